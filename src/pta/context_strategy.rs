// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Context selection policies.
//!
//! All three selectors build callee contexts the same way: prepend one item
//! to the caller context and keep the newest `k` items. They differ in the
//! item they prepend.

use log::*;
use serde::{Deserialize, Serialize};

use super::context::{Context, ContextCache, ContextId, ContextItem, DUMMY_CID};
use crate::graph::call_site::CallSiteId;
use crate::graph::pag::NodeId;
use crate::ir::FuncId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextType {
    CallSite,
    Obj,
    Func,
}

impl Default for ContextType {
    fn default() -> Self {
        ContextType::CallSite
    }
}

pub trait ContextSelector {
    fn context_type(&self) -> ContextType;

    fn k(&self) -> usize;

    fn cache(&self) -> &ContextCache;

    fn cache_mut(&mut self) -> &mut ContextCache;

    /// The context an entry function is analysed under.
    fn empty_context(&mut self, seed: FuncId) -> ContextId;

    /// Derives the context of `callee` called at `call_site` from the
    /// caller context. `discriminant` is the receiver object, if any.
    fn select_context(
        &mut self,
        caller_cid: ContextId,
        call_site: CallSiteId,
        discriminant: Option<NodeId>,
        callee: FuncId,
    ) -> ContextId;

    /// Prepends `item` to the caller context and interns the result.
    fn extend_context(&mut self, caller_cid: ContextId, item: ContextItem) -> ContextId {
        let k = self.k();
        let cache = self.cache_mut();
        let Some(caller_ctx) = cache.get_context(caller_cid) else {
            warn!("Unknown caller context {:?}, falling back to the dummy context", caller_cid);
            return DUMMY_CID;
        };
        let elem = cache.get_or_new_item_id(item);
        let ctx = Context::new_k_limited_context(&caller_ctx, elem, k);
        cache.get_or_new_context_id(&ctx)
    }
}

pub struct KCallSiteSensitive {
    k: usize,
    ctx_cache: ContextCache,
}

impl KCallSiteSensitive {
    pub fn new(k: usize) -> Self {
        KCallSiteSensitive { k, ctx_cache: ContextCache::new() }
    }
}

impl ContextSelector for KCallSiteSensitive {
    fn context_type(&self) -> ContextType {
        ContextType::CallSite
    }

    fn k(&self) -> usize {
        self.k
    }

    fn cache(&self) -> &ContextCache {
        &self.ctx_cache
    }

    fn cache_mut(&mut self) -> &mut ContextCache {
        &mut self.ctx_cache
    }

    fn empty_context(&mut self, _seed: FuncId) -> ContextId {
        DUMMY_CID
    }

    fn select_context(
        &mut self,
        caller_cid: ContextId,
        call_site: CallSiteId,
        _discriminant: Option<NodeId>,
        callee: FuncId,
    ) -> ContextId {
        self.extend_context(caller_cid, ContextItem::CallSite { call_site, callee })
    }
}

pub struct KObjectSensitive {
    k: usize,
    ctx_cache: ContextCache,
}

impl KObjectSensitive {
    pub fn new(k: usize) -> Self {
        KObjectSensitive { k, ctx_cache: ContextCache::new() }
    }
}

impl ContextSelector for KObjectSensitive {
    fn context_type(&self) -> ContextType {
        ContextType::Obj
    }

    fn k(&self) -> usize {
        self.k
    }

    fn cache(&self) -> &ContextCache {
        &self.ctx_cache
    }

    fn cache_mut(&mut self) -> &mut ContextCache {
        &mut self.ctx_cache
    }

    fn empty_context(&mut self, _seed: FuncId) -> ContextId {
        DUMMY_CID
    }

    fn select_context(
        &mut self,
        caller_cid: ContextId,
        _call_site: CallSiteId,
        discriminant: Option<NodeId>,
        _callee: FuncId,
    ) -> ContextId {
        // Calls without a receiver object stay in the caller's context.
        match discriminant {
            Some(heap) => self.extend_context(caller_cid, ContextItem::Obj { heap }),
            None => caller_cid,
        }
    }
}

pub struct KFuncSensitive {
    k: usize,
    ctx_cache: ContextCache,
}

impl KFuncSensitive {
    pub fn new(k: usize) -> Self {
        KFuncSensitive { k, ctx_cache: ContextCache::new() }
    }
}

impl ContextSelector for KFuncSensitive {
    fn context_type(&self) -> ContextType {
        ContextType::Func
    }

    fn k(&self) -> usize {
        self.k
    }

    fn cache(&self) -> &ContextCache {
        &self.ctx_cache
    }

    fn cache_mut(&mut self) -> &mut ContextCache {
        &mut self.ctx_cache
    }

    /// Entries are seeded with themselves, so function sensitivity never
    /// runs under the empty context.
    fn empty_context(&mut self, seed: FuncId) -> ContextId {
        self.extend_context(DUMMY_CID, ContextItem::Func { func: seed })
    }

    fn select_context(
        &mut self,
        caller_cid: ContextId,
        _call_site: CallSiteId,
        _discriminant: Option<NodeId>,
        callee: FuncId,
    ) -> ContextId {
        self.extend_context(caller_cid, ContextItem::Func { func: callee })
    }
}

pub fn new_context_selector(context_type: ContextType, k: usize) -> Box<dyn ContextSelector> {
    match context_type {
        ContextType::CallSite => Box::new(KCallSiteSensitive::new(k)),
        ContextType::Obj => Box::new(KObjectSensitive::new(k)),
        ContextType::Func => Box::new(KFuncSensitive::new(k)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::bit_vec::Idx;

    #[test]
    fn call_site_contexts_are_k_limited() {
        let mut selector = KCallSiteSensitive::new(1);
        let entry = selector.empty_context(FuncId::new(0));
        assert_eq!(entry, DUMMY_CID);
        let c1 = selector.select_context(entry, CallSiteId::new(1), None, FuncId::new(1));
        let c2 = selector.select_context(c1, CallSiteId::new(2), None, FuncId::new(2));
        let c2_again = selector.select_context(entry, CallSiteId::new(2), None, FuncId::new(2));
        assert_ne!(c1, c2);
        assert_eq!(c2, c2_again);
        assert_eq!(selector.cache().get_context(c2).unwrap().len(), 1);
    }

    #[test]
    fn object_sensitivity_without_receiver_keeps_caller_context() {
        let mut selector = KObjectSensitive::new(2);
        let c1 = selector.select_context(DUMMY_CID, CallSiteId::new(1), Some(NodeId::new(7)), FuncId::new(1));
        assert_ne!(c1, DUMMY_CID);
        assert_eq!(selector.select_context(c1, CallSiteId::new(3), None, FuncId::new(2)), c1);
        assert_eq!(
            selector.cache().context_items(c1),
            vec![ContextItem::Obj { heap: NodeId::new(7) }]
        );
    }

    #[test]
    fn function_sensitivity_seeds_entries() {
        let mut selector = KFuncSensitive::new(1);
        let entry = selector.empty_context(FuncId::new(4));
        assert_ne!(entry, DUMMY_CID);
        assert_eq!(selector.cache().context_items(entry), vec![ContextItem::Func { func: FuncId::new(4) }]);
    }

    #[test]
    fn unknown_caller_context_falls_back_to_dummy() {
        let mut selector = KCallSiteSensitive::new(1);
        let bogus = ContextId::new(42);
        assert_eq!(selector.select_context(bogus, CallSiteId::new(1), None, FuncId::new(1)), DUMMY_CID);
    }
}
