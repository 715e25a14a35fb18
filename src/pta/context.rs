// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result};
use std::rc::Rc;

use crate::graph::call_site::CallSiteId;
use crate::graph::pag::NodeId;
use crate::ir::FuncId;
use crate::util::newtype_index;

newtype_index! {
    /// The unique identifier for each context.
    pub struct ContextId { DEBUG_FORMAT = "ContextId({})" }
}

newtype_index! {
    pub struct ContextItemId { DEBUG_FORMAT = "ContextItemId({})" }
}

/// The empty context. Also used wherever contexts are merged, e.g. for
/// static fields and singleton functions.
pub const DUMMY_CID: ContextId = ContextId::from_u32(0);

/// A function analysed under a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CSFuncId {
    pub cid: ContextId,
    pub func_id: FuncId,
}

impl CSFuncId {
    pub fn new(cid: ContextId, func_id: FuncId) -> Self {
        CSFuncId { cid, func_id }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextItem {
    CallSite { call_site: CallSiteId, callee: FuncId },
    Obj { heap: NodeId },
    Func { func: FuncId },
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Context {
    pub(crate) context_elems: Vec<ContextItemId>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.context_elems.fmt(f)
    }
}

impl Context {
    pub fn new_empty() -> Rc<Self> {
        Rc::new(Context { context_elems: Vec::new() })
    }

    pub fn new(context_elems: Vec<ContextItemId>) -> Rc<Self> {
        Rc::new(Context { context_elems })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.context_elems.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.context_elems.is_empty()
    }

    pub fn elems(&self) -> &[ContextItemId] {
        &self.context_elems
    }

    /// Compose a new context from a given context and a new context element.
    /// The oldest elements are discarded once the length exceeds `k`.
    pub fn new_k_limited_context(old_ctx: &Rc<Context>, elem: ContextItemId, k: usize) -> Rc<Self> {
        let mut elems = Vec::with_capacity(k);
        if k > 0 {
            elems.push(elem);
            if old_ctx.len() < k {
                elems.extend_from_slice(&old_ctx.context_elems[..])
            } else {
                elems.extend_from_slice(&old_ctx.context_elems[..k - 1])
            }
        }
        Rc::new(Context { context_elems: elems })
    }

    pub fn first_context_element(&self) -> Option<ContextItemId> {
        self.context_elems.first().copied()
    }
}

/// Interns contexts and the items they are made of.
#[derive(Debug)]
pub struct ContextCache {
    context_list: Vec<Rc<Context>>,
    context_to_index_map: HashMap<Rc<Context>, ContextId>,
    item_list: Vec<ContextItem>,
    item_to_index_map: HashMap<ContextItem, ContextItemId>,
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextCache {
    /// Creates a cache in which the empty context is `DUMMY_CID`.
    pub fn new() -> ContextCache {
        let mut cache = ContextCache {
            context_list: Vec::new(),
            context_to_index_map: HashMap::new(),
            item_list: Vec::new(),
            item_to_index_map: HashMap::new(),
        };
        let dummy = cache.get_or_new_context_id(&Context::new_empty());
        debug_assert_eq!(dummy, DUMMY_CID);
        cache
    }

    pub fn get_or_new_context_id(&mut self, context: &Rc<Context>) -> ContextId {
        if let Some(id) = self.context_to_index_map.get(context) {
            *id
        } else {
            let id = ContextId::from_u32(self.context_list.len() as u32);
            self.context_list.push(context.clone());
            self.context_to_index_map.insert(context.clone(), id);
            id
        }
    }

    pub fn get_or_new_item_id(&mut self, item: ContextItem) -> ContextItemId {
        if let Some(id) = self.item_to_index_map.get(&item) {
            *id
        } else {
            let id = ContextItemId::from_u32(self.item_list.len() as u32);
            self.item_list.push(item);
            self.item_to_index_map.insert(item, id);
            id
        }
    }

    pub fn get_context(&self, id: ContextId) -> Option<Rc<Context>> {
        self.context_list.get(id.as_usize()).cloned()
    }

    pub fn get_item(&self, id: ContextItemId) -> Option<ContextItem> {
        self.item_list.get(id.as_usize()).copied()
    }

    /// Items of the context `id`, newest first.
    pub fn context_items(&self, id: ContextId) -> Vec<ContextItem> {
        self.get_context(id)
            .map(|ctx| ctx.elems().iter().filter_map(|e| self.get_item(*e)).collect())
            .unwrap_or_default()
    }

    pub fn num_contexts(&self) -> usize {
        self.context_list.len()
    }
}
