// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use crate::graph::pag::NodeId;
use crate::ir::{FuncId, MethodSignature, StmtId, ValueId};
use crate::util::newtype_index;

newtype_index! {
    pub struct CallSiteId { DEBUG_FORMAT = "CallSite({})" }
}

/// An actual argument. Synthesised calls may pass PAG nodes that have no IR
/// counterpart, such as a container's element slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallArg {
    Value(ValueId),
    Node(NodeId),
}

/// A call site with a fixed callee.
#[derive(Clone, Debug)]
pub struct CallSite {
    pub id: CallSiteId,
    pub stmt: Option<StmtId>,
    pub sig: MethodSignature,
    pub args: Option<Vec<CallArg>>,
    pub lhs: Option<ValueId>,
    /// Base of an instance invoke.
    pub receiver: Option<ValueId>,
    pub caller: FuncId,
    pub callee: FuncId,
    /// The dynamic call site this one was cloned from.
    pub origin: Option<CallSiteId>,
}

/// A call site whose callee depends on what its receiver points to.
#[derive(Clone, Debug)]
pub struct DynCallSite {
    pub id: CallSiteId,
    pub stmt: Option<StmtId>,
    pub sig: MethodSignature,
    pub args: Option<Vec<CallArg>>,
    pub lhs: Option<ValueId>,
    /// Base of an instance invoke or the pointer of a pointer invoke.
    pub receiver: Option<CallArg>,
    pub caller: FuncId,
    /// The callee named by the declared signature, if it exists.
    pub proto_callee: Option<FuncId>,
}

#[derive(Clone, Debug)]
pub enum ICallSite {
    Static(CallSite),
    Dynamic(DynCallSite),
}

impl ICallSite {
    pub fn id(&self) -> CallSiteId {
        match self {
            ICallSite::Static(cs) => cs.id,
            ICallSite::Dynamic(cs) => cs.id,
        }
    }

    pub fn stmt(&self) -> Option<StmtId> {
        match self {
            ICallSite::Static(cs) => cs.stmt,
            ICallSite::Dynamic(cs) => cs.stmt,
        }
    }

    pub fn caller(&self) -> FuncId {
        match self {
            ICallSite::Static(cs) => cs.caller,
            ICallSite::Dynamic(cs) => cs.caller,
        }
    }
}

/// Owns every call site of a run. Ids grow monotonically and are shared by
/// static and dynamic sites.
#[derive(Default)]
pub struct CallSiteManager {
    call_sites: Vec<ICallSite>,
    dyn_to_static: HashMap<(CallSiteId, FuncId), CallSiteId>,
}

impl CallSiteManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> CallSiteId {
        CallSiteId::from_u32(self.call_sites.len() as u32)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_call_site(
        &mut self,
        stmt: Option<StmtId>,
        sig: MethodSignature,
        args: Option<Vec<CallArg>>,
        lhs: Option<ValueId>,
        receiver: Option<ValueId>,
        caller: FuncId,
        callee: FuncId,
    ) -> CallSiteId {
        let id = self.next_id();
        self.call_sites.push(ICallSite::Static(CallSite {
            id,
            stmt,
            sig,
            args,
            lhs,
            receiver,
            caller,
            callee,
            origin: None,
        }));
        id
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_dyn_call_site(
        &mut self,
        stmt: Option<StmtId>,
        sig: MethodSignature,
        args: Option<Vec<CallArg>>,
        lhs: Option<ValueId>,
        receiver: Option<CallArg>,
        caller: FuncId,
        proto_callee: Option<FuncId>,
    ) -> CallSiteId {
        let id = self.next_id();
        self.call_sites.push(ICallSite::Dynamic(DynCallSite {
            id,
            stmt,
            sig,
            args,
            lhs,
            receiver,
            caller,
            proto_callee,
        }));
        id
    }

    pub fn get(&self, id: CallSiteId) -> Option<&ICallSite> {
        self.call_sites.get(id.as_usize())
    }

    pub fn get_call_site(&self, id: CallSiteId) -> Option<&CallSite> {
        match self.get(id)? {
            ICallSite::Static(cs) => Some(cs),
            ICallSite::Dynamic(_) => None,
        }
    }

    pub fn get_dyn_call_site(&self, id: CallSiteId) -> Option<&DynCallSite> {
        match self.get(id)? {
            ICallSite::Dynamic(cs) => Some(cs),
            ICallSite::Static(_) => None,
        }
    }

    /// Returns the static call site standing for `dyn_id` resolved to
    /// `callee`, creating it on first request.
    pub fn clone_call_site_from_dyn(&mut self, dyn_id: CallSiteId, callee: FuncId) -> Option<CallSiteId> {
        if let Some(id) = self.dyn_to_static.get(&(dyn_id, callee)) {
            return Some(*id);
        }
        let dyn_cs = self.get_dyn_call_site(dyn_id)?.clone();
        let receiver = match dyn_cs.receiver {
            Some(CallArg::Value(v)) => Some(v),
            _ => None,
        };
        let id = self.next_id();
        self.call_sites.push(ICallSite::Static(CallSite {
            id,
            stmt: dyn_cs.stmt,
            sig: dyn_cs.sig,
            args: dyn_cs.args,
            lhs: dyn_cs.lhs,
            receiver,
            caller: dyn_cs.caller,
            callee,
            origin: Some(dyn_id),
        }));
        self.dyn_to_static.insert((dyn_id, callee), id);
        Some(id)
    }

    /// Static clones of `dyn_id` created so far.
    pub fn cloned_call_sites(&self, dyn_id: CallSiteId) -> Vec<CallSiteId> {
        let mut clones: Vec<CallSiteId> = self
            .dyn_to_static
            .iter()
            .filter(|((d, _), _)| *d == dyn_id)
            .map(|(_, cs)| *cs)
            .collect();
        clones.sort();
        clones
    }

    pub fn len(&self) -> usize {
        self.call_sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.call_sites.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::bit_vec::Idx;

    fn dyn_site(csm: &mut CallSiteManager) -> CallSiteId {
        csm.new_dyn_call_site(
            Some(StmtId::new(3)),
            MethodSignature::new("A", "foo"),
            Some(vec![CallArg::Value(ValueId::new(5))]),
            None,
            Some(CallArg::Value(ValueId::new(4))),
            FuncId::new(0),
            None,
        )
    }

    #[test]
    fn clones_are_unique_per_callee() {
        let mut csm = CallSiteManager::new();
        let d = dyn_site(&mut csm);
        let a = csm.clone_call_site_from_dyn(d, FuncId::new(1)).unwrap();
        let a_again = csm.clone_call_site_from_dyn(d, FuncId::new(1)).unwrap();
        let b = csm.clone_call_site_from_dyn(d, FuncId::new(2)).unwrap();
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(csm.cloned_call_sites(d), vec![a, b]);

        let clone = csm.get_call_site(a).unwrap();
        assert_eq!(clone.origin, Some(d));
        assert_eq!(clone.receiver, Some(ValueId::new(4)));
        assert_eq!(clone.callee, FuncId::new(1));
    }

    #[test]
    fn static_sites_cannot_be_cloned() {
        let mut csm = CallSiteManager::new();
        let s = csm.new_call_site(None, MethodSignature::new("A", "bar"), None, None, None, FuncId::new(0), FuncId::new(1));
        assert!(csm.clone_call_site_from_dyn(s, FuncId::new(1)).is_none());
        assert!(csm.get_dyn_call_site(s).is_none());
        assert_eq!(csm.len(), 1);
    }
}
