// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashSet;

use super::call_site::CallSiteId;
use super::pag::PagEdgeKind;
use crate::ir::{FuncId, MethodId, StmtId, ValueId};

/// A tuple type consisting of source value, destination value, edge kind and
/// the statement the edge comes from.
pub type InternalEdge = (ValueId, ValueId, PagEdgeKind, StmtId);

/// The context-insensitive summary of one function body.
pub struct FuncPag {
    pub(crate) func_id: FuncId,
    pub(crate) internal_edges: Vec<InternalEdge>,
    /// Static fields and globals the body touches.
    pub(crate) static_variables_involved: HashSet<ValueId>,
    pub(crate) return_values: Vec<ValueId>,
    /// Allocations stored straight into a field, as (allocation, field,
    /// statement). They pass through a temporary when instantiated.
    pub(crate) field_allocs: Vec<(ValueId, ValueId, StmtId)>,

    // Call sites statically resolved before the analysis.
    pub(crate) normal_callsites: Vec<CallSiteId>,
    // Call sites resolved on-the-fly from the points-to set of their receiver.
    pub(crate) dynamic_callsites: Vec<CallSiteId>,
    // Call sites whose receiver has no known type; resolved by method name
    // or through a field holding a function.
    pub(crate) unknown_callsites: Vec<CallSiteId>,
}

impl FuncPag {
    pub fn new(func_id: FuncId) -> Self {
        FuncPag {
            func_id,
            internal_edges: Vec::new(),
            static_variables_involved: HashSet::new(),
            return_values: Vec::new(),
            field_allocs: Vec::new(),
            normal_callsites: Vec::new(),
            dynamic_callsites: Vec::new(),
            unknown_callsites: Vec::new(),
        }
    }

    pub fn func_id(&self) -> FuncId {
        self.func_id
    }

    pub fn add_internal_edge(&mut self, src: ValueId, dst: ValueId, kind: PagEdgeKind, stmt: StmtId) {
        self.internal_edges.push((src, dst, kind, stmt));
    }

    pub fn internal_edges(&self) -> &[InternalEdge] {
        &self.internal_edges
    }

    pub fn add_static_variables_involved(&mut self, value: ValueId) {
        self.static_variables_involved.insert(value);
    }

    pub fn is_static_variable(&self, value: ValueId) -> bool {
        self.static_variables_involved.contains(&value)
    }

    pub fn add_return_value(&mut self, value: ValueId) {
        self.return_values.push(value);
    }

    pub fn add_field_alloc(&mut self, alloc: ValueId, field: ValueId, stmt: StmtId) {
        self.field_allocs.push((alloc, field, stmt));
    }

    pub fn field_allocs(&self) -> &[(ValueId, ValueId, StmtId)] {
        &self.field_allocs
    }

    pub fn add_normal_callsite(&mut self, callsite: CallSiteId) {
        self.normal_callsites.push(callsite);
    }

    pub fn add_dynamic_callsite(&mut self, callsite: CallSiteId) {
        self.dynamic_callsites.push(callsite);
    }

    pub fn add_unknown_callsite(&mut self, callsite: CallSiteId) {
        self.unknown_callsites.push(callsite);
    }

    pub fn normal_callsites(&self) -> &[CallSiteId] {
        &self.normal_callsites
    }

    pub fn dynamic_callsites(&self) -> &[CallSiteId] {
        &self.dynamic_callsites
    }

    pub fn unknown_callsites(&self) -> &[CallSiteId] {
        &self.unknown_callsites
    }
}

/// A binding between a local of this function and the variable of an
/// enclosing scope or another module it refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InterFuncEdge {
    /// The method declaring the variable.
    pub src_method: MethodId,
    pub src: ValueId,
    /// The local of this function referring to it.
    pub dst: ValueId,
    /// Set when this function writes the captured variable.
    pub reverse: bool,
}

/// Cross-scope edges of one function: closure captures, module-level
/// variables and imports.
pub struct InterFuncPag {
    pub(crate) func_id: FuncId,
    pub(crate) edges: Vec<InterFuncEdge>,
}

impl InterFuncPag {
    pub fn new(func_id: FuncId) -> Self {
        InterFuncPag { func_id, edges: Vec::new() }
    }

    pub fn add_edge(&mut self, edge: InterFuncEdge) {
        if let Some(existing) = self.edges.iter_mut().find(|e| e.src == edge.src && e.dst == edge.dst) {
            existing.reverse |= edge.reverse;
        } else {
            self.edges.push(edge);
        }
    }

    pub fn edges(&self) -> &[InterFuncEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Methods whose variables this function refers to.
    pub fn source_methods(&self) -> Vec<MethodId> {
        let mut methods: Vec<MethodId> = self.edges.iter().map(|e| e.src_method).collect();
        methods.sort();
        methods.dedup();
        methods
    }
}
