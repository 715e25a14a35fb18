// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Builds the Pointer Assignment Graph (PAG) for a single function.
//!
//! The Function PAG is part of the PAG for the whole program. It is
//! context-insensitive: edges are recorded between IR values and only
//! instantiated into PAG nodes once a context is chosen for the function.

use log::*;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result};

use crate::builder::call_graph_builder;
use crate::graph::call_graph::CallGraph;
use crate::graph::call_site::CallArg;
use crate::graph::func_pag::{FuncPag, InterFuncEdge, InterFuncPag};
use crate::graph::pag::PagEdgeKind;
use crate::ir::known_names::GLOBAL_THIS;
use crate::ir::types::{PTR_INVOKE_NAME, UNKNOWN_CLASS};
use crate::ir::{FieldSignature, FuncId, MethodSignature, Scene, StmtId, StmtKind, Value, ValueId};

/// Key under which references to the same global location are merged.
#[derive(Clone, PartialEq, Eq, Hash)]
enum GlobalKey {
    Static(FieldSignature),
    Global(String),
}

/// A visitor that traverses the statements of a function body and builds
/// the function's pointer assignment graph.
pub struct FuncPagBuilder<'a, 's> {
    scene: &'s Scene,
    func_id: FuncId,
    cg: &'a mut CallGraph,
    /// Pointer Assignment Graph for this function.
    fpag: &'a mut FuncPag,
    inter_fpag: &'a mut InterFuncPag,
    /// Representative value of each static field or global property.
    globals: HashMap<GlobalKey, ValueId>,
}

impl<'a, 's> Debug for FuncPagBuilder<'a, 's> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        "FuncPagBuilder".fmt(f)
    }
}

impl<'a, 's> FuncPagBuilder<'a, 's> {
    pub fn new(
        scene: &'s Scene,
        func_id: FuncId,
        cg: &'a mut CallGraph,
        fpag: &'a mut FuncPag,
        inter_fpag: &'a mut InterFuncPag,
    ) -> FuncPagBuilder<'a, 's> {
        debug!("Building FuncPag for {:?}: {}", func_id, scene.method(func_id).signature);
        FuncPagBuilder {
            scene,
            func_id,
            cg,
            fpag,
            inter_fpag,
            globals: HashMap::new(),
        }
    }

    /// Builds the PAG.
    pub fn build(&mut self) {
        let scene = self.scene;
        for stmt_id in scene.method(self.func_id).stmts() {
            match scene.stmt(*stmt_id).kind {
                StmtKind::Assign { lhs, rhs } => self.visit_assign(*stmt_id, lhs, rhs),
                StmtKind::Invoke { expr } => self.visit_invoke(*stmt_id, expr),
                StmtKind::Return { op } => self.visit_return(op),
                StmtKind::ReturnVoid | StmtKind::Nop => {}
            }
        }
    }

    fn visit_assign(&mut self, stmt: StmtId, lhs: ValueId, rhs: ValueId) {
        let scene = self.scene;
        let rhs_value = scene.value(rhs);
        // Formals and the receiver are bound when calls are wired.
        if matches!(rhs_value, Value::Parameter { .. } | Value::This { .. }) {
            return;
        }
        if rhs_value.is_invoke() {
            self.visit_lhs_operand(lhs);
            self.visit_invoke(stmt, rhs);
            return;
        }

        let lhs = self.visit_lhs_operand(lhs);
        if rhs_value.is_allocation() {
            if !self.is_pointer_like(lhs) {
                debug!("Skipping allocation into {}", scene.value_to_string(lhs));
            } else if scene.is_heap_ref(lhs) {
                self.fpag.add_field_alloc(rhs, lhs, stmt);
            } else {
                self.fpag.add_internal_edge(rhs, lhs, PagEdgeKind::Address, stmt);
            }
            return;
        }
        if !self.is_pointer_like(rhs) {
            return;
        }
        let rhs = self.visit_rhs_operand(rhs);
        match (scene.is_heap_ref(lhs), scene.is_heap_ref(rhs)) {
            (false, false) => self.fpag.add_internal_edge(rhs, lhs, PagEdgeKind::Copy, stmt),
            (false, true) => self.fpag.add_internal_edge(rhs, lhs, PagEdgeKind::Load, stmt),
            (true, false) => self.fpag.add_internal_edge(rhs, lhs, PagEdgeKind::Write, stmt),
            (true, true) => debug!(
                "Unexpected field to field assignment {} = {}",
                scene.value_to_string(lhs),
                scene.value_to_string(rhs)
            ),
        }
    }

    fn visit_invoke(&mut self, stmt: StmtId, expr: ValueId) {
        let scene = self.scene;
        let value = scene.value(expr);
        for op in value.operands() {
            self.visit_rhs_operand(op);
        }

        let call_sites = call_graph_builder::resolve_call_stmt(scene, self.cg, stmt, self.func_id);
        if !call_sites.is_empty() {
            for cs in call_sites {
                self.fpag.add_normal_callsite(cs);
            }
            return;
        }

        let (sig, receiver, proto_callee) = match value {
            Value::InstanceInvoke { base, method, .. } => {
                (method.clone(), *base, scene.method_by_sig(method))
            }
            Value::PtrInvoke { ptr, .. } => {
                (MethodSignature::new(UNKNOWN_CLASS, PTR_INVOKE_NAME), *ptr, None)
            }
            Value::StaticInvoke { method, .. } => {
                warn!("Unresolved static call to {} in {}", method, scene.method(self.func_id).signature);
                return;
            }
            _ => return,
        };
        let args = value
            .invoke_args()
            .unwrap_or_default()
            .iter()
            .map(|arg| CallArg::Value(*arg))
            .collect();
        let unknown = sig.has_unknown_class() && sig.name != PTR_INVOKE_NAME;
        let cs = self.cg.call_site_manager_mut().new_dyn_call_site(
            Some(stmt),
            sig,
            Some(args),
            scene.stmt(stmt).lhs(),
            Some(CallArg::Value(receiver)),
            self.func_id,
            proto_callee,
        );
        if unknown {
            self.fpag.add_unknown_callsite(cs);
        } else {
            self.fpag.add_dynamic_callsite(cs);
        }
    }

    fn visit_return(&mut self, op: ValueId) {
        let op = self.visit_rhs_operand(op);
        self.fpag.add_return_value(op);
    }

    fn visit_lhs_operand(&mut self, value: ValueId) -> ValueId {
        self.visit_operand(value, true)
    }

    fn visit_rhs_operand(&mut self, value: ValueId) -> ValueId {
        self.visit_operand(value, false)
    }

    /// Records captures of the operand and returns the representative of the
    /// location it denotes.
    fn visit_operand(&mut self, value: ValueId, is_write: bool) -> ValueId {
        let scene = self.scene;
        match scene.value(value) {
            Value::Local { .. } => {
                self.check_external_local(value, is_write);
                value
            }
            Value::InstanceField { base, .. } => {
                self.check_external_local(*base, false);
                match scene.global_property(value) {
                    Some(name) => {
                        let rep = *self.globals.entry(GlobalKey::Global(name.to_string())).or_insert(value);
                        self.fpag.add_static_variables_involved(rep);
                        rep
                    }
                    None => value,
                }
            }
            Value::ArrayRef { base, .. } => {
                self.check_external_local(*base, false);
                value
            }
            Value::StaticField { field } => {
                let rep = *self.globals.entry(GlobalKey::Static(field.clone())).or_insert(value);
                self.fpag.add_static_variables_involved(rep);
                rep
            }
            _ => value,
        }
    }

    /// Records a binding for a local this function uses without declaring it.
    fn check_external_local(&mut self, value: ValueId, is_write: bool) {
        let scene = self.scene;
        if !scene.value(value).is_local() || scene.is_declared_in(self.func_id, value) {
            return;
        }
        if scene.value(value).local_name() == Some(GLOBAL_THIS) {
            return;
        }
        match scene.resolve_external_local(self.func_id, value) {
            Some((src_method, src)) => self.inter_fpag.add_edge(InterFuncEdge {
                src_method,
                src,
                dst: value,
                reverse: is_write,
            }),
            None => warn!(
                "Cannot resolve external local {} used in {}",
                scene.value_to_string(value),
                scene.method(self.func_id).signature
            ),
        }
    }

    fn is_pointer_like(&self, value: ValueId) -> bool {
        matches!(
            self.scene.value(value),
            Value::Local { .. } | Value::InstanceField { .. } | Value::StaticField { .. } | Value::ArrayRef { .. }
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{SceneBuilder, Type};

    fn build(scene: &Scene, func: FuncId) -> (FuncPag, InterFuncPag) {
        let mut cg = CallGraph::new();
        let mut fpag = FuncPag::new(func);
        let mut inter = InterFuncPag::new(func);
        FuncPagBuilder::new(scene, func, &mut cg, &mut fpag, &mut inter).build();
        (fpag, inter)
    }

    #[test]
    fn assignments_are_classified() {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        sb.add_class(file, "Foo", None);
        let main = sb.add_function(file, "main", &[], Type::Void);
        let a = sb.local(main, "a", Type::class("Foo"));
        let b = sb.local(main, "b", Type::class("Foo"));
        let c = sb.local(main, "c", Type::class("Foo"));
        sb.new_object(main, a, "Foo", vec![]);
        sb.assign(main, b, a);
        let fa = sb.field(a, "Foo", "f");
        sb.assign(main, fa, b);
        let fa2 = sb.field(a, "Foo", "f");
        sb.assign(main, c, fa2);
        let one = sb.num_const("1");
        sb.assign(main, c, one);
        let scene = sb.finish();

        let (fpag, inter) = build(&scene, main);
        let kinds: Vec<PagEdgeKind> = fpag.internal_edges().iter().map(|e| e.2).collect();
        assert_eq!(
            kinds,
            vec![PagEdgeKind::Address, PagEdgeKind::Copy, PagEdgeKind::Write, PagEdgeKind::Load]
        );
        assert!(inter.is_empty());
    }

    #[test]
    fn global_properties_and_field_allocations() {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        sb.add_class(file, "Foo", None);
        let main = sb.add_function(file, "main", &[], Type::Void);
        let a = sb.local(main, "a", Type::class("Foo"));
        let b = sb.local(main, "b", Type::class("Foo"));
        let g = sb.free_local(GLOBAL_THIS, Type::Any);
        let gx = sb.field(g, "Object", "x");
        let gx2 = sb.field(g, "Object", "x");
        let s1 = sb.assign(main, gx, a);
        let s2 = sb.assign(main, b, gx2);
        let af = sb.field(a, "Foo", "f");
        let new_foo = sb.new_expr("Foo");
        let stmt = sb.assign(main, af, new_foo);
        let scene = sb.finish();

        let (fpag, inter) = build(&scene, main);
        assert!(inter.is_empty());
        assert_eq!(
            fpag.internal_edges(),
            &[(a, gx, PagEdgeKind::Copy, s1), (gx, b, PagEdgeKind::Copy, s2)]
        );
        assert!(fpag.is_static_variable(gx));
        assert_eq!(fpag.field_allocs(), &[(new_foo, af, stmt)]);
    }

    #[test]
    fn calls_are_bucketed() {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        let a = sb.add_class(file, "A", None);
        sb.add_method(a, "foo", &[], Type::Void);
        let b = sb.add_class(file, "B", Some("A"));
        sb.add_method(b, "foo", &[], Type::Void);
        sb.add_method(a, "bar", &[], Type::Void);
        let main = sb.add_function(file, "main", &[], Type::Void);
        let x = sb.local(main, "x", Type::class("A"));
        let y = sb.local(main, "y", Type::Unknown);
        let f = sb.local(main, "f", Type::Unknown);
        sb.call_instance(main, None, x, MethodSignature::new("A", "foo"), vec![]);
        sb.call_instance(main, None, x, MethodSignature::new("A", "bar"), vec![]);
        sb.call_instance(main, None, y, MethodSignature::new(UNKNOWN_CLASS, "run"), vec![]);
        sb.call_ptr(main, None, f, vec![]);
        let scene = sb.finish();

        let (fpag, _) = build(&scene, main);
        assert_eq!(fpag.normal_callsites().len(), 1);
        assert_eq!(fpag.dynamic_callsites().len(), 2);
        assert_eq!(fpag.unknown_callsites().len(), 1);
    }

    #[test]
    fn captures_and_static_fields_are_recorded() {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        let outer = sb.add_function(file, "outer", &[], Type::Void);
        let v = sb.local(outer, "v", Type::class("Foo"));
        let inner = sb.add_closure(outer, "inner", &[], Type::Void);
        let captured = sb.free_local("v", Type::class("Foo"));
        let s1 = sb.static_field("Foo", "inst");
        let s2 = sb.static_field("Foo", "inst");
        let t = sb.local(inner, "t", Type::class("Foo"));
        sb.assign(inner, s1, captured);
        sb.assign(inner, t, s2);
        sb.assign(inner, captured, t);
        let scene = sb.finish();

        let (fpag, inter) = build(&scene, inner);
        assert_eq!(inter.edges().len(), 1);
        let edge = inter.edges()[0];
        assert_eq!((edge.src_method, edge.src, edge.dst), (outer, v, captured));
        assert!(edge.reverse);
        // Both static field references collapse onto the first.
        assert!(fpag.is_static_variable(s1));
        assert!(!fpag.is_static_variable(s2));
        assert_eq!(fpag.internal_edges()[1].0, s1);
    }
}
