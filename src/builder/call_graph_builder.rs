// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! This module provides essential functions for resolving call targets
//! before the pointer analysis starts.

use std::collections::BTreeSet;

use log::*;

use crate::graph::call_graph::CallGraph;
use crate::graph::call_site::{CallArg, CallSiteId};
use crate::ir::known_names::is_receiver_dependent_class;
use crate::ir::types::CONSTRUCTOR_NAME;
use crate::ir::{FuncId, MethodId, MethodSignature, Scene, StmtId, Value};

/// Resolves the call statement `stmt` of `caller` to its statically known
/// call sites. The result is cached in the call graph, so every statement is
/// resolved once. An empty result means the call must be resolved on-the-fly.
pub fn resolve_call_stmt(scene: &Scene, cg: &mut CallGraph, stmt: StmtId, caller: FuncId) -> Vec<CallSiteId> {
    if let Some(call_sites) = cg.get_call_sites_by_stmt(stmt) {
        return call_sites.clone();
    }
    let Some(expr) = scene.invoke_expr(stmt) else {
        return Vec::new();
    };
    let lhs = scene.stmt(stmt).lhs();
    let (sig, callees, receiver) = match scene.value(expr) {
        Value::StaticInvoke { method, .. } => {
            (method.clone(), scene.method_by_sig(method).into_iter().collect(), None)
        }
        Value::InstanceInvoke { base, method, .. } => {
            (method.clone(), resolve_instance_invoke(scene, method), Some(*base))
        }
        _ => return Vec::new(),
    };
    let args: Vec<CallArg> = scene
        .value(expr)
        .invoke_args()
        .unwrap_or_default()
        .iter()
        .map(|arg| CallArg::Value(*arg))
        .collect();

    let call_sites: Vec<CallSiteId> = callees
        .into_iter()
        .map(|callee| {
            cg.call_site_manager_mut().new_call_site(
                Some(stmt),
                sig.clone(),
                Some(args.clone()),
                lhs,
                receiver,
                caller,
                callee,
            )
        })
        .collect();
    cg.set_stmt_call_sites(stmt, call_sites.clone());
    call_sites
}

/// Devirtualizes an instance invoke with class hierarchy analysis.
///
/// Returns the target only if the declared class and its subclasses agree on
/// exactly one concrete implementation. Constructors are never virtual.
/// Calls on containers and function objects depend on the receiver object and
/// are never resolved here.
pub fn resolve_instance_invoke(scene: &Scene, sig: &MethodSignature) -> Vec<MethodId> {
    if sig.has_unknown_class() || is_receiver_dependent_class(&sig.class) {
        return Vec::new();
    }
    let Some(class) = scene.class_by_name(&sig.class) else {
        debug!("Class of {} is not in the scene", sig);
        return Vec::new();
    };
    if sig.name == CONSTRUCTOR_NAME {
        return scene.find_method_in_hierarchy(class, &sig.name).into_iter().collect();
    }

    let mut targets = BTreeSet::new();
    if let Some(m) = scene.find_method_in_hierarchy(class, &sig.name) {
        targets.insert(m);
    }
    for sub in scene.subclasses(class) {
        if let Some(m) = scene.class(sub).methods.get(&sig.name) {
            targets.insert(*m);
        }
    }
    let concrete: Vec<MethodId> = targets
        .into_iter()
        .filter(|m| !scene.method(*m).is_abstract)
        .collect();
    if concrete.len() == 1 {
        concrete
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{SceneBuilder, Type};

    #[test]
    fn single_implementation_is_resolved_statically() {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        let a = sb.add_class(file, "A", None);
        let foo = sb.add_method(a, "foo", &[], Type::Void);
        let b = sb.add_class(file, "B", Some("A"));
        sb.add_method(b, "bar", &[], Type::Void);
        let c = sb.add_class(file, "C", None);
        sb.add_abstract_method(c, "baz", &[], Type::Void);
        let d = sb.add_class(file, "D", Some("C"));
        let d_baz = sb.add_method(d, "baz", &[], Type::Void);
        let e = sb.add_class(file, "E", Some("C"));
        sb.add_method(e, "baz", &[], Type::Void);
        let scene = sb.finish();

        assert_eq!(resolve_instance_invoke(&scene, &MethodSignature::new("B", "foo")), vec![foo]);
        assert_eq!(resolve_instance_invoke(&scene, &MethodSignature::new("A", "foo")), vec![foo]);
        assert!(resolve_instance_invoke(&scene, &MethodSignature::new("C", "baz")).is_empty());
        assert_eq!(resolve_instance_invoke(&scene, &MethodSignature::new("D", "baz")), vec![d_baz]);
        assert!(resolve_instance_invoke(&scene, &MethodSignature::new("Array", "push")).is_empty());
    }

    #[test]
    fn call_statements_are_resolved_once() {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        let a = sb.add_class(file, "A", None);
        sb.add_method(a, "foo", &[], Type::Void);
        let main = sb.add_function(file, "main", &[], Type::Void);
        let x = sb.local(main, "x", Type::class("A"));
        sb.new_object(main, x, "A", vec![]);
        let call = sb.call_instance(main, None, x, MethodSignature::new("A", "foo"), vec![]);
        let scene = sb.finish();

        let mut cg = CallGraph::new();
        let first = resolve_call_stmt(&scene, &mut cg, call, main);
        assert_eq!(first.len(), 1);
        assert_eq!(resolve_call_stmt(&scene, &mut cg, call, main), first);
        assert_eq!(cg.call_site_manager().len(), 1);
        let cs = cg.call_site_manager().get_call_site(first[0]).unwrap();
        assert_eq!(cs.receiver, Some(x));
    }
}
