// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Reflective invocation through `Function.prototype`.
//!
//! - `f.call(o, a, b)` invokes `f` with `this = o` and parameters `a, b`.
//! - `f.apply(o, arr)` invokes `f` with `this = o` and every parameter
//!   reading the element slot of `arr`.
//! - `f.bind(o, a)` creates a bound function remembering `o`, the pre-applied
//!   arguments and the context of the binding call.

use log::*;

use super::PagPlugin;
use crate::builder::pag_builder::PagBuilder;
use crate::error::PtaResult;
use crate::graph::call_graph::CallGraphNodeKind;
use crate::graph::call_site::CallSite;
use crate::graph::pag::{BoundInfo, FieldKey, NodeId, PagEdgeKind};
use crate::ir::known_names::{KnownNames, FUNCTION_CLASS};
use crate::pta::context::ContextId;

pub struct FunctionPlugin;

fn function_known_name(cs: &CallSite) -> KnownNames {
    KnownNames::of(FUNCTION_CLASS, &cs.sig.name)
}

impl FunctionPlugin {
    fn process_call(
        &self,
        builder: &mut PagBuilder<'_>,
        cs: &CallSite,
        cid: ContextId,
        func_obj: NodeId,
        apply: bool,
    ) -> PtaResult<Vec<NodeId>> {
        let callee = cs.callee;
        let scene = builder.scene();
        if !scene.method(callee).has_body() {
            debug!("Reflective call of body-less {}", scene.method(callee).signature);
            return Ok(Vec::new());
        }
        builder.build_func_pag(callee);
        let callee_cid = builder.select_callee_context(cs, cid, Some(func_obj), callee);

        let mut srcs = Vec::new();
        if apply {
            if let Some(array) = builder.arg_node(cs, cid, 1) {
                let elements = builder.pag_mut().get_or_new_field_ref_node(array, FieldKey::Element);
                for param in scene.param_locals(callee).into_iter().flatten() {
                    let dst = builder.pag_mut().get_or_new_node(scene, callee_cid, param, None);
                    srcs.extend(builder.add_flow_edge(elements, dst, PagEdgeKind::Load, cs.stmt));
                }
            }
        } else {
            srcs.extend(builder.add_call_param_pag_edge(cs, cid, callee, callee_cid, 1, 0)?);
        }
        srcs.extend(builder.add_call_return_pag_edge(cs, cid, callee, callee_cid)?);
        if let Some(this_arg) = builder.arg_node(cs, cid, 0) {
            srcs.extend(builder.add_this_edge(this_arg, callee, callee_cid, cs.stmt)?);
        }

        builder.cg.add_node(callee, CallGraphNodeKind::of(scene.method(callee)));
        builder.schedule(callee, callee_cid);
        Ok(srcs)
    }

    fn process_bind(
        &self,
        builder: &mut PagBuilder<'_>,
        cs: &CallSite,
        cid: ContextId,
        func_obj: NodeId,
    ) -> PtaResult<Vec<NodeId>> {
        let Some(lhs) = builder.lhs_node(cs, cid) else {
            return Ok(Vec::new());
        };
        let num_args = cs.args.as_ref().map_or(0, |args| args.len());
        let bound = BoundInfo {
            call_site: cs.id,
            args_offset: num_args.saturating_sub(1),
            origin_cid: cid,
        };
        let this_node = builder.arg_node(cs, cid, 0);
        let bound_func = builder
            .pag_mut()
            .get_or_new_bound_func_node(func_obj, cs.callee, bound, this_node);
        builder.add_address_edge(bound_func, lhs, cs.stmt);
        Ok(Vec::new())
    }
}

impl PagPlugin for FunctionPlugin {
    fn name(&self) -> &'static str {
        "Function"
    }

    fn can_handle(&self, builder: &PagBuilder<'_>, cs: &CallSite, base_obj: Option<NodeId>) -> bool {
        let Some(obj) = base_obj else {
            return false;
        };
        builder.pag().node(obj).is_function() && function_known_name(cs) != KnownNames::None
    }

    fn process_call_site(
        &self,
        builder: &mut PagBuilder<'_>,
        cs: &CallSite,
        cid: ContextId,
        base_obj: Option<NodeId>,
    ) -> PtaResult<Vec<NodeId>> {
        let Some(func_obj) = base_obj else {
            return Ok(Vec::new());
        };
        match function_known_name(cs) {
            KnownNames::FunctionCall => self.process_call(builder, cs, cid, func_obj, false),
            KnownNames::FunctionApply => self.process_call(builder, cs, cid, func_obj, true),
            KnownNames::FunctionBind => self.process_bind(builder, cs, cid, func_obj),
            _ => Ok(Vec::new()),
        }
    }
}
