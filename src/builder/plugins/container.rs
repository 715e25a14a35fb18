// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! `Array`, `Set` and `Map` methods.
//!
//! The elements of one container allocation share one element slot, so keys
//! and indices are not distinguished.

use log::*;

use super::PagPlugin;
use crate::builder::pag_builder::PagBuilder;
use crate::error::PtaResult;
use crate::graph::call_site::{CallArg, CallSite};
use crate::graph::pag::{ContainerKind, FieldKey, NodeId, PagEdgeKind, SyntheticObj};
use crate::ir::known_names::{KnownNames, ARRAY_CLASS};
use crate::pta::context::ContextId;

pub struct ContainerPlugin;

fn container_known_name(kind: ContainerKind, cs: &CallSite) -> KnownNames {
    KnownNames::of(kind.class_name(), &cs.sig.name)
}

impl ContainerPlugin {
    /// Argument positions whose values are stored into the container.
    fn stored_args(&self, name: KnownNames, num_args: usize) -> std::ops::Range<usize> {
        match name {
            // `map.set(key, value)`
            KnownNames::MapSet => 1..num_args.min(2),
            // `fill(value, start, end)`
            KnownNames::ArrayFill => 0..num_args.min(1),
            // `splice(start, deleteCount, ...items)`
            KnownNames::ArraySplice => 2.min(num_args)..num_args,
            _ => 0..num_args,
        }
    }

    fn write(&self, builder: &mut PagBuilder<'_>, cs: &CallSite, cid: ContextId, name: KnownNames, element: NodeId) -> Vec<NodeId> {
        let num_args = cs.args.as_ref().map_or(0, |args| args.len());
        let mut srcs = Vec::new();
        for index in self.stored_args(name, num_args) {
            if let Some(value) = builder.arg_node(cs, cid, index) {
                srcs.extend(builder.add_flow_edge(value, element, PagEdgeKind::Copy, cs.stmt));
            }
        }
        srcs
    }

    fn read(&self, builder: &mut PagBuilder<'_>, cs: &CallSite, cid: ContextId, element: NodeId) -> Vec<NodeId> {
        builder
            .lhs_node(cs, cid)
            .and_then(|lhs| builder.add_flow_edge(element, lhs, PagEdgeKind::Copy, cs.stmt))
            .into_iter()
            .collect()
    }

    /// `slice` and `concat` return a new array holding the receiver's
    /// elements, and for `concat` the elements of the argument arrays.
    fn copy(&self, builder: &mut PagBuilder<'_>, cs: &CallSite, cid: ContextId, name: KnownNames, element: NodeId) -> Vec<NodeId> {
        let Some(lhs) = builder.lhs_node(cs, cid) else {
            return Vec::new();
        };
        let copy = builder.pag_mut().get_or_new_synthetic_obj(
            cid,
            SyntheticObj::ContainerCopy { call_site: cs.id },
            Some(ARRAY_CLASS.to_string()),
        );
        let copy_element = builder.pag_mut().get_or_clone_container_field_node(copy);
        builder.add_address_edge(copy, lhs, cs.stmt);

        let mut srcs: Vec<NodeId> = builder
            .add_flow_edge(element, copy_element, PagEdgeKind::Copy, cs.stmt)
            .into_iter()
            .collect();
        if name == KnownNames::ArrayConcat {
            let num_args = cs.args.as_ref().map_or(0, |args| args.len());
            for index in 0..num_args {
                let Some(other) = builder.arg_node(cs, cid, index) else {
                    continue;
                };
                let other_elements = builder.pag_mut().get_or_new_field_ref_node(other, FieldKey::Element);
                srcs.extend(builder.add_flow_edge(other_elements, copy_element, PagEdgeKind::Load, cs.stmt));
            }
        }
        srcs
    }

    /// The callback receives the element slot as its first argument.
    fn for_each(&self, builder: &mut PagBuilder<'_>, cs: &CallSite, cid: ContextId, element: NodeId) -> Vec<NodeId> {
        let Some(callback) = builder.arg_node(cs, cid, 0) else {
            warn!("Callback of {:?} is not a pointer", cs.id);
            return Vec::new();
        };
        builder
            .add_synthetic_ptr_call(cs, cid, callback, vec![CallArg::Node(element)], None)
            .map(|_| element)
            .into_iter()
            .collect()
    }
}

impl PagPlugin for ContainerPlugin {
    fn name(&self) -> &'static str {
        "Container"
    }

    fn can_handle(&self, builder: &PagBuilder<'_>, cs: &CallSite, base_obj: Option<NodeId>) -> bool {
        base_obj
            .and_then(|obj| builder.pag().node(obj).container_kind())
            .map_or(false, |kind| container_known_name(kind, cs) != KnownNames::None)
    }

    fn process_call_site(
        &self,
        builder: &mut PagBuilder<'_>,
        cs: &CallSite,
        cid: ContextId,
        base_obj: Option<NodeId>,
    ) -> PtaResult<Vec<NodeId>> {
        let Some(obj) = base_obj else {
            return Ok(Vec::new());
        };
        let Some(kind) = builder.pag().node(obj).container_kind() else {
            return Ok(Vec::new());
        };
        let name = container_known_name(kind, cs);
        let element = builder.pag_mut().get_or_clone_container_field_node(obj);

        let srcs = if name.is_container_write() {
            self.write(builder, cs, cid, name, element)
        } else if name == KnownNames::MapGet || name.is_container_read() {
            self.read(builder, cs, cid, element)
        } else if name.is_container_copy() {
            self.copy(builder, cs, cid, name, element)
        } else if name.is_foreach() {
            self.for_each(builder, cs, cid, element)
        } else {
            Vec::new()
        };
        Ok(srcs)
    }
}
