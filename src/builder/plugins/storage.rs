// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! UI state stores. Every (store, key) pair is one global slot.

use log::*;

use super::{callee_known_name, PagPlugin};
use crate::builder::pag_builder::PagBuilder;
use crate::error::PtaResult;
use crate::graph::call_site::{CallArg, CallSite};
use crate::graph::pag::{NodeId, PagEdgeKind};
use crate::ir::known_names::KnownNames;
use crate::pta::context::ContextId;

pub struct StoragePlugin;

impl StoragePlugin {
    /// The slot named by the constant key in the first argument.
    fn slot(&self, builder: &mut PagBuilder<'_>, cs: &CallSite) -> Option<(NodeId, String, String)> {
        let scene = builder.scene();
        let storage = scene.class_of_method(cs.callee).name.clone();
        let key = match cs.args.as_ref()?.first()? {
            CallArg::Value(v) => scene.value(*v).as_str_constant()?.to_string(),
            CallArg::Node(_) => return None,
        };
        let slot = builder.pag_mut().get_or_new_slot(&storage, &key);
        Some((slot, storage, key))
    }
}

impl PagPlugin for StoragePlugin {
    fn name(&self) -> &'static str {
        "Storage"
    }

    fn can_handle(&self, builder: &PagBuilder<'_>, cs: &CallSite, _base_obj: Option<NodeId>) -> bool {
        let name = callee_known_name(builder, cs);
        name.is_storage_write() || name.is_storage_read()
    }

    fn process_call_site(
        &self,
        builder: &mut PagBuilder<'_>,
        cs: &CallSite,
        cid: ContextId,
        _base_obj: Option<NodeId>,
    ) -> PtaResult<Vec<NodeId>> {
        let Some((slot, storage, key)) = self.slot(builder, cs) else {
            warn!("Storage access {:?} has no constant key", cs.id);
            return Ok(Vec::new());
        };
        let name = callee_known_name(builder, cs);
        let mut srcs = Vec::new();

        if name.is_storage_write() {
            if let Some(value) = builder.arg_node(cs, cid, 1) {
                srcs.extend(builder.add_flow_edge(value, slot, PagEdgeKind::Copy, cs.stmt));
            }
        }
        if name.is_storage_read() {
            if let Some(lhs) = builder.lhs_node(cs, cid) {
                srcs.extend(builder.add_flow_edge(slot, lhs, PagEdgeKind::Copy, cs.stmt));
                // A link is two-way: writes through the linked variable reach
                // the store.
                if matches!(name, KnownNames::StorageLink | KnownNames::StorageSetAndLink) {
                    srcs.extend(builder.add_flow_edge(lhs, slot, PagEdgeKind::Copy, cs.stmt));
                }
                if let Some(info) = builder.pag_mut().node_mut(lhs).local_info_mut() {
                    info.storage_link = Some((storage, key));
                }
            }
        }
        Ok(srcs)
    }
}
