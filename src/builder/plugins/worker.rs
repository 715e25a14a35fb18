// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Worker threads.
//!
//! Creating a `ThreadWorker` makes the module code of the worker script an
//! entry. Each script has two channel slots, one per direction. The worker
//! object is linked to the slots of its script through two hidden fields, so
//! the host reaches the right script through whatever worker it posts to.
//! Message handlers are called with the channel flowing towards their side.

use log::*;

use super::{callee_known_name, PagPlugin};
use crate::builder::pag_builder::PagBuilder;
use crate::error::PtaResult;
use crate::graph::call_site::{CallArg, CallSite};
use crate::graph::pag::{FieldKey, NodeId, PagEdgeKind};
use crate::ir::known_names::{KnownNames, THREAD_WORKER_CLASS};
use crate::pta::context::ContextId;

const TO_WORKER: &str = "host->worker";
const TO_HOST: &str = "worker->host";
/// Fields of a worker object holding the messages of each direction.
const TO_WORKER_FIELD: &str = "%toWorker";
const TO_HOST_FIELD: &str = "%toHost";

pub struct WorkerPlugin;

fn channel_space(script: &str) -> String {
    format!("worker:{}", script)
}

impl WorkerPlugin {
    /// True if the call is made on the host side of the worker.
    fn on_host_side(&self, builder: &PagBuilder<'_>, cs: &CallSite) -> bool {
        builder.scene().class_of_method(cs.callee).name == THREAD_WORKER_CLASS
    }

    /// The channel slot of `direction` for the script the caller belongs to.
    fn worker_side_slot(&self, builder: &mut PagBuilder<'_>, cs: &CallSite, direction: &str) -> NodeId {
        let script = builder.scene().file_of_method(cs.caller).name.clone();
        builder.pag_mut().get_or_new_slot(&channel_space(&script), direction)
    }

    /// The hidden field `field` of the worker objects the receiver of `cs`
    /// points to.
    fn worker_field(&self, builder: &mut PagBuilder<'_>, cs: &CallSite, cid: ContextId, field: &str) -> Option<NodeId> {
        let Some(receiver) = cs.receiver else {
            warn!("Worker call {:?} has no receiver", cs.id);
            return None;
        };
        let scene = builder.scene();
        let base = builder.pag_mut().get_or_new_node(scene, cid, receiver, cs.stmt);
        Some(builder.pag_mut().get_or_new_field_ref_node(base, FieldKey::Named(field.to_string())))
    }

    fn start_worker(&self, builder: &mut PagBuilder<'_>, cs: &CallSite, cid: ContextId) -> Vec<NodeId> {
        let scene = builder.scene();
        let script = match cs.args.as_ref().and_then(|args| args.first()) {
            Some(CallArg::Value(v)) => scene.value(*v).as_str_constant(),
            _ => None,
        };
        let Some(script) = script else {
            warn!("Worker script of {:?} is not a constant", cs.id);
            return Vec::new();
        };
        let Some(file) = scene.file_by_name(script) else {
            warn!("Worker script {} not found", script);
            return Vec::new();
        };
        let entry = scene.file(file).default_method;
        info!("Worker script {} started from {}", script, scene.method(cs.caller).signature);
        builder.add_entry(entry);
        builder.cg.add_direct_or_special_call_edge(cs.id, cs.caller, entry, true);

        let space = channel_space(&scene.file(file).name);
        let inbox = builder.pag_mut().get_or_new_slot(&space, TO_WORKER);
        let outbox = builder.pag_mut().get_or_new_slot(&space, TO_HOST);
        let mut srcs = Vec::new();
        if let Some(field) = self.worker_field(builder, cs, cid, TO_WORKER_FIELD) {
            srcs.extend(builder.add_flow_edge(field, inbox, PagEdgeKind::Load, cs.stmt));
        }
        if let Some(field) = self.worker_field(builder, cs, cid, TO_HOST_FIELD) {
            srcs.extend(builder.add_flow_edge(outbox, field, PagEdgeKind::Write, cs.stmt));
        }
        srcs
    }

    fn post_message(&self, builder: &mut PagBuilder<'_>, cs: &CallSite, cid: ContextId) -> Vec<NodeId> {
        let (channel, kind) = if self.on_host_side(builder, cs) {
            match self.worker_field(builder, cs, cid, TO_WORKER_FIELD) {
                Some(field) => (field, PagEdgeKind::Write),
                None => return Vec::new(),
            }
        } else {
            (self.worker_side_slot(builder, cs, TO_HOST), PagEdgeKind::Copy)
        };
        builder
            .arg_node(cs, cid, 0)
            .and_then(|data| builder.add_flow_edge(data, channel, kind, cs.stmt))
            .into_iter()
            .collect()
    }

    fn on_message(&self, builder: &mut PagBuilder<'_>, cs: &CallSite, cid: ContextId, handler_index: usize) -> Vec<NodeId> {
        let mut srcs = Vec::new();
        let channel = if self.on_host_side(builder, cs) {
            let Some(stmt) = cs.stmt else {
                warn!("Message handler registration {:?} has no statement", cs.id);
                return Vec::new();
            };
            let Some(field) = self.worker_field(builder, cs, cid, TO_HOST_FIELD) else {
                return Vec::new();
            };
            let received = builder.pag_mut().get_or_new_temp(cid, stmt);
            srcs.extend(builder.add_flow_edge(field, received, PagEdgeKind::Load, cs.stmt));
            received
        } else {
            self.worker_side_slot(builder, cs, TO_WORKER)
        };
        let Some(handler) = builder.arg_node(cs, cid, handler_index) else {
            warn!("Message handler of {:?} is not a pointer", cs.id);
            return srcs;
        };
        if builder
            .add_synthetic_ptr_call(cs, cid, handler, vec![CallArg::Node(channel)], None)
            .is_some()
        {
            srcs.push(channel);
        }
        srcs
    }
}

impl PagPlugin for WorkerPlugin {
    fn name(&self) -> &'static str {
        "Worker"
    }

    fn can_handle(&self, builder: &PagBuilder<'_>, cs: &CallSite, _base_obj: Option<NodeId>) -> bool {
        matches!(
            callee_known_name(builder, cs),
            KnownNames::WorkerConstructor
                | KnownNames::WorkerPostMessage
                | KnownNames::WorkerAddEventListener
                | KnownNames::WorkerOn
                | KnownNames::WorkerOnMessage
        )
    }

    fn process_call_site(
        &self,
        builder: &mut PagBuilder<'_>,
        cs: &CallSite,
        cid: ContextId,
        _base_obj: Option<NodeId>,
    ) -> PtaResult<Vec<NodeId>> {
        let srcs = match callee_known_name(builder, cs) {
            KnownNames::WorkerConstructor => self.start_worker(builder, cs, cid),
            KnownNames::WorkerPostMessage => self.post_message(builder, cs, cid),
            KnownNames::WorkerOnMessage => self.on_message(builder, cs, cid, 0),
            // `addEventListener('message', handler)`
            KnownNames::WorkerAddEventListener | KnownNames::WorkerOn => self.on_message(builder, cs, cid, 1),
            _ => Vec::new(),
        };
        Ok(srcs)
    }
}
