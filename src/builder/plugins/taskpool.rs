// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use log::*;

use super::{callee_known_name, PagPlugin};
use crate::builder::pag_builder::PagBuilder;
use crate::error::PtaResult;
use crate::graph::call_site::CallSite;
use crate::graph::pag::NodeId;
use crate::ir::known_names::KnownNames;
use crate::pta::context::ContextId;

/// Concurrent tasks run their function with the remaining arguments, which
/// is modelled as a call through the function argument.
pub struct TaskPoolPlugin;

impl PagPlugin for TaskPoolPlugin {
    fn name(&self) -> &'static str {
        "TaskPool"
    }

    fn can_handle(&self, builder: &PagBuilder<'_>, cs: &CallSite, _base_obj: Option<NodeId>) -> bool {
        matches!(
            callee_known_name(builder, cs),
            KnownNames::TaskPoolExecute
                | KnownNames::TaskPoolExecuteDelayed
                | KnownNames::TaskPoolExecutePeriodically
                | KnownNames::TaskConstructor
        )
    }

    fn process_call_site(
        &self,
        builder: &mut PagBuilder<'_>,
        cs: &CallSite,
        cid: ContextId,
        _base_obj: Option<NodeId>,
    ) -> PtaResult<Vec<NodeId>> {
        // `executeDelayed(delay, task)` and `executePeriodically(period, task)`
        // take the task second.
        let func_index = match callee_known_name(builder, cs) {
            KnownNames::TaskPoolExecuteDelayed | KnownNames::TaskPoolExecutePeriodically => 1,
            _ => 0,
        };
        let Some(args) = cs.args.clone() else {
            return Ok(Vec::new());
        };
        let Some(func) = builder.arg_node(cs, cid, func_index) else {
            warn!("Task function of {:?} is not a pointer", cs.id);
            return Ok(Vec::new());
        };
        let task_args = args.into_iter().skip(func_index + 1).collect();
        match builder.add_synthetic_ptr_call(cs, cid, func, task_args, None) {
            Some(_) => Ok(vec![func]),
            None => Ok(Vec::new()),
        }
    }
}
