// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Hand-written models of platform APIs.
//!
//! A plugin takes over a call site instead of the generic argument, return
//! and receiver wiring. Plugins are tried in registration order and the first
//! one accepting a call site handles it.

use log::*;

use super::pag_builder::PagBuilder;
use crate::error::PtaResult;
use crate::graph::call_site::CallSite;
use crate::graph::pag::NodeId;
use crate::ir::known_names::KnownNames;
use crate::pta::context::ContextId;

pub mod container;
pub mod function;
pub mod sdk;
pub mod storage;
pub mod taskpool;
pub mod worker;

pub trait PagPlugin {
    fn name(&self) -> &'static str;

    /// A cheap test on the identity of the callee or the receiver object.
    fn can_handle(&self, builder: &PagBuilder<'_>, cs: &CallSite, base_obj: Option<NodeId>) -> bool;

    /// Wires the call site. Returns the nodes that became new flow sources.
    fn process_call_site(
        &self,
        builder: &mut PagBuilder<'_>,
        cs: &CallSite,
        cid: ContextId,
        base_obj: Option<NodeId>,
    ) -> PtaResult<Vec<NodeId>>;
}

pub struct PluginManager {
    plugins: Vec<Box<dyn PagPlugin>>,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    pub fn new() -> Self {
        PluginManager {
            plugins: vec![
                Box::new(storage::StoragePlugin),
                Box::new(function::FunctionPlugin),
                Box::new(taskpool::TaskPoolPlugin),
                Box::new(worker::WorkerPlugin),
                Box::new(sdk::SdkPlugin),
                Box::new(container::ContainerPlugin),
            ],
        }
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// The first plugin accepting the call site.
    pub fn find(&self, builder: &PagBuilder<'_>, cs: &CallSite, base_obj: Option<NodeId>) -> Option<&dyn PagPlugin> {
        self.plugins
            .iter()
            .find(|p| p.can_handle(builder, cs, base_obj))
            .map(|p| p.as_ref())
    }

    /// Lets the first matching plugin handle the call site. Returns `None`
    /// if no plugin accepts it.
    pub fn process_call_site(
        &self,
        builder: &mut PagBuilder<'_>,
        cs: &CallSite,
        cid: ContextId,
        base_obj: Option<NodeId>,
    ) -> PtaResult<Option<Vec<NodeId>>> {
        let Some(plugin) = self.find(builder, cs, base_obj) else {
            return Ok(None);
        };
        debug!("{} plugin handles {:?}", plugin.name(), cs.id);
        plugin.process_call_site(builder, cs, cid, base_obj).map(Some)
    }
}

/// Classifies the callee of `cs` by its declaring class and name.
pub(crate) fn callee_known_name(builder: &PagBuilder<'_>, cs: &CallSite) -> KnownNames {
    let scene = builder.scene();
    let method = scene.method(cs.callee);
    KnownNames::of(&scene.class_of_method(cs.callee).name, &method.name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plugins_are_tried_in_a_fixed_order() {
        assert_eq!(
            PluginManager::new().plugin_names(),
            vec!["Storage", "Function", "TaskPool", "Worker", "SDK", "Container"]
        );
    }
}
