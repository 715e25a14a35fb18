// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use log::*;

use crate::builder::pag_builder::{PagBuilder, PtData};
use crate::error::{PtaError, PtaResult};
use crate::graph::call_graph::CallGraph;
use crate::graph::pag::{NodeId, Pag};
use crate::ir::{FuncId, Scene, ValueId};
use crate::pts_set::points_to::{PointsToSet, PtsCollection};
use crate::util::options::AnalysisOptions;
use crate::util::pta_statistics::PtaStat;

use self::propagator::Propagator;

pub mod context;
pub mod context_strategy;
pub mod propagator;

/// Whole-program, context-sensitive pointer analysis over a scene.
///
/// Each round instantiates the newly reachable functions, solves the
/// points-to constraints and resolves the dynamic calls whose receivers got
/// new objects. Rounds stop once neither the PAG nor any points-to set
/// changes.
pub struct PointerAnalysis<'s> {
    scene: &'s Scene,
    builder: PagBuilder<'s>,
    pt_data: PtData,
    addr_edge_cursor: usize,
    rounds: usize,
    elapsed: Duration,
}

impl<'s> PointerAnalysis<'s> {
    pub fn new(scene: &'s Scene, options: AnalysisOptions) -> Self {
        let pt_data = PtData::new(options.pts_collection);
        PointerAnalysis {
            scene,
            builder: PagBuilder::new(scene, options),
            pt_data,
            addr_edge_cursor: 0,
            rounds: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.builder.options
    }

    pub fn analyze(&mut self) -> PtaResult<()> {
        let now = Instant::now();
        let entries = self.resolve_entries()?;
        self.builder.build_for_entries(&entries);

        loop {
            self.rounds += 1;
            debug!("Round {}", self.rounds);
            let reached = self.builder.handle_reachable()?;
            let changed = self.solve()?;
            if !reached && !changed && !self.builder.has_pending_work() {
                break;
            }
        }

        self.elapsed = now.elapsed();
        info!(
            "Pointer analysis completed in {} after {} rounds",
            humantime::format_duration(self.elapsed),
            self.rounds
        );
        Ok(())
    }

    /// Entry functions named in the options, or the module code of every
    /// file if none is named.
    fn resolve_entries(&self) -> PtaResult<Vec<FuncId>> {
        let names = &self.builder.options.entries;
        if names.is_empty() {
            return Ok(self.scene.files().map(|f| f.default_method).collect());
        }
        names
            .iter()
            .map(|name| {
                self.scene
                    .find_method(name)
                    .ok_or_else(|| PtaError::UnknownEntry(name.clone()))
            })
            .collect()
    }

    /// One solve of the points-to constraints followed by the resolution of
    /// the calls it enabled. Returns true if any points-to set grew.
    fn solve(&mut self) -> PtaResult<bool> {
        let retrigger_nodes = self.builder.get_retrigger_nodes();
        let updated_nodes = self.builder.get_updated_nodes().clone();
        self.builder.reset_updated_nodes();

        let mut propagator = Propagator::new(&mut self.builder.pag, &mut self.pt_data, &mut self.addr_edge_cursor);
        let changed = propagator.solve_worklist(&retrigger_nodes, &updated_nodes);
        let receivers = propagator.take_receivers();

        for (node, objs) in receivers {
            self.builder.handle_receiver(node, &objs, &self.pt_data)?;
        }
        self.builder.handle_unprocessed_call_sites(&self.pt_data)?;
        Ok(changed)
    }

    /// The objects `node` points to.
    pub fn points_to(&self, node: NodeId) -> PtsCollection<NodeId> {
        self.pt_data.get_pts(node)
    }

    /// The objects the IR value points to, merged over all contexts.
    pub fn points_to_by_value(&self, value: ValueId) -> BTreeSet<NodeId> {
        self.builder
            .pag()
            .get_nodes_by_value(self.scene, value)
            .values()
            .flat_map(|node| self.pt_data.get_pts(*node).iter().collect::<Vec<_>>())
            .collect()
    }

    pub fn call_graph(&self) -> &CallGraph {
        self.builder.call_graph()
    }

    pub fn pag(&self) -> &Pag {
        self.builder.pag()
    }

    pub fn builder(&self) -> &PagBuilder<'s> {
        &self.builder
    }

    pub fn pt_data(&self) -> &PtData {
        &self.pt_data
    }

    pub fn scene(&self) -> &'s Scene {
        self.scene
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn stats(&self) -> PtaStat<'_, 's> {
        PtaStat::new(self)
    }
}
