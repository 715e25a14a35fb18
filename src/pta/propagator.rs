// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The key component of our pointer analysis.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use log::*;

use crate::builder::pag_builder::PtData;
use crate::graph::pag::{NodeId, Pag, PagEdgeKind};
use crate::pts_set::points_to::{PointsToSet, PtsCollection};

/// Propagating the points-to information along the PAG edges.
pub struct Propagator<'pta> {
    /// Pointer Assignment Graph
    pag: &'pta mut Pag,
    /// Points-to data
    pt_data: &'pta mut PtData,
    /// Number of address edges of the PAG already processed.
    addr_edge_cursor: &'pta mut usize,

    /// Worklist for resolution
    worklist: VecDeque<NodeId>,

    /// Receivers of registered calls that got new objects, reported back to
    /// the PAG builder once the worklist is empty.
    receivers: BTreeMap<NodeId, BTreeSet<NodeId>>,
    changed: bool,
}

impl<'pta> Propagator<'pta> {
    /// Constructor
    pub fn new(pag: &'pta mut Pag, pt_data: &'pta mut PtData, addr_edge_cursor: &'pta mut usize) -> Self {
        Propagator {
            pag,
            pt_data,
            addr_edge_cursor,
            worklist: VecDeque::new(),
            receivers: BTreeMap::new(),
            changed: false,
        }
    }

    /// Propagates pts data until the worklist is empty. Returns true if any
    /// points-to set grew.
    pub fn solve_worklist(
        &mut self,
        retrigger_nodes: &[NodeId],
        updated_nodes: &HashMap<NodeId, PtsCollection<NodeId>>,
    ) -> bool {
        self.init_constraints(retrigger_nodes, updated_nodes);
        while let Some(node) = self.worklist.pop_front() {
            self.process_node(node);
        }
        self.changed
    }

    /// Receivers with the objects they got in this solve.
    pub fn take_receivers(&mut self) -> Vec<(NodeId, Vec<NodeId>)> {
        std::mem::take(&mut self.receivers)
            .into_iter()
            .map(|(node, objs)| (node, objs.into_iter().collect()))
            .collect()
    }

    /// Initialize the worklist, activate new constraints.
    fn init_constraints(&mut self, retrigger_nodes: &[NodeId], updated_nodes: &HashMap<NodeId, PtsCollection<NodeId>>) {
        self.process_all_addr_edges();
        for (node, pts) in updated_nodes {
            if self.pt_data.union_pts_to(*node, pts) {
                self.changed = true;
                self.worklist.push_back(*node);
            }
        }
        // Nodes with new outgoing edges pass their whole set along again.
        for node in retrigger_nodes {
            let pts = self.pt_data.get_pts(*node);
            if !pts.is_empty() {
                self.propagate(*node, &pts);
            }
        }
    }

    /// Process address edges.
    fn process_all_addr_edges(&mut self) {
        while let Some(edge) = self.pag.addr_edges.get(*self.addr_edge_cursor).copied() {
            *self.addr_edge_cursor += 1;
            let Some((obj, dst)) = self.pag.edge_endpoints(edge) else {
                continue;
            };
            if self.pt_data.add_pts(dst, obj) {
                self.changed = true;
                self.worklist.push_back(dst);
            }
        }
    }

    fn process_node(&mut self, node: NodeId) {
        let Some(diff) = self.pt_data.get_diff_pts(node).cloned() else {
            return;
        };
        if diff.is_empty() {
            return;
        }
        self.pt_data.flush(node);
        self.propagate(node, &diff);
    }

    /// Propagates the objects `pts` newly seen at `node`.
    fn propagate(&mut self, node: NodeId, pts: &PtsCollection<NodeId>) {
        self.handle_copy(node, pts);
        self.handle_load_and_store(node, pts);
        self.handle_receiver(node, pts);
    }

    /// Process all outgoing copy-like edges of the node.
    fn handle_copy(&mut self, node: NodeId, pts: &PtsCollection<NodeId>) {
        for dst in self.pag.copy_successors(node) {
            self.union_into(dst, pts);
        }
    }

    /// Realises the loads and stores through field references based on
    /// `node` for every new object, by connecting the object's field node.
    fn handle_load_and_store(&mut self, node: NodeId, pts: &PtsCollection<NodeId>) {
        for field_ref in self.pag.field_refs_of(node).to_vec() {
            let loads = self.pag.successors(field_ref, PagEdgeKind::Load);
            let stores = self.pag.predecessors(field_ref, PagEdgeKind::Write);
            if loads.is_empty() && stores.is_empty() {
                continue;
            }
            for obj in pts.iter() {
                if !self.pag.node(obj).is_heap_obj() {
                    continue;
                }
                let Some(field) = self.pag.get_or_clone_field_node(field_ref, obj) else {
                    continue;
                };
                for dst in &loads {
                    if self.pag.add_edge(field, *dst, PagEdgeKind::Copy, None).is_some() {
                        let field_pts = self.pt_data.get_pts(field);
                        self.union_into(*dst, &field_pts);
                    }
                }
                for src in &stores {
                    if self.pag.add_edge(*src, field, PagEdgeKind::Copy, None).is_some() {
                        let src_pts = self.pt_data.get_pts(*src);
                        self.union_into(field, &src_pts);
                    }
                }
            }
        }
    }

    fn handle_receiver(&mut self, node: NodeId, pts: &PtsCollection<NodeId>) {
        let has_calls = self
            .pag
            .node(node)
            .local_info()
            .map_or(false, |info| info.has_related_calls());
        if has_calls {
            trace!("Receiver {:?} got {:?}", node, pts);
            self.receivers.entry(node).or_default().extend(pts.iter());
        }
    }

    fn union_into(&mut self, dst: NodeId, pts: &PtsCollection<NodeId>) {
        if self.pt_data.union_pts_to(dst, pts) {
            self.changed = true;
            self.worklist.push_back(dst);
        }
    }
}
