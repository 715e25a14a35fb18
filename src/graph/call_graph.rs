// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use petgraph::algo::has_path_connecting;
use petgraph::dot::Dot;
use petgraph::graph::{DefaultIx, EdgeIndex, NodeIndex};
use petgraph::Graph;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use super::call_site::{CallSiteId, CallSiteManager};
use crate::ir::{FuncId, Method, Scene, StmtId};

/// Unique identifiers for call graph nodes.
pub type CGNodeId = NodeIndex<DefaultIx>;
/// Unique identifiers for call graph edges.
pub type CGEdgeId = EdgeIndex<DefaultIx>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallGraphNodeKind {
    /// A method with a body.
    Real,
    /// An abstract method.
    Virtual,
    Constructor,
    /// A body-less platform method.
    Intrinsic,
    /// Not classified yet.
    Blank,
}

impl CallGraphNodeKind {
    pub fn of(method: &Method) -> Self {
        if method.is_abstract {
            CallGraphNodeKind::Virtual
        } else if method.is_constructor() {
            CallGraphNodeKind::Constructor
        } else if !method.has_body() {
            CallGraphNodeKind::Intrinsic
        } else {
            CallGraphNodeKind::Real
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallType {
    /// Resolved before the analysis starts.
    Static,
    /// Resolved from points-to information.
    Dynamic,
    /// Introduced by a plugin for a modelled platform API.
    Special,
}

#[derive(Debug)]
pub struct CallGraphNode {
    pub(crate) func: FuncId,
    pub(crate) kind: CallGraphNodeKind,
}

#[derive(Debug)]
pub struct CallGraphEdge {
    pub(crate) callsite: CallSiteId,
    pub(crate) call_type: CallType,
}

pub struct CallGraph {
    /// The graph structure capturing call relationships.
    pub graph: Graph<CallGraphNode, CallGraphEdge>,
    /// A map from functions to their corresponding call graph nodes.
    pub func_nodes: HashMap<FuncId, CGNodeId>,
    /// A map from call sites to call graph edges.
    pub callsite_to_edges: HashMap<CallSiteId, HashSet<CGEdgeId>>,
    /// Call sites resolved for each call statement before the analysis.
    stmt_to_callsites: HashMap<StmtId, Vec<CallSiteId>>,
    /// Functions in the order they became reachable.
    pub(crate) reach_funcs: Vec<FuncId>,
    pub(crate) call_site_manager: CallSiteManager,
}

impl Default for CallGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CallGraph {
    pub fn new() -> Self {
        CallGraph {
            graph: Graph::new(),
            func_nodes: HashMap::new(),
            callsite_to_edges: HashMap::new(),
            stmt_to_callsites: HashMap::new(),
            reach_funcs: Vec::new(),
            call_site_manager: CallSiteManager::new(),
        }
    }

    pub fn call_site_manager(&self) -> &CallSiteManager {
        &self.call_site_manager
    }

    pub fn call_site_manager_mut(&mut self) -> &mut CallSiteManager {
        &mut self.call_site_manager
    }

    /// Adds a node for `func`, refining the kind of a blank node.
    pub fn add_node(&mut self, func: FuncId, kind: CallGraphNodeKind) -> CGNodeId {
        let node_id = self.get_or_insert_node(func);
        if let Some(node) = self.graph.node_weight_mut(node_id) {
            if node.kind == CallGraphNodeKind::Blank {
                node.kind = kind;
            }
        }
        node_id
    }

    fn get_or_insert_node(&mut self, func: FuncId) -> CGNodeId {
        match self.func_nodes.entry(func) {
            Entry::Occupied(o) => *o.get(),
            Entry::Vacant(v) => {
                self.reach_funcs.push(func);
                let node_id = self.graph.add_node(CallGraphNode {
                    func,
                    kind: CallGraphNodeKind::Blank,
                });
                *v.insert(node_id)
            }
        }
    }

    pub fn get_node(&self, func: FuncId) -> Option<CGNodeId> {
        self.func_nodes.get(&func).copied()
    }

    pub fn node_kind(&self, func: FuncId) -> Option<CallGraphNodeKind> {
        self.get_node(func)
            .and_then(|n| self.graph.node_weight(n))
            .map(|n| n.kind)
    }

    pub fn has_node(&self, func: FuncId) -> bool {
        self.func_nodes.contains_key(&func)
    }

    pub fn get_callees(&self, callsite: CallSiteId) -> HashSet<FuncId> {
        self.callsite_to_edges
            .get(&callsite)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| self.graph.edge_endpoints(*edge_id))
            .filter_map(|(_, target)| self.graph.node_weight(target))
            .map(|node| node.func)
            .collect()
    }

    /// Callees of `func` over all its call sites.
    pub fn callees_of(&self, func: FuncId) -> HashSet<FuncId> {
        let Some(node) = self.get_node(func) else {
            return HashSet::new();
        };
        self.graph
            .neighbors(node)
            .filter_map(|n| self.graph.node_weight(n))
            .map(|n| n.func)
            .collect()
    }

    pub fn has_edge(&self, callsite: CallSiteId, callee: FuncId) -> bool {
        self.get_callees(callsite).contains(&callee)
    }

    /// Adds a call from `caller` to `callee` at `callsite`.
    /// Returns false if the edge already existed.
    pub fn add_edge(
        &mut self,
        callsite: CallSiteId,
        caller: FuncId,
        callee: FuncId,
        call_type: CallType,
    ) -> bool {
        let caller_node = self.get_or_insert_node(caller);
        let callee_node = self.get_or_insert_node(callee);
        if self.has_edge(callsite, callee) {
            return false;
        }
        let edge_id = self
            .graph
            .add_edge(caller_node, callee_node, CallGraphEdge { callsite, call_type });
        self.callsite_to_edges.entry(callsite).or_default().insert(edge_id);
        true
    }

    pub fn add_dynamic_call_edge(&mut self, callsite: CallSiteId, caller: FuncId, callee: FuncId) -> bool {
        self.add_edge(callsite, caller, callee, CallType::Dynamic)
    }

    pub fn add_direct_or_special_call_edge(
        &mut self,
        callsite: CallSiteId,
        caller: FuncId,
        callee: FuncId,
        special: bool,
    ) -> bool {
        let call_type = if special { CallType::Special } else { CallType::Static };
        self.add_edge(callsite, caller, callee, call_type)
    }

    /// Returns true if `from` is `to` or can reach it over call edges.
    pub fn detect_reachable(&self, from: FuncId, to: FuncId) -> bool {
        if from == to {
            return true;
        }
        match (self.get_node(from), self.get_node(to)) {
            (Some(from), Some(to)) => has_path_connecting(&self.graph, from, to, None),
            _ => false,
        }
    }

    pub fn set_stmt_call_sites(&mut self, stmt: StmtId, call_sites: Vec<CallSiteId>) {
        self.stmt_to_callsites.insert(stmt, call_sites);
    }

    pub fn get_call_sites_by_stmt(&self, stmt: StmtId) -> Option<&Vec<CallSiteId>> {
        self.stmt_to_callsites.get(&stmt)
    }

    pub fn reach_funcs(&self) -> &[FuncId] {
        &self.reach_funcs
    }

    pub fn num_edges_of_type(&self, call_type: CallType) -> usize {
        self.graph
            .edge_weights()
            .filter(|e| e.call_type == call_type)
            .count()
    }

    /// Renders the call graph in Graphviz DOT format.
    pub fn to_dot(&self, scene: &Scene) -> String {
        let labelled = self.graph.map(
            |_, node| scene.method(node.func).signature.to_string(),
            |_, edge| format!("{:?} {:?}", edge.callsite, edge.call_type),
        );
        format!("{}", Dot::new(&labelled))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::bit_vec::Idx;

    #[test]
    fn edges_are_added_once_and_reachability_follows_them() {
        let mut cg = CallGraph::new();
        let (f0, f1, f2) = (FuncId::new(0), FuncId::new(1), FuncId::new(2));
        let cs = CallSiteId::new(0);
        assert!(cg.add_edge(cs, f0, f1, CallType::Static));
        assert!(!cg.add_edge(cs, f0, f1, CallType::Static));
        assert!(cg.add_dynamic_call_edge(CallSiteId::new(1), f1, f2));

        assert!(cg.detect_reachable(f0, f2));
        assert!(!cg.detect_reachable(f2, f0));
        assert!(cg.detect_reachable(f2, f2));
        assert_eq!(cg.reach_funcs(), &[f0, f1, f2]);
        assert_eq!(cg.num_edges_of_type(CallType::Dynamic), 1);
        assert_eq!(cg.callees_of(f0), HashSet::from([f1]));
    }

    #[test]
    fn blank_nodes_get_refined() {
        let mut cg = CallGraph::new();
        let f = FuncId::new(3);
        cg.add_edge(CallSiteId::new(0), FuncId::new(0), f, CallType::Static);
        assert_eq!(cg.node_kind(f), Some(CallGraphNodeKind::Blank));
        cg.add_node(f, CallGraphNodeKind::Constructor);
        cg.add_node(f, CallGraphNodeKind::Real);
        assert_eq!(cg.node_kind(f), Some(CallGraphNodeKind::Constructor));
    }
}
