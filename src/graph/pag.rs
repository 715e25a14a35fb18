// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use log::*;
use petgraph::graph::{DefaultIx, EdgeIndex, NodeIndex};
use petgraph::Graph;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::call_site::CallSiteId;
use crate::ir::known_names::{ARRAY_CLASS, GLOBAL_THIS, MAP_CLASS, SET_CLASS};
use crate::ir::{FieldSignature, MethodId, Scene, StmtId, Value, ValueId};
use crate::pta::context::{ContextId, DUMMY_CID};
use crate::util::bit_vec::Idx;

// Unique identifiers for graph node and edges.
pub type NodeId = NodeIndex<DefaultIx>;
pub type EdgeId = EdgeIndex<DefaultIx>;

impl Idx for NodeId {
    #[inline]
    fn new(idx: usize) -> Self {
        NodeIndex::new(idx)
    }

    #[inline]
    fn index(self) -> usize {
        NodeIndex::index(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    Named(String),
    /// The single slot standing for all elements of an array or container.
    Element,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SyntheticObj {
    /// Object returned by a body-less platform method.
    SdkReturn { call_site: CallSiteId },
    /// Object assumed to be passed for a parameter in method-level mode.
    FabricatedParam { method: MethodId, index: usize },
    /// Object assumed to be the receiver in method-level mode.
    FabricatedThis { method: MethodId },
    /// Container returned by copying reads such as `slice`.
    ContainerCopy { call_site: CallSiteId },
}

/// What a PAG node stands for, independently of its context.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PagValue {
    Ir(ValueId),
    /// A field of a heap object.
    Field { obj: NodeId, field: FieldKey },
    /// A field reference through `base` with no IR counterpart.
    FieldRef { base: NodeId, field: FieldKey },
    BoundFunc { origin: NodeId, call_site: CallSiteId },
    Synthetic(SyntheticObj),
    /// A global slot, e.g. a storage key or a worker channel.
    Slot { space: String, key: String },
    /// Temporary holding an allocation stored straight into a field.
    Temp(StmtId),
    GlobalThis,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Array,
    Set,
    Map,
}

impl ContainerKind {
    pub fn of_class(class: &str) -> Option<ContainerKind> {
        match class {
            ARRAY_CLASS => Some(ContainerKind::Array),
            SET_CLASS => Some(ContainerKind::Set),
            MAP_CLASS => Some(ContainerKind::Map),
            _ => None,
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            ContainerKind::Array => ARRAY_CLASS,
            ContainerKind::Set => SET_CLASS,
            ContainerKind::Map => MAP_CLASS,
        }
    }
}

/// State of pointer nodes that calls can be dispatched on.
#[derive(Clone, Debug, Default)]
pub struct LocalInfo {
    /// Dynamic call sites whose receiver is this node, with the caller
    /// context they were registered under.
    pub dyn_call_sites: Vec<(CallSiteId, ContextId)>,
    /// Call sites whose receiver type is unknown.
    pub unknown_call_sites: Vec<(CallSiteId, ContextId)>,
    /// Statically resolved instance calls resolved once per receiver object.
    pub instance_call_sites: Vec<(CallSiteId, ContextId)>,
    /// Callback handed to a platform method.
    pub sdk_param: bool,
    /// Storage and key this node is linked to.
    pub storage_link: Option<(String, String)>,
}

impl LocalInfo {
    pub fn has_related_calls(&self) -> bool {
        !self.dyn_call_sites.is_empty()
            || !self.unknown_call_sites.is_empty()
            || !self.instance_call_sites.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundInfo {
    /// The `bind` call site whose arguments are pre-applied.
    pub call_site: CallSiteId,
    pub args_offset: usize,
    pub origin_cid: ContextId,
}

#[derive(Clone, Debug)]
pub struct FuncInfo {
    pub method: MethodId,
    pub bound: Option<BoundInfo>,
    /// Overrides the receiver when the function is invoked.
    pub this_node: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub enum PagNodeKind {
    Local(LocalInfo),
    /// The `this` local of an instance method.
    ThisRef(LocalInfo),
    GlobalThis(LocalInfo),
    FieldRef { base: NodeId, field: FieldKey },
    StaticField(LocalInfo),
    ObjField,
    Alloc { class: Option<String> },
    NewContainer { kind: ContainerKind, element: Option<NodeId> },
    Function(FuncInfo),
    Slot,
    Other,
}

#[derive(Debug)]
pub struct PagNode {
    pub cid: ContextId,
    pub value: PagValue,
    pub stmt: Option<StmtId>,
    pub kind: PagNodeKind,
    /// Field reference nodes based on this node.
    pub(crate) field_refs: Vec<NodeId>,
    /// Field nodes of this node when it is a heap object.
    pub(crate) obj_fields: BTreeMap<FieldKey, NodeId>,
}

impl PagNode {
    fn new(cid: ContextId, value: PagValue, stmt: Option<StmtId>, kind: PagNodeKind) -> Self {
        PagNode {
            cid,
            value,
            stmt,
            kind,
            field_refs: Vec::new(),
            obj_fields: BTreeMap::new(),
        }
    }

    pub fn ir_value(&self) -> Option<ValueId> {
        match self.value {
            PagValue::Ir(v) => Some(v),
            _ => None,
        }
    }

    pub fn local_info(&self) -> Option<&LocalInfo> {
        match &self.kind {
            PagNodeKind::Local(info)
            | PagNodeKind::ThisRef(info)
            | PagNodeKind::GlobalThis(info)
            | PagNodeKind::StaticField(info) => Some(info),
            _ => None,
        }
    }

    pub fn local_info_mut(&mut self) -> Option<&mut LocalInfo> {
        match &mut self.kind {
            PagNodeKind::Local(info)
            | PagNodeKind::ThisRef(info)
            | PagNodeKind::GlobalThis(info)
            | PagNodeKind::StaticField(info) => Some(info),
            _ => None,
        }
    }

    pub fn func_info(&self) -> Option<&FuncInfo> {
        match &self.kind {
            PagNodeKind::Function(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_this_ref(&self) -> bool {
        matches!(self.kind, PagNodeKind::ThisRef(_))
    }

    pub fn is_global_this(&self) -> bool {
        matches!(self.kind, PagNodeKind::GlobalThis(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, PagNodeKind::Function(_))
    }

    /// Nodes that can appear in points-to sets.
    pub fn is_heap_obj(&self) -> bool {
        matches!(
            self.kind,
            PagNodeKind::Alloc { .. } | PagNodeKind::NewContainer { .. } | PagNodeKind::Function(_)
        )
    }

    /// Class of a heap object, containers answering their SDK class.
    pub fn obj_class(&self) -> Option<&str> {
        match &self.kind {
            PagNodeKind::Alloc { class } => class.as_deref(),
            PagNodeKind::NewContainer { kind, .. } => Some(kind.class_name()),
            _ => None,
        }
    }

    pub fn container_kind(&self) -> Option<ContainerKind> {
        match self.kind {
            PagNodeKind::NewContainer { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn container_element(&self) -> Option<NodeId> {
        match self.kind {
            PagNodeKind::NewContainer { element, .. } => element,
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PagEdgeKind {
    Address,
    Copy,
    Load,
    Write,
    This,
    InterProceduralCopy,
}

impl PagEdgeKind {
    pub const ALL: [PagEdgeKind; 6] = [
        PagEdgeKind::Address,
        PagEdgeKind::Copy,
        PagEdgeKind::Load,
        PagEdgeKind::Write,
        PagEdgeKind::This,
        PagEdgeKind::InterProceduralCopy,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    /// Edges along which points-to sets flow unchanged.
    pub fn is_copy_like(self) -> bool {
        matches!(
            self,
            PagEdgeKind::Copy | PagEdgeKind::This | PagEdgeKind::InterProceduralCopy
        )
    }
}

#[derive(Debug)]
pub struct PagEdge {
    pub kind: PagEdgeKind,
    pub stmt: Option<StmtId>,
}

type EdgeMap = HashMap<NodeId, BTreeSet<EdgeId>>;

/// Canonical key of a field reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum InstanceKey {
    Instance(ValueId, FieldKey),
    Static(FieldSignature),
    Global(String),
}

pub struct Pag {
    /// The graph structure capturing assignment relations between nodes.
    pub(crate) graph: Graph<PagNode, PagEdge>,
    /// Interning table of nodes.
    values: HashMap<(ContextId, PagValue), NodeId>,
    /// All contexts each IR value has been instantiated in.
    value_contexts: HashMap<ValueId, BTreeMap<ContextId, NodeId>>,
    /// Representative value of each canonical field reference.
    real_instance_refs: HashMap<InstanceKey, ValueId>,
    /// Address edges in creation order; the solver keeps a cursor into it.
    pub(crate) addr_edges: Vec<EdgeId>,
    in_edges: [EdgeMap; 6],
    out_edges: [EdgeMap; 6],
}

impl Default for Pag {
    fn default() -> Self {
        Self::new()
    }
}

impl Pag {
    pub fn new() -> Self {
        Pag {
            graph: Graph::new(),
            values: HashMap::new(),
            value_contexts: HashMap::new(),
            real_instance_refs: HashMap::new(),
            addr_edges: Vec::new(),
            in_edges: Default::default(),
            out_edges: Default::default(),
        }
    }

    #[inline]
    pub fn graph(&self) -> &Graph<PagNode, PagEdge> {
        &self.graph
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &PagNode {
        &self.graph[id]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut PagNode {
        &mut self.graph[id]
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &PagEdge {
        &self.graph[id]
    }

    pub fn edge_endpoints(&self, id: EdgeId) -> Option<(NodeId, NodeId)> {
        self.graph.edge_endpoints(id)
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn num_edges_of_kind(&self, kind: PagEdgeKind) -> usize {
        self.graph.edge_weights().filter(|e| e.kind == kind).count()
    }

    /// Maps field and array references to the representative value of their
    /// (base, field) pair. Static fields and global properties live in the
    /// dummy context.
    fn canonicalize(&mut self, scene: &Scene, cid: ContextId, value: ValueId) -> (ContextId, ValueId) {
        if let Some(name) = scene.global_property(value) {
            let rep = *self
                .real_instance_refs
                .entry(InstanceKey::Global(name.to_string()))
                .or_insert(value);
            return (DUMMY_CID, rep);
        }
        let key = match scene.value(value) {
            Value::InstanceField { base, field } => {
                InstanceKey::Instance(*base, FieldKey::Named(field.name.clone()))
            }
            Value::ArrayRef { base, .. } => InstanceKey::Instance(*base, FieldKey::Element),
            Value::StaticField { field } => {
                let rep = *self
                    .real_instance_refs
                    .entry(InstanceKey::Static(field.clone()))
                    .or_insert(value);
                return (DUMMY_CID, rep);
            }
            _ => return (cid, value),
        };
        (cid, *self.real_instance_refs.entry(key).or_insert(value))
    }

    fn intern(&mut self, cid: ContextId, value: PagValue, stmt: Option<StmtId>, kind: PagNodeKind) -> NodeId {
        match self.values.entry((cid, value.clone())) {
            Entry::Occupied(o) => *o.get(),
            Entry::Vacant(v) => {
                let id = self.graph.add_node(PagNode::new(cid, value, stmt, kind));
                *v.insert(id)
            }
        }
    }

    /// Returns the node of `value` under `cid`, creating it on first use.
    pub fn get_or_new_node(
        &mut self,
        scene: &Scene,
        cid: ContextId,
        value: ValueId,
        stmt: Option<StmtId>,
    ) -> NodeId {
        if scene.value(value).local_name() == Some(GLOBAL_THIS) {
            return self.global_this_node();
        }
        let (cid, rep) = self.canonicalize(scene, cid, value);
        if let Some(id) = self.values.get(&(cid, PagValue::Ir(rep))) {
            return *id;
        }
        let kind = match scene.value(rep) {
            _ if scene.global_property(rep).is_some() => PagNodeKind::StaticField(LocalInfo::default()),
            Value::Local { name, .. } if name == "this" => PagNodeKind::ThisRef(LocalInfo::default()),
            Value::Local { .. } => PagNodeKind::Local(LocalInfo::default()),
            Value::InstanceField { base, field } => PagNodeKind::FieldRef {
                base: self.get_or_new_node(scene, cid, *base, stmt),
                field: FieldKey::Named(field.name.clone()),
            },
            Value::ArrayRef { base, .. } => PagNodeKind::FieldRef {
                base: self.get_or_new_node(scene, cid, *base, stmt),
                field: FieldKey::Element,
            },
            Value::StaticField { .. } => PagNodeKind::StaticField(LocalInfo::default()),
            Value::New { class } => match ContainerKind::of_class(class) {
                Some(kind) => PagNodeKind::NewContainer { kind, element: None },
                None => PagNodeKind::Alloc { class: Some(class.clone()) },
            },
            Value::NewArray { .. } => PagNodeKind::NewContainer {
                kind: ContainerKind::Array,
                element: None,
            },
            Value::FunctionRef { method } => PagNodeKind::Function(FuncInfo {
                method: *method,
                bound: None,
                this_node: None,
            }),
            _ => PagNodeKind::Other,
        };
        let base = match kind {
            PagNodeKind::FieldRef { base, .. } => Some(base),
            _ => None,
        };
        let id = self.intern(cid, PagValue::Ir(rep), stmt, kind);
        if let Some(base) = base {
            self.graph[base].field_refs.push(id);
        }
        self.value_contexts.entry(rep).or_default().insert(cid, id);
        id
    }

    /// Returns the existing node of `value` under `cid`.
    pub fn get_node_by_value(&self, scene: &Scene, cid: ContextId, value: ValueId) -> Option<NodeId> {
        if scene.value(value).local_name() == Some(GLOBAL_THIS) {
            return self.values.get(&(DUMMY_CID, PagValue::GlobalThis)).copied();
        }
        let (cid, rep) = self.lookup_canonical(scene, cid, value);
        self.values.get(&(cid, PagValue::Ir(rep))).copied()
    }

    /// All instantiations of `value`, by context.
    pub fn get_nodes_by_value(&self, scene: &Scene, value: ValueId) -> BTreeMap<ContextId, NodeId> {
        let (_, rep) = self.lookup_canonical(scene, DUMMY_CID, value);
        self.value_contexts.get(&rep).cloned().unwrap_or_default()
    }

    fn lookup_canonical(&self, scene: &Scene, cid: ContextId, value: ValueId) -> (ContextId, ValueId) {
        if let Some(name) = scene.global_property(value) {
            let rep = self
                .real_instance_refs
                .get(&InstanceKey::Global(name.to_string()))
                .copied()
                .unwrap_or(value);
            return (DUMMY_CID, rep);
        }
        let key = match scene.value(value) {
            Value::InstanceField { base, field } => {
                InstanceKey::Instance(*base, FieldKey::Named(field.name.clone()))
            }
            Value::ArrayRef { base, .. } => InstanceKey::Instance(*base, FieldKey::Element),
            Value::StaticField { field } => {
                let rep = self
                    .real_instance_refs
                    .get(&InstanceKey::Static(field.clone()))
                    .copied()
                    .unwrap_or(value);
                return (DUMMY_CID, rep);
            }
            _ => return (cid, value),
        };
        (cid, self.real_instance_refs.get(&key).copied().unwrap_or(value))
    }

    pub fn global_this_node(&mut self) -> NodeId {
        self.intern(DUMMY_CID, PagValue::GlobalThis, None, PagNodeKind::GlobalThis(LocalInfo::default()))
    }

    /// The node of field `field` of heap object `obj`.
    pub fn get_or_new_obj_field_node(&mut self, obj: NodeId, field: FieldKey) -> NodeId {
        if let Some(id) = self.graph[obj].obj_fields.get(&field) {
            return *id;
        }
        let cid = self.graph[obj].cid;
        let id = self.intern(
            cid,
            PagValue::Field { obj, field: field.clone() },
            None,
            PagNodeKind::ObjField,
        );
        self.graph[obj].obj_fields.insert(field, id);
        id
    }

    /// The node that field reference `field_ref` denotes when its base points
    /// to `obj`.
    pub fn get_or_clone_field_node(&mut self, field_ref: NodeId, obj: NodeId) -> Option<NodeId> {
        match &self.graph[field_ref].kind {
            PagNodeKind::FieldRef { field, .. } => {
                let field = field.clone();
                Some(self.get_or_new_obj_field_node(obj, field))
            }
            _ => {
                error!("{:?} is not a field reference", field_ref);
                None
            }
        }
    }

    /// The element slot of a container or array allocation, shared by all of
    /// its elements.
    pub fn get_or_clone_container_field_node(&mut self, obj: NodeId) -> NodeId {
        let element = self.get_or_new_obj_field_node(obj, FieldKey::Element);
        if let PagNodeKind::NewContainer { element: slot @ None, .. } = &mut self.graph[obj].kind {
            *slot = Some(element);
        }
        element
    }

    /// A field reference through `base` that has no IR counterpart.
    pub fn get_or_new_field_ref_node(&mut self, base: NodeId, field: FieldKey) -> NodeId {
        let cid = self.graph[base].cid;
        let key = (cid, PagValue::FieldRef { base, field: field.clone() });
        if let Some(id) = self.values.get(&key) {
            return *id;
        }
        let id = self.intern(key.0, key.1, None, PagNodeKind::FieldRef { base, field });
        self.graph[base].field_refs.push(id);
        id
    }

    pub fn get_or_new_bound_func_node(
        &mut self,
        origin: NodeId,
        method: MethodId,
        bound: BoundInfo,
        this_node: Option<NodeId>,
    ) -> NodeId {
        let value = PagValue::BoundFunc { origin, call_site: bound.call_site };
        self.intern(
            bound.origin_cid,
            value,
            None,
            PagNodeKind::Function(FuncInfo { method, bound: Some(bound), this_node }),
        )
    }

    pub fn get_or_new_synthetic_obj(
        &mut self,
        cid: ContextId,
        obj: SyntheticObj,
        class: Option<String>,
    ) -> NodeId {
        let kind = match class.as_deref().and_then(ContainerKind::of_class) {
            Some(kind) => PagNodeKind::NewContainer { kind, element: None },
            None => PagNodeKind::Alloc { class },
        };
        self.intern(cid, PagValue::Synthetic(obj), None, kind)
    }

    pub fn get_or_new_temp(&mut self, cid: ContextId, stmt: StmtId) -> NodeId {
        self.intern(cid, PagValue::Temp(stmt), Some(stmt), PagNodeKind::Local(LocalInfo::default()))
    }

    /// A global slot, shared by every context.
    pub fn get_or_new_slot(&mut self, space: &str, key: &str) -> NodeId {
        let value = PagValue::Slot { space: space.to_string(), key: key.to_string() };
        self.intern(DUMMY_CID, value, None, PagNodeKind::Slot)
    }

    /// Returns true if the edge from `src` to `dst` of the `kind` exists.
    pub fn contains_edge(&self, src: NodeId, dst: NodeId, kind: PagEdgeKind) -> bool {
        self.graph
            .edges_connecting(src, dst)
            .any(|edge| edge.weight().kind == kind)
    }

    /// Adds an edge from `src` to `dst`.
    /// Returns the edge id if this edge is newly added to the graph.
    pub fn add_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        kind: PagEdgeKind,
        stmt: Option<StmtId>,
    ) -> Option<EdgeId> {
        if self.contains_edge(src, dst, kind) {
            return None;
        }
        let edge_id = self.graph.add_edge(src, dst, PagEdge { kind, stmt });
        if kind == PagEdgeKind::Address {
            self.addr_edges.push(edge_id);
        }
        self.out_edges[kind.slot()].entry(src).or_default().insert(edge_id);
        self.in_edges[kind.slot()].entry(dst).or_default().insert(edge_id);
        Some(edge_id)
    }

    /// Targets of the `kind` edges leaving `node`.
    pub fn successors(&self, node: NodeId, kind: PagEdgeKind) -> Vec<NodeId> {
        self.out_edges[kind.slot()]
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|e| self.graph.edge_endpoints(*e))
            .map(|(_, dst)| dst)
            .collect()
    }

    /// Sources of the `kind` edges entering `node`.
    pub fn predecessors(&self, node: NodeId, kind: PagEdgeKind) -> Vec<NodeId> {
        self.in_edges[kind.slot()]
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|e| self.graph.edge_endpoints(*e))
            .map(|(src, _)| src)
            .collect()
    }

    /// Nodes `node` flows into unchanged.
    pub fn copy_successors(&self, node: NodeId) -> Vec<NodeId> {
        PagEdgeKind::ALL
            .iter()
            .filter(|k| k.is_copy_like())
            .flat_map(|k| self.successors(node, *k))
            .collect()
    }

    pub fn field_refs_of(&self, node: NodeId) -> &[NodeId] {
        &self.graph[node].field_refs
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices()
    }

    pub fn node_to_string(&self, scene: &Scene, id: NodeId) -> String {
        let node = &self.graph[id];
        let value = match &node.value {
            PagValue::Ir(v) => scene.value_to_string(*v),
            PagValue::Field { obj, field } => format!("{:?}.{:?}", obj, field),
            PagValue::FieldRef { base, field } => format!("{:?}->{:?}", base, field),
            PagValue::BoundFunc { origin, call_site } => format!("bound {:?}@{:?}", origin, call_site),
            PagValue::Synthetic(obj) => format!("{:?}", obj),
            PagValue::Slot { space, key } => format!("{}[{}]", space, key),
            PagValue::Temp(stmt) => format!("%tmp@{:?}", stmt),
            PagValue::GlobalThis => GLOBAL_THIS.to_string(),
        };
        format!("{:?}:{}:{}", id, node.cid, value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{SceneBuilder, Type};
    use crate::util::bit_vec::Idx;

    #[test]
    fn nodes_are_interned_per_context() {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        let f = sb.add_function(file, "f", &[], Type::Void);
        let a = sb.local(f, "a", Type::class("Foo"));
        let scene = sb.finish();

        let mut pag = Pag::new();
        let c1 = ContextId::new(1);
        let n0 = pag.get_or_new_node(&scene, DUMMY_CID, a, None);
        assert_eq!(pag.get_or_new_node(&scene, DUMMY_CID, a, None), n0);
        let n1 = pag.get_or_new_node(&scene, c1, a, None);
        assert_ne!(n0, n1);
        let by_value = pag.get_nodes_by_value(&scene, a);
        assert_eq!(by_value.len(), 2);
        assert_eq!(by_value[&c1], n1);
    }

    #[test]
    fn field_refs_with_same_base_and_field_collapse() {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        let f = sb.add_function(file, "f", &[], Type::Void);
        let a = sb.local(f, "a", Type::class("Foo"));
        let f1 = sb.field(a, "Foo", "x");
        let f2 = sb.field(a, "Foo", "x");
        let f3 = sb.field(a, "Foo", "y");
        let s1 = sb.static_field("Foo", "inst");
        let s2 = sb.static_field("Foo", "inst");
        let scene = sb.finish();

        let mut pag = Pag::new();
        let c1 = ContextId::new(1);
        let n1 = pag.get_or_new_node(&scene, c1, f1, None);
        let n2 = pag.get_or_new_node(&scene, c1, f2, None);
        let n3 = pag.get_or_new_node(&scene, c1, f3, None);
        assert_eq!(n1, n2);
        assert_ne!(n1, n3);
        let base = pag.get_node_by_value(&scene, c1, a).unwrap();
        assert_eq!(pag.field_refs_of(base), &[n1, n3]);

        let st1 = pag.get_or_new_node(&scene, c1, s1, None);
        let st2 = pag.get_or_new_node(&scene, DUMMY_CID, s2, None);
        assert_eq!(st1, st2);
        assert_eq!(pag.node(st1).cid, DUMMY_CID);
    }

    #[test]
    fn global_properties_live_outside_contexts() {
        let mut sb = SceneBuilder::new();
        let g1 = sb.free_local(GLOBAL_THIS, Type::Any);
        let g2 = sb.free_local(GLOBAL_THIS, Type::Any);
        let x1 = sb.field(g1, "Object", "x");
        let x2 = sb.field(g2, "Object", "x");
        let y = sb.field(g2, "Object", "y");
        let scene = sb.finish();

        let mut pag = Pag::new();
        let c1 = ContextId::new(1);
        let n1 = pag.get_or_new_node(&scene, c1, x1, None);
        let n2 = pag.get_or_new_node(&scene, DUMMY_CID, x2, None);
        assert_eq!(n1, n2);
        assert_eq!(pag.node(n1).cid, DUMMY_CID);
        assert!(matches!(pag.node(n1).kind, PagNodeKind::StaticField(_)));
        assert_eq!(pag.get_node_by_value(&scene, c1, x2), Some(n1));
        assert_ne!(pag.get_or_new_node(&scene, c1, y, None), n1);
    }

    #[test]
    fn edges_are_idempotent() {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        let f = sb.add_function(file, "f", &[], Type::Void);
        let a = sb.local(f, "a", Type::class("Foo"));
        let b = sb.local(f, "b", Type::class("Foo"));
        let new = sb.new_expr("Foo");
        let scene = sb.finish();

        let mut pag = Pag::new();
        let na = pag.get_or_new_node(&scene, DUMMY_CID, a, None);
        let nb = pag.get_or_new_node(&scene, DUMMY_CID, b, None);
        let obj = pag.get_or_new_node(&scene, DUMMY_CID, new, None);
        assert!(pag.add_edge(obj, na, PagEdgeKind::Address, None).is_some());
        assert!(pag.add_edge(obj, na, PagEdgeKind::Address, None).is_none());
        assert!(pag.add_edge(na, nb, PagEdgeKind::Copy, None).is_some());
        assert!(pag.add_edge(na, nb, PagEdgeKind::Copy, None).is_none());
        assert!(pag.add_edge(na, nb, PagEdgeKind::InterProceduralCopy, None).is_some());
        assert_eq!(pag.num_edges(), 3);
        assert_eq!(pag.addr_edges.len(), 1);
        assert_eq!(pag.copy_successors(na).len(), 2);
        assert!(pag.node(obj).is_heap_obj());
    }

    #[test]
    fn containers_share_one_element_slot() {
        let mut sb = SceneBuilder::new();
        let arr = sb.new_array_expr(Type::class("Foo"));
        let set = sb.new_expr("Set");
        let scene = sb.finish();

        let mut pag = Pag::new();
        let arr_obj = pag.get_or_new_node(&scene, DUMMY_CID, arr, None);
        let set_obj = pag.get_or_new_node(&scene, DUMMY_CID, set, None);
        assert_eq!(pag.node(set_obj).container_kind(), Some(ContainerKind::Set));
        let e1 = pag.get_or_clone_container_field_node(arr_obj);
        let e2 = pag.get_or_clone_container_field_node(arr_obj);
        assert_eq!(e1, e2);
        assert_eq!(pag.node(arr_obj).container_element(), Some(e1));
        assert_ne!(pag.get_or_clone_container_field_node(set_obj), e1);
    }
}
