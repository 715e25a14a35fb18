// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Builds the whole-program PAG on-the-fly.
//!
//! Function summaries are instantiated under the contexts chosen by the
//! context selector as functions become reachable. Calls whose targets depend
//! on points-to information are registered on their receiver nodes and wired
//! once the solver reports new objects for them.

use log::*;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use super::fpag_builder::FuncPagBuilder;
use super::plugins::{sdk, PluginManager};
use crate::error::{PtaError, PtaResult};
use crate::graph::call_graph::{CallGraph, CallGraphNodeKind};
use crate::graph::call_site::{CallArg, CallSite, CallSiteId, DynCallSite};
use crate::graph::func_pag::{FuncPag, InterFuncPag};
use crate::graph::pag::{FieldKey, NodeId, Pag, PagEdgeKind, PagNodeKind, SyntheticObj};
use crate::ir::known_names::{KnownNames, FUNCTION_CLASS};
use crate::ir::types::{PTR_INVOKE_NAME, UNKNOWN_CLASS};
use crate::ir::{FuncId, MethodSignature, Scene, StmtId, Type, Value, ValueId};
use crate::pta::context::{CSFuncId, ContextCache, ContextId, DUMMY_CID};
use crate::pta::context_strategy::{new_context_selector, ContextSelector, ContextType};
use crate::pts_set::points_to::{PointsToSet, PtsCollection};
use crate::pts_set::pt_data::DiffPTData;
use crate::util::options::{AnalysisOptions, AnalysisScale};

pub type PtData = DiffPTData<NodeId, NodeId>;

pub struct PagBuilder<'s> {
    pub(crate) scene: &'s Scene,
    pub(crate) options: AnalysisOptions,
    pub(crate) pag: Pag,
    pub(crate) cg: CallGraph,
    pub(crate) ctx: Box<dyn ContextSelector>,
    plugins: Rc<PluginManager>,

    func_pags: HashMap<FuncId, Rc<FuncPag>>,
    inter_func_pags: HashMap<FuncId, Rc<InterFuncPag>>,
    singleton_funcs: HashMap<FuncId, bool>,

    /// Contexts each function has been instantiated under.
    handled_funcs: HashSet<CSFuncId>,
    /// Functions scheduled under at least one context.
    scheduled_funcs: HashSet<FuncId>,
    worklist: VecDeque<CSFuncId>,
    entries: Vec<CSFuncId>,
    /// Instantiated functions that refer to variables of other scopes.
    inter_links: Vec<CSFuncId>,

    /// Nodes that got new outgoing edges and must propagate their whole
    /// points-to set again.
    retrigger_nodes: BTreeSet<NodeId>,
    /// Objects to add directly to points-to sets, e.g. receivers bound to `this`.
    updated_nodes: HashMap<NodeId, PtsCollection<NodeId>>,

    /// (call site, caller context, receiver object) triples already resolved.
    processed_calls: HashSet<(CallSiteId, ContextId, NodeId)>,
    /// Triples no callee was found for by type; retried through fields.
    unprocessed_calls: Vec<(CallSiteId, ContextId, NodeId)>,
    /// Functions already dispatched to through a field, per call site.
    field_callees: HashSet<(CallSiteId, ContextId, NodeId)>,
    /// Pointer calls synthesized by plugins, by origin call site, pointer
    /// and arguments.
    synthetic_calls: HashMap<(CallSiteId, NodeId, Vec<CallArg>), CallSiteId>,
}

impl<'s> PagBuilder<'s> {
    pub fn new(scene: &'s Scene, options: AnalysisOptions) -> PagBuilder<'s> {
        let ctx = new_context_selector(options.context_type, options.context_depth as usize);
        PagBuilder {
            scene,
            options,
            pag: Pag::new(),
            cg: CallGraph::new(),
            ctx,
            plugins: Rc::new(PluginManager::new()),
            func_pags: HashMap::new(),
            inter_func_pags: HashMap::new(),
            singleton_funcs: HashMap::new(),
            handled_funcs: HashSet::new(),
            scheduled_funcs: HashSet::new(),
            worklist: VecDeque::new(),
            entries: Vec::new(),
            inter_links: Vec::new(),
            retrigger_nodes: BTreeSet::new(),
            updated_nodes: HashMap::new(),
            processed_calls: HashSet::new(),
            unprocessed_calls: Vec::new(),
            field_callees: HashSet::new(),
            synthetic_calls: HashMap::new(),
        }
    }

    #[inline]
    pub fn scene(&self) -> &'s Scene {
        self.scene
    }

    #[inline]
    pub fn pag(&self) -> &Pag {
        &self.pag
    }

    #[inline]
    pub fn pag_mut(&mut self) -> &mut Pag {
        &mut self.pag
    }

    #[inline]
    pub fn call_graph(&self) -> &CallGraph {
        &self.cg
    }

    #[inline]
    pub fn context_cache(&self) -> &ContextCache {
        self.ctx.cache()
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn func_pag(&self, func: FuncId) -> Option<&FuncPag> {
        self.func_pags.get(&func).map(|f| f.as_ref())
    }

    pub fn num_func_pags(&self) -> usize {
        self.func_pags.len()
    }

    pub fn num_handled_funcs(&self) -> usize {
        self.handled_funcs.len()
    }

    pub fn entries(&self) -> &[CSFuncId] {
        &self.entries
    }

    /// Reachable functions that were never summarised, platform methods
    /// aside.
    pub fn unhandled_funcs(&self) -> Vec<FuncId> {
        self.cg
            .reach_funcs()
            .iter()
            .copied()
            .filter(|f| !self.func_pags.contains_key(f) && !self.scene.class_of_method(*f).is_sdk)
            .collect()
    }

    /// Schedules the entry functions under their initial contexts.
    pub fn build_for_entries(&mut self, entries: &[FuncId]) {
        for entry in entries {
            self.add_entry(*entry);
        }
    }

    pub(crate) fn add_entry(&mut self, func: FuncId) -> CSFuncId {
        let cid = self.ctx.empty_context(func);
        let cs_func = CSFuncId::new(cid, func);
        self.cg.add_node(func, CallGraphNodeKind::of(self.scene.method(func)));
        if !self.entries.contains(&cs_func) {
            info!("Entry {}", self.scene.method(func).signature);
            self.entries.push(cs_func);
        }
        self.schedule(func, cid);
        cs_func
    }

    pub(crate) fn schedule(&mut self, func: FuncId, cid: ContextId) {
        let cs_func = CSFuncId::new(cid, func);
        if !self.handled_funcs.contains(&cs_func) {
            self.scheduled_funcs.insert(func);
            self.worklist.push_back(cs_func);
        }
    }

    /// Drains the worklist of reachable (context, function) pairs.
    /// Returns true if any pair was newly instantiated.
    pub fn handle_reachable(&mut self) -> PtaResult<bool> {
        let mut changed = false;
        while let Some(cs_func) = self.worklist.pop_front() {
            if !self.handled_funcs.insert(cs_func) {
                continue;
            }
            debug!(
                "Processing {} under {:?}",
                self.scene.method(cs_func.func_id).signature,
                cs_func.cid
            );
            self.build_func_pag(cs_func.func_id);
            self.build_pag_from_func_pag(cs_func.func_id, cs_func.cid)?;
            changed = true;
        }
        if changed {
            for link in self.inter_links.clone() {
                self.add_edges_from_inter_func_pag(link.func_id, link.cid);
            }
        }
        Ok(changed)
    }

    /// Builds the summary of `func` once. Returns true if a new summary was
    /// created, or if a body-less function was taken over by the SDK model.
    pub fn build_func_pag(&mut self, func: FuncId) -> bool {
        if self.func_pags.contains_key(&func) {
            return false;
        }
        let method = self.scene.method(func);
        if !method.has_body() {
            return sdk::build_sdk_func_pag(self.scene, func);
        }

        let mut fpag = FuncPag::new(func);
        let mut inter_fpag = InterFuncPag::new(func);
        FuncPagBuilder::new(self.scene, func, &mut self.cg, &mut fpag, &mut inter_fpag).build();
        self.func_pags.insert(func, Rc::new(fpag));

        if !inter_fpag.is_empty() {
            // Functions owning captured or imported variables must be analysed
            // too. Their own captures are followed once their summaries exist.
            for src_method in inter_fpag.source_methods() {
                if !self.scheduled_funcs.contains(&src_method) {
                    debug!("Scheduling variable owner {}", self.scene.method(src_method).signature);
                    self.add_entry(src_method);
                }
            }
            self.inter_func_pags.insert(func, Rc::new(inter_fpag));
        }
        true
    }

    /// Instantiates the summary of `func` under `cid`.
    pub fn build_pag_from_func_pag(&mut self, func: FuncId, cid: ContextId) -> PtaResult<()> {
        let Some(fpag) = self.func_pags.get(&func).cloned() else {
            return Ok(());
        };
        self.cg.add_node(func, CallGraphNodeKind::of(self.scene.method(func)));

        for (src, dst, kind, stmt) in fpag.internal_edges() {
            let src_node = self.pag.get_or_new_node(self.scene, cid, *src, Some(*stmt));
            let dst_node = self.pag.get_or_new_node(self.scene, cid, *dst, Some(*stmt));
            if self.pag.add_edge(src_node, dst_node, *kind, Some(*stmt)).is_none() {
                continue;
            }
            match kind {
                PagEdgeKind::Address => {}
                PagEdgeKind::Write => {
                    self.retrigger_nodes.insert(src_node);
                    self.retrigger_field_base(dst_node);
                }
                PagEdgeKind::Load => self.retrigger_field_base(src_node),
                _ => {
                    self.retrigger_nodes.insert(src_node);
                }
            }
        }

        for (alloc, field, stmt) in fpag.field_allocs() {
            let obj = self.pag.get_or_new_node(self.scene, cid, *alloc, Some(*stmt));
            let field_node = self.pag.get_or_new_node(self.scene, cid, *field, Some(*stmt));
            let temp = self.pag.get_or_new_temp(cid, *stmt);
            self.pag.add_edge(obj, temp, PagEdgeKind::Address, Some(*stmt));
            if self.pag.add_edge(temp, field_node, PagEdgeKind::Write, Some(*stmt)).is_some() {
                self.retrigger_field_base(field_node);
            }
        }

        if self.options.analysis_scale == AnalysisScale::MethodLevel {
            self.add_fabricated_objects(func, cid);
        }

        self.add_calls_edges_from_func_pag(&fpag, cid)?;
        for cs in fpag.dynamic_callsites() {
            self.add_dynamic_call_site(*cs, cid);
        }
        for cs in fpag.unknown_callsites() {
            self.add_unknown_call_site(*cs, cid);
        }
        if self.inter_func_pags.contains_key(&func) {
            self.inter_links.push(CSFuncId::new(cid, func));
        }
        Ok(())
    }

    /// A new field reference must see the objects its base already points to.
    fn retrigger_field_base(&mut self, field_ref: NodeId) {
        if let PagNodeKind::FieldRef { base, .. } = self.pag.node(field_ref).kind {
            self.retrigger_nodes.insert(base);
        }
    }

    /// Gives class-typed parameters and the receiver one object each, so that
    /// a function analysed on its own has something to point to.
    fn add_fabricated_objects(&mut self, func: FuncId, cid: ContextId) {
        let scene = self.scene;
        let method = scene.method(func);
        for (index, param) in scene.param_locals(func).into_iter().enumerate() {
            let (Some(param), Some(Type::Class(class))) = (param, method.params.get(index)) else {
                continue;
            };
            let obj = self.pag.get_or_new_synthetic_obj(
                cid,
                SyntheticObj::FabricatedParam { method: func, index },
                Some(class.clone()),
            );
            let dst = self.pag.get_or_new_node(scene, cid, param, None);
            self.pag.add_edge(obj, dst, PagEdgeKind::Address, None);
        }
        if !method.is_static {
            if let Some(this) = scene.this_local(func) {
                let class = scene.class_of_method(func).name.clone();
                let obj = self.pag.get_or_new_synthetic_obj(
                    cid,
                    SyntheticObj::FabricatedThis { method: func },
                    Some(class),
                );
                let dst = self.pag.get_or_new_node(scene, cid, this, None);
                self.pag.add_edge(obj, dst, PagEdgeKind::Address, None);
            }
        }
    }

    /// Wires the statically resolved calls of a function instance. Under
    /// object sensitivity instance calls wait for their receiver objects.
    pub fn add_calls_edges_from_func_pag(&mut self, fpag: &FuncPag, cid: ContextId) -> PtaResult<()> {
        for cs_id in fpag.normal_callsites() {
            let Some(cs) = self.cg.call_site_manager().get_call_site(*cs_id).cloned() else {
                continue;
            };
            self.cg.add_direct_or_special_call_edge(cs.id, cs.caller, cs.callee, false);
            if self.ctx.context_type() == ContextType::Obj && !self.scene.method(cs.callee).is_static {
                if let Some(receiver) = cs.receiver {
                    let node = self.pag.get_or_new_node(self.scene, cid, receiver, cs.stmt);
                    match self.pag.node_mut(node).local_info_mut() {
                        Some(info) => {
                            info.instance_call_sites.push((cs.id, cid));
                            self.retrigger_nodes.insert(node);
                            continue;
                        }
                        None => debug!("Receiver {:?} cannot hold calls, wiring directly", node),
                    }
                }
            }
            self.process_call(&cs, cid, None)?;
        }
        Ok(())
    }

    /// Registers a dynamic call site on its receiver node.
    pub fn add_dynamic_call_site(&mut self, cs_id: CallSiteId, cid: ContextId) {
        if let Some(node) = self.dyn_receiver_node(cs_id, cid) {
            if let Some(info) = self.pag.node_mut(node).local_info_mut() {
                info.dyn_call_sites.push((cs_id, cid));
                self.retrigger_nodes.insert(node);
                return;
            }
            warn!("Receiver {:?} of {:?} cannot hold calls", node, cs_id);
        }
    }

    pub fn add_unknown_call_site(&mut self, cs_id: CallSiteId, cid: ContextId) {
        if let Some(node) = self.dyn_receiver_node(cs_id, cid) {
            if let Some(info) = self.pag.node_mut(node).local_info_mut() {
                info.unknown_call_sites.push((cs_id, cid));
                self.retrigger_nodes.insert(node);
                return;
            }
            warn!("Receiver {:?} of {:?} cannot hold calls", node, cs_id);
        }
    }

    fn dyn_receiver_node(&mut self, cs_id: CallSiteId, cid: ContextId) -> Option<NodeId> {
        let dyn_cs = self.cg.call_site_manager().get_dyn_call_site(cs_id)?;
        match dyn_cs.receiver {
            Some(CallArg::Value(v)) => {
                let stmt = dyn_cs.stmt;
                Some(self.pag.get_or_new_node(self.scene, cid, v, stmt))
            }
            Some(CallArg::Node(n)) => Some(n),
            None => {
                warn!("Dynamic call site {:?} has no receiver", cs_id);
                None
            }
        }
    }

    /// Dispatches the calls registered on `node` for its new objects.
    pub fn handle_receiver(&mut self, node: NodeId, objs: &[NodeId], pt_data: &PtData) -> PtaResult<Vec<NodeId>> {
        let Some(info) = self.pag.node(node).local_info().cloned() else {
            return Ok(Vec::new());
        };
        let mut srcs = Vec::new();
        for obj in objs.iter().copied() {
            if !self.pag.node(obj).is_heap_obj() {
                continue;
            }
            for (cs, cid) in &info.dyn_call_sites {
                srcs.extend(self.add_dynamic_call_edge(*cs, *cid, obj)?);
            }
            for (cs, cid) in &info.unknown_call_sites {
                srcs.extend(self.handle_unknown_dynamic_call(*cs, *cid, obj, pt_data)?);
            }
            for (cs, cid) in &info.instance_call_sites {
                srcs.extend(self.process_instance_call(*cs, *cid, obj)?);
            }
        }
        Ok(srcs)
    }

    /// Resolves the dynamic call site `cs_id` for receiver object `obj` and
    /// wires the resolved callees.
    pub fn add_dynamic_call_edge(&mut self, cs_id: CallSiteId, cid: ContextId, obj: NodeId) -> PtaResult<Vec<NodeId>> {
        if !self.processed_calls.insert((cs_id, cid, obj)) {
            return Ok(Vec::new());
        }
        let Some(dyn_cs) = self.cg.call_site_manager().get_dyn_call_site(cs_id).cloned() else {
            return Ok(Vec::new());
        };
        let callees = self.get_dynamic_callee(&dyn_cs, obj);
        if callees.is_empty() {
            debug!("No callee of {} for {:?} yet", dyn_cs.sig, obj);
            self.unprocessed_calls.push((cs_id, cid, obj));
            return Ok(Vec::new());
        }
        self.wire_dynamic_callees(&dyn_cs, cid, obj, callees)
    }

    /// Resolves a call on a receiver of unknown type: by the object itself,
    /// then by a function stored in the object's field of the method's name.
    pub fn handle_unknown_dynamic_call(
        &mut self,
        cs_id: CallSiteId,
        cid: ContextId,
        obj: NodeId,
        pt_data: &PtData,
    ) -> PtaResult<Vec<NodeId>> {
        if !self.processed_calls.insert((cs_id, cid, obj)) {
            return Ok(Vec::new());
        }
        let Some(dyn_cs) = self.cg.call_site_manager().get_dyn_call_site(cs_id).cloned() else {
            return Ok(Vec::new());
        };
        let callees = self.get_dynamic_callee(&dyn_cs, obj);
        if !callees.is_empty() {
            return self.wire_dynamic_callees(&dyn_cs, cid, obj, callees);
        }
        self.unprocessed_calls.push((cs_id, cid, obj));
        self.resolve_through_field(&dyn_cs, cid, obj, pt_data)
    }

    /// Retries the calls no callee was found for, looking for functions
    /// stored in the receiver's field of the method's name.
    pub fn handle_unprocessed_call_sites(&mut self, pt_data: &PtData) -> PtaResult<Vec<NodeId>> {
        let mut srcs = Vec::new();
        for (cs_id, cid, obj) in self.unprocessed_calls.clone() {
            let Some(dyn_cs) = self.cg.call_site_manager().get_dyn_call_site(cs_id).cloned() else {
                continue;
            };
            srcs.extend(self.resolve_through_field(&dyn_cs, cid, obj, pt_data)?);
        }
        Ok(srcs)
    }

    fn resolve_through_field(
        &mut self,
        dyn_cs: &DynCallSite,
        cid: ContextId,
        obj: NodeId,
        pt_data: &PtData,
    ) -> PtaResult<Vec<NodeId>> {
        if dyn_cs.sig.name == PTR_INVOKE_NAME || self.pag.node(obj).is_function() {
            return Ok(Vec::new());
        }
        let field = self.pag.get_or_new_obj_field_node(obj, FieldKey::Named(dyn_cs.sig.name.clone()));
        let mut srcs = Vec::new();
        for func_obj in pt_data.get_pts(field).iter() {
            let Some(method) = self.pag.node(func_obj).func_info().map(|f| f.method) else {
                continue;
            };
            if self.field_callees.insert((dyn_cs.id, cid, func_obj)) {
                srcs.extend(self.wire_dynamic_callees(dyn_cs, cid, func_obj, vec![method])?);
            }
        }
        Ok(srcs)
    }

    fn wire_dynamic_callees(
        &mut self,
        dyn_cs: &DynCallSite,
        cid: ContextId,
        obj: NodeId,
        callees: Vec<FuncId>,
    ) -> PtaResult<Vec<NodeId>> {
        // `bind` only creates a function value; the call edge appears once the
        // bound function is invoked.
        let binds = self.pag.node(obj).is_function()
            && KnownNames::of(FUNCTION_CLASS, &dyn_cs.sig.name) == KnownNames::FunctionBind;
        let mut srcs = Vec::new();
        for callee in callees {
            let Some(cs_id) = self
                .cg
                .call_site_manager_mut()
                .clone_call_site_from_dyn(dyn_cs.id, callee)
            else {
                continue;
            };
            if binds {
                if let Some(cs) = self.cg.call_site_manager().get_call_site(cs_id).cloned() {
                    srcs.extend(self.process_call(&cs, cid, Some(obj))?);
                }
                continue;
            }
            let recursive = self.cg.detect_reachable(callee, dyn_cs.caller);
            self.cg.add_dynamic_call_edge(cs_id, dyn_cs.caller, callee);
            if recursive {
                debug!(
                    "{} already reaches {}, not wiring {:?} again",
                    self.scene.method(callee).signature,
                    self.scene.method(dyn_cs.caller).signature,
                    cs_id
                );
                continue;
            }
            let Some(cs) = self.cg.call_site_manager().get_call_site(cs_id).cloned() else {
                continue;
            };
            srcs.extend(self.process_call(&cs, cid, Some(obj))?);
        }
        Ok(srcs)
    }

    /// Candidate callees of a dynamic call on `obj`.
    pub fn get_dynamic_callee(&self, dyn_cs: &DynCallSite, obj: NodeId) -> Vec<FuncId> {
        let scene = self.scene;
        let node = self.pag.node(obj);
        let class_name = match node.func_info() {
            Some(func) => {
                let reflective = KnownNames::of(FUNCTION_CLASS, &dyn_cs.sig.name) != KnownNames::None;
                if dyn_cs.sig.name == PTR_INVOKE_NAME || reflective {
                    return vec![func.method];
                }
                Some(FUNCTION_CLASS)
            }
            None => node.obj_class(),
        };

        if let Some(class) = class_name.and_then(|c| scene.class_by_name(c)) {
            if let Some(m) = scene.find_method_in_hierarchy(class, &dyn_cs.sig.name) {
                return vec![m];
            }
        }
        if let Some(m) = dyn_cs.proto_callee {
            return vec![m];
        }
        if dyn_cs.sig.name == PTR_INVOKE_NAME {
            return Vec::new();
        }
        // A generic callee receiving callbacks; the callbacks are what runs.
        dyn_cs
            .args
            .iter()
            .flatten()
            .filter_map(|arg| match arg {
                CallArg::Value(v) => match scene.value(*v) {
                    Value::FunctionRef { method } => Some(*method),
                    _ => match scene.value_type(*v) {
                        Type::Function(sig) => scene.method_by_sig(&sig),
                        _ => None,
                    },
                },
                CallArg::Node(_) => None,
            })
            .collect()
    }

    pub fn process_instance_call(&mut self, cs_id: CallSiteId, cid: ContextId, obj: NodeId) -> PtaResult<Vec<NodeId>> {
        if !self.processed_calls.insert((cs_id, cid, obj)) {
            return Ok(Vec::new());
        }
        let Some(cs) = self.cg.call_site_manager().get_call_site(cs_id).cloned() else {
            return Ok(Vec::new());
        };
        self.process_call(&cs, cid, Some(obj))
    }

    /// Wires one resolved call under `caller_cid`, letting a plugin take
    /// over modelled APIs. Returns the nodes that became new flow sources.
    pub fn process_call(&mut self, cs: &CallSite, caller_cid: ContextId, base_obj: Option<NodeId>) -> PtaResult<Vec<NodeId>> {
        let plugins = Rc::clone(&self.plugins);
        if let Some(srcs) = plugins.process_call_site(self, cs, caller_cid, base_obj)? {
            return Ok(srcs);
        }

        let callee = cs.callee;
        let method = self.scene.method(callee);
        if !method.has_body() {
            debug!("Skipping call to body-less {}", method.signature);
            return Ok(Vec::new());
        }
        self.build_func_pag(callee);
        let callee_cid = self.select_callee_context(cs, caller_cid, base_obj, callee);

        let mut srcs = Vec::new();
        let mut param_offset = 0;
        let bound = base_obj.and_then(|obj| self.pag.node(obj).func_info()).and_then(|f| f.bound);
        if let Some(bound) = bound {
            if let Some(bind_cs) = self.cg.call_site_manager().get_call_site(bound.call_site).cloned() {
                // The first argument of `bind` is the receiver.
                srcs.extend(self.add_call_param_pag_edge(&bind_cs, bound.origin_cid, callee, callee_cid, 1, 0)?);
            }
            param_offset = bound.args_offset;
        }
        srcs.extend(self.add_call_param_pag_edge(cs, caller_cid, callee, callee_cid, 0, param_offset)?);
        srcs.extend(self.add_call_return_pag_edge(cs, caller_cid, callee, callee_cid)?);
        srcs.extend(self.add_this_ref_call_edge(cs, caller_cid, base_obj, callee, callee_cid)?);

        self.cg.add_node(callee, CallGraphNodeKind::of(method));
        self.schedule(callee, callee_cid);
        Ok(srcs)
    }

    /// Singleton accessors run under the dummy context, everything else under
    /// the context the selector derives.
    pub(crate) fn select_callee_context(
        &mut self,
        cs: &CallSite,
        caller_cid: ContextId,
        base_obj: Option<NodeId>,
        callee: FuncId,
    ) -> ContextId {
        if self.is_singleton_function(callee) {
            debug!("{} is a singleton accessor", self.scene.method(callee).signature);
            return DUMMY_CID;
        }
        self.ctx.select_context(caller_cid, cs.id, base_obj, callee)
    }

    /// Binds arguments to formals. Arguments from `arg_skip` on are bound to
    /// formals from `param_offset` on.
    pub fn add_call_param_pag_edge(
        &mut self,
        cs: &CallSite,
        caller_cid: ContextId,
        callee: FuncId,
        callee_cid: ContextId,
        arg_skip: usize,
        param_offset: usize,
    ) -> PtaResult<Vec<NodeId>> {
        let Some(args) = &cs.args else {
            return Ok(Vec::new());
        };
        let params = self.scene.param_locals(callee);
        let mut srcs = Vec::new();
        for (i, arg) in args.iter().skip(arg_skip).enumerate() {
            let Some(Some(param)) = params.get(i + param_offset) else {
                break;
            };
            let Some(src) = self.call_arg_node(*arg, caller_cid, cs.stmt) else {
                continue;
            };
            let dst = self.pag.get_or_new_node(self.scene, callee_cid, *param, None);
            srcs.extend(self.add_flow_edge(src, dst, PagEdgeKind::Copy, cs.stmt));
        }
        Ok(srcs)
    }

    /// Connects every returned local of the callee to the call's target.
    pub fn add_call_return_pag_edge(
        &mut self,
        cs: &CallSite,
        caller_cid: ContextId,
        callee: FuncId,
        callee_cid: ContextId,
    ) -> PtaResult<Vec<NodeId>> {
        let Some(lhs) = cs.lhs else {
            return Ok(Vec::new());
        };
        let scene = self.scene;
        let dst = self.pag.get_or_new_node(scene, caller_cid, lhs, cs.stmt);
        let mut srcs = Vec::new();
        for ret in scene.return_stmts(callee) {
            let Some(op) = scene.stmt(ret).return_op() else {
                continue;
            };
            match scene.value(op) {
                Value::Local { .. } => {
                    let src = self.pag.get_or_new_node(scene, callee_cid, op, Some(ret));
                    srcs.extend(self.add_flow_edge(src, dst, PagEdgeKind::Copy, Some(ret)));
                }
                Value::Constant(_) | Value::Expr { .. } => {}
                _ => return Err(PtaError::UnexpectedReturnOperand { method: callee, value: op }),
            }
        }
        Ok(srcs)
    }

    /// Binds the callee's `this` to the receiver of the call.
    pub fn add_this_ref_call_edge(
        &mut self,
        cs: &CallSite,
        caller_cid: ContextId,
        base_obj: Option<NodeId>,
        callee: FuncId,
        callee_cid: ContextId,
    ) -> PtaResult<Vec<NodeId>> {
        let scene = self.scene;
        let method = scene.method(callee);
        if method.is_static {
            return Ok(Vec::new());
        }
        let Some(this_local) = scene.this_local(callee) else {
            return Err(PtaError::MissingThisRef { method: callee });
        };
        let this_stmt = scene.this_assign_stmt(callee);
        let this_node = self.pag.get_or_new_node(scene, callee_cid, this_local, this_stmt);

        if let Some(obj) = base_obj {
            match self.pag.node(obj).func_info() {
                Some(func) => {
                    if let Some(bound_this) = func.this_node {
                        return Ok(self.add_flow_edge(bound_this, this_node, PagEdgeKind::This, cs.stmt).into_iter().collect());
                    }
                    debug!("No receiver for {} called through a function value", method.signature);
                }
                None => self.add_updated_node(this_node, obj),
            }
            return Ok(Vec::new());
        }

        let Some(receiver) = cs.receiver else {
            if method.is_constructor() {
                return Err(PtaError::NonInstanceInvoke { callee, stmt: cs.stmt });
            }
            return Ok(Vec::new());
        };
        if !is_pointer_value(scene.value(receiver)) {
            return Err(PtaError::MissingReceiverNode { receiver, stmt: cs.stmt });
        }
        let recv_node = self.pag.get_or_new_node(scene, caller_cid, receiver, cs.stmt);
        Ok(self.add_flow_edge(recv_node, this_node, PagEdgeKind::This, cs.stmt).into_iter().collect())
    }

    /// Binds the `this` of `callee` to `src`, e.g. the first argument of
    /// `Function.call`.
    pub(crate) fn add_this_edge(
        &mut self,
        src: NodeId,
        callee: FuncId,
        callee_cid: ContextId,
        stmt: Option<StmtId>,
    ) -> PtaResult<Option<NodeId>> {
        let scene = self.scene;
        if scene.method(callee).is_static {
            return Ok(None);
        }
        let Some(this_local) = scene.this_local(callee) else {
            return Err(PtaError::MissingThisRef { method: callee });
        };
        let this_node = self.pag.get_or_new_node(scene, callee_cid, this_local, scene.this_assign_stmt(callee));
        Ok(self.add_flow_edge(src, this_node, PagEdgeKind::This, stmt))
    }

    /// Connects captured and imported locals of `func` under `cid` to every
    /// instance of the variables they refer to.
    pub fn add_edges_from_inter_func_pag(&mut self, func: FuncId, cid: ContextId) {
        let Some(inter_fpag) = self.inter_func_pags.get(&func).cloned() else {
            return;
        };
        let scene = self.scene;
        for edge in inter_fpag.edges() {
            let srcs = self.pag.get_nodes_by_value(scene, edge.src);
            if srcs.is_empty() {
                debug!(
                    "{} of {} is not instantiated yet",
                    scene.value_to_string(edge.src),
                    scene.method(edge.src_method).signature
                );
                continue;
            }
            let dst = self.pag.get_or_new_node(scene, cid, edge.dst, None);
            for src in srcs.into_values() {
                self.add_flow_edge(src, dst, PagEdgeKind::InterProceduralCopy, None);
                if edge.reverse {
                    self.add_flow_edge(dst, src, PagEdgeKind::InterProceduralCopy, None);
                }
            }
        }
    }

    /// Returns true if the static function `func` returns an object it also
    /// keeps in a static field or global, i.e. it hands out one shared
    /// instance.
    pub fn is_singleton_function(&mut self, func: FuncId) -> bool {
        if let Some(result) = self.singleton_funcs.get(&func) {
            return *result;
        }
        let result = self.detect_singleton(func);
        self.singleton_funcs.insert(func, result);
        result
    }

    fn detect_singleton(&self, func: FuncId) -> bool {
        if !self.scene.method(func).is_static {
            return false;
        }
        let Some(fpag) = self.func_pags.get(&func) else {
            return false;
        };
        if fpag.static_variables_involved.is_empty() || fpag.return_values.is_empty() {
            return false;
        }
        let mut succs: HashMap<ValueId, Vec<ValueId>> = HashMap::new();
        for (src, dst, kind, _) in fpag.internal_edges() {
            if *kind != PagEdgeKind::Address {
                succs.entry(*src).or_default().push(*dst);
            }
        }
        let returns: HashSet<ValueId> = fpag.return_values.iter().copied().collect();

        for (_, target, kind, _) in fpag.internal_edges() {
            if *kind != PagEdgeKind::Address {
                continue;
            }
            if fpag.is_static_variable(*target) && reaches_return(*target, &succs, &returns) {
                return true;
            }
            // Only paths leaving the allocation through a global are followed.
            for succ in succs.get(target).into_iter().flatten() {
                if fpag.is_static_variable(*succ) && reaches_return(*succ, &succs, &returns) {
                    return true;
                }
            }
        }
        false
    }

    /// Takes the nodes whose points-to sets must be propagated again.
    pub fn get_retrigger_nodes(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.retrigger_nodes).into_iter().collect()
    }

    pub fn get_updated_nodes(&self) -> &HashMap<NodeId, PtsCollection<NodeId>> {
        &self.updated_nodes
    }

    pub fn reset_updated_nodes(&mut self) {
        self.updated_nodes.clear();
    }

    /// True if a later round may have work: functions to instantiate or
    /// deltas for the solver.
    pub fn has_pending_work(&self) -> bool {
        !self.worklist.is_empty() || !self.retrigger_nodes.is_empty() || !self.updated_nodes.is_empty()
    }

    pub(crate) fn add_updated_node(&mut self, node: NodeId, obj: NodeId) {
        let collection_type = self.options.pts_collection;
        self.updated_nodes
            .entry(node)
            .or_insert_with(|| collection_type.new_set())
            .insert(obj);
    }

    /// Adds a flow edge and returns its source if the edge is new.
    pub(crate) fn add_flow_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        kind: PagEdgeKind,
        stmt: Option<StmtId>,
    ) -> Option<NodeId> {
        self.pag.add_edge(src, dst, kind, stmt)?;
        match kind {
            PagEdgeKind::Load => self.retrigger_field_base(src),
            PagEdgeKind::Write => {
                self.retrigger_field_base(dst);
                self.retrigger_nodes.insert(src);
            }
            _ => {
                self.retrigger_nodes.insert(src);
            }
        }
        Some(src)
    }

    pub(crate) fn add_address_edge(&mut self, obj: NodeId, dst: NodeId, stmt: Option<StmtId>) {
        self.pag.add_edge(obj, dst, PagEdgeKind::Address, stmt);
    }

    /// The node an argument denotes in the caller, if it can carry pointers.
    pub(crate) fn call_arg_node(&mut self, arg: CallArg, cid: ContextId, stmt: Option<StmtId>) -> Option<NodeId> {
        match arg {
            CallArg::Value(v) if is_pointer_value(self.scene.value(v)) => {
                Some(self.pag.get_or_new_node(self.scene, cid, v, stmt))
            }
            CallArg::Value(_) => None,
            CallArg::Node(n) => Some(n),
        }
    }

    pub(crate) fn arg_node(&mut self, cs: &CallSite, cid: ContextId, index: usize) -> Option<NodeId> {
        let arg = *cs.args.as_ref()?.get(index)?;
        self.call_arg_node(arg, cid, cs.stmt)
    }

    pub(crate) fn lhs_node(&mut self, cs: &CallSite, cid: ContextId) -> Option<NodeId> {
        let lhs = cs.lhs?;
        Some(self.pag.get_or_new_node(self.scene, cid, lhs, cs.stmt))
    }

    /// Synthesizes a call through the function pointer `ptr`, e.g. a callback
    /// handed to a platform API, and registers it on `ptr`.
    pub(crate) fn add_synthetic_ptr_call(
        &mut self,
        origin: &CallSite,
        cid: ContextId,
        ptr: NodeId,
        args: Vec<CallArg>,
        lhs: Option<ValueId>,
    ) -> Option<CallSiteId> {
        let key = (origin.id, ptr, args.clone());
        if let Some(id) = self.synthetic_calls.get(&key) {
            return Some(*id);
        }
        let id = self.cg.call_site_manager_mut().new_dyn_call_site(
            origin.stmt,
            MethodSignature::new(UNKNOWN_CLASS, PTR_INVOKE_NAME),
            Some(args),
            lhs,
            Some(CallArg::Node(ptr)),
            origin.caller,
            None,
        );
        self.synthetic_calls.insert(key, id);
        match self.pag.node_mut(ptr).local_info_mut() {
            Some(info) => info.dyn_call_sites.push((id, cid)),
            None => {
                warn!("Cannot call through {:?}", ptr);
                return None;
            }
        }
        self.retrigger_nodes.insert(ptr);
        Some(id)
    }
}

/// Values that denote a pointer location.
pub(crate) fn is_pointer_value(value: &Value) -> bool {
    matches!(
        value,
        Value::Local { .. } | Value::InstanceField { .. } | Value::StaticField { .. } | Value::ArrayRef { .. }
    )
}

fn reaches_return(start: ValueId, succs: &HashMap<ValueId, Vec<ValueId>>, returns: &HashSet<ValueId>) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(v) = stack.pop() {
        if returns.contains(&v) {
            return true;
        }
        if !visited.insert(v) {
            continue;
        }
        stack.extend(succs.get(&v).into_iter().flatten().copied());
    }
    false
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::SceneBuilder;

    fn singleton_scene(store_in_static: bool) -> (Scene, FuncId) {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        let foo = sb.add_class(file, "Foo", None);
        let get = sb.add_static_method(foo, "getInstance", &[], Type::class("Foo"));
        let t = sb.local(get, "t", Type::class("Foo"));
        let r = sb.local(get, "r", Type::class("Foo"));
        sb.new_object(get, t, "Foo", vec![]);
        if store_in_static {
            let inst = sb.static_field("Foo", "inst");
            sb.assign(get, inst, t);
            let inst2 = sb.static_field("Foo", "inst");
            sb.assign(get, r, inst2);
        } else {
            sb.assign(get, r, t);
        }
        sb.ret(get, r);
        (sb.finish(), get)
    }

    #[test]
    fn singleton_accessors_are_detected() {
        let (scene, get) = singleton_scene(true);
        let mut builder = PagBuilder::new(&scene, AnalysisOptions::default());
        assert!(builder.build_func_pag(get));
        assert!(!builder.build_func_pag(get));
        assert!(builder.is_singleton_function(get));

        let (scene, get) = singleton_scene(false);
        let mut builder = PagBuilder::new(&scene, AnalysisOptions::default());
        builder.build_func_pag(get);
        assert!(!builder.is_singleton_function(get));
    }

    #[test]
    fn instantiation_is_idempotent_per_context() {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        sb.add_class(file, "Foo", None);
        let main = sb.add_function(file, "main", &[], Type::Void);
        let a = sb.local(main, "a", Type::class("Foo"));
        let b = sb.local(main, "b", Type::class("Foo"));
        sb.new_object(main, a, "Foo", vec![]);
        sb.assign(main, b, a);
        let scene = sb.finish();

        let mut builder = PagBuilder::new(&scene, AnalysisOptions::default());
        builder.build_for_entries(&[main]);
        builder.build_for_entries(&[main]);
        assert!(builder.handle_reachable().unwrap());
        assert!(!builder.handle_reachable().unwrap());
        assert_eq!(builder.num_handled_funcs(), 1);
        assert_eq!(builder.pag().num_edges(), 2);
        assert!(!builder.get_retrigger_nodes().is_empty());
        assert!(builder.get_retrigger_nodes().is_empty());
    }

    #[test]
    fn sdk_functions_have_no_summary() {
        let mut sb = SceneBuilder::new();
        let storage = sb.add_sdk_class("AppStorage", None, None);
        let get = sb.add_sdk_method(storage, "get", true, &[("key", Type::Primitive("string".into()))], Type::Any);
        let scene = sb.finish();

        let mut builder = PagBuilder::new(&scene, AnalysisOptions::default());
        assert!(builder.build_func_pag(get));
        assert!(builder.func_pag(get).is_none());
        assert!(builder.unhandled_funcs().is_empty());
    }
}
