// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use itertools::Itertools;
use log::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::io::{BufWriter, Write};

use crate::builder::pag_builder::PagBuilder;
use crate::graph::call_graph::CallType;
use crate::graph::pag::PagEdgeKind;
use crate::ir::ValueId;
use crate::pta::PointerAnalysis;
use crate::pts_set::points_to::PointsToSet;

#[derive(Debug, Default)]
pub struct PagStat {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub edges_by_kind: Vec<(PagEdgeKind, usize)>,
    pub num_contexts: usize,
    pub num_func_pags: usize,
    pub num_cs_funcs: usize,
}

impl PagStat {
    pub fn do_stat(&mut self, builder: &PagBuilder<'_>) {
        let pag = builder.pag();
        self.num_nodes = pag.num_nodes();
        self.num_edges = pag.num_edges();
        self.edges_by_kind = PagEdgeKind::ALL
            .iter()
            .map(|kind| (*kind, pag.num_edges_of_kind(*kind)))
            .collect();
        self.num_contexts = builder.context_cache().num_contexts();
        self.num_func_pags = builder.num_func_pags();
        self.num_cs_funcs = builder.num_handled_funcs();
    }

    pub fn get_stat(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "PAG Statistics: ");
        let _ = writeln!(s, "#Nodes: {}", self.num_nodes);
        let _ = writeln!(s, "#Edges: {}", self.num_edges);
        for (kind, num) in &self.edges_by_kind {
            let _ = writeln!(s, "  #{:?} edges: {}", kind, num);
        }
        let _ = writeln!(s, "#Contexts: {}", self.num_contexts);
        let _ = writeln!(s, "#Function summaries: {}", self.num_func_pags);
        let _ = writeln!(s, "#Context-sensitive functions: {}", self.num_cs_funcs);
        s
    }
}

#[derive(Debug, Default)]
pub struct CgStat {
    pub num_reachable_funcs: usize,
    pub num_static_edges: usize,
    pub num_dynamic_edges: usize,
    pub num_special_edges: usize,
    pub num_call_sites: usize,
    pub unhandled_funcs: Vec<String>,
}

impl CgStat {
    pub fn do_stat(&mut self, builder: &PagBuilder<'_>) {
        let cg = builder.call_graph();
        let scene = builder.scene();
        self.num_reachable_funcs = cg.reach_funcs().len();
        self.num_static_edges = cg.num_edges_of_type(CallType::Static);
        self.num_dynamic_edges = cg.num_edges_of_type(CallType::Dynamic);
        self.num_special_edges = cg.num_edges_of_type(CallType::Special);
        self.num_call_sites = cg.call_site_manager().len();
        self.unhandled_funcs = builder
            .unhandled_funcs()
            .into_iter()
            .map(|f| scene.method(f).signature.to_string())
            .sorted()
            .collect();
    }

    pub fn get_stat(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "Call Graph Statistics: ");
        let _ = writeln!(s, "#Reachable functions: {}", self.num_reachable_funcs);
        let _ = writeln!(s, "#Static call edges: {}", self.num_static_edges);
        let _ = writeln!(s, "#Dynamic call edges: {}", self.num_dynamic_edges);
        let _ = writeln!(s, "#Special call edges: {}", self.num_special_edges);
        let _ = writeln!(s, "#Call sites: {}", self.num_call_sites);
        let _ = writeln!(s, "#Unhandled functions: {}", self.unhandled_funcs.len());
        for func in &self.unhandled_funcs {
            let _ = writeln!(s, "  {}", func);
        }
        s
    }
}

pub struct PtaStat<'pta, 's> {
    pta: &'pta PointerAnalysis<'s>,
    pub num_pointers: usize,
    pub num_pts_relations: usize,
    pub num_ci_pointers: usize,
    pub num_ci_pts_relations: usize,
    pub pag_stat: PagStat,
    pub cg_stat: CgStat,
}

impl<'pta, 's> PtaStat<'pta, 's> {
    pub fn new(pta: &'pta PointerAnalysis<'s>) -> Self {
        PtaStat {
            pta,
            num_pointers: 0,
            num_pts_relations: 0,
            num_ci_pointers: 0,
            num_ci_pts_relations: 0,
            pag_stat: PagStat::default(),
            cg_stat: CgStat::default(),
        }
    }

    pub fn do_stat(&mut self) -> &mut Self {
        let pt_data = self.pta.pt_data();
        let pag = self.pta.pag();
        let mut ci_pts: BTreeMap<ValueId, BTreeSet<ValueId>> = BTreeMap::new();
        self.num_pointers = 0;
        self.num_pts_relations = 0;
        for node in pt_data.keys() {
            let pts = pt_data.get_pts(node);
            self.num_pointers += 1;
            self.num_pts_relations += pts.count();
            let Some(ptr) = pag.node(node).ir_value() else {
                continue;
            };
            let pointees = ci_pts.entry(ptr).or_default();
            pointees.extend(pts.iter().filter_map(|obj| pag.node(obj).ir_value()));
        }
        self.num_ci_pointers = ci_pts.len();
        self.num_ci_pts_relations = ci_pts.values().map(|pts| pts.len()).sum();

        self.pag_stat.do_stat(self.pta.builder());
        self.cg_stat.do_stat(self.pta.builder());
        self
    }

    pub fn get_stat(&self) -> String {
        let avg = |relations: usize, pointers: usize| {
            if pointers == 0 {
                0.0
            } else {
                relations as f64 / pointers as f64
            }
        };
        let mut s = String::new();
        let _ = writeln!(s, "##########################################################");
        let _ = writeln!(
            s,
            "Analysis time: {} ({} rounds)",
            humantime::format_duration(self.pta.elapsed()),
            self.pta.rounds()
        );
        s.push_str(&self.cg_stat.get_stat());
        let _ = writeln!(s, "----------------------------------------------------------");
        s.push_str(&self.pag_stat.get_stat());
        let _ = writeln!(s, "----------------------------------------------------------");
        let _ = writeln!(s, "CS Points-to Statistics: ");
        let _ = writeln!(s, "#Pointers: {}", self.num_pointers);
        let _ = writeln!(s, "#Points-to relations: {}", self.num_pts_relations);
        let _ = writeln!(s, "#Avg points-to size: {}", avg(self.num_pts_relations, self.num_pointers));
        let _ = writeln!(s, "CI Points-to Statistics: ");
        let _ = writeln!(s, "#Pointers: {}", self.num_ci_pointers);
        let _ = writeln!(s, "#Points-to relations: {}", self.num_ci_pts_relations);
        let _ = writeln!(s, "#Avg points-to size: {}", avg(self.num_ci_pts_relations, self.num_ci_pointers));
        let _ = writeln!(s, "##########################################################");
        s
    }

    pub fn print_stat<W: Write>(&self, stat_writer: &mut BufWriter<W>) -> std::io::Result<()> {
        stat_writer.write_all(self.get_stat().as_bytes())?;
        stat_writer.flush()
    }

    pub fn dump_stats(&self) -> std::io::Result<()> {
        info!("Dumping pta statistics...");
        let mut stat_writer = BufWriter::new(std::io::stdout());
        self.print_stat(&mut stat_writer)
    }
}
