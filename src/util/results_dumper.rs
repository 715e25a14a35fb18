// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use itertools::Itertools;
use log::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::ir::{FuncId, ValueId};
use crate::pta::PointerAnalysis;
use crate::pts_set::points_to::PointsToSet;

pub fn dump_results(pta: &PointerAnalysis<'_>) -> std::io::Result<()> {
    // dump points-to results
    if let Some(pts_output) = &pta.options().pts_output {
        info!("Dumping points-to results...");
        dump_ci_pts(pta, pts_output)?;
    }

    // dump call graph
    if let Some(cg_output) = &pta.options().call_graph_output {
        info!("Dumping call graph...");
        dump_call_graph(pta, std::path::Path::new(cg_output))?;
    }
    Ok(())
}

fn open_writer(path: &str) -> std::io::Result<BufWriter<Box<dyn Write>>> {
    Ok(BufWriter::new(match path {
        "stdout" => Box::new(std::io::stdout()) as Box<dyn Write>,
        _ => Box::new(File::create(path)?) as Box<dyn Write>,
    }))
}

pub fn dump_call_graph(pta: &PointerAnalysis<'_>, dot_path: &std::path::Path) -> std::io::Result<()> {
    std::fs::write(dot_path, pta.call_graph().to_dot(pta.scene()))
}

/// Context-insensitive points-to sets, grouped by the function declaring
/// each pointer.
pub fn dump_ci_pts(pta: &PointerAnalysis<'_>, pts_path: &str) -> std::io::Result<()> {
    let scene = pta.scene();
    let pag = pta.pag();
    let pt_data = pta.pt_data();

    let mut grouped_pts: BTreeMap<FuncId, BTreeMap<ValueId, BTreeSet<String>>> = BTreeMap::new();
    let mut globals: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for node in pt_data.keys() {
        let pointees: BTreeSet<String> = pt_data
            .get_pts(node)
            .iter()
            .map(|obj| pag.node_to_string(scene, obj))
            .collect();
        match pag.node(node).ir_value() {
            Some(value) => match scene.methods().find(|m| m.declares(value)) {
                Some(method) => {
                    grouped_pts
                        .entry(method.id)
                        .or_default()
                        .entry(value)
                        .or_default()
                        .extend(pointees);
                }
                None => globals.entry(scene.value_to_string(value)).or_default().extend(pointees),
            },
            None => globals.entry(pag.node_to_string(scene, node)).or_default().extend(pointees),
        }
    }

    let mut pts_writer = open_writer(pts_path)?;
    for (func_id, pts_map) in grouped_pts {
        writeln!(pts_writer, "{:?} - {}", func_id, scene.method(func_id).signature)?;
        for (value, pts) in pts_map {
            write_pts(&mut pts_writer, &scene.value_to_string(value), &pts)?;
        }
    }
    if !globals.is_empty() {
        writeln!(pts_writer, "<globals>")?;
        for (name, pts) in globals {
            write_pts(&mut pts_writer, &name, &pts)?;
        }
    }
    pts_writer.flush()
}

fn write_pts<W: Write>(writer: &mut W, pointer: &str, pts: &BTreeSet<String>) -> std::io::Result<()> {
    writeln!(writer, "\t{} ({}) ==> {{ {} }}", pointer, pts.len(), pts.iter().join(" "))
}
