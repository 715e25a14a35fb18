// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The main routine of `pta`.
//!
//! Loads a scene serialized as JSON, runs the pointer analysis from the
//! requested entries and dumps the results.

use anyhow::{bail, Context};
use log::*;
use std::env;

use arkpta::ir::Scene;
use arkpta::pta::PointerAnalysis;
use arkpta::util::options::AnalysisOptions;
use arkpta::util::results_dumper;

fn main() -> anyhow::Result<()> {
    // Initialize loggers.
    if env::var("PTA_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PTA_LOG")
            .write_style("PTA_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    // Get any options specified via the PTA_FLAGS environment variable
    let mut options = AnalysisOptions::default();
    let pta_flags = env::var("PTA_FLAGS").unwrap_or_default();
    let pta_args: Vec<String> = serde_json::from_str(&pta_flags).unwrap_or_default();
    let mut inputs = options.parse_from_args(&pta_args[..], true);

    // Let arguments supplied on the command line override the environment variable.
    let args: Vec<String> = env::args().skip(1).collect();
    inputs.extend(options.parse_from_args(&args, false));
    info!("PTA Options: {:?}", options);

    let Some(input) = inputs.last() else {
        bail!("no scene file given");
    };
    let json = std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input))?;
    let scene = Scene::from_json(&json).with_context(|| format!("failed to load {}", input))?;

    let mut pta = PointerAnalysis::new(&scene, options);
    pta.analyze().context("pointer analysis failed")?;

    if pta.options().dump_stats {
        pta.stats().do_stat().dump_stats().context("failed to dump statistics")?;
    }
    results_dumper::dump_results(&pta).context("failed to dump results")?;
    Ok(())
}
