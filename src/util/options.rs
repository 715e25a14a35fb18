// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Analysis options.

use clap::error::ErrorKind;
use clap::{Arg, Command};
use serde::{Deserialize, Serialize};

use crate::pta::context_strategy::ContextType;
use crate::pts_set::points_to::PtsCollectionType;

const PTA_USAGE: &str = r#"pta [OPTIONS] SCENE"#;

/// Whether the whole program is analysed from its entries, or each entry
/// method on its own with fabricated objects for its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisScale {
    WholeProgram,
    MethodLevel,
}

impl Default for AnalysisScale {
    fn default() -> Self {
        AnalysisScale::WholeProgram
    }
}

/// Creates the clap::Command metadata for argument parsing.
fn make_options_parser() -> Command<'static> {
    let parser = Command::new("pta")
        .no_binary_name(true)
        .override_usage(PTA_USAGE)
        .version(env!("CARGO_PKG_VERSION"))
        .arg(Arg::new("entry")
            .long("entry")
            .takes_value(true)
            .multiple_occurrences(true)
            .help("An entry method, as `Class.method`, a method name or a file name.")
            .long_help("May be given several times. Without entries the module code of every file is analysed."))
        .arg(Arg::new("analysis-scale")
            .long("scale")
            .takes_value(true)
            .value_parser(["whole-program", "method-level"])
            .help("Analyse the whole program or each entry method on its own."))
        .arg(Arg::new("context-type")
            .long("context-type")
            .takes_value(true)
            .value_parser(["callsite", "cs", "object", "obj", "function", "func"])
            .help("The kind of context elements."))
        .arg(Arg::new("context-depth")
            .long("context-depth")
            .takes_value(true)
            .value_parser(clap::value_parser!(u32))
            .help("The context depth limit for a context-sensitive pointer analysis. Defaults to 1."))
        .arg(Arg::new("pts-collection")
            .long("pts-collection")
            .takes_value(true)
            .value_parser(["bitvec", "hashset"])
            .hide(true)
            .help("The representation of points-to sets."))
        .arg(Arg::new("dump-stats")
            .long("dump-stats")
            .takes_value(false)
            .help("Dump the statistics of the analysis results."))
        .arg(Arg::new("call-graph-output")
            .long("dump-call-graph")
            .takes_value(true)
            .help("Dump the call graph in DOT format to the output file."))
        .arg(Arg::new("pts-output")
            .long("dump-pts")
            .takes_value(true)
            .help("Dump points-to results to the output file."))
        .arg(Arg::new("INPUT")
            .multiple(true)
            .help("The scene file to be analyzed."));
    parser
}

#[derive(Clone, Debug)]
pub struct AnalysisOptions {
    pub analysis_scale: AnalysisScale,
    pub context_type: ContextType,
    pub context_depth: u32,
    pub pts_collection: PtsCollectionType,
    pub entries: Vec<String>,

    pub dump_stats: bool,
    pub call_graph_output: Option<String>,
    pub pts_output: Option<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            analysis_scale: AnalysisScale::WholeProgram,
            context_type: ContextType::CallSite,
            context_depth: 1,
            pts_collection: PtsCollectionType::BitVec,
            entries: Vec::new(),
            dump_stats: false,
            call_graph_output: None,
            pts_output: None,
        }
    }
}

impl AnalysisOptions {
    /// Parses options from a list of strings and returns the input files.
    /// Options not given keep their current value, so options from the
    /// environment can be overridden by the command line.
    pub fn parse_from_args(&mut self, args: &[String], from_env: bool) -> Vec<String> {
        let matches = match make_options_parser().try_get_matches_from(args.iter()) {
            Ok(matches) => matches,
            Err(e) => match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion if !from_env => e.exit(),
                _ => {
                    if from_env {
                        eprintln!("Invalid PTA_FLAGS:");
                    }
                    e.exit()
                }
            },
        };

        if let Some(entries) = matches.get_many::<String>("entry") {
            self.entries = entries.cloned().collect();
        }
        if let Some(scale) = matches.get_one::<String>("analysis-scale") {
            self.analysis_scale = match scale.as_str() {
                "method-level" => AnalysisScale::MethodLevel,
                _ => AnalysisScale::WholeProgram,
            };
        }
        if let Some(context_type) = matches.get_one::<String>("context-type") {
            self.context_type = match context_type.as_str() {
                "object" | "obj" => ContextType::Obj,
                "function" | "func" => ContextType::Func,
                _ => ContextType::CallSite,
            };
        }
        if let Some(depth) = matches.get_one::<u32>("context-depth") {
            self.context_depth = *depth;
        }
        if let Some(collection) = matches.get_one::<String>("pts-collection") {
            self.pts_collection = match collection.as_str() {
                "hashset" => PtsCollectionType::HashSet,
                _ => PtsCollectionType::BitVec,
            };
        }

        if matches.contains_id("dump-stats") {
            self.dump_stats = true;
        }
        if let Some(output) = matches.get_one::<String>("call-graph-output") {
            self.call_graph_output = Some(output.clone());
        }
        if let Some(output) = matches.get_one::<String>("pts-output") {
            self.pts_output = Some(output.clone());
        }

        matches
            .get_many::<String>("INPUT")
            .map(|inputs| inputs.cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(|s| s.to_string()).collect()
    }

    #[test]
    fn command_line_overrides_environment() {
        let mut options = AnalysisOptions::default();
        let inputs = options.parse_from_args(&args("--context-type obj --context-depth 2 --entry main"), true);
        assert!(inputs.is_empty());
        assert_eq!(options.context_type, ContextType::Obj);
        assert_eq!(options.context_depth, 2);

        let inputs = options.parse_from_args(&args("--context-depth 3 --scale method-level scene.json"), false);
        assert_eq!(inputs, vec!["scene.json".to_string()]);
        assert_eq!(options.context_type, ContextType::Obj);
        assert_eq!(options.context_depth, 3);
        assert_eq!(options.analysis_scale, AnalysisScale::MethodLevel);
        assert_eq!(options.entries, vec!["main".to_string()]);
        assert!(!options.dump_stats);
    }
}
