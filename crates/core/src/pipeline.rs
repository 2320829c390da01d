//! End-to-end analysis of a build directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug_span, info, warn};

use crate::collapse::{collapse_files, collapse_trace};
use crate::error::PipelineError;
use crate::model::CollapsedStacks;
use crate::normalize::{
    CombinedTrace, PathNormalizer, TraceCombiner, TraceInput, find_compile_commands,
    find_trace_files, load_trace_inputs,
};
use crate::parsers::compile_commands::{CompileCommand, parse_compile_commands};
use crate::parsers::{ParseError, StackInput, parse_stack_input};
use crate::svg::{render_flame_graph, validate_options};
use crate::views::flame_graph::{FlameGraphOptions, merge_stacks};
use crate::views::report::generate_report;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    /// Explicit compile command database. When unset, the build directory
    /// and its ancestors are searched.
    pub compile_commands: Option<PathBuf>,
    /// Extra project include roots (`-I`).
    pub include_dirs: Vec<PathBuf>,
    /// Extra system include roots (`-isystem`).
    pub system_include_dirs: Vec<PathBuf>,
    pub flame_graph: FlameGraphOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(".", ".")
    }
}

impl PipelineConfig {
    pub fn new(source_dir: impl Into<PathBuf>, build_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            build_dir: build_dir.into(),
            compile_commands: None,
            include_dirs: Vec::new(),
            system_include_dirs: Vec::new(),
            flame_graph: FlameGraphOptions::default(),
        }
    }
}

/// Everything the pipeline produces. Nothing is written to disk.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub combined: CombinedTrace,
    /// Markdown report.
    pub report: String,
    pub stacks: CollapsedStacks,
    pub svg: String,
}

/// Discover, load and analyze every trace file under the build directory.
pub fn run(config: &PipelineConfig) -> Result<PipelineOutput, PipelineError> {
    let _span = debug_span!("pipeline", build_dir = %config.build_dir.display()).entered();
    validate_options(&config.flame_graph)?;

    let traces = find_trace_files(&config.build_dir);
    info!(count = traces.len(), "traces.found");
    let commands = load_compile_commands(config)?;
    let inputs = load_trace_inputs(&traces)?;
    analyze(config, inputs, commands)
}

/// Analyze already loaded trace files.
pub fn analyze(
    config: &PipelineConfig,
    inputs: Vec<TraceInput>,
    commands: Vec<CompileCommand>,
) -> Result<PipelineOutput, PipelineError> {
    validate_options(&config.flame_graph)?;
    let normalizer = build_normalizer(config, &commands);
    let combiner = TraceCombiner::new(normalizer, commands);

    let combined = {
        let _span = debug_span!("combine", files = inputs.len()).entered();
        combiner.combine(inputs)
    };
    info!(
        files = combined.files.len(),
        events = combined.document.len(),
        compile_us = combined.report.total_compile.duration,
        "traces.combined"
    );

    let report = generate_report(&combined.report);

    let stacks = {
        let _span = debug_span!("collapse").entered();
        collapse_files(&combined.files)
    };
    let graph = merge_stacks(&stacks);
    let svg = {
        let _span = debug_span!("render", nodes = graph.nodes.len()).entered();
        render_flame_graph(&graph, &config.flame_graph)?
    };
    info!(stacks = stacks.len(), total_us = graph.total, "flamegraph.rendered");

    Ok(PipelineOutput {
        combined,
        report,
        stacks,
        svg,
    })
}

/// Render a flame graph from a Chrome trace or folded stacks.
pub fn render_input(data: &[u8], options: &FlameGraphOptions) -> Result<String, PipelineError> {
    let stacks = match parse_stack_input(data)? {
        StackInput::Trace(document) => collapse_trace(&document),
        StackInput::Collapsed(stacks) => stacks,
    };
    let graph = merge_stacks(&stacks);
    Ok(render_flame_graph(&graph, options)?)
}

fn build_normalizer(config: &PipelineConfig, commands: &[CompileCommand]) -> PathNormalizer {
    let mut normalizer = PathNormalizer::new(&config.source_dir, &config.build_dir);
    for dir in &config.include_dirs {
        normalizer.add_project_root(dir);
    }
    for dir in &config.system_include_dirs {
        normalizer.add_system_root(dir);
    }
    normalizer.add_compile_commands(commands);
    normalizer.with_default_system_roots()
}

/// Load the compile command database. An explicitly configured database
/// must load; a discovered one is skipped with a warning when it doesn't.
fn load_compile_commands(config: &PipelineConfig) -> Result<Vec<CompileCommand>, PipelineError> {
    if let Some(path) = &config.compile_commands {
        return read_compile_commands(path);
    }
    let Some(path) = find_compile_commands(&config.build_dir) else {
        info!("compile_commands.missing");
        return Ok(Vec::new());
    };
    match read_compile_commands(&path) {
        Ok(commands) => Ok(commands),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring compile command database");
            Ok(Vec::new())
        }
    }
}

fn read_compile_commands(path: &Path) -> Result<Vec<CompileCommand>, PipelineError> {
    let data = fs::read(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let commands = parse_compile_commands(&data).map_err(ParseError::from)?;
    info!(path = %path.display(), count = commands.len(), "compile_commands.loaded");
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_deserializes_with_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"build_dir":"out","include_dirs":["inc"],"flame_graph":{"title":"T"}}"#,
        )
        .unwrap();
        assert_eq!(config.build_dir, PathBuf::from("out"));
        assert_eq!(config.source_dir, PathBuf::from("."));
        assert_eq!(config.include_dirs, vec![PathBuf::from("inc")]);
        assert_eq!(config.flame_graph.title, "T");
        assert_eq!(config.flame_graph.frame_height, 16.0);
    }

    #[test]
    fn render_input_accepts_folded_stacks() {
        let svg = render_input(b"main;parse 30\nmain 10\n", &FlameGraphOptions::default()).unwrap();
        assert!(svg.contains("<title>parse (30 µs, 75.00%)</title>"));
    }

    #[test]
    fn render_input_accepts_named_threads() {
        let trace = br#"[{"name":"main","ph":"X","ts":0,"dur":40,"pid":"Browser","tid":-1}]"#;
        let svg = render_input(trace, &FlameGraphOptions::default()).unwrap();
        assert!(svg.contains("<title>main (40 µs, 100.00%)</title>"));
    }

    #[test]
    fn render_input_rejects_unknown_json() {
        let err = render_input(br#"{"nodes":[]}"#, &FlameGraphOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(ParseError::UnknownFormat)));
    }

    #[test]
    fn explicit_database_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::new(dir.path(), dir.path());
        config.compile_commands = Some(dir.path().join("missing.json"));
        assert!(matches!(run(&config), Err(PipelineError::Io { .. })));
    }
}
