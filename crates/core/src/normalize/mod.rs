//! Merging per translation unit time traces into one timeline.

pub mod discover;
pub mod paths;

use std::fs;
use std::path::{Path, PathBuf};

use timetrace_protocol::{ContextId, Phase, TraceDocument, TraceEvent};
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::model::{ReportData, TimestampRanges};
use crate::parsers::chrome::parse_time_trace;
use crate::parsers::compile_commands::CompileCommand;

pub use discover::{find_compile_commands, find_trace_files};
pub use paths::PathNormalizer;

/// Events whose detail is a file path.
const PATH_EVENTS: &[&str] = &[
    "Source",
    "Frontend",
    "OptModule",
    "ParseDeclarationOrFunctionDefinition",
    "ExecuteCompiler",
];

/// A parsed trace file together with the path it was read from.
#[derive(Debug, Clone)]
pub struct TraceInput {
    pub path: PathBuf,
    pub document: TraceDocument,
}

/// The normalized events of one translation unit, in that unit's own
/// timestamps, pids and tids.
#[derive(Debug, Clone)]
pub struct FileTrace {
    pub display_name: String,
    pub events: Vec<TraceEvent>,
    /// Duration of the unit's `ExecuteCompiler` event, zero when absent.
    pub duration: f64,
}

/// Result of [`TraceCombiner::combine`].
#[derive(Debug, Clone, Default)]
pub struct CombinedTrace {
    /// Every file's events laid out back to back on pid 0 / tid 0, sorted by
    /// timestamp.
    pub document: TraceDocument,
    pub report: ReportData,
    pub files: Vec<FileTrace>,
}

/// Read and parse every trace file.
///
/// Unreadable or malformed files are logged and skipped. Fails only when
/// files were given and none of them could be loaded.
pub fn load_trace_inputs(paths: &[PathBuf]) -> Result<Vec<TraceInput>, PipelineError> {
    let mut inputs = Vec::with_capacity(paths.len());
    let mut failed = 0;

    for path in paths {
        match load_trace(path) {
            Ok(document) => inputs.push(TraceInput {
                path: path.clone(),
                document,
            }),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping trace file");
                failed += 1;
            }
        }
    }

    if !paths.is_empty() && inputs.is_empty() {
        return Err(PipelineError::NoUsableInput { failed });
    }
    Ok(inputs)
}

fn load_trace(path: &Path) -> Result<TraceDocument, PipelineError> {
    let data = fs::read(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document = parse_time_trace(&data).map_err(crate::parsers::ParseError::from)?;
    Ok(document)
}

/// Normalizes trace files one at a time and lays them out sequentially.
#[derive(Debug, Clone)]
pub struct TraceCombiner {
    normalizer: PathNormalizer,
    commands: Vec<CompileCommand>,
}

impl TraceCombiner {
    pub fn new(normalizer: PathNormalizer, commands: Vec<CompileCommand>) -> Self {
        Self {
            normalizer,
            commands,
        }
    }

    pub fn combine(&self, inputs: Vec<TraceInput>) -> CombinedTrace {
        let mut report = ReportData::new();
        let mut files = Vec::with_capacity(inputs.len());
        let mut combined = Vec::new();
        let mut offset = 0.0;

        for input in inputs {
            let (file, partial) = self.normalize_file(input);
            report.merge(partial);

            combined.extend(file.events.iter().map(|event| {
                let mut event = event.clone();
                event.ts += offset;
                event.pid = ContextId::default();
                event.tid = ContextId::default();
                event
            }));
            // One unit of gap keeps consecutive files from touching.
            offset += file.duration + 1.0;
            files.push(file);
        }

        combined.sort_by(|a, b| a.ts.total_cmp(&b.ts));
        debug!(
            files = files.len(),
            events = combined.len(),
            span = offset,
            "combined traces"
        );

        CombinedTrace {
            document: TraceDocument::new(combined),
            report,
            files,
        }
    }

    fn normalize_file(&self, input: TraceInput) -> (FileTrace, ReportData) {
        let display_name = self
            .normalizer
            .display_filename(&input.path, &self.commands);
        let mut events = input.document.trace_events;
        events.sort_by(|a, b| b.duration().total_cmp(&a.duration()));

        let mut accounting = Accounting::default();
        let mut report = ReportData::new();
        let mut duration = 0.0;
        let mut normalized = Vec::with_capacity(events.len());

        for mut event in events {
            if event.ph == Phase::Metadata || event.name.starts_with("Total") {
                continue;
            }

            if PATH_EVENTS.contains(&event.name.as_str())
                && let Some(detail) = event.detail()
            {
                let detail = self.normalizer.normalize_detail(detail);
                event.set_detail(detail);
            }

            accounting.route(&event, &display_name, &mut report);

            match event.name.as_str() {
                "ExecuteCompiler" => {
                    duration = event.duration();
                    event.set_detail(display_name.as_str());
                }
                "Source" => {
                    event.name = event
                        .detail()
                        .unwrap_or(display_name.as_str())
                        .to_string();
                    event.cat = "Source".to_string();
                }
                _ => {}
            }
            normalized.push(event);
        }

        debug!(file = %display_name, duration, events = normalized.len(), "normalized trace");
        let file = FileTrace {
            display_name,
            events: normalized,
            duration,
        };
        (file, report)
    }
}

/// Regions already counted towards the parsing and instantiation totals of
/// one file.
#[derive(Debug, Default)]
struct Accounting {
    parsing: TimestampRanges,
    instantiation: TimestampRanges,
}

impl Accounting {
    fn route(&mut self, event: &TraceEvent, display_name: &str, report: &mut ReportData) {
        let name = event.name.as_str();
        let dur = event.duration();
        let detail = event.detail();

        match name {
            "Source" => {
                if self.parsing.claim(event.ts, dur) {
                    report.total_parsing.update(1, dur);
                }
                report.add_file_parse_data(detail.unwrap_or(display_name), 1, dur);
            }
            "ParseDeclarationOrFunctionDefinition" => {}
            "PerformPendingInstantiations" => {
                if self.instantiation.claim(event.ts, dur) {
                    report.total_instantiations.update(1, dur);
                }
            }
            "Frontend" => report.total_frontend.update(1, dur),
            "Backend" => report.total_backend.update(1, dur),
            "Optimizer" => report.total_optimize.update(1, dur),
            "CodeGenPasses" => report.total_codegen.update(1, dur),
            "ExecuteCompiler" => {
                report.total_compile.update(1, dur);
                report.add_file_compile_data(display_name, 1, dur);
            }
            _ if name.starts_with("Parse") => {
                if let Some(symbol) = detail {
                    report.add_symbol_parse_data(symbol, 1, dur);
                }
            }
            _ if name.starts_with("Instantiate") => {
                if let Some(symbol) = detail {
                    if self.instantiation.claim(event.ts, dur) {
                        report.total_instantiations.update(1, dur);
                    }
                    report.add_symbol_instantiate_data(symbol, 1, dur);
                }
            }
            _ => {}
        }
    }
}
