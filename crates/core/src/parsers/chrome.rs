use serde::Deserialize;
use thiserror::Error;
use timetrace_protocol::{TraceDocument, TraceEvent};

#[derive(Debug, Error)]
pub enum ChromeParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level Chrome trace JSON, in object or array form.
///
/// clang writes the object form, with `beginningOfTime` and other keys
/// next to `traceEvents`; those are ignored.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TraceFile {
    Object {
        #[serde(rename = "traceEvents")]
        trace_events: Vec<TraceEvent>,
    },
    Array(Vec<TraceEvent>),
}

/// Parse one `-ftime-trace` document.
pub fn parse_time_trace(data: &[u8]) -> Result<TraceDocument, ChromeParseError> {
    let trace_file: TraceFile = serde_json::from_slice(data)?;
    let trace_events = match trace_file {
        TraceFile::Object { trace_events } => trace_events,
        TraceFile::Array(events) => events,
    };
    Ok(TraceDocument::new(trace_events))
}
