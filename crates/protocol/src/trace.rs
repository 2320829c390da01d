//! Chrome Trace Event Format, as written by `clang -ftime-trace`.
//!
//! Only the fields the pipeline reads are typed. `args` and every other
//! key (`id`, `bp`, `s`, `cname`, ...) are kept as raw JSON so that a
//! re-serialized event stays loadable in any trace viewer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event phase (`ph`).
///
/// Phases the pipeline does not interpret are preserved verbatim in
/// [`Phase::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    /// `B`: opens a region closed by the next matching `E`.
    Begin,
    /// `E`
    End,
    /// `X`: a complete interval `[ts, ts + dur)`.
    Complete,
    /// `M`: process/thread names and similar.
    Metadata,
    Other(String),
}

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Phase::Begin => "B",
            Phase::End => "E",
            Phase::Complete => "X",
            Phase::Metadata => "M",
            Phase::Other(s) => s,
        }
    }
}

impl From<String> for Phase {
    fn from(s: String) -> Self {
        match s.as_str() {
            "B" => Phase::Begin,
            "E" => Phase::End,
            "X" => Phase::Complete,
            "M" => Phase::Metadata,
            _ => Phase::Other(s),
        }
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// Process or thread id. Most writers use integers, some use names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextId {
    Number(i64),
    Name(String),
}

impl Default for ContextId {
    fn default() -> Self {
        ContextId::Number(0)
    }
}

impl From<i64> for ContextId {
    fn from(id: i64) -> Self {
        ContextId::Number(id)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextId::Number(id) => write!(f, "{id}"),
            ContextId::Name(name) => f.write_str(name),
        }
    }
}

/// One trace event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cat: String,
    pub ph: Phase,
    /// Start timestamp in µs.
    #[serde(default)]
    pub ts: f64,
    /// Duration in µs, present on complete events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur: Option<f64>,
    #[serde(default)]
    pub pid: ContextId,
    #[serde(default)]
    pub tid: ContextId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
    /// Keys not listed above, written back unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TraceEvent {
    /// A complete (`X`) event without arguments.
    pub fn complete(name: impl Into<String>, ts: f64, dur: f64) -> Self {
        Self {
            name: name.into(),
            cat: String::new(),
            ph: Phase::Complete,
            ts,
            dur: Some(dur),
            pid: ContextId::default(),
            tid: ContextId::default(),
            args: None,
            extra: Map::new(),
        }
    }

    /// Builder-style setter for `args.detail`.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.set_detail(detail);
        self
    }

    /// `args.detail`, when it is a string.
    pub fn detail(&self) -> Option<&str> {
        self.args
            .as_ref()
            .and_then(|args| args.get("detail"))
            .and_then(Value::as_str)
    }

    pub fn set_detail(&mut self, detail: impl Into<String>) {
        self.args
            .get_or_insert_with(Map::new)
            .insert("detail".to_string(), Value::String(detail.into()));
    }

    /// Duration in µs, treating a missing or negative `dur` as zero.
    pub fn duration(&self) -> f64 {
        self.dur.unwrap_or(0.0).max(0.0)
    }

    pub fn end(&self) -> f64 {
        self.ts + self.duration()
    }
}

/// Object form of a trace file: `{"traceEvents": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceDocument {
    #[serde(rename = "traceEvents", default)]
    pub trace_events: Vec<TraceEvent>,
}

impl TraceDocument {
    pub fn new(trace_events: Vec<TraceEvent>) -> Self {
        Self { trace_events }
    }

    pub fn len(&self) -> usize {
        self.trace_events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace_events.is_empty()
    }
}
