pub mod chrome;
pub mod collapsed;
pub mod compile_commands;

use thiserror::Error;
use timetrace_protocol::TraceDocument;

use crate::model::CollapsedStacks;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("time trace: {0}")]
    Chrome(#[from] chrome::ChromeParseError),
    #[error("compile commands: {0}")]
    CompileCommands(#[from] compile_commands::CompileCommandsParseError),
    #[error("collapsed: {0}")]
    Collapsed(#[from] collapsed::CollapsedParseError),
    #[error("unable to detect format")]
    UnknownFormat,
}

/// Input accepted by the stand-alone flame graph renderer.
#[derive(Debug)]
pub enum StackInput {
    Trace(TraceDocument),
    Collapsed(CollapsedStacks),
}

/// Detect whether `data` is a Chrome trace (object or array form) or
/// folded stacks, and parse it.
pub fn parse_stack_input(data: &[u8]) -> Result<StackInput, ParseError> {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        let is_trace = value
            .as_object()
            .is_some_and(|obj| obj.contains_key("traceEvents"))
            || value
                .as_array()
                .is_some_and(|arr| arr.iter().all(|v| v.get("ph").is_some()));
        if is_trace {
            return Ok(StackInput::Trace(chrome::parse_time_trace(data)?));
        }
        return Err(ParseError::UnknownFormat);
    }

    Ok(StackInput::Collapsed(collapsed::parse_collapsed(data)?))
}
