use thiserror::Error;

use crate::model::CollapsedStacks;

#[derive(Debug, Error)]
pub enum CollapsedParseError {
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("line {line}: invalid value {value:?}")]
    InvalidValue { line: usize, value: String },
    #[error("no valid stack lines found")]
    Empty,
}

/// Parse Brendan Gregg's collapsed/folded stack format.
///
/// Each line has the format `frame;frame;... value`: frames are separated
/// by `;` and the value is the last whitespace-separated token. Repeated
/// paths are summed.
pub fn parse_collapsed(data: &[u8]) -> Result<CollapsedStacks, CollapsedParseError> {
    let text = std::str::from_utf8(data)?;
    let mut stacks = CollapsedStacks::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(pos) = line.rfind(char::is_whitespace) else {
            continue;
        };
        let value_str = &line[pos + 1..];
        let value: f64 = value_str
            .parse()
            .map_err(|_| CollapsedParseError::InvalidValue {
                line: index + 1,
                value: value_str.to_string(),
            })?;

        let stack_str = line[..pos].trim();
        if stack_str.is_empty() {
            continue;
        }
        stacks.add(stack_str.split(';'), value);
    }

    if stacks.is_empty() {
        return Err(CollapsedParseError::Empty);
    }
    Ok(stacks)
}
