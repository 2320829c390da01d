use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileCommandsParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One record of a `compile_commands.json` database.
///
/// CMake writes `command`; other generators write `arguments`. Either is
/// accepted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompileCommand {
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    pub file: String,
}

/// Which kind of include flag introduced a search path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `-I`
    Project,
    /// `-isystem`
    System,
}

static ISYSTEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-isystem\s+(\S+)").expect("valid regex")
});
static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-I\s*(\S+)").expect("valid regex")
});

impl CompileCommand {
    /// The full command line as one string.
    pub fn command_line(&self) -> Cow<'_, str> {
        match &self.command {
            Some(command) => Cow::Borrowed(command),
            None => Cow::Owned(self.arguments.join(" ")),
        }
    }

    /// Include search paths named on the command line, `-isystem` first.
    /// Relative paths are resolved against `directory` when known.
    pub fn include_paths(&self) -> Vec<(IncludeKind, PathBuf)> {
        let line = self.command_line();
        let system = ISYSTEM_RE
            .captures_iter(&line)
            .map(|c| (IncludeKind::System, c[1].to_string()));
        let project = INCLUDE_RE
            .captures_iter(&line)
            .map(|c| (IncludeKind::Project, c[1].to_string()));
        system
            .chain(project)
            .map(|(kind, raw)| (kind, self.resolve(&raw)))
            .collect()
    }

    fn resolve(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw.trim_matches('"'));
        match &self.directory {
            Some(dir) if path.is_relative() => Path::new(dir).join(path),
            _ => path.to_path_buf(),
        }
    }
}

pub fn parse_compile_commands(
    data: &[u8],
) -> Result<Vec<CompileCommand>, CompileCommandsParseError> {
    Ok(serde_json::from_slice(data)?)
}
