use std::path::PathBuf;

use thiserror::Error;

use crate::parsers::ParseError;
use crate::svg::RenderError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("none of the {failed} trace files could be loaded")]
    NoUsableInput { failed: usize },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
