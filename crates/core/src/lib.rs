//! Combine clang `-ftime-trace` files, aggregate compile cost and render
//! flame graphs.

pub mod collapse;
pub mod error;
pub mod model;
pub mod normalize;
pub mod palette;
pub mod parsers;
pub mod pipeline;
pub mod svg;
pub mod views;

pub use error::PipelineError;
pub use pipeline::{PipelineConfig, PipelineOutput};
