pub mod flame_graph;
pub mod report;

pub use flame_graph::{FlameGraph, FlameGraphOptions, FlameNode, FlowMerger, MinWidth, merge_stacks};
pub use report::generate_report;
