pub mod collapsed;
pub mod count_duration;
pub mod report_data;
pub mod timestamp_ranges;

pub use collapsed::CollapsedStacks;
pub use count_duration::CountDuration;
pub use report_data::{ReportData, template_set};
pub use timestamp_ranges::{TimestampRange, TimestampRanges};
