/// A half-open `[start, end)` interval in µs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampRange {
    pub start: f64,
    pub end: f64,
}

impl TimestampRange {
    pub fn contains(&self, ts: f64) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// Time ranges already attributed to one cost bucket.
///
/// The compiler nests same-category intervals (a `Source` region inside
/// another `Source` region, an `InstantiateFunction` inside
/// `PerformPendingInstantiations`). Events are visited longest first, so
/// the outermost interval claims its range and every nested one starting
/// inside it is skipped.
///
/// Lookups are a linear scan; one instance lives for a single file and
/// stays small.
#[derive(Debug, Clone, Default)]
pub struct TimestampRanges {
    ranges: Vec<TimestampRange>,
}

impl TimestampRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `[start, end)`. Empty, reversed, negative or non-finite
    /// ranges are rejected and `false` is returned.
    pub fn add_range(&mut self, start: f64, end: f64) -> bool {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || start >= end {
            return false;
        }
        self.ranges.push(TimestampRange { start, end });
        true
    }

    /// Whether `ts` falls inside a recorded range.
    pub fn includes(&self, ts: f64) -> bool {
        self.ranges.iter().any(|r| r.contains(ts))
    }

    /// Claim `[start, start + duration)` unless `start` is already covered.
    ///
    /// Returns `true` when the caller should count the interval.
    pub fn claim(&mut self, start: f64, duration: f64) -> bool {
        if self.includes(start) {
            return false;
        }
        self.add_range(start, start + duration);
        true
    }

    pub fn ranges(&self) -> &[TimestampRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
