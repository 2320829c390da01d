use std::ops::AddAssign;

use serde::Serialize;

/// Number of occurrences and their summed duration (µs).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CountDuration {
    pub count: u64,
    pub duration: f64,
}

impl CountDuration {
    pub fn new(count: u64, duration: f64) -> Self {
        Self { count, duration }
    }

    pub fn update(&mut self, count: u64, duration: f64) {
        self.count += count;
        self.duration += duration;
    }

    /// Mean duration per occurrence, zero when nothing was counted.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.duration / self.count as f64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl AddAssign for CountDuration {
    fn add_assign(&mut self, rhs: Self) {
        self.update(rhs.count, rhs.duration);
    }
}
