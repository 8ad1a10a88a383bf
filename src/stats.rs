//! Aggregate results of a batch corpus test.
use std::fmt;

use crate::timer::format_secs;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchTestReport {
    pub total: usize,
    pub successes: usize,
    pub elapsed_secs: f64,
}

impl BatchTestReport {
    /// Percentage of recovered passwords; zero for an empty corpus.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.successes as f64) / (self.total as f64) * 100.0
    }

    /// Average seconds spent per password; zero for an empty corpus.
    pub fn avg_secs_per_item(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.elapsed_secs / (self.total as f64)
    }
}

impl fmt::Display for BatchTestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} : {:.2}% ({} seconds, {} s / pwd)",
            self.successes,
            self.total,
            self.success_rate(),
            format_secs(self.elapsed_secs),
            format_secs(self.avg_secs_per_item())
        )
    }
}
