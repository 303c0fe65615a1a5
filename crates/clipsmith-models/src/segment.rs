//! Time ranges in source-file seconds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A `{start, end}` span in source-file seconds.
///
/// Used both for "keep" ranges (clips) and "remove" ranges (dead space).
/// Invariant: `end > start`. Construct through [`TimeRange::new`] to enforce
/// it; ranges arriving over the wire are re-validated at the point of use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

/// Validation errors for time ranges.
#[derive(Debug, Error, PartialEq)]
pub enum TimeRangeError {
    #[error("range end {end:.3} must be greater than start {start:.3}")]
    EmptyOrInverted { start: f64, end: f64 },

    #[error("range start {0:.3} must not be negative")]
    NegativeStart(f64),
}

impl TimeRange {
    /// Create a validated range.
    pub fn new(start: f64, end: f64) -> Result<Self, TimeRangeError> {
        if start < 0.0 {
            return Err(TimeRangeError::NegativeStart(start));
        }
        if end <= start {
            return Err(TimeRangeError::EmptyOrInverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether two ranges share any time.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Re-validate a deserialized range.
    pub fn validate(&self) -> Result<(), TimeRangeError> {
        Self::new(self.start, self.end).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_inverted() {
        assert!(TimeRange::new(5.0, 5.0).is_err());
        assert!(TimeRange::new(5.0, 4.0).is_err());
        assert!(TimeRange::new(-1.0, 4.0).is_err());
        assert!(TimeRange::new(0.0, 0.1).is_ok());
    }

    #[test]
    fn test_duration() {
        let r = TimeRange::new(1.5, 4.0).unwrap();
        assert!((r.duration() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_overlaps() {
        let a = TimeRange::new(0.0, 2.0).unwrap();
        let b = TimeRange::new(1.5, 3.0).unwrap();
        let c = TimeRange::new(2.0, 3.0).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // touching endpoints do not overlap
    }
}
