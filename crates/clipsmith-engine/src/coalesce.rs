//! Progress coalescing.
//!
//! Raw progress lines can arrive far more often than is useful downstream.
//! An emission passes when the message changed, the percent moved at least
//! a minimum delta, or a minimum interval has elapsed since the last
//! emission — whichever triggers first. Timestamps are passed in explicitly
//! so the policy is testable with synthetic sequences.

use std::time::{Duration, Instant};

/// Default minimum percent movement.
pub const DEFAULT_MIN_DELTA: u8 = 2;

/// Default minimum interval between same-looking emissions.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(250);

/// Suppresses near-duplicate progress emissions.
#[derive(Debug)]
pub struct ProgressCoalescer {
    min_delta: u8,
    min_interval: Duration,
    last: Option<Emission>,
}

#[derive(Debug)]
struct Emission {
    percent: u8,
    message: String,
    at: Instant,
}

impl Default for ProgressCoalescer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELTA, DEFAULT_MIN_INTERVAL)
    }
}

impl ProgressCoalescer {
    pub fn new(min_delta: u8, min_interval: Duration) -> Self {
        Self {
            min_delta,
            min_interval,
            last: None,
        }
    }

    /// Offer a progress sample at the current time.
    pub fn offer(&mut self, percent: u8, message: &str) -> bool {
        self.offer_at(percent, message, Instant::now())
    }

    /// Offer a progress sample with an explicit timestamp. Returns whether
    /// it should be emitted. The first offer always passes.
    pub fn offer_at(&mut self, percent: u8, message: &str, now: Instant) -> bool {
        let emit = match &self.last {
            None => true,
            Some(last) => {
                last.message != message
                    || percent.abs_diff(last.percent) >= self.min_delta
                    || now.duration_since(last.at) >= self.min_interval
            }
        };

        if emit {
            self.last = Some(Emission {
                percent,
                message: message.to_string(),
                at: now,
            });
        }
        emit
    }
}
