//! Compilation transition specifications.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How consecutive clips in a compilation are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Hard cut
    #[default]
    None,
    /// Adjacent clips overlap and blend
    Crossfade,
    /// Each clip fades to/from black independently
    DipToBlack,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::None => "none",
            TransitionKind::Crossfade => "crossfade",
            TransitionKind::DipToBlack => "dip_to_black",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transition applied between consecutive clips in a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransitionSpec {
    #[serde(default)]
    pub kind: TransitionKind,

    /// Transition duration in seconds
    #[serde(default)]
    pub duration: f64,
}

/// Validation errors for transitions against a clip sequence.
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("transition duration {0:.3} must not be negative")]
    NegativeDuration(f64),

    #[error(
        "crossfade duration {duration:.3}s is not shorter than clip {index} ({clip_duration:.3}s); \
         the overlap offset would go negative"
    )]
    CrossfadeTooLong {
        duration: f64,
        index: usize,
        clip_duration: f64,
    },

    #[error(
        "dip-to-black half duration {half:.3}s exceeds clip {index} ({clip_duration:.3}s)"
    )]
    DipTooLong {
        half: f64,
        index: usize,
        clip_duration: f64,
    },
}

impl TransitionSpec {
    pub const fn new(kind: TransitionKind, duration: f64) -> Self {
        Self { kind, duration }
    }

    pub const fn cut() -> Self {
        Self::new(TransitionKind::None, 0.0)
    }

    /// Validate this transition against the ordered clip durations it will
    /// be applied between.
    ///
    /// Crossfade requires the duration to be strictly less than every
    /// adjacent clip duration, otherwise the running-timeline offset goes
    /// negative. Rejected here rather than clamped.
    pub fn validate_for(&self, clip_durations: &[f64]) -> Result<(), TransitionError> {
        if self.duration < 0.0 {
            return Err(TransitionError::NegativeDuration(self.duration));
        }
        if clip_durations.len() < 2 {
            return Ok(());
        }
        match self.kind {
            TransitionKind::None => Ok(()),
            TransitionKind::Crossfade => {
                for (index, &clip_duration) in clip_durations.iter().enumerate() {
                    if self.duration >= clip_duration {
                        return Err(TransitionError::CrossfadeTooLong {
                            duration: self.duration,
                            index,
                            clip_duration,
                        });
                    }
                }
                Ok(())
            }
            TransitionKind::DipToBlack => {
                let half = self.duration / 2.0;
                for (index, &clip_duration) in clip_durations.iter().enumerate() {
                    if half > clip_duration {
                        return Err(TransitionError::DipTooLong {
                            half,
                            index,
                            clip_duration,
                        });
                    }
                }
                Ok(())
            }
        }
    }
}
