//! Export-time clip specifications.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::caption_style::CaptionStyleOverride;

/// Minimum effective clip duration accepted for export.
///
/// Anything shorter is rejected before graph construction rather than
/// producing a degenerate ffmpeg invocation.
pub const MIN_CLIP_DURATION_SECS: f64 = 1.0;

/// A clip selected for export.
///
/// `start_time`/`end_time` are the detection boundaries and are never
/// mutated; user trimming is expressed through the offset fields, so the
/// original detection window stays recoverable.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipExport {
    pub id: String,

    /// Detection start in source seconds
    pub start_time: f64,

    /// Detection end in source seconds
    pub end_time: f64,

    /// Seconds added to the start boundary (may be negative to extend)
    #[serde(default)]
    pub trim_start_offset: f64,

    /// Seconds added to the end boundary (may be negative to shorten)
    #[serde(default)]
    pub trim_end_offset: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Per-clip caption style override, applied field-by-field on top of
    /// the export's preset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_style: Option<CaptionStyleOverride>,
}

/// Validation errors for export clips.
#[derive(Debug, Error, PartialEq)]
pub enum ClipValidationError {
    #[error("clip {id}: effective duration {duration:.3}s is below the {min:.1}s minimum")]
    TooShort { id: String, duration: f64, min: f64 },

    #[error("clip {id}: effective start {start:.3} is not before effective end {end:.3}")]
    InvertedWindow { id: String, start: f64, end: f64 },
}

impl ClipExport {
    /// Effective start after trimming, clamped to the source origin.
    pub fn effective_start(&self) -> f64 {
        (self.start_time + self.trim_start_offset).max(0.0)
    }

    /// Effective end after trimming.
    pub fn effective_end(&self) -> f64 {
        self.end_time + self.trim_end_offset
    }

    /// Effective duration after trimming.
    pub fn effective_duration(&self) -> f64 {
        self.effective_end() - self.effective_start()
    }

    /// Reject degenerate windows before any graph is built.
    pub fn validate(&self) -> Result<(), ClipValidationError> {
        let start = self.effective_start();
        let end = self.effective_end();
        if end <= start {
            return Err(ClipValidationError::InvertedWindow {
                id: self.id.clone(),
                start,
                end,
            });
        }
        let duration = end - start;
        if duration < MIN_CLIP_DURATION_SECS {
            return Err(ClipValidationError::TooShort {
                id: self.id.clone(),
                duration,
                min: MIN_CLIP_DURATION_SECS,
            });
        }
        Ok(())
    }

    /// Whether any descriptive field warrants a metadata sidecar.
    pub fn has_metadata(&self) -> bool {
        self.title.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(start: f64, end: f64, trim_start: f64, trim_end: f64) -> ClipExport {
        ClipExport {
            id: "c1".to_string(),
            start_time: start,
            end_time: end,
            trim_start_offset: trim_start,
            trim_end_offset: trim_end,
            title: None,
            caption_style: None,
        }
    }

    #[test]
    fn test_effective_window() {
        let c = clip(10.0, 20.0, 1.5, -0.5);
        assert!((c.effective_start() - 11.5).abs() < 1e-9);
        assert!((c.effective_end() - 19.5).abs() < 1e-9);
        assert!((c.effective_duration() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_start_clamped() {
        let c = clip(0.5, 10.0, -2.0, 0.0);
        assert_eq!(c.effective_start(), 0.0);
    }

    #[test]
    fn test_validate_rejects_short_clip() {
        let c = clip(10.0, 11.5, 0.0, -1.0);
        assert!(matches!(
            c.validate(),
            Err(ClipValidationError::TooShort { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let c = clip(10.0, 12.0, 3.0, 0.0);
        assert!(matches!(
            c.validate(),
            Err(ClipValidationError::InvertedWindow { .. })
        ));
    }

    #[test]
    fn test_trimming_preserves_detection_bounds() {
        let c = clip(10.0, 20.0, 2.0, -3.0);
        assert_eq!(c.start_time, 10.0);
        assert_eq!(c.end_time, 20.0);
    }
}
