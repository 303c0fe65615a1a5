//! Shared data models for the Clipsmith pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis jobs and their per-step lifecycle
//! - Time ranges, detected clips and export clip specs
//! - Compilation transitions
//! - Caption styling and transcripts
//! - Content hashes used as cache/identity keys

pub mod analysis;
pub mod caption_style;
pub mod clip;
pub mod hash;
pub mod job;
pub mod segment;
pub mod transcript;
pub mod transition;

// Re-export common types
pub use analysis::{AnalysisOutcome, DetectedClip, SpeakerSegment};
pub use caption_style::{CaptionAlignment, CaptionPreset, CaptionStyle, CaptionStyleOverride};
pub use clip::{ClipExport, ClipValidationError, MIN_CLIP_DURATION_SECS};
pub use hash::ContentHash;
pub use job::{Job, JobOutputs, JobStatus, Step, StepName, StepStatus};
pub use segment::{TimeRange, TimeRangeError};
pub use transcript::{Transcript, TranscriptSegment, TranscriptWord};
pub use transition::{TransitionError, TransitionKind, TransitionSpec};
