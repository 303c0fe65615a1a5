//! Transcript payloads produced by the analysis process.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A word with its timing in source seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// An already-segmented span of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Full transcript: segment-level spans when the detector provides them,
/// word-level timing otherwise (captions are reconstructed from words).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,

    #[serde(default)]
    pub words: Vec<TranscriptWord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Transcript {
    pub fn has_segments(&self) -> bool {
        !self.segments.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.words.is_empty()
    }
}
