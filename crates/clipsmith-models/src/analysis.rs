//! Terminal analysis result payload.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::segment::TimeRange;
use crate::transcript::Transcript;

/// One moment detected by the analysis process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectedClip {
    pub id: String,
    pub start_time: f64,
    pub end_time: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Detector-assigned score; semantics are opaque to this system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Who spoke when, as reported by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpeakerSegment {
    pub speaker: String,
    pub start: f64,
    pub end: f64,
}

/// The JSON payload of a terminal `RESULT:` line.
///
/// Every field defaults so a detector that omits a section still parses;
/// a payload that fails to parse at all is treated as a job failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisOutcome {
    #[serde(default)]
    pub clips: Vec<DetectedClip>,

    #[serde(default)]
    pub dead_space: Vec<TimeRange>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Transcript>,

    #[serde(default)]
    pub speakers: Vec<SpeakerSegment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_payload_parses() {
        let outcome: AnalysisOutcome = serde_json::from_str(r#"{"clips": []}"#).unwrap();
        assert!(outcome.clips.is_empty());
        assert!(outcome.transcript.is_none());
    }

    #[test]
    fn test_full_payload_parses() {
        let json = r#"{
            "clips": [{"id": "m1", "start_time": 12.0, "end_time": 31.5, "title": "Big moment", "score": 0.92}],
            "dead_space": [{"start": 0.0, "end": 4.2}],
            "transcript": {"words": [{"word": "hey", "start": 4.2, "end": 4.5}]},
            "speakers": [{"speaker": "A", "start": 4.2, "end": 31.5}]
        }"#;
        let outcome: AnalysisOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome.clips.len(), 1);
        assert_eq!(outcome.dead_space.len(), 1);
        assert_eq!(outcome.speakers.len(), 1);
        assert!(outcome.transcript.unwrap().words.len() == 1);
    }
}
