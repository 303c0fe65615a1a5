//! Heuristic mapping from progress messages to step transitions.
//!
//! The analysis process reports free-text messages, not structured step
//! signals, so step status is inferred from substrings. This is best-effort:
//! a message that names no known phase simply leaves step state alone, and a
//! missed transition is corrected when the terminal result marks all steps
//! done.

use clipsmith_models::{StepName, StepStatus};

/// A step transition implied by one progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepHint {
    pub step: StepName,
    pub status: StepStatus,
}

/// Infer a step transition from a progress message, if any.
pub fn infer_step(message: &str) -> Option<StepHint> {
    let lower = message.to_lowercase();

    // Completion wording checked before activity wording so "transcription
    // complete" does not re-mark the step running.
    if lower.contains("transcrib") {
        let status = if lower.contains("complete") || lower.contains("done") {
            StepStatus::Done
        } else {
            StepStatus::Running
        };
        return Some(StepHint {
            step: StepName::Transcribe,
            status,
        });
    }

    if lower.contains("enrich") || lower.contains("ai analysis") {
        let status = if lower.contains("complete") || lower.contains("done") {
            StepStatus::Done
        } else {
            StepStatus::Running
        };
        return Some(StepHint {
            step: StepName::AiEnrich,
            status,
        });
    }

    if lower.contains("detect") || lower.contains("analyz") || lower.contains("scanning") {
        let status = if lower.contains("complete") || lower.contains("done") {
            StepStatus::Done
        } else {
            StepStatus::Running
        };
        return Some(StepHint {
            step: StepName::Detect,
            status,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcribe_running() {
        let hint = infer_step("Transcribing audio: pass 1").unwrap();
        assert_eq!(hint.step, StepName::Transcribe);
        assert_eq!(hint.status, StepStatus::Running);
    }

    #[test]
    fn test_transcribe_done() {
        let hint = infer_step("transcription complete").unwrap();
        assert_eq!(hint.step, StepName::Transcribe);
        assert_eq!(hint.status, StepStatus::Done);
    }

    #[test]
    fn test_detect_wording_variants() {
        for msg in ["detecting highlights", "analyzing audio energy", "scanning frames"] {
            let hint = infer_step(msg).unwrap();
            assert_eq!(hint.step, StepName::Detect, "{msg}");
            assert_eq!(hint.status, StepStatus::Running);
        }
    }

    #[test]
    fn test_enrich() {
        let hint = infer_step("AI analysis of candidate clips").unwrap();
        assert_eq!(hint.step, StepName::AiEnrich);
    }

    #[test]
    fn test_unrecognized_is_none() {
        assert!(infer_step("warming up").is_none());
        assert!(infer_step("").is_none());
    }
}
