//! Analysis job records and per-step lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::hash::ContentHash;

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting behind the active job
    #[default]
    Queued,
    /// Analysis process is running
    Running,
    /// Terminal result received
    Done,
    /// Unrecoverable step failure or abnormal process exit
    Failed,
    /// Explicitly canceled by the caller
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named phases of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Detect,
    Transcribe,
    AiEnrich,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Detect => "detect",
            StepName::Transcribe => "transcribe",
            StepName::AiEnrich => "ai_enrich",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Done,
    Skipped,
    Failed,
}

/// One named phase of a job with its own status.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Step {
    pub name: StepName,

    pub status: StepStatus,

    /// Human-readable note from the last progress line that touched this step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl Step {
    pub fn pending(name: StepName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            message: None,
            updated_at: Utc::now(),
        }
    }
}

/// Cache file paths produced by a completed analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct JobOutputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detections: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_clips: Option<PathBuf>,
}

/// One analysis run over one source file.
///
/// A job record, once created, is mutated in place and persisted after every
/// mutation by the store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Caller-assigned identifier, typically a project identifier
    pub id: String,

    /// Source recording being analyzed
    pub input_path: PathBuf,

    /// Content hash of the source file, filled in once computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_hash: Option<ContentHash>,

    pub status: JobStatus,

    /// Ordered step records; matched by name, not index
    pub steps: Vec<Step>,

    /// Overall progress (0-100)
    #[serde(default)]
    pub progress: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub outputs: JobOutputs,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job record with its step list seeded.
    ///
    /// `ai_enrich` is present only when enrichment was requested, so a job
    /// that never asked for it does not report a permanently-pending step.
    pub fn new(id: impl Into<String>, input_path: impl Into<PathBuf>, with_enrichment: bool) -> Self {
        let now = Utc::now();
        let mut steps = vec![Step::pending(StepName::Detect), Step::pending(StepName::Transcribe)];
        if with_enrichment {
            steps.push(Step::pending(StepName::AiEnrich));
        }

        Self {
            id: id.into(),
            input_path: input_path.into(),
            input_hash: None,
            status: JobStatus::Queued,
            steps,
            progress: 0,
            cost_estimate: None,
            error: None,
            outputs: JobOutputs::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Find a step by name.
    pub fn step(&self, name: StepName) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Find a step by name, mutably.
    pub fn step_mut(&mut self, name: StepName) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.name == name)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
