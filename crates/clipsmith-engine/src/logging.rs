//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for job processing with
//! contextual information (job id, operation type).

use tracing::{error, info, warn};

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    pub fn new(job_id: &str, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of a job operation.
    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log a progress update during job execution.
    pub fn log_progress(&self, percent: u8, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            percent,
            "Job progress: {}", message
        );
    }

    /// Log a warning during job execution.
    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    /// Log successful completion.
    pub fn log_complete(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job complete: {}", message
        );
    }

    /// Log a failure.
    pub fn log_failure(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job failed: {}", message
        );
    }
}
