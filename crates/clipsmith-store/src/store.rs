//! Single-file JSON job store.
//!
//! The whole job table is serialized to one JSON array and rewritten on
//! every mutation, so there is no partial-write window to recover from.
//! The design assumes one orchestrator per store file; the interior mutex
//! serializes writers within this process only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clipsmith_models::{ContentHash, Job, JobOutputs, JobStatus, StepName, StepStatus};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Partial update to a job record. Unset fields keep their value.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub input_hash: Option<ContentHash>,
    pub cost_estimate: Option<f64>,
    pub error: Option<String>,
    pub outputs: Option<JobOutputs>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Partial update to one step of a job.
#[derive(Debug, Clone, Default)]
pub struct StepPatch {
    pub status: Option<StepStatus>,
    pub message: Option<String>,
}

impl StepPatch {
    pub fn status(status: StepStatus) -> Self {
        Self {
            status: Some(status),
            message: None,
        }
    }
}

struct StoreState {
    /// Keyed by job id; ordered so the file is stable across rewrites
    jobs: BTreeMap<String, Job>,
}

/// Durable record of analysis jobs, persisted after every mutation.
pub struct JobStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JobStore {
    /// Open a store, loading existing records from `path`.
    ///
    /// A malformed file is treated as empty rather than refusing to start;
    /// the next mutation rewrites a valid file.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let jobs = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<Job>>(&bytes) {
                Ok(list) => list.into_iter().map(|j| (j.id.clone(), j)).collect(),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Job store file is malformed, starting with an empty store"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), jobs = jobs.len(), "Opened job store");
        Ok(Self {
            path,
            state: Mutex::new(StoreState { jobs }),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a new job record and persist.
    pub async fn create(&self, job: Job) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.jobs.contains_key(&job.id) {
            return Err(StoreError::DuplicateJob(job.id));
        }
        state.jobs.insert(job.id.clone(), job);
        self.persist(&state).await
    }

    /// Apply a patch to a job, bump its `updated_at`, and persist.
    pub async fn update(&self, id: &str, patch: JobPatch) -> StoreResult<Job> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;

        if let Some(status) = patch.status {
            job.status = status;
        }
        if let Some(progress) = patch.progress {
            job.progress = progress.min(100);
        }
        if let Some(hash) = patch.input_hash {
            job.input_hash = Some(hash);
        }
        if let Some(cost) = patch.cost_estimate {
            job.cost_estimate = Some(cost);
        }
        if let Some(error) = patch.error {
            job.error = Some(error);
        }
        if let Some(outputs) = patch.outputs {
            job.outputs = outputs;
        }
        job.updated_at = Utc::now();

        let snapshot = job.clone();
        self.persist(&state).await?;
        Ok(snapshot)
    }

    /// Apply a patch to one step of a job, matched by name.
    ///
    /// A step name the job does not carry is a no-op: the step list depends
    /// on what the job requested, and the heuristics that feed this call may
    /// name a step the job never seeded.
    pub async fn update_step(
        &self,
        id: &str,
        name: StepName,
        patch: StepPatch,
    ) -> StoreResult<Job> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;

        if let Some(step) = job.step_mut(name) {
            if let Some(status) = patch.status {
                step.status = status;
            }
            if let Some(message) = patch.message {
                step.message = Some(message);
            }
            step.updated_at = Utc::now();
            job.updated_at = step.updated_at;
            let snapshot = job.clone();
            self.persist(&state).await?;
            Ok(snapshot)
        } else {
            debug!(job_id = id, step = %name, "Job does not carry this step, ignoring update");
            Ok(job.clone())
        }
    }

    /// Fetch one job by id.
    pub async fn get(&self, id: &str) -> Option<Job> {
        self.state.lock().await.jobs.get(id).cloned()
    }

    /// List all jobs in id order.
    pub async fn list(&self) -> Vec<Job> {
        self.state.lock().await.jobs.values().cloned().collect()
    }

    /// Rewrite the whole table via a temp file and rename.
    async fn persist(&self, state: &StoreState) -> StoreResult<()> {
        let jobs: Vec<&Job> = state.jobs.values().collect();
        let bytes = serde_json::to_vec_pretty(&jobs)?;

        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Temp file lands in the same directory so the rename stays on one
        // filesystem.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
