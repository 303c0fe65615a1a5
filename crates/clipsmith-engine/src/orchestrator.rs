//! Detection orchestrator.
//!
//! At most one analysis process runs at a time. Additional submissions queue
//! in arrival order and are started only after the active job reaches a
//! terminal state. The child's stdout is parsed through [`LineBuffer`],
//! progress is coalesced before it touches the store or subscribers, and
//! step status is inferred from message text.

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use clipsmith_models::{
    AnalysisOutcome, Job, JobOutputs, JobStatus, StepName, StepStatus,
};
use clipsmith_store::{JobPatch, JobStore, StepPatch};
use metrics::counter;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::cache::{hash_file, CacheLayout};
use crate::coalesce::ProgressCoalescer;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::logging::JobLogger;
use crate::protocol::{AnalysisEvent, LineBuffer};
use crate::steps::infer_step;

const STDOUT_READ_CHUNK: usize = 64 * 1024;

/// A request to analyze one source file.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Caller-assigned job id, typically a project identifier
    pub job_id: String,
    pub input_path: PathBuf,
}

/// Events published to subscribers as jobs move through the slot.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Job is waiting behind the active one
    Queued { job_id: String },
    /// Job's analysis process started
    Started { job_id: String },
    /// Coalesced progress update
    Progress {
        job_id: String,
        percent: u8,
        message: String,
    },
    /// Terminal success
    Done {
        job_id: String,
        outcome: Box<AnalysisOutcome>,
    },
    /// Terminal failure
    Failed { job_id: String, error: String },
    /// Terminal cancellation
    Canceled { job_id: String },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Queued { job_id }
            | JobEvent::Started { job_id }
            | JobEvent::Progress { job_id, .. }
            | JobEvent::Done { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Canceled { job_id } => job_id,
        }
    }
}

/// Configuration payload passed to the analysis process as its second
/// positional argument.
#[derive(Debug, Serialize)]
struct AnalysisProcessConfig<'a> {
    input_path: &'a str,
    content_hash: &'a str,
    cache_dir: &'a str,
    detections_path: &'a str,
    transcript_path: &'a str,
    ai_clips_path: &'a str,
    enrichment: bool,
}

struct ActiveJob {
    job_id: String,
    cancel_tx: watch::Sender<bool>,
    // Kept alive so the channel stays open before the monitor subscribes
    cancel_rx: watch::Receiver<bool>,
}

impl ActiveJob {
    fn reserve(job_id: String) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            job_id,
            cancel_tx,
            cancel_rx,
        }
    }
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveJob>,
    queue: VecDeque<AnalysisRequest>,
}

/// Single-slot analysis scheduler.
pub struct DetectionOrchestrator {
    config: EngineConfig,
    store: Arc<JobStore>,
    slot: Mutex<Slot>,
    events_tx: mpsc::Sender<JobEvent>,
}

impl DetectionOrchestrator {
    /// Create an orchestrator; returns the receiver for job events.
    pub fn new(
        config: EngineConfig,
        store: Arc<JobStore>,
    ) -> (Arc<Self>, mpsc::Receiver<JobEvent>) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let orchestrator = Arc::new(Self {
            config,
            store,
            slot: Mutex::new(Slot::default()),
            events_tx,
        });
        (orchestrator, events_rx)
    }

    /// Submit a job: start it if the slot is free, otherwise queue it and
    /// emit an immediate queued event.
    pub async fn submit(self: &Arc<Self>, request: AnalysisRequest) -> EngineResult<()> {
        self.store
            .create(Job::new(
                request.job_id.clone(),
                request.input_path.clone(),
                self.config.enrichment,
            ))
            .await?;

        let start_now = {
            let mut slot = self.slot.lock().await;
            if slot.active.is_some() {
                slot.queue.push_back(request.clone());
                false
            } else {
                // Reserve the slot before any await so a concurrent submit
                // queues behind us.
                slot.active = Some(ActiveJob::reserve(request.job_id.clone()));
                true
            }
        };

        if start_now {
            let job_id = request.job_id.clone();
            let result = self.start(request).await;
            if result.is_err() {
                // Spawn failure must still release the slot and chain
                self.finish_and_chain(&job_id).await;
            }
            result
        } else {
            counter!("clipsmith_jobs_queued").increment(1);
            info!(job_id = %request.job_id, "Slot busy, job queued");
            self.emit(JobEvent::Queued {
                job_id: request.job_id,
            })
            .await;
            Ok(())
        }
    }

    /// Cancel a job. A queued job is removed and marked canceled; the active
    /// job's process is terminated. Cancellation is never counted as a
    /// failure.
    pub async fn cancel(self: &Arc<Self>, job_id: &str) -> EngineResult<()> {
        let mut slot = self.slot.lock().await;

        if let Some(pos) = slot.queue.iter().position(|r| r.job_id == job_id) {
            slot.queue.remove(pos);
            drop(slot);

            self.store
                .update(job_id, JobPatch::status(JobStatus::Canceled))
                .await?;
            counter!("clipsmith_jobs_canceled").increment(1);
            info!(job_id, "Canceled queued job");
            self.emit(JobEvent::Canceled {
                job_id: job_id.to_string(),
            })
            .await;
            return Ok(());
        }

        if let Some(active) = &slot.active {
            if active.job_id == job_id {
                // Updates the value even when no task is awaiting it yet;
                // the prepare phase and the monitor both watch this flag.
                active.cancel_tx.send_replace(true);
                info!(job_id, "Cancellation signaled to active job");
                return Ok(());
            }
        }

        Err(EngineError::JobNotFound(job_id.to_string()))
    }

    /// Start the analysis process for a request that holds the slot.
    ///
    /// Boxed because the terminal chain leads back here: the monitor awaits
    /// `finish_and_chain`, which awaits `start` for the next queued job.
    fn start<'a>(
        self: &'a Arc<Self>,
        request: AnalysisRequest,
    ) -> Pin<Box<dyn Future<Output = EngineResult<()>> + Send + 'a>> {
        Box::pin(self.start_inner(request))
    }

    async fn start_inner(self: &Arc<Self>, request: AnalysisRequest) -> EngineResult<()> {
        let job_id = request.job_id.clone();
        let logger = JobLogger::new(&job_id, "analysis");

        // The receiver cloned off the slot has not observed any value yet,
        // so a cancel sent at any point from reservation onward is visible.
        let mut cancel_rx = {
            let slot = self.slot.lock().await;
            match &slot.active {
                Some(active) if active.job_id == job_id => active.cancel_rx.clone(),
                _ => watch::channel(false).1,
            }
        };

        match self.prepare_and_spawn(&request, &mut cancel_rx).await {
            Ok(Some(child)) => {
                logger.log_start(&format!("analyzing {}", request.input_path.display()));
                self.emit(JobEvent::Started {
                    job_id: job_id.clone(),
                })
                .await;

                let orchestrator = Arc::clone(self);
                tokio::spawn(async move {
                    orchestrator.monitor(request, child, cancel_rx, logger).await;
                });
                Ok(())
            }
            Ok(None) => {
                // Canceled before the process existed
                let _ = self
                    .store
                    .update(&job_id, JobPatch::status(JobStatus::Canceled))
                    .await;
                counter!("clipsmith_jobs_canceled").increment(1);
                logger.log_complete("canceled");
                self.emit(JobEvent::Canceled {
                    job_id: job_id.clone(),
                })
                .await;
                self.finish_and_chain(&job_id).await;
                Ok(())
            }
            Err(e) => {
                // Spawn failure is fatal for this job, no retry; the slot
                // must still chain to the next queued job.
                logger.log_failure(&e.to_string());
                let _ = self
                    .store
                    .update(
                        &job_id,
                        JobPatch {
                            status: Some(JobStatus::Failed),
                            error: Some(e.to_string()),
                            ..Default::default()
                        },
                    )
                    .await;
                counter!("clipsmith_jobs_failed").increment(1);
                self.emit(JobEvent::Failed {
                    job_id: job_id.clone(),
                    error: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    /// Hash the input, set up cache directories, spawn the child.
    ///
    /// Returns `Ok(None)` when the job was canceled before the process
    /// spawned. Hashing a long recording is the slow part of this phase,
    /// so cancellation is raced against it.
    async fn prepare_and_spawn(
        self: &Arc<Self>,
        request: &AnalysisRequest,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> EngineResult<Option<Child>> {
        let hash = tokio::select! {
            hash = hash_file(&request.input_path) => hash?,
            // The only value ever sent is true; an error means the slot
            // entry is gone, which also ends this job.
            _ = cancel_rx.changed() => return Ok(None),
        };
        let layout = CacheLayout::new(&self.config.cache_dir, &hash);
        layout.ensure_dirs().await?;

        self.store
            .update(
                &request.job_id,
                JobPatch {
                    status: Some(JobStatus::Running),
                    input_hash: Some(hash.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let input_path = request.input_path.to_string_lossy().to_string();
        let cache_dir = layout.root().to_string_lossy().to_string();
        let detections_path = layout.detections().to_string_lossy().to_string();
        let transcript_path = layout.transcript().to_string_lossy().to_string();
        let ai_clips_path = layout.ai_clips().to_string_lossy().to_string();
        let process_config = AnalysisProcessConfig {
            input_path: &input_path,
            content_hash: hash.as_str(),
            cache_dir: &cache_dir,
            detections_path: &detections_path,
            transcript_path: &transcript_path,
            ai_clips_path: &ai_clips_path,
            enrichment: self.config.enrichment,
        };
        let config_json = serde_json::to_string(&process_config)?;

        if *cancel_rx.borrow() {
            return Ok(None);
        }

        let child = Command::new(&self.config.analysis_program)
            .args(&self.config.analysis_args)
            .arg(&request.input_path)
            .arg(&config_json)
            // Line-buffered parsing relies on the child not buffering stdout
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::SpawnFailed {
                program: self.config.analysis_program.clone(),
                source,
            })?;

        Ok(Some(child))
    }

    /// Drive one child process to a terminal state, then chain the queue.
    async fn monitor(
        self: Arc<Self>,
        request: AnalysisRequest,
        mut child: Child,
        mut cancel_rx: watch::Receiver<bool>,
        logger: JobLogger,
    ) {
        let job_id = request.job_id.clone();
        let hash = self
            .store
            .get(&job_id)
            .await
            .and_then(|j| j.input_hash);

        let mut stdout = child.stdout.take();
        let mut buffer = LineBuffer::new();
        let mut coalescer = ProgressCoalescer::new(
            self.config.progress_min_delta,
            self.config.progress_min_interval,
        );
        let mut result_payload: Option<String> = None;
        let mut canceled = false;
        let mut chunk = vec![0u8; STDOUT_READ_CHUNK];

        loop {
            let read = async {
                match &mut stdout {
                    Some(out) => out.read(&mut chunk).await,
                    None => Ok(0),
                }
            };
            tokio::select! {
                n = read => match n {
                    Ok(0) => break,
                    Ok(n) => {
                        for event in buffer.feed(&chunk[..n]) {
                            self.handle_event(&job_id, event, &mut coalescer, &mut result_payload, &logger)
                                .await;
                        }
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e, "Error reading analysis stdout");
                        break;
                    }
                },
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        info!(job_id = %job_id, "Terminating analysis process");
                        let _ = child.kill().await;
                        canceled = true;
                        break;
                    }
                }
            }
        }

        // The final line may have no trailing newline
        if let Some(event) = buffer.finish() {
            self.handle_event(&job_id, event, &mut coalescer, &mut result_payload, &logger)
                .await;
        }

        let status = child.wait().await.ok();
        let exit_code = status.and_then(|s| s.code());

        if canceled {
            let _ = self
                .store
                .update(&job_id, JobPatch::status(JobStatus::Canceled))
                .await;
            counter!("clipsmith_jobs_canceled").increment(1);
            logger.log_complete("canceled");
            self.emit(JobEvent::Canceled {
                job_id: job_id.clone(),
            })
            .await;
        } else {
            match self.terminal_outcome(result_payload, exit_code) {
                Ok(outcome) => {
                    self.mark_done(&job_id, hash.as_ref(), &outcome).await;
                    logger.log_complete(&format!("{} clips detected", outcome.clips.len()));
                    counter!("clipsmith_jobs_done").increment(1);
                    self.emit(JobEvent::Done {
                        job_id: job_id.clone(),
                        outcome: Box::new(outcome),
                    })
                    .await;
                }
                Err(e) => {
                    let _ = self
                        .store
                        .update(
                            &job_id,
                            JobPatch {
                                status: Some(JobStatus::Failed),
                                error: Some(e.to_string()),
                                ..Default::default()
                            },
                        )
                        .await;
                    counter!("clipsmith_jobs_failed").increment(1);
                    logger.log_failure(&e.to_string());
                    self.emit(JobEvent::Failed {
                        job_id: job_id.clone(),
                        error: e.to_string(),
                    })
                    .await;
                }
            }
        }

        self.finish_and_chain(&job_id).await;
    }

    /// Classify the process exit into success or one of the failure modes.
    fn terminal_outcome(
        &self,
        result_payload: Option<String>,
        exit_code: Option<i32>,
    ) -> EngineResult<AnalysisOutcome> {
        match (result_payload, exit_code) {
            // A half-formed result is unusable even when the process exited
            // cleanly.
            (Some(json), Some(0)) => {
                serde_json::from_str(&json).map_err(EngineError::MalformedResult)
            }
            // A result followed by a bad exit means the process failed after
            // printing it; only exit 0 plus a result counts as success.
            (Some(_), code) => Err(EngineError::NonZeroExit { code }),
            (None, code) => Err(EngineError::ExitedWithoutResult { code }),
        }
    }

    /// Mark the job and its steps done and record output paths.
    async fn mark_done(
        &self,
        job_id: &str,
        hash: Option<&clipsmith_models::ContentHash>,
        outcome: &AnalysisOutcome,
    ) {
        let _ = self
            .store
            .update_step(job_id, StepName::Detect, StepPatch::status(StepStatus::Done))
            .await;
        // No transcript in the result means the process skipped that phase
        let transcribe_status = if outcome.transcript.is_some() {
            StepStatus::Done
        } else {
            StepStatus::Skipped
        };
        let _ = self
            .store
            .update_step(job_id, StepName::Transcribe, StepPatch::status(transcribe_status))
            .await;
        let _ = self
            .store
            .update_step(job_id, StepName::AiEnrich, StepPatch::status(StepStatus::Done))
            .await;

        let outputs = hash.map(|h| {
            let layout = CacheLayout::new(&self.config.cache_dir, h);
            JobOutputs {
                detections: Some(layout.detections()),
                transcript: outcome.transcript.as_ref().map(|_| layout.transcript()),
                ai_clips: self.config.enrichment.then(|| layout.ai_clips()),
            }
        });

        let _ = self
            .store
            .update(
                job_id,
                JobPatch {
                    status: Some(JobStatus::Done),
                    progress: Some(100),
                    cost_estimate: outcome.cost_estimate,
                    outputs,
                    ..Default::default()
                },
            )
            .await;
    }

    /// React to one classified stdout line.
    async fn handle_event(
        &self,
        job_id: &str,
        event: AnalysisEvent,
        coalescer: &mut ProgressCoalescer,
        result_payload: &mut Option<String>,
        logger: &JobLogger,
    ) {
        match event {
            AnalysisEvent::Progress { percent, message } => {
                if let Some(hint) = infer_step(&message) {
                    let _ = self
                        .store
                        .update_step(
                            job_id,
                            hint.step,
                            StepPatch {
                                status: Some(hint.status),
                                message: Some(message.clone()),
                            },
                        )
                        .await;
                }

                if coalescer.offer(percent, &message) {
                    logger.log_progress(percent, &message);
                    let _ = self
                        .store
                        .update(
                            job_id,
                            JobPatch {
                                progress: Some(percent),
                                ..Default::default()
                            },
                        )
                        .await;
                    self.emit(JobEvent::Progress {
                        job_id: job_id.to_string(),
                        percent,
                        message,
                    })
                    .await;
                }
            }
            AnalysisEvent::Result(json) => {
                debug!(job_id, bytes = json.len(), "Received analysis result payload");
                *result_payload = Some(json);
            }
            AnalysisEvent::Error(text) => {
                logger.log_warning(&text);
            }
            AnalysisEvent::Debug(text) => {
                debug!(job_id, "analysis: {}", text);
            }
        }
    }

    /// Release the slot held by `job_id` and start the next queued job.
    ///
    /// The active entry is taken only when it still belongs to the releasing
    /// job, so the chain runs exactly once per terminal transition. When a
    /// queued job fails to even spawn, the loop keeps draining so one bad
    /// entry cannot strand the rest of the queue.
    async fn finish_and_chain(self: &Arc<Self>, job_id: &str) {
        let mut holder = job_id.to_string();
        loop {
            let next = {
                let mut slot = self.slot.lock().await;
                match &slot.active {
                    Some(active) if active.job_id == holder => {
                        slot.active = None;
                        if let Some(request) = slot.queue.pop_front() {
                            slot.active = Some(ActiveJob::reserve(request.job_id.clone()));
                            Some(request)
                        } else {
                            None
                        }
                    }
                    _ => {
                        debug!(job_id = %holder, "Slot no longer held by this job, not chaining");
                        None
                    }
                }
            };

            let Some(request) = next else { break };
            let next_id = request.job_id.clone();
            info!(job_id = %next_id, "Starting next queued job");
            match self.start(request).await {
                Ok(()) => break,
                Err(e) => {
                    error!(job_id = %next_id, error = %e, "Failed to start queued job");
                    holder = next_id;
                }
            }
        }
    }

    async fn emit(&self, event: JobEvent) {
        if self.events_tx.send(event).await.is_err() {
            debug!("No event subscriber, dropping job event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    /// Write an executable script that plays the analysis process.
    fn fake_analyzer(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("analyzer.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn build(
        dir: &std::path::Path,
        script_body: &str,
    ) -> (
        Arc<DetectionOrchestrator>,
        mpsc::Receiver<JobEvent>,
        Arc<JobStore>,
    ) {
        let script = fake_analyzer(dir, script_body);
        let config = EngineConfig {
            analysis_program: script.to_string_lossy().to_string(),
            analysis_args: vec![],
            cache_dir: dir.join("cache"),
            store_path: dir.join("jobs.json"),
            work_dir: dir.join("work"),
            progress_min_delta: 1,
            progress_min_interval: Duration::from_millis(0),
            enrichment: false,
        };
        let store = Arc::new(JobStore::open(&config.store_path).await.unwrap());
        let (orchestrator, events) = DetectionOrchestrator::new(config, Arc::clone(&store));
        (orchestrator, events, store)
    }

    fn input_file(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        path
    }

    async fn next_event(events: &mut mpsc::Receiver<JobEvent>) -> JobEvent {
        tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for job event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_successful_job_reaches_done() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, mut events, store) = build(
            dir.path(),
            r#"echo "PROGRESS:10:detecting highlights"
echo "PROGRESS:90:finishing"
echo "RESULT:{\"clips\":[{\"id\":\"c1\",\"start_time\":1.0,\"end_time\":9.0}],\"dead_space\":[]}""#,
        )
        .await;

        let input = input_file(dir.path(), "rec-a.mp4");
        orchestrator
            .submit(AnalysisRequest {
                job_id: "job-a".to_string(),
                input_path: input,
            })
            .await
            .unwrap();

        let mut saw_progress = false;
        loop {
            match next_event(&mut events).await {
                JobEvent::Progress { percent, .. } => {
                    saw_progress = true;
                    assert!(percent <= 100);
                }
                JobEvent::Done { job_id, outcome } => {
                    assert_eq!(job_id, "job-a");
                    assert_eq!(outcome.clips.len(), 1);
                    break;
                }
                JobEvent::Started { .. } => {}
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(saw_progress);

        let job = store.get("job-a").await.unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.input_hash.is_some());
        assert_eq!(job.step(StepName::Detect).unwrap().status, StepStatus::Done);
        // No transcript in the result payload
        assert_eq!(
            job.step(StepName::Transcribe).unwrap().status,
            StepStatus::Skipped
        );
    }

    #[tokio::test]
    async fn test_result_without_trailing_newline_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, mut events, _store) = build(
            dir.path(),
            r#"printf 'RESULT:{"clips":[],"dead_space":[]}'"#,
        )
        .await;

        orchestrator
            .submit(AnalysisRequest {
                job_id: "job-n".to_string(),
                input_path: input_file(dir.path(), "rec-n.mp4"),
            })
            .await
            .unwrap();

        loop {
            if let JobEvent::Done { job_id, .. } = next_event(&mut events).await {
                assert_eq!(job_id, "job-n");
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_result_fails_with_code() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, mut events, store) = build(
            dir.path(),
            r#"echo "PROGRESS:10:detecting"
exit 3"#,
        )
        .await;

        orchestrator
            .submit(AnalysisRequest {
                job_id: "job-f".to_string(),
                input_path: input_file(dir.path(), "rec-f.mp4"),
            })
            .await
            .unwrap();

        loop {
            if let JobEvent::Failed { error, .. } = next_event(&mut events).await {
                assert!(error.contains("3"), "exit code missing from: {error}");
                break;
            }
        }
        let job = store.get("job-f").await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.is_some());
    }

    #[tokio::test]
    async fn test_result_with_nonzero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        // The process prints a usable result but then dies, e.g. while
        // writing its cache files. Only exit 0 counts as success.
        let (orchestrator, mut events, store) = build(
            dir.path(),
            r#"echo 'RESULT:{"clips":[],"dead_space":[]}'
exit 3"#,
        )
        .await;

        orchestrator
            .submit(AnalysisRequest {
                job_id: "job-r".to_string(),
                input_path: input_file(dir.path(), "rec-r.mp4"),
            })
            .await
            .unwrap();

        loop {
            if let JobEvent::Failed { error, .. } = next_event(&mut events).await {
                assert!(error.contains("3"), "exit code missing from: {error}");
                break;
            }
        }
        assert_eq!(store.get("job-r").await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_malformed_result_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, mut events, store) = build(
            dir.path(),
            r#"echo 'RESULT:{"clips": [truncated'"#,
        )
        .await;

        orchestrator
            .submit(AnalysisRequest {
                job_id: "job-m".to_string(),
                input_path: input_file(dir.path(), "rec-m.mp4"),
            })
            .await
            .unwrap();

        loop {
            if let JobEvent::Failed { job_id, .. } = next_event(&mut events).await {
                assert_eq!(job_id, "job-m");
                break;
            }
        }
        assert_eq!(store.get("job-m").await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_second_job_queues_then_chains() {
        let dir = tempfile::tempdir().unwrap();
        // Slow enough that the second submit lands while the first runs
        let (orchestrator, mut events, store) = build(
            dir.path(),
            r#"sleep 1
echo 'RESULT:{"clips":[],"dead_space":[]}'"#,
        )
        .await;

        orchestrator
            .submit(AnalysisRequest {
                job_id: "first".to_string(),
                input_path: input_file(dir.path(), "rec-1.mp4"),
            })
            .await
            .unwrap();
        orchestrator
            .submit(AnalysisRequest {
                job_id: "second".to_string(),
                input_path: input_file(dir.path(), "rec-2.mp4"),
            })
            .await
            .unwrap();

        // The queued job gets its event immediately, before the first
        // finishes.
        let mut order = Vec::new();
        loop {
            let event = next_event(&mut events).await;
            match &event {
                JobEvent::Queued { job_id } => order.push(format!("queued:{job_id}")),
                JobEvent::Started { job_id } => order.push(format!("started:{job_id}")),
                JobEvent::Done { job_id, .. } => {
                    order.push(format!("done:{job_id}"));
                    if job_id == "second" {
                        break;
                    }
                }
                _ => {}
            }
        }

        let started_first = order.iter().position(|e| e == "started:first").unwrap();
        let queued_second = order.iter().position(|e| e == "queued:second").unwrap();
        let done_first = order.iter().position(|e| e == "done:first").unwrap();
        let started_second = order.iter().position(|e| e == "started:second").unwrap();

        assert!(started_first < queued_second);
        // Second starts only after the first's terminal state
        assert!(done_first < started_second);

        assert_eq!(store.get("second").await.unwrap().status, JobStatus::Done);
    }

    #[tokio::test]
    async fn test_cancel_queued_job() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, mut events, store) = build(
            dir.path(),
            r#"sleep 1
echo 'RESULT:{"clips":[],"dead_space":[]}'"#,
        )
        .await;

        orchestrator
            .submit(AnalysisRequest {
                job_id: "active".to_string(),
                input_path: input_file(dir.path(), "rec-1.mp4"),
            })
            .await
            .unwrap();
        orchestrator
            .submit(AnalysisRequest {
                job_id: "waiting".to_string(),
                input_path: input_file(dir.path(), "rec-2.mp4"),
            })
            .await
            .unwrap();

        orchestrator.cancel("waiting").await.unwrap();
        assert_eq!(
            store.get("waiting").await.unwrap().status,
            JobStatus::Canceled
        );

        // The active job still completes and nothing chains afterwards
        loop {
            if let JobEvent::Done { job_id, .. } = next_event(&mut events).await {
                assert_eq!(job_id, "active");
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_cancel_during_input_hashing() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, mut events, store) = build(
            dir.path(),
            r#"sleep 5
echo 'RESULT:{"clips":[],"dead_space":[]}'"#,
        )
        .await;

        // Large enough that hashing it takes measurable time
        let input = dir.path().join("long-recording.mp4");
        std::fs::write(&input, vec![0u8; 32 * 1024 * 1024]).unwrap();

        let submitter = Arc::clone(&orchestrator);
        let submit_task = tokio::spawn(async move {
            submitter
                .submit(AnalysisRequest {
                    job_id: "big".to_string(),
                    input_path: input,
                })
                .await
        });

        // The slot is reserved before hashing starts, so cancel succeeds as
        // soon as submit has taken it; whether it lands during hashing or
        // after the spawn, the job must end canceled, never done.
        loop {
            match orchestrator.cancel("big").await {
                Ok(()) => break,
                Err(_) => tokio::time::sleep(Duration::from_millis(1)).await,
            }
        }

        loop {
            if let JobEvent::Canceled { job_id } = next_event(&mut events).await {
                assert_eq!(job_id, "big");
                break;
            }
        }
        submit_task.await.unwrap().unwrap();
        assert_eq!(store.get("big").await.unwrap().status, JobStatus::Canceled);
    }

    #[tokio::test]
    async fn test_cancel_active_job_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, mut events, store) = build(
            dir.path(),
            r#"echo "PROGRESS:5:detecting"
sleep 30
echo 'RESULT:{"clips":[],"dead_space":[]}'"#,
        )
        .await;

        orchestrator
            .submit(AnalysisRequest {
                job_id: "long".to_string(),
                input_path: input_file(dir.path(), "rec-1.mp4"),
            })
            .await
            .unwrap();

        // Wait until it is demonstrably running
        loop {
            if let JobEvent::Progress { .. } = next_event(&mut events).await {
                break;
            }
        }

        orchestrator.cancel("long").await.unwrap();
        loop {
            if let JobEvent::Canceled { job_id } = next_event(&mut events).await {
                assert_eq!(job_id, "long");
                break;
            }
        }
        assert_eq!(store.get("long").await.unwrap().status, JobStatus::Canceled);
    }

    #[tokio::test]
    async fn test_spawn_failure_fails_job_and_frees_slot() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            analysis_program: dir
                .path()
                .join("does-not-exist")
                .to_string_lossy()
                .to_string(),
            analysis_args: vec![],
            cache_dir: dir.path().join("cache"),
            store_path: dir.path().join("jobs.json"),
            work_dir: dir.path().join("work"),
            progress_min_delta: 1,
            progress_min_interval: Duration::from_millis(0),
            enrichment: false,
        };
        let store = Arc::new(JobStore::open(&config.store_path).await.unwrap());
        let (orchestrator, mut events) =
            DetectionOrchestrator::new(config, Arc::clone(&store));

        let result = orchestrator
            .submit(AnalysisRequest {
                job_id: "ghost".to_string(),
                input_path: input_file(dir.path(), "rec.mp4"),
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.get("ghost").await.unwrap().status, JobStatus::Failed);

        loop {
            if let JobEvent::Failed { job_id, .. } = next_event(&mut events).await {
                assert_eq!(job_id, "ghost");
                break;
            }
        }

        // Slot was released for the next submission
        let slot = orchestrator.slot.lock().await;
        assert!(slot.active.is_none());
        assert!(slot.queue.is_empty());
    }
}
