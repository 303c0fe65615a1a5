//! Clipsmith engine binary.
//!
//! Submits an analysis job for the recording given on the command line,
//! streams progress to the log, and optionally runs exports from the
//! detection result.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipsmith_engine::{
    AnalysisRequest, DetectionOrchestrator, EngineConfig, ExportCoordinator, ExportRequest,
    JobEvent,
};
use clipsmith_media::{EncodingConfig, FfmpegRunner};
use clipsmith_models::{ClipExport, TransitionSpec};
use clipsmith_store::JobStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("clipsmith=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let input = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => bail!("usage: clipsmith-engine <recording> [job-id]"),
    };
    let job_id = std::env::args()
        .nth(2)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let config = EngineConfig::from_env();
    info!(?config, "Starting clipsmith-engine");

    clipsmith_media::check_ffmpeg().context("ffmpeg is required")?;
    clipsmith_media::check_ffprobe().context("ffprobe is required")?;

    let store = Arc::new(
        JobStore::open(&config.store_path)
            .await
            .context("failed to open job store")?,
    );
    let export_on_done = std::env::var("CLIPSMITH_EXPORT_DIR").ok().map(PathBuf::from);
    let work_dir = config.work_dir.clone();

    let (orchestrator, mut events) = DetectionOrchestrator::new(config, store);
    orchestrator
        .submit(AnalysisRequest {
            job_id: job_id.clone(),
            input_path: input.clone(),
        })
        .await
        .context("failed to submit analysis job")?;

    while let Some(event) = events.recv().await {
        if event.job_id() != job_id {
            continue;
        }
        match event {
            JobEvent::Queued { .. } => info!("Job queued"),
            JobEvent::Started { .. } => info!("Analysis started"),
            JobEvent::Progress {
                percent, message, ..
            } => info!(percent, "{message}"),
            JobEvent::Done { outcome, .. } => {
                info!(
                    clips = outcome.clips.len(),
                    dead_space = outcome.dead_space.len(),
                    "Analysis complete"
                );

                if let Some(output_dir) = export_on_done.clone() {
                    let clips: Vec<ClipExport> = outcome
                        .clips
                        .iter()
                        .map(|c| ClipExport {
                            id: c.id.clone(),
                            start_time: c.start_time,
                            end_time: c.end_time,
                            trim_start_offset: 0.0,
                            trim_end_offset: 0.0,
                            title: c.title.clone(),
                            caption_style: None,
                        })
                        .collect();
                    if clips.is_empty() {
                        warn!("No clips detected, nothing to export");
                        break;
                    }

                    let request = ExportRequest {
                        source: input.clone(),
                        output_dir,
                        clips,
                        export_clips: true,
                        compilation: Some(TransitionSpec::cut()),
                        dead_space_cut: (!outcome.dead_space.is_empty())
                            .then(|| outcome.dead_space.clone()),
                        captions: None,
                        vertical: false,
                        encoding: EncodingConfig::default(),
                    };
                    let coordinator =
                        ExportCoordinator::new(FfmpegRunner::new(), work_dir.clone());
                    let summary = coordinator
                        .run(&request, |current, total| {
                            info!(current, total, "Export task");
                        })
                        .await?;
                    info!(
                        completed = summary.completed_count,
                        failed = summary.errors.len(),
                        "Exports finished"
                    );
                    for error in &summary.errors {
                        warn!(task = %error.task, "{}", error.message);
                    }
                }
                break;
            }
            JobEvent::Failed { error, .. } => {
                bail!("analysis failed: {error}");
            }
            JobEvent::Canceled { .. } => {
                warn!("Job canceled");
                break;
            }
        }
    }

    Ok(())
}
