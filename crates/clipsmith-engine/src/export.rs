//! Export coordinator.
//!
//! Sequences clip extractions, an optional compiled reel and an optional
//! full-length cut against the filter-graph builder and the transcode
//! runner. Tasks run strictly one at a time; per-task failures are caught
//! and accumulated so one bad clip never aborts its siblings.

use std::path::{Path, PathBuf};

use clipsmith_media::{
    caption_overlay_node, compilation_graph, dead_space_graph, extract_clip, probe_media,
    render_graph, segment_graph, vertical_crop_geometry, vertical_crop_node,
    write_clip_subtitles, ClipWindow, EncodingConfig, FfmpegCommand, FfmpegRunner,
};
use clipsmith_models::{
    CaptionPreset, CaptionStyle, ClipExport, TimeRange, Transcript, TransitionSpec,
};
use metrics::counter;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};

/// Vertical export output resolution.
const VERTICAL_OUT_WIDTH: u32 = 1080;
const VERTICAL_OUT_HEIGHT: u32 = 1920;

/// Caption burn-in settings for an export run.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    pub transcript: Transcript,
    pub preset: CaptionPreset,
}

/// Everything one coordinator run should produce.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    /// Accepted clips, used by both per-clip export and the compilation
    pub clips: Vec<ClipExport>,
    /// Export each clip as its own file
    pub export_clips: bool,
    /// Export one compiled reel with this transition
    pub compilation: Option<TransitionSpec>,
    /// Export one full-length cut with these ranges removed
    pub dead_space_cut: Option<Vec<TimeRange>>,
    /// Burn captions into clip exports
    pub captions: Option<CaptionRequest>,
    /// Crop clip exports to 9:16
    pub vertical: bool,
    pub encoding: EncodingConfig,
}

/// One failed task, kept alongside the ones that succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct ExportTaskError {
    /// Task label, e.g. `clip:c3` or `compilation`
    pub task: String,
    pub message: String,
}

/// Partial-success summary of a coordinator run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    pub completed_count: usize,
    pub errors: Vec<ExportTaskError>,
    /// Media files written, in task order
    pub outputs: Vec<PathBuf>,
}

enum ExportTask {
    Clip(ClipExport),
    Compilation(TransitionSpec),
    DeadSpaceCut(Vec<TimeRange>),
}

impl ExportTask {
    fn label(&self) -> String {
        match self {
            ExportTask::Clip(clip) => format!("clip:{}", clip.id),
            ExportTask::Compilation(_) => "compilation".to_string(),
            ExportTask::DeadSpaceCut(_) => "full_cut".to_string(),
        }
    }
}

/// Runs one export request to completion.
pub struct ExportCoordinator {
    runner: FfmpegRunner,
    work_dir: PathBuf,
}

impl ExportCoordinator {
    pub fn new(runner: FfmpegRunner, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            work_dir: work_dir.into(),
        }
    }

    /// Run all requested tasks sequentially.
    ///
    /// `progress` receives `(current, total)` counted across every requested
    /// task type; `current` is the 1-based task now running.
    pub async fn run<F>(
        &self,
        request: &ExportRequest,
        mut progress: F,
    ) -> EngineResult<ExportSummary>
    where
        F: FnMut(usize, usize),
    {
        let tasks = plan_tasks(request)?;
        let total = tasks.len();

        tokio::fs::create_dir_all(&request.output_dir).await?;
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let mut summary = ExportSummary::default();
        for (index, task) in tasks.iter().enumerate() {
            progress(index + 1, total);
            let label = task.label();

            let result = match task {
                ExportTask::Clip(clip) => self.export_clip(request, clip).await,
                ExportTask::Compilation(transition) => {
                    self.export_compilation(request, *transition).await
                }
                ExportTask::DeadSpaceCut(remove) => self.export_full_cut(request, remove).await,
            };

            match result {
                Ok(output) => {
                    summary.completed_count += 1;
                    summary.outputs.push(output);
                    counter!("clipsmith_exports_completed").increment(1);
                }
                Err(e) => {
                    warn!(task = %label, error = %e, "Export task failed, continuing");
                    counter!("clipsmith_exports_failed").increment(1);
                    summary.errors.push(ExportTaskError {
                        task: label,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            completed = summary.completed_count,
            failed = summary.errors.len(),
            "Export run finished"
        );
        Ok(summary)
    }

    /// Export one clip, with optional caption burn-in and vertical crop.
    async fn export_clip(
        &self,
        request: &ExportRequest,
        clip: &ClipExport,
    ) -> EngineResult<PathBuf> {
        clip.validate()
            .map_err(|e| EngineError::invalid_export(e.to_string()))?;

        let start = clip.effective_start();
        let duration = clip.effective_duration();
        let output = request.output_dir.join(format!("{}.mp4", clip.id));

        let subtitle_path = match &request.captions {
            Some(captions) => {
                let style = resolve_style(captions.preset, clip);
                let path = self.work_dir.join(format!("{}.ass", clip.id));
                let wrote = write_clip_subtitles(
                    &captions.transcript,
                    start,
                    clip.effective_end(),
                    &style,
                    &path,
                )
                .await?;
                wrote.then_some(path)
            }
            None => None,
        };

        if subtitle_path.is_none() && !request.vertical {
            // Plain extraction: stream copy with one re-encode retry
            extract_clip(
                &self.runner,
                &request.source,
                &output,
                start,
                duration,
                &request.encoding,
                |_| {},
            )
            .await?;
        } else {
            let mut graph = segment_graph(start, duration)?;
            let mut video = graph
                .video_out
                .clone()
                .ok_or_else(|| EngineError::invalid_export("segment graph lost its video"))?;

            if request.vertical {
                let info = probe_media(&request.source).await?;
                let geometry = vertical_crop_geometry(info.width, info.height);
                graph.push(vertical_crop_node(
                    geometry,
                    VERTICAL_OUT_WIDTH,
                    VERTICAL_OUT_HEIGHT,
                    video.clone(),
                    "vcrop",
                ));
                video = "vcrop".to_string();
            }

            if let Some(path) = &subtitle_path {
                graph.push(caption_overlay_node(path, video.clone(), "vsub"));
                video = "vsub".to_string();
            }

            graph.video_out = Some(video);
            render_graph(
                &self.runner,
                &[request.source.as_path()],
                &graph,
                &output,
                &request.encoding,
                |_| {},
            )
            .await?;
        }

        if clip.has_metadata() {
            self.write_metadata_sidecar(clip, &output).await?;
        }

        Ok(output)
    }

    /// Export one compiled reel joining all clips with the transition.
    async fn export_compilation(
        &self,
        request: &ExportRequest,
        transition: TransitionSpec,
    ) -> EngineResult<PathBuf> {
        let mut clips = request.clips.clone();
        for clip in &clips {
            clip.validate()
                .map_err(|e| EngineError::invalid_export(e.to_string()))?;
        }
        // Compilation order is ascending source position
        clips.sort_by(|a, b| {
            a.effective_start()
                .partial_cmp(&b.effective_start())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let windows: Vec<ClipWindow> = clips
            .iter()
            .map(|c| ClipWindow::new(c.effective_start(), c.effective_duration()))
            .collect();
        let graph = compilation_graph(&windows, transition)?;

        let output = request.output_dir.join("compilation.mp4");
        render_graph(
            &self.runner,
            &[request.source.as_path()],
            &graph,
            &output,
            &request.encoding,
            |_| {},
        )
        .await?;
        Ok(output)
    }

    /// Export the full recording with dead-space ranges removed.
    async fn export_full_cut(
        &self,
        request: &ExportRequest,
        remove: &[TimeRange],
    ) -> EngineResult<PathBuf> {
        let output = request.output_dir.join("full_cut.mp4");
        let info = probe_media(&request.source).await?;

        match dead_space_graph(info.duration, remove)? {
            Some(graph) => {
                render_graph(
                    &self.runner,
                    &[request.source.as_path()],
                    &graph,
                    &output,
                    &request.encoding,
                    |_| {},
                )
                .await?;
            }
            None => {
                // Nothing to remove: straight stream copy
                let cmd = FfmpegCommand::new(&request.source, &output).codec_copy();
                self.runner.run(&cmd).await?;
            }
        }
        Ok(output)
    }

    /// Write the JSON metadata sidecar next to the media file.
    async fn write_metadata_sidecar(
        &self,
        clip: &ClipExport,
        media_path: &Path,
    ) -> EngineResult<()> {
        let sidecar = media_path.with_extension("json");
        let payload = json!({
            "id": clip.id,
            "title": clip.title,
            "start_time": clip.start_time,
            "end_time": clip.end_time,
            "trim_start_offset": clip.trim_start_offset,
            "trim_end_offset": clip.trim_end_offset,
        });
        tokio::fs::write(&sidecar, serde_json::to_vec_pretty(&payload)?).await?;
        Ok(())
    }
}

/// Resolve the effective caption style for one clip.
fn resolve_style(preset: CaptionPreset, clip: &ClipExport) -> CaptionStyle {
    let base = preset.style();
    match &clip.caption_style {
        Some(overrides) => base.merged(overrides),
        None => base,
    }
}

/// Expand a request into its ordered task list, validating up front what can
/// be validated without touching the filesystem.
fn plan_tasks(request: &ExportRequest) -> EngineResult<Vec<ExportTask>> {
    let mut tasks = Vec::new();

    if request.export_clips {
        for clip in &request.clips {
            tasks.push(ExportTask::Clip(clip.clone()));
        }
    }

    if let Some(transition) = request.compilation {
        if request.clips.is_empty() {
            return Err(EngineError::invalid_export(
                "compilation requested with no clips",
            ));
        }
        tasks.push(ExportTask::Compilation(transition));
    }

    if let Some(remove) = &request.dead_space_cut {
        // Overlap or disorder is a caller error, caught before any spawn
        let mut cursor = 0.0_f64;
        for (i, range) in remove.iter().enumerate() {
            range
                .validate()
                .map_err(|e| EngineError::invalid_export(format!("removal range {i}: {e}")))?;
            if range.start < cursor {
                return Err(EngineError::invalid_export(format!(
                    "removal ranges must be sorted and non-overlapping (range {i})"
                )));
            }
            cursor = range.end;
        }
        tasks.push(ExportTask::DeadSpaceCut(remove.clone()));
    }

    if tasks.is_empty() {
        return Err(EngineError::invalid_export("nothing to export"));
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipsmith_models::TransitionKind;

    fn clip(id: &str, start: f64, end: f64) -> ClipExport {
        ClipExport {
            id: id.to_string(),
            start_time: start,
            end_time: end,
            trim_start_offset: 0.0,
            trim_end_offset: 0.0,
            title: None,
            caption_style: None,
        }
    }

    fn base_request() -> ExportRequest {
        ExportRequest {
            source: PathBuf::from("/tmp/source.mp4"),
            output_dir: PathBuf::from("/tmp/out"),
            clips: vec![clip("c1", 0.0, 10.0), clip("c2", 20.0, 28.0)],
            export_clips: true,
            compilation: None,
            dead_space_cut: None,
            captions: None,
            vertical: false,
            encoding: EncodingConfig::default(),
        }
    }

    #[test]
    fn test_plan_counts_all_task_types() {
        let mut request = base_request();
        request.compilation = Some(TransitionSpec::cut());
        request.dead_space_cut = Some(vec![TimeRange { start: 5.0, end: 8.0 }]);

        let tasks = plan_tasks(&request).unwrap();
        assert_eq!(tasks.len(), 4); // 2 clips + compilation + full cut
        assert_eq!(tasks[2].label(), "compilation");
        assert_eq!(tasks[3].label(), "full_cut");
    }

    #[test]
    fn test_plan_rejects_empty_request() {
        let mut request = base_request();
        request.export_clips = false;
        assert!(matches!(
            plan_tasks(&request),
            Err(EngineError::InvalidExport(_))
        ));
    }

    #[test]
    fn test_plan_rejects_compilation_without_clips() {
        let mut request = base_request();
        request.clips.clear();
        request.export_clips = false;
        request.compilation = Some(TransitionSpec::cut());
        assert!(plan_tasks(&request).is_err());
    }

    #[test]
    fn test_plan_rejects_overlapping_removals() {
        let mut request = base_request();
        request.dead_space_cut = Some(vec![
            TimeRange { start: 2.0, end: 6.0 },
            TimeRange { start: 5.0, end: 9.0 },
        ]);
        assert!(matches!(
            plan_tasks(&request),
            Err(EngineError::InvalidExport(_))
        ));
    }

    #[test]
    fn test_plan_rejects_inverted_removal_range() {
        let mut request = base_request();
        request.dead_space_cut = Some(vec![TimeRange { start: 6.0, end: 2.0 }]);
        assert!(plan_tasks(&request).is_err());
    }

    #[test]
    fn test_resolve_style_applies_override() {
        let mut c = clip("c1", 0.0, 10.0);
        c.caption_style = Some(clipsmith_models::CaptionStyleOverride {
            font_size: Some(72),
            ..Default::default()
        });
        let style = resolve_style(CaptionPreset::Minimal, &c);
        assert_eq!(style.font_size, 72);
        // Remaining fields come from the preset
        assert_eq!(style.font, CaptionStyle::preset_minimal().font);
    }

    #[tokio::test]
    async fn test_run_accumulates_failures_without_aborting() {
        // No ffmpeg invocation succeeds against a missing source; every task
        // must still be attempted and reported.
        let dir = tempfile::tempdir().unwrap();
        let mut request = base_request();
        request.source = dir.path().join("missing.mp4");
        request.output_dir = dir.path().join("out");
        // One structurally invalid clip amid valid ones
        request.clips.push(clip("bad", 5.0, 5.2));

        let coordinator = ExportCoordinator::new(FfmpegRunner::new(), dir.path().join("work"));
        let mut seen = Vec::new();
        let summary = coordinator
            .run(&request, |current, total| seen.push((current, total)))
            .await
            .unwrap();

        assert_eq!(summary.completed_count, 0);
        assert_eq!(summary.errors.len(), 3);
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
        // The invalid clip failed on validation, not on a spawn attempt
        let bad = summary.errors.iter().find(|e| e.task == "clip:bad").unwrap();
        assert!(bad.message.contains("minimum"));
    }
}
