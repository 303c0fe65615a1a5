//! Transcode execution: clip extraction with fast→accurate fallback, and
//! rendering of built filter graphs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner, TranscodeProgress};
use crate::error::{MediaError, MediaResult};
use crate::graph::FilterGraph;

/// Re-encode settings used when a graph or accurate extraction runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_crf() -> u8 {
    20
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

/// How a plain clip extraction cuts the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// Stream copy. Fast, but cut points snap to keyframes; boundary timing
    /// may drift by up to one keyframe interval.
    Fast,
    /// Full re-encode with a two-pass seek. Frame accurate, slower.
    Accurate,
}

/// Coarse input-side seek margin for accurate extraction. Seeking most of
/// the way by keyframe and decoding only the remainder keeps the accurate
/// path from decoding the whole file.
const ACCURATE_SEEK_MARGIN_SECS: f64 = 5.0;

/// Build the extraction command for one mode.
fn extract_command(
    input: &Path,
    output: &Path,
    start: f64,
    duration: f64,
    mode: ExtractMode,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    match mode {
        ExtractMode::Fast => FfmpegCommand::new(input, output)
            .seek(start)
            .duration(duration)
            .codec_copy(),
        ExtractMode::Accurate => {
            let coarse = (start - ACCURATE_SEEK_MARGIN_SECS).max(0.0);
            FfmpegCommand::new(input, output)
                .seek(coarse)
                .output_seek(start - coarse)
                .duration(duration)
                .video_codec(&encoding.video_codec)
                .preset(&encoding.preset)
                .crf(encoding.crf)
                .audio_codec(&encoding.audio_codec)
                .audio_bitrate(&encoding.audio_bitrate)
        }
    }
}

/// Extract `[start, start + duration)` from a source file.
///
/// Fast mode is tried first; if the transcoder itself rejects it (corrupt
/// index, codec that cannot be copied into the output container), the same
/// request is retried once in accurate mode. Spawn failures and
/// cancellation are never retried.
pub async fn extract_clip<F>(
    runner: &FfmpegRunner,
    input: &Path,
    output: &Path,
    start: f64,
    duration: f64,
    encoding: &EncodingConfig,
    progress_callback: F,
) -> MediaResult<ExtractMode>
where
    F: Fn(TranscodeProgress) + Clone + Send + 'static,
{
    if duration <= 0.0 {
        return Err(MediaError::invalid_graph(format!(
            "extraction duration {duration:.3} must be positive"
        )));
    }

    let fast = extract_command(input, output, start, duration, ExtractMode::Fast, encoding);
    info!(
        input = %input.display(),
        start, duration, "Extracting clip (stream copy)"
    );

    match runner
        .run_with_progress(&fast, Some(duration), progress_callback.clone())
        .await
    {
        Ok(()) => Ok(ExtractMode::Fast),
        // Only a transcoder rejection triggers the fallback; one retry max
        Err(MediaError::FfmpegFailed { message, .. }) => {
            warn!(%message, "Stream copy failed, retrying with re-encode");
            let accurate = extract_command(
                input,
                output,
                start,
                duration,
                ExtractMode::Accurate,
                encoding,
            );
            runner
                .run_with_progress(&accurate, Some(duration), progress_callback)
                .await?;
            Ok(ExtractMode::Accurate)
        }
        Err(e) => Err(e),
    }
}

/// Render a built filter graph to an output file.
///
/// Inputs are added in graph index order; the graph's terminal labels are
/// mapped to the output. Filtered output always re-encodes.
pub async fn render_graph<F>(
    runner: &FfmpegRunner,
    inputs: &[&Path],
    graph: &FilterGraph,
    output: &Path,
    encoding: &EncodingConfig,
    progress_callback: F,
) -> MediaResult<()>
where
    F: Fn(TranscodeProgress) + Send + 'static,
{
    let (first, rest) = inputs
        .split_first()
        .ok_or_else(|| MediaError::invalid_graph("graph render needs at least one input"))?;
    if graph.nodes.is_empty() {
        return Err(MediaError::invalid_graph("empty filter graph"));
    }

    let mut cmd = FfmpegCommand::new(first, output).filter_complex(graph.serialize());
    for input in rest {
        cmd = cmd.add_input(input);
    }
    if let Some(label) = &graph.video_out {
        cmd = cmd
            .map(label.clone())
            .video_codec(&encoding.video_codec)
            .preset(&encoding.preset)
            .crf(encoding.crf);
    }
    if let Some(label) = &graph.audio_out {
        cmd = cmd
            .map(label.clone())
            .audio_codec(&encoding.audio_codec)
            .audio_bitrate(&encoding.audio_bitrate);
    }

    info!(output = %output.display(), nodes = graph.nodes.len(), "Rendering filter graph");
    runner
        .run_with_progress(&cmd, graph.expected_duration, progress_callback)
        .await
}
