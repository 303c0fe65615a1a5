//! FFmpeg invocation layer.
//!
//! Edit descriptions are compiled into typed filter graphs ([`graph`]),
//! subtitles are generated per clip window ([`captions`]), and the actual
//! ffmpeg/ffprobe processes are driven by [`command`], [`probe`] and
//! [`transcode`]. Graph construction is pure and fully validated before any
//! process is spawned.

pub mod captions;
pub mod command;
pub mod error;
pub mod graph;
pub mod probe;
pub mod transcode;

pub use captions::{ass_timestamp, events_for_window, render_ass, write_clip_subtitles, CaptionEvent};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, TranscodeProgress};
pub use error::{MediaError, MediaResult};
pub use graph::{
    audio_mix_graph, caption_overlay_node, compilation_graph, complement_ranges, dead_space_graph,
    escape_filter_path, segment_graph, vertical_crop_geometry, vertical_crop_node, AudioTrackSpec,
    ClipWindow, CropGeometry, FilterGraph, FilterNode, TrackRole,
};
pub use probe::{get_duration, probe_media, MediaInfo};
pub use transcode::{extract_clip, render_graph, EncodingConfig, ExtractMode};
