//! Typed filter-graph construction.
//!
//! Edit descriptions (segments to keep or remove, transitions, crop
//! geometry, caption overlay, audio tracks) are first translated into a
//! list of typed nodes with named input/output ports, and only then
//! serialized to ffmpeg `-filter_complex` syntax. Structural correctness is
//! checked here, without invoking any external process.

use std::path::Path;

use clipsmith_models::{TimeRange, TransitionKind, TransitionSpec};

use crate::error::{MediaError, MediaResult};

/// One named operation in a transform graph.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    /// Labels of the streams this node consumes
    pub inputs: Vec<String>,
    /// The filter expression, e.g. `trim=start=1.500:end=4.000`
    pub filter: String,
    /// Labels of the streams this node produces
    pub outputs: Vec<String>,
}

impl FilterNode {
    pub fn new(
        inputs: impl IntoIterator<Item = impl Into<String>>,
        filter: impl Into<String>,
        outputs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            filter: filter.into(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }

    fn render(&self) -> String {
        let mut s = String::new();
        for input in &self.inputs {
            s.push('[');
            s.push_str(input);
            s.push(']');
        }
        s.push_str(&self.filter);
        for output in &self.outputs {
            s.push('[');
            s.push_str(output);
            s.push(']');
        }
        s
    }
}

/// An ordered transform graph with its terminal stream labels.
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    pub nodes: Vec<FilterNode>,
    /// Terminal video stream label, if the graph produces video
    pub video_out: Option<String>,
    /// Terminal audio stream label, if the graph produces audio
    pub audio_out: Option<String>,
    /// Output duration in seconds implied by the graph, for progress math
    pub expected_duration: Option<f64>,
}

impl FilterGraph {
    pub fn push(&mut self, node: FilterNode) {
        self.nodes.push(node);
    }

    /// Serialize to `-filter_complex` syntax.
    pub fn serialize(&self) -> String {
        self.nodes
            .iter()
            .map(FilterNode::render)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// An effective clip window in source seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start: f64,
    pub duration: f64,
}

impl ClipWindow {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    fn end(&self) -> f64 {
        self.start + self.duration
    }
}

fn trim_pair(graph: &mut FilterGraph, window: &ClipWindow, index: usize) -> (String, String) {
    let v = format!("v{index}");
    let a = format!("a{index}");
    graph.push(FilterNode::new(
        ["0:v"],
        format!(
            "trim=start={:.3}:end={:.3},setpts=PTS-STARTPTS",
            window.start,
            window.end()
        ),
        [v.clone()],
    ));
    graph.push(FilterNode::new(
        ["0:a"],
        format!(
            "atrim=start={:.3}:end={:.3},asetpts=PTS-STARTPTS",
            window.start,
            window.end()
        ),
        [a.clone()],
    ));
    (v, a)
}

fn concat_node(graph: &mut FilterGraph, pairs: &[(String, String)]) {
    let mut inputs = Vec::with_capacity(pairs.len() * 2);
    for (v, a) in pairs {
        inputs.push(v.clone());
        inputs.push(a.clone());
    }
    graph.push(FilterNode::new(
        inputs,
        format!("concat=n={}:v=1:a=1", pairs.len()),
        ["vout", "aout"],
    ));
    graph.video_out = Some("vout".to_string());
    graph.audio_out = Some("aout".to_string());
}

/// Trim audio and video to `[start, start + duration)`.
pub fn segment_graph(start: f64, duration: f64) -> MediaResult<FilterGraph> {
    if start < 0.0 || duration <= 0.0 {
        return Err(MediaError::invalid_graph(format!(
            "segment start {start:.3}/duration {duration:.3} out of range"
        )));
    }

    let mut graph = FilterGraph::default();
    let (v, a) = trim_pair(&mut graph, &ClipWindow::new(start, duration), 0);
    graph.video_out = Some(v);
    graph.audio_out = Some(a);
    graph.expected_duration = Some(duration);
    Ok(graph)
}

/// Compute the keep complement of a set of removal ranges.
///
/// Ranges must be valid, sorted ascending by start, non-overlapping, and
/// within `[0, source_duration]`; overlap or disorder is a caller error.
/// The union of the returned ranges with the removals reconstructs
/// `[0, source_duration)` exactly.
pub fn complement_ranges(
    source_duration: f64,
    remove: &[TimeRange],
) -> MediaResult<Vec<TimeRange>> {
    if source_duration <= 0.0 {
        return Err(MediaError::invalid_graph(format!(
            "source duration {source_duration:.3} must be positive"
        )));
    }

    let mut cursor = 0.0_f64;
    let mut keep = Vec::new();

    for (i, range) in remove.iter().enumerate() {
        range
            .validate()
            .map_err(|e| MediaError::invalid_graph(format!("removal range {i}: {e}")))?;
        if range.start < cursor {
            return Err(MediaError::invalid_graph(format!(
                "removal ranges must be sorted and non-overlapping: range {i} starts at \
                 {:.3} before cursor {cursor:.3}",
                range.start
            )));
        }
        if range.end > source_duration {
            return Err(MediaError::invalid_graph(format!(
                "removal range {i} ends at {:.3} past source duration {source_duration:.3}",
                range.end
            )));
        }
        if range.start > cursor {
            keep.push(TimeRange {
                start: cursor,
                end: range.start,
            });
        }
        cursor = range.end;
    }

    if cursor < source_duration {
        keep.push(TimeRange {
            start: cursor,
            end: source_duration,
        });
    }

    if keep.is_empty() {
        return Err(MediaError::invalid_graph(
            "removal ranges cover the entire source; nothing left to keep",
        ));
    }

    Ok(keep)
}

/// Build a graph that drops the given removal ranges and concatenates what
/// remains.
///
/// Returns `Ok(None)` when there is nothing to remove: the caller should
/// stream-copy the source instead of running a no-op graph.
pub fn dead_space_graph(
    source_duration: f64,
    remove: &[TimeRange],
) -> MediaResult<Option<FilterGraph>> {
    if remove.is_empty() {
        return Ok(None);
    }

    let keep = complement_ranges(source_duration, remove)?;

    let mut graph = FilterGraph::default();
    let pairs: Vec<(String, String)> = keep
        .iter()
        .enumerate()
        .map(|(i, range)| {
            trim_pair(
                &mut graph,
                &ClipWindow::new(range.start, range.duration()),
                i,
            )
        })
        .collect();

    concat_node(&mut graph, &pairs);
    graph.expected_duration = Some(keep.iter().map(TimeRange::duration).sum());
    Ok(Some(graph))
}

/// Build a compilation graph joining the given clip windows with the
/// requested transition.
///
/// Windows must already be in ascending start order; the transition is
/// validated against every clip duration before any node is emitted.
pub fn compilation_graph(
    windows: &[ClipWindow],
    transition: TransitionSpec,
) -> MediaResult<FilterGraph> {
    if windows.is_empty() {
        return Err(MediaError::invalid_graph("compilation needs at least one clip"));
    }
    for (i, w) in windows.iter().enumerate() {
        if w.duration <= 0.0 {
            return Err(MediaError::invalid_graph(format!(
                "clip {i} has non-positive duration {:.3}",
                w.duration
            )));
        }
    }

    let durations: Vec<f64> = windows.iter().map(|w| w.duration).collect();
    transition
        .validate_for(&durations)
        .map_err(|e| MediaError::invalid_graph(e.to_string()))?;

    let mut graph = FilterGraph::default();

    if windows.len() == 1 {
        let (v, a) = trim_pair(&mut graph, &windows[0], 0);
        graph.video_out = Some(v);
        graph.audio_out = Some(a);
        graph.expected_duration = Some(durations[0]);
        return Ok(graph);
    }

    match transition.kind {
        TransitionKind::None => {
            let pairs: Vec<(String, String)> = windows
                .iter()
                .enumerate()
                .map(|(i, w)| trim_pair(&mut graph, w, i))
                .collect();
            concat_node(&mut graph, &pairs);
            graph.expected_duration = Some(durations.iter().sum());
        }

        TransitionKind::Crossfade => {
            let d = transition.duration;
            let pairs: Vec<(String, String)> = windows
                .iter()
                .enumerate()
                .map(|(i, w)| trim_pair(&mut graph, w, i))
                .collect();

            // Each offset is computed against the already-shortened running
            // timeline, not the naive sum of raw durations.
            let (mut prev_v, mut prev_a) = pairs[0].clone();
            let mut running = durations[0];
            for (i, (v, a)) in pairs.iter().enumerate().skip(1) {
                let offset = running - d;
                let vx = format!("vx{i}");
                let ax = format!("ax{i}");
                graph.push(FilterNode::new(
                    [prev_v.clone(), v.clone()],
                    format!("xfade=transition=fade:duration={d:.3}:offset={offset:.3}"),
                    [vx.clone()],
                ));
                graph.push(FilterNode::new(
                    [prev_a.clone(), a.clone()],
                    format!("acrossfade=d={d:.3}:c1=tri:c2=tri"),
                    [ax.clone()],
                ));
                running = offset + durations[i];
                prev_v = vx;
                prev_a = ax;
            }
            graph.video_out = Some(prev_v);
            graph.audio_out = Some(prev_a);
            graph.expected_duration = Some(running);
        }

        TransitionKind::DipToBlack => {
            // The fades themselves create the transition; no offset math.
            let half = transition.duration / 2.0;
            let last = windows.len() - 1;
            let mut pairs = Vec::with_capacity(windows.len());
            for (i, w) in windows.iter().enumerate() {
                let mut vf = format!(
                    "trim=start={:.3}:end={:.3},setpts=PTS-STARTPTS",
                    w.start,
                    w.end()
                );
                let mut af = format!(
                    "atrim=start={:.3}:end={:.3},asetpts=PTS-STARTPTS",
                    w.start,
                    w.end()
                );
                if i > 0 {
                    vf.push_str(&format!(",fade=t=in:st=0:d={half:.3}"));
                    af.push_str(&format!(",afade=t=in:st=0:d={half:.3}"));
                }
                if i < last {
                    // Fade-out start is computed from this clip's own duration
                    let fade_out_start = w.duration - half;
                    vf.push_str(&format!(",fade=t=out:st={fade_out_start:.3}:d={half:.3}"));
                    af.push_str(&format!(",afade=t=out:st={fade_out_start:.3}:d={half:.3}"));
                }
                let v = format!("v{i}");
                let a = format!("a{i}");
                graph.push(FilterNode::new(["0:v"], vf, [v.clone()]));
                graph.push(FilterNode::new(["0:a"], af, [a.clone()]));
                pairs.push((v, a));
            }
            concat_node(&mut graph, &pairs);
            graph.expected_duration = Some(durations.iter().sum());
        }
    }

    Ok(graph)
}

/// Crop rectangle for a vertical (9:16) export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropGeometry {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Compute a centered 9:16 crop for any native resolution.
///
/// Works for both narrower-than-9:16 and wider-than-9:16 sources; the crop
/// origin is never negative and the rectangle never exceeds the frame.
pub fn vertical_crop_geometry(src_width: u32, src_height: u32) -> CropGeometry {
    let ideal = (src_height as f64 * 9.0 / 16.0).round() as u32;
    let width = ideal.min(src_width).max(1);
    let x = (src_width.saturating_sub(width)) / 2;
    CropGeometry {
        width,
        height: src_height,
        x,
        y: 0,
    }
}

/// Append a crop + scale stage producing `output` from `input`.
pub fn vertical_crop_node(
    geometry: CropGeometry,
    out_width: u32,
    out_height: u32,
    input: impl Into<String>,
    output: impl Into<String>,
) -> FilterNode {
    FilterNode::new(
        [input.into()],
        format!(
            "crop={}:{}:{}:{},scale={}:{},setsar=1",
            geometry.width, geometry.height, geometry.x, geometry.y, out_width, out_height
        ),
        [output.into()],
    )
}

/// Escape a path for use inside filter syntax.
///
/// Separators are normalized and the characters the filter grammar reserves
/// are backslash-escaped, so an arbitrary subtitle path survives the
/// invocation.
pub fn escape_filter_path(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let mut escaped = String::with_capacity(normalized.len() + 12);
    for ch in normalized.chars() {
        match ch {
            ':' => escaped.push_str("\\:"),
            '\'' => escaped.push_str("\\'"),
            ',' => escaped.push_str("\\,"),
            ';' => escaped.push_str("\\;"),
            '[' => escaped.push_str("\\["),
            ']' => escaped.push_str("\\]"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Burn a subtitle file into the video stream.
pub fn caption_overlay_node(
    subtitle_path: &Path,
    input: impl Into<String>,
    output: impl Into<String>,
) -> FilterNode {
    FilterNode::new(
        [input.into()],
        format!("subtitles=filename={}", escape_filter_path(subtitle_path)),
        [output.into()],
    )
}

/// Role of an audio track in a mix; determines its preset level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRole {
    Main,
    Ambience,
    Effects,
    Music,
}

impl TrackRole {
    /// Preset level in dB, used when no explicit volume is given.
    pub fn preset_db(&self) -> f64 {
        match self {
            TrackRole::Main => 0.0,
            TrackRole::Ambience => -12.0,
            TrackRole::Effects => -6.0,
            TrackRole::Music => -18.0,
        }
    }
}

/// One audio track contributing to a mix.
#[derive(Debug, Clone)]
pub struct AudioTrackSpec {
    /// ffmpeg input index this track's audio comes from
    pub input_index: usize,
    pub role: TrackRole,
    /// Explicit level in dB; overrides the role preset
    pub volume_db: Option<f64>,
    /// Optional segment trim in source seconds
    pub trim: Option<TimeRange>,
    /// Optional start delay in seconds
    pub delay: Option<f64>,
    /// Optional fade-in duration in seconds
    pub fade_in: Option<f64>,
    /// Optional fade-out duration in seconds; requires a trim so the fade
    /// start can be derived from the track duration
    pub fade_out: Option<f64>,
}

impl AudioTrackSpec {
    pub fn main(input_index: usize) -> Self {
        Self {
            input_index,
            role: TrackRole::Main,
            volume_db: None,
            trim: None,
            delay: None,
            fade_in: None,
            fade_out: None,
        }
    }
}

/// Convert a dB level to a linear volume ratio.
pub fn db_to_ratio(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Build a mix graph over the given tracks.
///
/// A single contributing track is passed through under the output label
/// rather than run through a one-input mixer.
pub fn audio_mix_graph(tracks: &[AudioTrackSpec]) -> MediaResult<FilterGraph> {
    if tracks.is_empty() {
        return Err(MediaError::invalid_graph("audio mix needs at least one track"));
    }

    let mut graph = FilterGraph::default();
    let mut labels = Vec::with_capacity(tracks.len());

    for (i, track) in tracks.iter().enumerate() {
        let mut stages: Vec<String> = Vec::new();

        if let Some(trim) = &track.trim {
            trim.validate()
                .map_err(|e| MediaError::invalid_graph(format!("track {i} trim: {e}")))?;
            stages.push(format!(
                "atrim=start={:.3}:end={:.3},asetpts=PTS-STARTPTS",
                trim.start, trim.end
            ));
        }

        if let Some(delay) = track.delay {
            if delay < 0.0 {
                return Err(MediaError::invalid_graph(format!(
                    "track {i} delay {delay:.3} must not be negative"
                )));
            }
            if delay > 0.0 {
                stages.push(format!("adelay={}:all=1", (delay * 1000.0).round() as u64));
            }
        }

        let db = track.volume_db.unwrap_or_else(|| track.role.preset_db());
        stages.push(format!("volume={:.4}", db_to_ratio(db)));

        if let Some(fade_in) = track.fade_in {
            stages.push(format!("afade=t=in:st=0:d={fade_in:.3}"));
        }
        if let Some(fade_out) = track.fade_out {
            let trim = track.trim.as_ref().ok_or_else(|| {
                MediaError::invalid_graph(format!(
                    "track {i} fade-out needs a trim to derive its start time"
                ))
            })?;
            let st = trim.duration() - fade_out;
            if st < 0.0 {
                return Err(MediaError::invalid_graph(format!(
                    "track {i} fade-out {fade_out:.3} exceeds track duration {:.3}",
                    trim.duration()
                )));
            }
            stages.push(format!("afade=t=out:st={st:.3}:d={fade_out:.3}"));
        }

        // Last track in a mix output; single track just gets the final name
        let label = if tracks.len() == 1 {
            "aout".to_string()
        } else {
            format!("t{i}")
        };
        graph.push(FilterNode::new(
            [format!("{}:a", track.input_index)],
            stages.join(","),
            [label.clone()],
        ));
        labels.push(label);
    }

    if tracks.len() > 1 {
        graph.push(FilterNode::new(
            labels,
            format!("amix=inputs={}:duration=longest:normalize=0", tracks.len()),
            ["aout"],
        ));
    }

    graph.audio_out = Some("aout".to_string());
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: f64, end: f64) -> TimeRange {
        TimeRange { start, end }
    }

    #[test]
    fn test_segment_graph_shape() {
        let graph = segment_graph(12.5, 8.0).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.video_out.as_deref(), Some("v0"));
        assert_eq!(graph.audio_out.as_deref(), Some("a0"));
        let text = graph.serialize();
        assert!(text.contains("trim=start=12.500:end=20.500"));
        assert!(text.contains("atrim=start=12.500:end=20.500"));
    }

    #[test]
    fn test_segment_graph_rejects_bad_window() {
        assert!(segment_graph(-1.0, 5.0).is_err());
        assert!(segment_graph(0.0, 0.0).is_err());
    }

    #[test]
    fn test_complement_reconstructs_source() {
        let source = 60.0;
        let remove = vec![range(5.0, 10.0), range(20.0, 21.5), range(58.0, 60.0)];
        let keep = complement_ranges(source, &remove).unwrap();

        assert_eq!(keep.len(), 3);
        assert_eq!(keep[0], range(0.0, 5.0));
        assert_eq!(keep[1], range(10.0, 20.0));
        assert_eq!(keep[2], range(21.5, 58.0));

        // Union of keep and remove covers [0, 60) with no gaps or overlap
        let mut all: Vec<TimeRange> = keep.iter().chain(remove.iter()).copied().collect();
        all.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap());
        let mut cursor = 0.0;
        for r in &all {
            assert!((r.start - cursor).abs() < 1e-9, "gap or overlap at {cursor}");
            cursor = r.end;
        }
        assert!((cursor - source).abs() < 1e-9);
    }

    #[test]
    fn test_complement_no_head_or_tail() {
        let keep = complement_ranges(10.0, &[range(0.0, 3.0), range(8.0, 10.0)]).unwrap();
        assert_eq!(keep, vec![range(3.0, 8.0)]);
    }

    #[test]
    fn test_complement_rejects_overlap_and_disorder() {
        assert!(complement_ranges(10.0, &[range(2.0, 5.0), range(4.0, 6.0)]).is_err());
        assert!(complement_ranges(10.0, &[range(5.0, 6.0), range(1.0, 2.0)]).is_err());
        assert!(complement_ranges(10.0, &[range(5.0, 12.0)]).is_err());
        assert!(complement_ranges(10.0, &[range(0.0, 10.0)]).is_err());
    }

    #[test]
    fn test_dead_space_passthrough_when_empty() {
        assert!(dead_space_graph(30.0, &[]).unwrap().is_none());
    }

    #[test]
    fn test_dead_space_graph_concat() {
        let graph = dead_space_graph(30.0, &[range(10.0, 12.0)]).unwrap().unwrap();
        let text = graph.serialize();
        assert!(text.contains("concat=n=2:v=1:a=1"));
        assert!((graph.expected_duration.unwrap() - 28.0).abs() < 1e-9);
    }

    #[test]
    fn test_crossfade_running_duration() {
        // 10 + 8 + 12 with two 1s crossfades = 28
        let windows = [
            ClipWindow::new(0.0, 10.0),
            ClipWindow::new(20.0, 8.0),
            ClipWindow::new(40.0, 12.0),
        ];
        let graph = compilation_graph(
            &windows,
            TransitionSpec::new(TransitionKind::Crossfade, 1.0),
        )
        .unwrap();
        assert!((graph.expected_duration.unwrap() - 28.0).abs() < 1e-9);

        let text = graph.serialize();
        // First offset against the raw first clip, second against the
        // already-shortened timeline: 9.0, then 9 + 8 - 1 = 16.0
        assert!(text.contains("offset=9.000"));
        assert!(text.contains("offset=16.000"));
        assert!(text.contains("acrossfade=d=1.000:c1=tri:c2=tri"));
    }

    #[test]
    fn test_crossfade_recurrence_matches_closed_form() {
        let durations = [7.0, 3.0, 5.0, 9.0, 4.0];
        let d = 0.75;
        let windows: Vec<ClipWindow> = durations
            .iter()
            .scan(0.0, |acc, &dur| {
                let w = ClipWindow::new(*acc, dur);
                *acc += dur + 1.0;
                Some(w)
            })
            .collect();
        let graph =
            compilation_graph(&windows, TransitionSpec::new(TransitionKind::Crossfade, d))
                .unwrap();
        let expected: f64 =
            durations.iter().sum::<f64>() - (durations.len() - 1) as f64 * d;
        assert!((graph.expected_duration.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_crossfade_rejects_overlong_transition() {
        let windows = [ClipWindow::new(0.0, 2.0), ClipWindow::new(5.0, 10.0)];
        let err = compilation_graph(
            &windows,
            TransitionSpec::new(TransitionKind::Crossfade, 2.0),
        )
        .unwrap_err();
        assert!(matches!(err, MediaError::InvalidGraph(_)));
    }

    #[test]
    fn test_dip_to_black_fades() {
        let windows = [
            ClipWindow::new(0.0, 10.0),
            ClipWindow::new(20.0, 8.0),
            ClipWindow::new(40.0, 12.0),
        ];
        let graph = compilation_graph(
            &windows,
            TransitionSpec::new(TransitionKind::DipToBlack, 1.0),
        )
        .unwrap();
        let text = graph.serialize();

        // First clip fades out only; middle fades both ways; last fades in only
        assert!(text.contains("fade=t=out:st=9.500:d=0.500"));
        assert!(text.contains("fade=t=in:st=0:d=0.500"));
        // Fade-out start comes from each clip's own duration
        assert!(text.contains("fade=t=out:st=7.500:d=0.500"));
        // Plain concat, no timeline shortening
        assert!(text.contains("concat=n=3:v=1:a=1"));
        assert!((graph.expected_duration.unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_compilation_none_concat() {
        let windows = [ClipWindow::new(0.0, 4.0), ClipWindow::new(10.0, 6.0)];
        let graph = compilation_graph(&windows, TransitionSpec::cut()).unwrap();
        assert!(graph.serialize().contains("concat=n=2:v=1:a=1"));
        assert!((graph.expected_duration.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_crop_bounds_wide_source() {
        let g = vertical_crop_geometry(1920, 1080);
        assert_eq!(g.width, 608); // round(1080 * 9/16)
        assert_eq!(g.x, 656);
        assert!(g.x + g.width <= 1920);
    }

    #[test]
    fn test_vertical_crop_bounds_narrow_source() {
        // Narrower than 9:16: crop clamps to full width, origin stays 0
        let g = vertical_crop_geometry(500, 1920);
        assert_eq!(g.width, 500);
        assert_eq!(g.x, 0);
    }

    #[test]
    fn test_vertical_crop_bounds_exhaustive() {
        for (w, h) in [(100, 5000), (5000, 100), (1, 1), (1080, 1920), (3840, 2160)] {
            let g = vertical_crop_geometry(w, h);
            assert!(g.width >= 1);
            assert!(g.x + g.width <= w, "crop exceeds frame for {w}x{h}");
        }
    }

    #[test]
    fn test_escape_filter_path() {
        let escaped = escape_filter_path(Path::new("C:\\clips\\it's, done.ass"));
        assert_eq!(escaped, "C\\:/clips/it\\'s\\, done.ass");
    }

    #[test]
    fn test_caption_overlay_node() {
        let node = caption_overlay_node(Path::new("/tmp/c1.ass"), "v0", "vc");
        assert_eq!(node.filter, "subtitles=filename=/tmp/c1.ass");
        assert_eq!(node.inputs, vec!["v0"]);
    }

    // Backslash escapes only work outside a quoted string, so the filter
    // must not quote what escape_filter_path already escaped.
    #[test]
    fn test_caption_overlay_node_apostrophe_path() {
        let node = caption_overlay_node(Path::new("/tmp/it's done.ass"), "v0", "vc");
        assert_eq!(node.filter, "subtitles=filename=/tmp/it\\'s done.ass");
    }

    #[test]
    fn test_db_to_ratio() {
        assert!((db_to_ratio(0.0) - 1.0).abs() < 1e-9);
        assert!((db_to_ratio(-6.0) - 0.5012).abs() < 1e-3);
        assert!((db_to_ratio(-20.0) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_audio_mix_single_track_is_renamed() {
        let graph = audio_mix_graph(&[AudioTrackSpec::main(0)]).unwrap();
        let text = graph.serialize();
        assert!(!text.contains("amix"));
        assert!(text.ends_with("[aout]"));
        assert!(text.contains("volume=1.0000"));
    }

    #[test]
    fn test_audio_mix_roles_and_override() {
        let tracks = vec![
            AudioTrackSpec::main(0),
            AudioTrackSpec {
                input_index: 1,
                role: TrackRole::Music,
                ..AudioTrackSpec::main(1)
            },
            AudioTrackSpec {
                input_index: 2,
                role: TrackRole::Effects,
                volume_db: Some(-3.0),
                ..AudioTrackSpec::main(2)
            },
        ];
        let graph = audio_mix_graph(&tracks).unwrap();
        let text = graph.serialize();
        assert!(text.contains("amix=inputs=3:duration=longest"));
        // Music preset -18 dB
        assert!(text.contains(&format!("volume={:.4}", db_to_ratio(-18.0))));
        // Explicit override beats the effects preset
        assert!(text.contains(&format!("volume={:.4}", db_to_ratio(-3.0))));
        assert!(!text.contains(&format!("volume={:.4}", db_to_ratio(-6.0))));
    }

    #[test]
    fn test_audio_mix_fade_out_requires_trim() {
        let track = AudioTrackSpec {
            fade_out: Some(1.0),
            ..AudioTrackSpec::main(0)
        };
        assert!(audio_mix_graph(&[track]).is_err());

        let track = AudioTrackSpec {
            trim: Some(range(0.0, 10.0)),
            fade_out: Some(1.0),
            ..AudioTrackSpec::main(0)
        };
        let graph = audio_mix_graph(&[track]).unwrap();
        assert!(graph.serialize().contains("afade=t=out:st=9.000:d=1.000"));
    }

    #[test]
    fn test_audio_mix_delay_in_ms() {
        let track = AudioTrackSpec {
            delay: Some(1.25),
            ..AudioTrackSpec::main(0)
        };
        let graph = audio_mix_graph(&[track]).unwrap();
        assert!(graph.serialize().contains("adelay=1250:all=1"));
    }
}
