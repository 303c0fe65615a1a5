//! ASS subtitle generation for clip exports.
//!
//! Transcript timing (segment-level when the detector provides it, word-level
//! otherwise) is clipped to one clip's window, re-zeroed to clip-relative
//! seconds, wrapped, and emitted as styled Dialogue events.

use std::path::Path;

use clipsmith_models::{CaptionStyle, Transcript, TranscriptSegment};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::MediaResult;

/// New segment when the gap since the previous word exceeds this.
const WORD_GAP_SECS: f64 = 0.6;

/// New segment when the current one reaches this many words.
const MAX_WORDS_PER_SEGMENT: usize = 8;

/// Events shorter than this after window clipping are dropped.
const MIN_EVENT_SECS: f64 = 0.1;

/// Word-wrap width in characters.
const MAX_CHARS_PER_LINE: usize = 32;

/// Lines beyond this are dropped, not scrolled.
const MAX_LINES: usize = 2;

/// One subtitle event in clip-relative seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionEvent {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Format clip-relative seconds as an ASS timecode (`H:MM:SS.CC`).
pub fn ass_timestamp(seconds: f64) -> String {
    let clamped = seconds.max(0.0);
    let total_cs = (clamped * 100.0).round() as u64;
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;
    format!("{hours}:{mins:02}:{secs:02}.{cs:02}")
}

/// Synthesize segments from word-level timing.
///
/// A new segment starts when the silence since the previous word exceeds
/// [`WORD_GAP_SECS`] or the current segment holds [`MAX_WORDS_PER_SEGMENT`]
/// words.
fn segments_from_words(transcript: &Transcript) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    let mut text_parts: Vec<&str> = Vec::new();
    let mut seg_start = 0.0;
    let mut seg_end = 0.0;

    for word in &transcript.words {
        let trimmed = word.word.trim();
        if trimmed.is_empty() {
            continue;
        }

        let starts_new = !text_parts.is_empty()
            && (word.start - seg_end > WORD_GAP_SECS
                || text_parts.len() >= MAX_WORDS_PER_SEGMENT);

        if starts_new {
            segments.push(TranscriptSegment {
                start: seg_start,
                end: seg_end,
                text: text_parts.join(" "),
            });
            text_parts.clear();
        }

        if text_parts.is_empty() {
            seg_start = word.start;
        }
        text_parts.push(trimmed);
        seg_end = word.end;
    }

    if !text_parts.is_empty() {
        segments.push(TranscriptSegment {
            start: seg_start,
            end: seg_end,
            text: text_parts.join(" "),
        });
    }

    segments
}

/// Clip transcript segments to `[clip_start, clip_end)` and re-zero their
/// timing relative to `clip_start`.
///
/// Segments fully outside the window are discarded, as are events whose
/// clipped duration falls below [`MIN_EVENT_SECS`].
pub fn events_for_window(
    transcript: &Transcript,
    clip_start: f64,
    clip_end: f64,
) -> Vec<CaptionEvent> {
    let synthesized;
    let segments: &[TranscriptSegment] = if transcript.has_segments() {
        &transcript.segments
    } else {
        synthesized = segments_from_words(transcript);
        &synthesized
    };

    let window = clip_end - clip_start;
    let mut events = Vec::new();

    for segment in segments {
        if segment.end <= clip_start || segment.start >= clip_end {
            continue;
        }
        let rel_start = (segment.start - clip_start).max(0.0);
        let rel_end = (segment.end - clip_start).min(window);
        if rel_end - rel_start < MIN_EVENT_SECS {
            continue;
        }
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }
        events.push(CaptionEvent {
            start: rel_start,
            end: rel_end,
            text: text.to_string(),
        });
    }

    events
}

/// Word-wrap text to [`MAX_CHARS_PER_LINE`] and join with ASS hard breaks.
/// Lines past [`MAX_LINES`] are dropped.
pub fn wrap_caption_text(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let additional = if current.is_empty() {
            word.chars().count()
        } else {
            word.chars().count() + 1
        };
        if !current.is_empty() && current.chars().count() + additional > MAX_CHARS_PER_LINE {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.truncate(MAX_LINES);
    lines.join("\\N")
}

/// Render a complete ASS document for the given events and style.
pub fn render_ass(events: &[CaptionEvent], style: &CaptionStyle) -> String {
    let mut doc = String::with_capacity(512 + events.len() * 80);

    doc.push_str("[Script Info]\n");
    doc.push_str("ScriptType: v4.00+\n");
    doc.push_str("PlayResX: 1080\n");
    doc.push_str("PlayResY: 1920\n");
    doc.push_str("WrapStyle: 2\n");
    doc.push_str("ScaledBorderAndShadow: yes\n\n");

    doc.push_str("[V4+ Styles]\n");
    doc.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    doc.push_str(&format!(
        "Style: Clip,{},{},&H00FFFFFF,&H00FFFFFF,&H00000000,&H80000000,0,0,0,0,100,100,0,0,1,\
         {:.1},{:.1},{},40,40,{},1\n\n",
        style.font,
        style.font_size,
        style.outline,
        style.shadow,
        style.alignment.ass_code(),
        style.margin_v,
    ));

    doc.push_str("[Events]\n");
    doc.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
    for event in events {
        doc.push_str(&format!(
            "Dialogue: 0,{},{},Clip,,0,0,0,,{}\n",
            ass_timestamp(event.start),
            ass_timestamp(event.end),
            wrap_caption_text(&event.text),
        ));
    }

    doc
}

/// Generate and write an ASS sidecar for one clip window.
///
/// Returns `Ok(false)` without writing when no events survive the window,
/// so the caller can skip the overlay stage entirely.
pub async fn write_clip_subtitles(
    transcript: &Transcript,
    clip_start: f64,
    clip_end: f64,
    style: &CaptionStyle,
    output_path: &Path,
) -> MediaResult<bool> {
    let events = events_for_window(transcript, clip_start, clip_end);
    if events.is_empty() {
        debug!(
            clip_start,
            clip_end, "No caption events in clip window, skipping subtitle file"
        );
        return Ok(false);
    }

    let doc = render_ass(&events, style);
    let mut file = tokio::fs::File::create(output_path).await?;
    file.write_all(doc.as_bytes()).await?;
    file.flush().await?;
    debug!(path = %output_path.display(), events = events.len(), "Wrote subtitle sidecar");
    Ok(true)
}
