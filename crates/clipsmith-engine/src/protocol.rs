//! Streaming line protocol spoken by the analysis process.
//!
//! The process writes newline-delimited text to stdout. Stdout arrives as
//! unbounded chunks that may split a line anywhere, including inside the
//! terminal `RESULT:` payload (which can be megabytes of JSON), so complete
//! lines are dispatched only once their newline arrives and the trailing
//! fragment is held back for the next chunk.

/// One classified line from the analysis process.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    /// `PROGRESS:<percent>:<message>`
    Progress { percent: u8, message: String },
    /// `RESULT:<json>` — terminal success payload, kept raw for the caller
    /// to parse
    Result(String),
    /// `ERROR:<text>` — reported error condition, not fatal to parsing
    Error(String),
    /// `DEBUG:<text>` — informational only
    Debug(String),
}

/// Classify one complete line.
///
/// Only the first colon-delimited token after `PROGRESS:` is parsed as the
/// percent; the remainder is rejoined, so messages may themselves contain
/// colons. Lines without a known prefix are treated as debug output rather
/// than dropped, since the process may print through libraries it does not
/// control.
pub fn classify_line(line: &str) -> AnalysisEvent {
    if let Some(rest) = line.strip_prefix("PROGRESS:") {
        let (percent_token, message) = match rest.split_once(':') {
            Some((p, m)) => (p, m),
            None => (rest, ""),
        };
        if let Ok(percent) = percent_token.trim().parse::<u8>() {
            return AnalysisEvent::Progress {
                percent: percent.min(100),
                message: message.trim().to_string(),
            };
        }
        // Unparsable percent: keep the whole line visible rather than guess
        return AnalysisEvent::Debug(line.to_string());
    }
    if let Some(json) = line.strip_prefix("RESULT:") {
        return AnalysisEvent::Result(json.to_string());
    }
    if let Some(text) = line.strip_prefix("ERROR:") {
        return AnalysisEvent::Error(text.trim().to_string());
    }
    if let Some(text) = line.strip_prefix("DEBUG:") {
        return AnalysisEvent::Debug(text.trim().to_string());
    }
    AnalysisEvent::Debug(line.to_string())
}

/// Accumulates stdout chunks and yields complete classified lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of stdout bytes; returns the events for every line
    /// completed by this chunk. The trailing fragment (no newline yet) is
    /// held until the next chunk or [`LineBuffer::finish`].
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<AnalysisEvent> {
        self.pending.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                events.push(classify_line(line));
            }
        }
        events
    }

    /// Flush the buffer on process exit.
    ///
    /// A process that exits immediately after writing its final line without
    /// a trailing newline must not lose that result, so any remaining
    /// fragment is classified as if the newline had arrived.
    pub fn finish(&mut self) -> Option<AnalysisEvent> {
        let rest = std::mem::take(&mut self.pending);
        let rest = rest.trim_end_matches(['\n', '\r']);
        if rest.is_empty() {
            None
        } else {
            Some(classify_line(rest))
        }
    }
}
