use std::fmt;

/// Announces a finished segment to whatever maintains the playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRecord {
    pub first_sequence: u32,
    pub last_sequence: u32,
    /// The stream has ended; no further segments follow.
    pub is_final: bool,
    pub encoding_profile: String,
    pub duration_seconds: f64,
}

impl fmt::Display for CompletionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "segmenter: {}, {}, {}, {}, {:.2}",
            self.first_sequence,
            self.last_sequence,
            u8::from(self.is_final),
            self.encoding_profile,
            self.duration_seconds
        )
    }
}

pub trait CompletionReporter: Send {
    fn segment_complete(&mut self, record: &CompletionRecord);
}

/// Writes records to stderr, one per line terminated by `\n\r`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrReporter;

impl CompletionReporter for StderrReporter {
    fn segment_complete(&mut self, record: &CompletionRecord) {
        eprint!("{}\n\r", record);
    }
}

impl CompletionReporter for Vec<CompletionRecord> {
    fn segment_complete(&mut self, record: &CompletionRecord) {
        self.push(record.clone());
    }
}
