//! Event input: decoding of JSON Lines event files and preselection

use crate::{
    event::{Event, EventRecord},
    preselection::Preselection,
    Result,
};
use eyre::WrapErr;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use tracing::warn;

/// Bookkeeping of what happened to the records of one or more files
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Non-blank lines read
    pub records: usize,

    /// Records which could not be decoded
    pub malformed: usize,

    /// Decoded events dropped by the preselection
    pub rejected: usize,
}
//
impl ReadStats {
    /// Records handed over to the analysis
    pub fn examined(&self) -> usize {
        self.records - self.rejected
    }

    /// Combine the statistics of another input
    pub fn merge(&mut self, other: Self) {
        self.records += other.records;
        self.malformed += other.malformed;
        self.rejected += other.rejected;
    }
}

/// Iterator over the records of an event file which pass the preselection
///
/// Malformed records are yielded as `EventRecord::Malformed` so that the
/// analysis can account for them. I/O errors are fatal.
pub struct EventReader<'presel, R: BufRead> {
    /// Name of the input, for diagnostics
    name: PathBuf,

    /// Line-oriented input
    input: R,

    /// Raw bytes of the current line
    buffer: Vec<u8>,

    /// Current line number (1-based)
    line_no: usize,

    /// Expression which decoded events must satisfy
    preselection: &'presel Preselection,

    /// What happened so far
    stats: ReadStats,
}
//
impl<'presel> EventReader<'presel, BufReader<File>> {
    /// Open an event file
    pub fn open(path: &Path, preselection: &'presel Preselection) -> Result<Self> {
        let file = File::open(path)
            .wrap_err_with(|| format!("Failed to open event file {}", path.display()))?;
        Ok(Self::new(path, BufReader::new(file), preselection))
    }
}
//
impl<'presel, R: BufRead> EventReader<'presel, R> {
    /// Read events from an arbitrary buffered input
    pub fn new(name: impl Into<PathBuf>, input: R, preselection: &'presel Preselection) -> Self {
        Self {
            name: name.into(),
            input,
            buffer: Vec::new(),
            line_no: 0,
            preselection,
            stats: ReadStats::default(),
        }
    }

    /// What happened so far
    pub fn stats(&self) -> ReadStats {
        self.stats
    }
}
//
impl<R: BufRead> Iterator for EventReader<'_, R> {
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Lines are decoded as raw bytes, so that bad encodings are
            // malformed records rather than I/O errors
            self.buffer.clear();
            match self.input.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    return Some(Err(e).wrap_err_with(|| {
                        format!("Failed to read {} after line {}", self.name.display(), self.line_no)
                    }))
                }
            }
            self.line_no += 1;
            if self.buffer.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            self.stats.records += 1;

            // Undecodable records bypass the preselection
            let event = match serde_json::from_slice::<Event>(&self.buffer) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        "Malformed record at {}:{}: {e}",
                        self.name.display(),
                        self.line_no
                    );
                    self.stats.malformed += 1;
                    return Some(Ok(EventRecord::Malformed));
                }
            };

            if self.preselection.accepts(&event) {
                return Some(Ok(EventRecord::Valid(event)));
            }
            self.stats.rejected += 1;
        }
    }
}
