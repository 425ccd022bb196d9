//! Structured log records emitted while parsing.

use serde::Serialize;

use crate::session::Observer;

/// Longest command excerpt quoted in a log message.
const EXCERPT_CHARS: usize = 20;

/// Severity of a log record, ordered from informational to fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Successful completion summary.
    Accept,
    /// Informational state change.
    Notice,
    /// Recoverable problem; the offending line was skipped.
    Warning,
    /// The run was aborted.
    Error,
}

impl Severity {
    const fn slot(self) -> usize {
        match self {
            Self::Accept => 0,
            Self::Notice => 1,
            Self::Warning => 2,
            Self::Error => 3,
        }
    }
}

/// One message produced by a parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Severity of the message.
    pub severity: Severity,
    /// Human-readable text; may span several lines.
    pub message: String,
    /// 1-based source line, `None` for file-level summaries.
    pub line: Option<usize>,
}

impl LogRecord {
    /// Creates a record.
    pub fn new(severity: Severity, message: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            severity,
            message: message.into(),
            line,
        }
    }
}

/// A record stored in a [`LogBook`] with its per-severity ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// 1-based position among records of the same severity.
    pub order: u32,
    /// The record itself.
    #[serde(flatten)]
    pub record: LogRecord,
}

/// Collecting [`Observer`] that keeps every record in arrival order.
#[derive(Debug, Clone, Default)]
pub struct LogBook {
    entries: Vec<LogEntry>,
    counters: [u32; 4],
}

impl LogBook {
    /// Creates an empty log book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record, assigning its ordinal.
    pub fn push(&mut self, record: LogRecord) {
        let counter = self
            .counters
            .get_mut(record.severity.slot())
            .map_or(0, |counter| {
                *counter = counter.saturating_add(1);
                *counter
            });
        self.entries.push(LogEntry {
            order: counter,
            record,
        });
    }

    /// All entries in arrival order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of records with the given severity.
    pub fn count(&self, severity: Severity) -> u32 {
        self.counters.get(severity.slot()).copied().unwrap_or(0)
    }

    /// Whether any record of `severity` mentions `needle`.
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.record.severity == severity && entry.record.message.contains(needle))
    }

    /// Drops all entries and resets the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.counters = [0; 4];
    }
}

impl Observer for LogBook {
    fn log(&mut self, record: LogRecord) {
        self.push(record);
    }
}

/// Standard warning text for a line no parser stage recognized.
pub(crate) fn unknown_command(line: &str) -> String {
    format!("Unknown command: '{}'.", excerpt(line))
}

/// Shortens `line` to at most [`EXCERPT_CHARS`] characters plus an ellipsis.
pub(crate) fn excerpt(line: &str) -> String {
    if line.chars().count() > EXCERPT_CHARS {
        let head: String = line.chars().take(EXCERPT_CHARS).collect();
        format!("{head}...")
    } else {
        line.to_string()
    }
}
