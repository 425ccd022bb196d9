//! Error types for the parsing pipeline.

use thiserror::Error;

/// Conditions that abort a parse.
///
/// Recoverable problems are reported as warnings through the log and never
/// surface here. An interrupted parse is not an error either; see
/// [`crate::session::Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input cannot be interpreted safely; the partial model was discarded.
    #[error("{message}")]
    Fatal {
        /// Human-readable description, identical to the logged error record.
        message: String,
        /// Source line that triggered the failure, if any.
        line: Option<usize>,
    },
}

impl ParseError {
    /// Creates a fatal error anchored at `line`.
    pub fn fatal(message: impl Into<String>, line: Option<usize>) -> Self {
        Self::Fatal {
            message: message.into(),
            line,
        }
    }

    /// Source line of the failure, if known.
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::Fatal { line, .. } => *line,
        }
    }
}

/// Errors raised by the host-facing API around the parsers and generators.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A parser reported a fatal condition.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The file extension does not map to a known parser.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// No parsed model is available, or it cannot feed the requested generator.
    #[error("no {0} model loaded")]
    NoModel(&'static str),

    /// A generator stopped before producing a program.
    #[error("operation interrupted")]
    Interrupted,

    /// A configuration or result could not cross the JS boundary.
    #[error("serialization error: {0}")]
    Serialization(String),
}
