//! Parser contract shared by the Excellon and HPGL front ends.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::ParseError;
use crate::excellon::ExcellonParser;
use crate::hpgl::HpglParser;
use crate::log::{LogRecord, Severity};
use crate::model::{Curve, Model, Tool};
use crate::session::{CancelToken, Observer, Outcome};

/// Kind of toolpath a parsed model is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Points to drill (Excellon).
    Drilling,
    /// Polylines to mill (HPGL).
    Milling,
}

/// Common interface of the input-format parsers.
///
/// A parser owns its session state and the model it builds. Every call to
/// [`Parser::parse`] starts from a cleared state. After a fatal error or an
/// interruption the model is left empty apart from the default tool.
pub trait Parser {
    /// Which generator the parsed model feeds.
    fn capability(&self) -> Capability;

    /// Resets the model and all session state.
    fn clear(&mut self);

    /// Consumes the whole `source`, reporting events to `observer`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Fatal`] when the input cannot be interpreted
    /// safely. The same message is logged with [`Severity::Error`] first.
    fn parse(
        &mut self,
        source: &[u8],
        observer: &mut dyn Observer,
    ) -> Result<Outcome<()>, ParseError>;

    /// The model built by the last parse.
    fn model(&self) -> &Model;

    /// Handle to this parser's interruption flag.
    fn cancel_token(&self) -> CancelToken;

    /// Tool table of the last parse.
    fn tools(&self) -> &BTreeMap<u32, Tool> {
        &self.model().tools
    }

    /// Curves of the last parse, in source order.
    fn curves(&self) -> &[Curve] {
        &self.model().curves
    }

    /// Requests interruption of the parse in progress.
    fn interrupt(&self) {
        self.cancel_token().interrupt();
    }
}

/// One of the two supported parsers.
#[derive(Debug)]
pub enum AnyParser {
    /// Excellon drill program parser.
    Excellon(ExcellonParser),
    /// HPGL plotter program parser.
    Hpgl(HpglParser),
}

impl AnyParser {
    /// Picks a parser from a file extension (`drl` or `plt`, any case).
    pub fn for_extension(extension: &str) -> Option<Self> {
        if extension.eq_ignore_ascii_case("drl") {
            Some(Self::Excellon(ExcellonParser::new()))
        } else if extension.eq_ignore_ascii_case("plt") {
            Some(Self::Hpgl(HpglParser::new()))
        } else {
            None
        }
    }

    /// Picks a parser from the extension of `file_name`.
    pub fn for_file_name(file_name: &str) -> Option<Self> {
        Path::new(file_name)
            .extension()
            .and_then(|extension| extension.to_str())
            .and_then(Self::for_extension)
    }

    fn inner(&self) -> &dyn Parser {
        match self {
            Self::Excellon(parser) => parser as &dyn Parser,
            Self::Hpgl(parser) => parser as &dyn Parser,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Parser {
        match self {
            Self::Excellon(parser) => parser as &mut dyn Parser,
            Self::Hpgl(parser) => parser as &mut dyn Parser,
        }
    }
}

impl Parser for AnyParser {
    fn capability(&self) -> Capability {
        self.inner().capability()
    }

    fn clear(&mut self) {
        self.inner_mut().clear();
    }

    fn parse(
        &mut self,
        source: &[u8],
        observer: &mut dyn Observer,
    ) -> Result<Outcome<()>, ParseError> {
        self.inner_mut().parse(source, observer)
    }

    fn model(&self) -> &Model {
        self.inner().model()
    }

    fn cancel_token(&self) -> CancelToken {
        self.inner().cancel_token()
    }
}

/// A trimmed input line with its position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceLine {
    /// 1-based line number.
    pub number: usize,
    /// Byte offset of the start of the line.
    pub offset: usize,
    /// Line content, Latin-1 decoded and trimmed.
    pub text: String,
}

/// Splits `source` into lines, tolerating both LF and CRLF endings.
pub(crate) fn source_lines(source: &[u8]) -> impl Iterator<Item = SourceLine> + '_ {
    source
        .split_inclusive(|&byte| byte == b'\n')
        .scan(0_usize, |offset, raw| {
            let start = *offset;
            *offset += raw.len();
            Some((start, raw))
        })
        .enumerate()
        .map(|(index, (offset, raw))| SourceLine {
            number: index + 1,
            offset,
            text: raw.iter().map(|&byte| char::from(byte)).collect::<String>().trim().to_string(),
        })
}

/// Percentage of `source_len` consumed before `offset`.
pub(crate) fn percent(offset: usize, source_len: usize) -> u64 {
    if source_len == 0 {
        return 100;
    }
    let offset = u128::from(u64::try_from(offset).unwrap_or(u64::MAX));
    let total = u128::from(u64::try_from(source_len).unwrap_or(u64::MAX));
    u64::try_from(offset.saturating_mul(100) / total).unwrap_or(100)
}

/// Log helper bound to an observer and the line being processed.
pub(crate) struct Reporter<'a> {
    observer: &'a mut dyn Observer,
    line: Option<usize>,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(observer: &'a mut dyn Observer) -> Self {
        Self {
            observer,
            line: None,
        }
    }

    /// Anchors subsequent records at `line`; `None` for file-level records.
    pub(crate) fn at_line(&mut self, line: Option<usize>) {
        self.line = line;
    }

    pub(crate) fn accept(&mut self, message: impl Into<String>) {
        self.emit(Severity::Accept, message.into());
    }

    pub(crate) fn notice(&mut self, message: impl Into<String>) {
        self.emit(Severity::Notice, message.into());
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>) {
        self.emit(Severity::Warning, message.into());
    }

    /// Logs `message` as an error and returns the matching fatal error.
    pub(crate) fn fatal(&mut self, message: impl Into<String>) -> ParseError {
        let message = message.into();
        self.emit(Severity::Error, message.clone());
        ParseError::fatal(message, self.line)
    }

    pub(crate) fn started(&mut self, operation: &str) {
        self.observer.started(operation);
    }

    pub(crate) fn progress(&mut self, done: u64, total: u64) {
        self.observer.progress(done, total);
    }

    pub(crate) fn finished(&mut self) {
        self.observer.finished();
    }

    fn emit(&mut self, severity: Severity, message: String) {
        self.observer.log(LogRecord::new(severity, message, self.line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_numbered_and_trimmed() {
        let lines: Vec<SourceLine> = source_lines(b"M48\r\n\r\n  METRIC \nM30").collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines.iter().map(|line| line.text.as_str()).collect::<Vec<_>>(),
            vec!["M48", "", "METRIC", "M30"]
        );
        assert_eq!(
            lines.iter().map(|line| line.offset).collect::<Vec<_>>(),
            vec![0, 5, 7, 17]
        );
        assert_eq!(lines.last().map(|line| line.number), Some(4));
    }

    #[test]
    fn trailing_newline_adds_no_line() {
        assert_eq!(source_lines(b"IN;\nPU;\n").count(), 2);
        assert_eq!(source_lines(b"").count(), 0);
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent(0, 200), 0);
        assert_eq!(percent(100, 200), 50);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn parser_selected_by_extension() {
        assert!(matches!(
            AnyParser::for_file_name("board.DRL"),
            Some(AnyParser::Excellon(_))
        ));
        assert!(matches!(
            AnyParser::for_file_name("/tmp/outline.plt"),
            Some(AnyParser::Hpgl(_))
        ));
        assert!(AnyParser::for_file_name("board.gbr").is_none());
        assert!(AnyParser::for_file_name("drl").is_none());
    }

    #[test]
    fn capability_follows_variant() {
        let drill = AnyParser::for_extension("drl").map(|parser| parser.capability());
        let mill = AnyParser::for_extension("plt").map(|parser| parser.capability());
        assert_eq!(drill, Some(Capability::Drilling));
        assert_eq!(mill, Some(Capability::Milling));
    }
}
