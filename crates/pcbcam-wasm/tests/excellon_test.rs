//! Integration tests for Excellon drill parsing.

use pcbcam_wasm::excellon::{ExcellonParser, NumberFormat, Units};
use pcbcam_wasm::log::{LogBook, Severity};
use pcbcam_wasm::parser::{AnyParser, Capability, Parser};
use pcbcam_wasm::session::{CancelToken, Observer, Outcome};
use pcbcam_wasm::{parse_excellon_internal, RunState};

fn parse(data: &[u8]) -> (ExcellonParser, LogBook, Outcome<()>) {
    let mut parser = ExcellonParser::new();
    let mut book = LogBook::new();
    let result = parser.parse(data, &mut book);
    assert!(result.is_ok(), "expected Ok, got Err: {:?}", result.as_ref().err());
    let outcome = result.unwrap_or(Outcome::Interrupted);
    (parser, book, outcome)
}

fn points(parser: &ExcellonParser) -> Vec<(u32, i64, i64)> {
    parser
        .curves()
        .iter()
        .filter_map(|curve| curve.first().map(|at| (curve.tool, at.x, at.y)))
        .collect()
}

/// Parse a decimal metric drill file → correct hole count, tools and bounds.
#[test]
#[allow(clippy::expect_used)]
fn metric_decimal_fixture_meta() {
    let data = include_bytes!("fixtures/metric_decimal.drl");
    let result = parse_excellon_internal(data);
    assert!(
        result.is_ok(),
        "expected Ok, got Err: {:?}",
        result.as_ref().err()
    );
    let meta = result.as_ref().expect("assert!(result.is_ok()) above");
    assert_eq!(meta.state, RunState::Completed);
    assert_eq!(meta.capability, Capability::Drilling);
    assert_eq!(meta.curve_count, 6);
    assert_eq!(meta.tool_count, 3);
    assert_eq!(meta.warning_count, 0);

    let bounds = meta.bounds.expect("six points give bounds");
    assert_eq!((bounds.min_x, bounds.max_x), (10_000, 30_000));
    assert_eq!((bounds.min_y, bounds.max_y), (10_000, 20_000));
}

/// The accept summary reports the boundaries in millimeters.
#[test]
fn metric_decimal_summary() {
    let (parser, book, outcome) = parse(include_bytes!("fixtures/metric_decimal.drl"));
    assert_eq!(outcome, Outcome::Completed(()));
    assert_eq!(parser.format(), NumberFormat::Format33);
    assert!(book.contains(
        Severity::Accept,
        "Xmin = 10 mm, Xmax = 30 mm, \u{394}X = 20 mm"
    ));
    assert_eq!(
        points(&parser),
        vec![
            (1, 10_000, 10_000),
            (1, 20_000, 10_000),
            (1, 30_000, 10_000),
            (2, 10_000, 20_000),
            (2, 20_000, 20_000),
            (2, 30_000, 20_000),
        ]
    );
}

/// Inch files with leading zeros are read as 2.4 and scaled by 25.4.
#[test]
fn inch_fixture_with_crlf_line_endings() {
    let (parser, book, outcome) = parse(include_bytes!("fixtures/inch_24.drl"));
    assert_eq!(outcome, Outcome::Completed(()));
    assert_eq!(parser.units(), Units::Inch);
    assert_eq!(parser.format(), NumberFormat::Format24);
    assert_eq!(
        points(&parser),
        vec![(1, 2_540, 2_540), (1, 5_080, 2_540), (2, -3_810, 7_620)]
    );
    assert_eq!(parser.model().diameter(1), 800);
    assert_eq!(parser.model().diameter(2), 1_020);
    assert_eq!(book.count(Severity::Warning), 0);
}

/// Points read before the format is known are recalculated afterwards.
#[test]
fn six_digit_tokens_resolve_earlier_points() {
    let (parser, book, outcome) = parse(include_bytes!("fixtures/autodetect_6digit.drl"));
    assert_eq!(outcome, Outcome::Completed(()));
    assert_eq!(parser.format(), NumberFormat::Format33);
    assert_eq!(
        points(&parser),
        vec![(1, 2_500, 1_500), (1, 12_000, 13_000), (1, 500, -1_000)]
    );
    assert_eq!(book.count(Severity::Warning), 1);
    assert!(book.contains(Severity::Warning, "set to 3.3"));
}

#[test]
fn five_digit_tokens_infer_3_2() {
    let (parser, book, outcome) = parse(include_bytes!("fixtures/autodetect_5digit.drl"));
    assert_eq!(outcome, Outcome::Completed(()));
    assert_eq!(parser.format(), NumberFormat::Format32);
    assert_eq!(
        points(&parser),
        vec![(1, 15_000, 25_000), (1, 500, -1_000)]
    );
    assert!(book.contains(Severity::Warning, "set to 3.2"));
}

/// No token ever reveals the format → fatal error with export advice.
#[test]
fn undetectable_format_fails_and_clears_model() {
    let mut parser = ExcellonParser::new();
    let mut book = LogBook::new();
    let result = parser.parse(include_bytes!("fixtures/undetectable.drl"), &mut book);
    assert!(result.is_err(), "expected Err, got {result:?}");
    assert_eq!(book.count(Severity::Error), 1);
    assert!(book.contains(Severity::Error, "keep leading zeros"));
    assert!(parser.curves().is_empty());
    assert_eq!(parser.tools().len(), 1);
}

/// A parser can be reused; each run starts from a clean state.
#[test]
fn parser_reuse_is_deterministic() {
    let mut parser = ExcellonParser::new();
    let data = include_bytes!("fixtures/autodetect_6digit.drl");

    let first = parser.parse(data, &mut LogBook::new());
    let first_curves = parser.curves().to_vec();
    let first_tools = parser.tools().clone();

    assert!(parser
        .parse(include_bytes!("fixtures/undetectable.drl"), &mut LogBook::new())
        .is_err());

    let second = parser.parse(data, &mut LogBook::new());
    assert_eq!(first, second);
    assert_eq!(parser.curves(), first_curves.as_slice());
    assert_eq!(parser.tools(), &first_tools);
}

#[test]
fn parser_is_chosen_by_extension() {
    let parser = AnyParser::for_file_name("board/holes.DRL");
    assert!(matches!(parser, Some(AnyParser::Excellon(_))));
    assert!(AnyParser::for_file_name("board.gbr").is_none());
    assert!(AnyParser::for_file_name("drl").is_none());
}

struct InterruptAt {
    token: CancelToken,
    at: u64,
    last_done: u64,
    operations: Vec<String>,
}

impl Observer for InterruptAt {
    fn started(&mut self, operation: &str) {
        self.operations.push(operation.to_string());
    }

    fn progress(&mut self, done: u64, _total: u64) {
        self.last_done = done;
        if done >= self.at {
            self.token.interrupt();
        }
    }
}

/// A 10 000-line program interrupted part-way yields no model and no error.
#[test]
fn long_program_can_be_interrupted() {
    let mut source = String::from("M48\nMETRIC\nT1C0.5\n%\nG05\nT1\n");
    for i in 0..10_000 {
        source.push_str(&format!("X{}.0Y{}.0\n", i % 100, i / 100));
    }
    source.push_str("M30\n");

    let mut parser = ExcellonParser::new();
    let mut observer = InterruptAt {
        token: parser.cancel_token(),
        at: 50,
        last_done: 0,
        operations: Vec::new(),
    };
    let result = parser.parse(source.as_bytes(), &mut observer);
    assert_eq!(result, Ok(Outcome::Interrupted));
    assert!(observer.last_done < 100);
    assert_eq!(observer.operations, vec!["Loading Excellon".to_string()]);
    assert!(parser.curves().is_empty());

    // The flag is cleared by the next parse.
    let result = parser.parse(source.as_bytes(), &mut LogBook::new());
    assert_eq!(result, Ok(Outcome::Completed(())));
    assert_eq!(parser.curves().len(), 10_000);
}

#[derive(Default)]
struct ProgressLog {
    operations: Vec<String>,
    reports: Vec<(u64, u64)>,
    finished: bool,
}

impl Observer for ProgressLog {
    fn started(&mut self, operation: &str) {
        self.operations.push(operation.to_string());
        self.reports.clear();
    }

    fn progress(&mut self, done: u64, total: u64) {
        if let Some(&(previous, _)) = self.reports.last() {
            assert!(done >= previous, "progress went backwards");
        }
        self.reports.push((done, total));
    }

    fn finished(&mut self) {
        self.finished = true;
    }
}

/// The recalculation pass reports as its own operation.
#[test]
fn progress_is_monotonic_per_operation() {
    let mut parser = ExcellonParser::new();
    let mut observer = ProgressLog::default();
    let result = parser.parse(include_bytes!("fixtures/autodetect_6digit.drl"), &mut observer);
    assert_eq!(result, Ok(Outcome::Completed(())));
    assert_eq!(
        observer.operations,
        vec!["Loading Excellon".to_string(), "Recalculating Points".to_string()]
    );
    assert_eq!(observer.reports.last(), Some(&(3, 3)));
    assert!(observer.finished);
}
