//! Integration tests for HPGL plotter program parsing.

use pcbcam_wasm::hpgl::HpglParser;
use pcbcam_wasm::log::{LogBook, Severity};
use pcbcam_wasm::model::CurveKind;
use pcbcam_wasm::parser::{AnyParser, Capability, Parser};
use pcbcam_wasm::session::{CancelToken, Observer, Outcome};
use pcbcam_wasm::{parse_hpgl_internal, RunState};

/// Parse the board fixture → one closed outline and one plunge point.
#[test]
#[allow(clippy::expect_used)]
fn board_fixture_meta() {
    let data = include_bytes!("fixtures/board.plt");
    let result = parse_hpgl_internal(data);
    assert!(
        result.is_ok(),
        "expected Ok, got Err: {:?}",
        result.as_ref().err()
    );
    let meta = result.as_ref().expect("assert!(result.is_ok()) above");
    assert_eq!(meta.state, RunState::Completed);
    assert_eq!(meta.capability, Capability::Milling);
    assert_eq!(meta.curve_count, 2);
    assert_eq!(meta.tool_count, 1);
    assert_eq!(meta.warning_count, 0);
}

#[test]
fn board_fixture_curves() {
    let mut parser = HpglParser::new();
    let mut book = LogBook::new();
    let result = parser.parse(include_bytes!("fixtures/board.plt"), &mut book);
    assert_eq!(result, Ok(Outcome::Completed(())));

    let curves = parser.curves();
    assert_eq!(curves.len(), 2);

    let outline: Vec<(i64, i64)> = curves
        .first()
        .map(|curve| curve.points.iter().map(|at| (at.x, at.y)).collect())
        .unwrap_or_default();
    assert_eq!(
        outline,
        vec![(0, 0), (10_000, 0), (10_000, 10_000), (0, 10_000), (0, 0)]
    );
    assert_eq!(curves.first().map(|curve| curve.kind), Some(CurveKind::Curve));

    let point = curves.get(1);
    assert_eq!(point.map(|curve| curve.kind), Some(CurveKind::Point));
    assert_eq!(
        point.and_then(|curve| curve.first()).map(|at| (at.x, at.y)),
        Some((20_000, 20_000))
    );

    // The trailing pen-up move still widens the reported boundaries.
    assert!(book.contains(Severity::Accept, "Xmax = 30 mm"));
}

/// Every resolved curve is a single point or a polyline of two or more vertices.
#[test]
fn resolved_curves_have_consistent_shapes() {
    let source = "IN;\nPU;\nPA1,1;\nPA2,2;\nPD;\nPA3,3;\nPU;\nPA4,4;\nPD;\nPU;\nPA5,5;\nPD;\nPA6,6;\nPA7,7;\n";
    let mut parser = HpglParser::new();
    let result = parser.parse(source.as_bytes(), &mut LogBook::new());
    assert_eq!(result, Ok(Outcome::Completed(())));
    assert!(!parser.curves().is_empty());
    for curve in parser.curves() {
        match curve.kind {
            CurveKind::Point => assert_eq!(curve.points.len(), 1),
            CurveKind::Curve => assert!(curve.points.len() >= 2),
            CurveKind::None => unreachable!("unresolved curve survived the parse"),
        }
    }
}

#[test]
fn unknown_and_unterminated_commands_warn() {
    let mut parser = HpglParser::new();
    let mut book = LogBook::new();
    let result = parser.parse(b"IN;\nVS10;\nPA1,1\nPD;\nPA2,x;\n", &mut book);
    assert_eq!(result, Ok(Outcome::Completed(())));
    assert_eq!(book.count(Severity::Warning), 3);
    assert!(book.contains(Severity::Warning, "Unknown command: 'VS10'."));
    assert!(book.contains(Severity::Warning, "Unknown command: 'PA1,1'."));
    assert!(parser.curves().is_empty());
}

#[test]
fn parser_is_chosen_by_extension() {
    let parser = AnyParser::for_file_name("outline.Plt");
    assert!(matches!(parser, Some(AnyParser::Hpgl(_))));
    assert_eq!(
        parser.map(|parser| parser.capability()),
        Some(Capability::Milling)
    );
}

struct StopImmediately(CancelToken);

impl Observer for StopImmediately {
    fn progress(&mut self, _done: u64, _total: u64) {
        self.0.interrupt();
    }
}

#[test]
fn interrupted_parse_keeps_no_curves() {
    let mut parser = HpglParser::new();
    let mut observer = StopImmediately(parser.cancel_token());
    let result = parser.parse(include_bytes!("fixtures/board.plt"), &mut observer);
    assert_eq!(result, Ok(Outcome::Interrupted));
    assert!(parser.curves().is_empty());
}
