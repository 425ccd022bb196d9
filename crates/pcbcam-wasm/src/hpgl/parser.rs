//! HPGL plotter program parser.
//!
//! Pen-up `PA` moves start a provisional curve; pen-down moves grow it into a
//! polyline. A pen-down right after a single pen-up move turns that move into
//! a plunge point.

use tracing::{debug, trace};

use crate::error::ParseError;
use crate::log::unknown_command;
use crate::model::{Bounds, BoundsTracker, Coord, Curve, CurveKind, Model, DEFAULT_TOOL};
use crate::parser::{percent, source_lines, Capability, Parser, Reporter};
use crate::session::{CancelToken, Observer, Outcome};

/// Micrometers per plotter unit (1/40 mm).
pub const PLOTTER_UNIT: i64 = 25;

/// Per-parse mutable state.
#[derive(Debug)]
struct Session {
    pen_up: bool,
    curves: Vec<Curve>,
    bounds: BoundsTracker,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            pen_up: true,
            curves: Vec::new(),
            bounds: BoundsTracker::default(),
        }
    }
}

impl Session {
    fn pen_down(&mut self) {
        self.pen_up = false;
        if let Some(curve) = self.curves.last_mut() {
            if curve.kind == CurveKind::None && curve.points.len() == 1 {
                curve.kind = CurveKind::Point;
            }
        }
    }

    fn plot(&mut self, at: Coord) {
        let start_new = self
            .curves
            .last()
            .map_or(true, |curve| self.pen_up && curve.kind != CurveKind::None);
        if start_new {
            self.curves.push(Curve {
                tool: DEFAULT_TOOL,
                ..Curve::default()
            });
        }

        if let Some(curve) = self.curves.last_mut() {
            if self.pen_up {
                curve.kind = CurveKind::None;
                curve.points.clear();
                curve.points.push(at);
            } else {
                curve.kind = CurveKind::Curve;
                curve.points.push(at);
            }
        }
        self.bounds.include(at);
    }

    /// Drops unresolved pen-up moves and turns one-vertex polylines into points.
    fn finish_curves(&mut self) -> Vec<Curve> {
        let mut curves = std::mem::take(&mut self.curves);
        curves.retain(|curve| curve.kind != CurveKind::None);
        for curve in &mut curves {
            if curve.kind == CurveKind::Curve && curve.points.len() < 2 {
                curve.kind = CurveKind::Point;
            }
        }
        curves
    }
}

/// Parser for HPGL plotter programs used as milling paths.
#[derive(Debug, Default)]
pub struct HpglParser {
    model: Model,
    session: Session,
    cancel: CancelToken,
}

impl HpglParser {
    /// Creates a parser with an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    fn run(
        &mut self,
        source: &[u8],
        report: &mut Reporter<'_>,
    ) -> Result<Outcome<()>, ParseError> {
        report.started("Loading HPGL");

        for line in source_lines(source) {
            if self.cancel.is_interrupted() {
                debug!(line = line.number, "hpgl parse interrupted");
                return Ok(Outcome::Interrupted);
            }

            report.progress(percent(line.offset, source.len()), 100);
            report.at_line(Some(line.number));

            let text = line.text.as_str();
            if text.is_empty() {
                continue;
            }
            trace!(line = line.number, text, "hpgl line");

            let Some(command) = text.strip_suffix(';') else {
                report.warning(unknown_command(text));
                continue;
            };

            if !self.execute(command) {
                report.warning(unknown_command(command));
            }
        }

        report.progress(100, 100);
        report.at_line(None);

        let bounds = self
            .session
            .bounds
            .bounds()
            .unwrap_or_else(|| Bounds::at(Coord::default()));
        report.accept(bounds.summary());

        let curves = self.session.finish_curves();
        debug!(curves = curves.len(), "hpgl parse complete");
        self.model = Model {
            curves,
            ..Model::default()
        };

        report.finished();
        Ok(Outcome::Completed(()))
    }

    /// Applies one command; returns `false` if it was not understood.
    fn execute(&mut self, command: &str) -> bool {
        if command.eq_ignore_ascii_case("IN")
            || starts_with_ignore_case(command, "PT")
            || starts_with_ignore_case(command, "SP")
        {
            return true;
        }

        if command.eq_ignore_ascii_case("PU") {
            self.session.pen_up = true;
            return true;
        }

        if command.eq_ignore_ascii_case("PD") {
            self.session.pen_down();
            return true;
        }

        if starts_with_ignore_case(command, "PA") {
            return match command.get(2..).and_then(parse_position) {
                Some(at) => {
                    self.session.plot(at);
                    true
                }
                None => false,
            };
        }

        false
    }
}

impl Parser for HpglParser {
    fn capability(&self) -> Capability {
        Capability::Milling
    }

    fn clear(&mut self) {
        self.model = Model::default();
        self.session = Session::default();
        self.cancel.reset();
    }

    fn parse(
        &mut self,
        source: &[u8],
        observer: &mut dyn Observer,
    ) -> Result<Outcome<()>, ParseError> {
        self.clear();
        let mut report = Reporter::new(observer);

        let result = self.run(source, &mut report);
        if !matches!(result, Ok(Outcome::Completed(()))) {
            self.model = Model::default();
            self.session = Session::default();
        }
        result
    }

    fn model(&self) -> &Model {
        &self.model
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Parses `<x>,<y>` plotter units into micrometers.
fn parse_position(arguments: &str) -> Option<Coord> {
    let (x, y) = arguments.split_once(',')?;
    let x = x.trim().parse::<i64>().ok()?.checked_mul(PLOTTER_UNIT)?;
    let y = y.trim().parse::<i64>().ok()?.checked_mul(PLOTTER_UNIT)?;
    Some(Coord::new(x, y))
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
