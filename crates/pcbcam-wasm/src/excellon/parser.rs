//! Excellon drill parser.
//!
//! The parser runs in two phases. The first phase walks the program line by
//! line through the [`Stage`] state machine, converting coordinates to
//! micrometers when the number format allows it and keeping the raw tokens
//! otherwise. If any token was left pending, a second phase re-reads those
//! tokens once the whole file has been seen and the format is known.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::error::ParseError;
use crate::log::{excerpt, unknown_command};
use crate::model::{BoundsTracker, Coord, Curve, Model, Tool, DEFAULT_TOOL};
use crate::number::{parse_rightmost_digits, scale_decimal, split_sign};
use crate::parser::{percent, source_lines, Capability, Parser, Reporter};
use crate::session::{CancelToken, Observer, Outcome};

use super::types::{DrillPoint, NumberFormat, Position, Stage, Units};

/// Inch-to-micrometer factor applied to ten-thousandths of an inch.
const INCH_NUMERATOR: i64 = 254;
const INCH_DENOMINATOR: i64 = 100;

const FORMAT_ADVICE: &str = "Unable to determine the number presentation format.\n\
    Try to change the Excellon export configuration in the Sprint-Layout:\n\
    - keep leading zeros,\n\
    - use the output with a decimal point,\n\
    - do not suppress comments.";

const UNITS_OUTSIDE_HEADER: &str = "An unexpected occurrence of the measuring system change \
    command.\nThe units of measurement can only be defined inside the header.";

/// Unit system and number format in effect while reading coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Notation {
    units: Units,
    format: NumberFormat,
}

impl Notation {
    /// Converts a signed numeric token to micrometers.
    ///
    /// Returns `None` when the token cannot be interpreted yet. A metric token
    /// without a decimal point may fix an unknown format as a side effect.
    fn parse(&mut self, token: &str, report: &mut Reporter<'_>) -> Option<i64> {
        let (negative, unsigned) = split_sign(token);
        if unsigned.is_empty() {
            return None;
        }

        let value = match (self.units, unsigned.split_once('.')) {
            (Units::Unknown, _) => None,
            (units, Some((integer, fraction))) => Self::parse_decimal(units, integer, fraction),
            (Units::Inch, None) => parse_rightmost_digits(unsigned, 6).and_then(inch_to_microns),
            (Units::Metric, None) => self.parse_metric_digits(unsigned, report),
        }?;

        Some(if negative { -value } else { value })
    }

    /// Whether `token` has a decimal point yet cannot be converted, so no
    /// number format would ever resolve it.
    fn rejects_decimal(self, token: &str) -> bool {
        let (_, unsigned) = split_sign(token);
        unsigned.split_once('.').is_some_and(|(integer, fraction)| {
            Self::parse_decimal(self.units, integer, fraction).is_none()
        })
    }

    fn parse_decimal(units: Units, integer: &str, fraction: &str) -> Option<i64> {
        match units {
            Units::Unknown => None,
            Units::Inch => scale_decimal(integer, fraction, 4).and_then(inch_to_microns),
            Units::Metric => scale_decimal(integer, fraction, 3),
        }
    }

    fn parse_metric_digits(&mut self, digits: &str, report: &mut Reporter<'_>) -> Option<i64> {
        match self.format {
            NumberFormat::Format32 => parse_rightmost_digits(digits, 5)?.checked_mul(10),
            NumberFormat::Format33 => parse_rightmost_digits(digits, 6),
            NumberFormat::Unknown | NumberFormat::Format24 => {
                if digits.len() == 6 {
                    let value = parse_rightmost_digits(digits, 6)?;
                    self.detect(NumberFormat::Format33, report);
                    Some(value)
                } else if digits.len() == 5 && digits.starts_with('0') {
                    let value = parse_rightmost_digits(digits, 5)?.checked_mul(10)?;
                    self.detect(NumberFormat::Format32, report);
                    Some(value)
                } else {
                    None
                }
            }
        }
    }

    fn detect(&mut self, format: NumberFormat, report: &mut Reporter<'_>) {
        debug!(%format, "inferred number format from digit count");
        self.format = format;
        report.warning(format!(
            "The actual number presentation format is set to {format}. \
             Check the output program carefully."
        ));
    }
}

/// Per-parse mutable state, reset wholesale by [`ExcellonParser::clear`].
#[derive(Debug, Default)]
struct Session {
    stage: Stage,
    notation: Notation,
    tool: u32,
    tools: BTreeMap<u32, Tool>,
    points: Vec<DrillPoint>,
    bounds: BoundsTracker,
    needs_recalculation: bool,
}

/// Parser for Excellon drill programs.
#[derive(Debug, Default)]
pub struct ExcellonParser {
    model: Model,
    session: Session,
    cancel: CancelToken,
}

impl ExcellonParser {
    /// Creates a parser with an empty model.
    pub fn new() -> Self {
        let mut parser = Self::default();
        parser.clear();
        parser
    }

    /// Unit system of the last parse.
    pub const fn units(&self) -> Units {
        self.session.notation.units
    }

    /// Number format of the last parse, declared or inferred.
    pub const fn format(&self) -> NumberFormat {
        self.session.notation.format
    }

    /// Stage the last parse ended in.
    pub const fn stage(&self) -> Stage {
        self.session.stage
    }

    fn run(
        &mut self,
        source: &[u8],
        report: &mut Reporter<'_>,
    ) -> Result<Outcome<()>, ParseError> {
        report.started("Loading Excellon");

        for line in source_lines(source) {
            if self.cancel.is_interrupted() {
                debug!(line = line.number, "excellon parse interrupted");
                return Ok(Outcome::Interrupted);
            }

            report.progress(percent(line.offset, source.len()), 100);
            report.at_line(Some(line.number));

            let text = line.text.as_str();
            if text.is_empty() {
                continue;
            }
            trace!(line = line.number, text, "excellon line");

            if self.session.stage == Stage::Tail {
                report.warning(
                    "The file contains not empty lines after the end of the program.\n\
                     They will be ignored.",
                );
                break;
            }

            let handled = if self.parse_comment(text, report) {
                true
            } else if self.parse_header(text, report)? {
                true
            } else {
                self.parse_body(text, report)?
            };

            if !handled {
                report.warning(unknown_command(text));
            }
        }

        report.progress(100, 100);
        report.at_line(None);

        if self.session.needs_recalculation && self.recalculate(report)?.is_interrupted() {
            return Ok(Outcome::Interrupted);
        }

        match self.session.bounds.bounds() {
            Some(bounds) => report.accept(bounds.summary()),
            None => report.warning(
                "The file has been successfully loaded, but it does not contain any \
                 coordinates for drilling.",
            ),
        }

        self.publish();
        report.finished();
        Ok(Outcome::Completed(()))
    }

    fn parse_comment(&mut self, line: &str, report: &mut Reporter<'_>) -> bool {
        if !line.starts_with(';') {
            return false;
        }

        if self.session.stage == Stage::Beginning && starts_with_ignore_case(line, "; Format: ") {
            let declared: String = line.chars().skip(10).take(3).collect();
            match NumberFormat::from_declaration(&declared) {
                Some(format) => {
                    debug!(%format, "declared number format");
                    self.session.notation.format = format;
                }
                None => {
                    self.session.notation.format = NumberFormat::Unknown;
                    let shown = if declared.is_empty() {
                        "<empty>"
                    } else {
                        declared.as_str()
                    };
                    report.warning(format!("Unknown number presentation format: '{shown}'."));
                }
            }
        }

        true
    }

    fn parse_header(&mut self, line: &str, report: &mut Reporter<'_>) -> Result<bool, ParseError> {
        if line.eq_ignore_ascii_case("M48") {
            if self.session.stage != Stage::Beginning {
                return Err(report.fatal(
                    "The redefinition of the header is prohibited.\n\
                     The input file can contain one header only.",
                ));
            }
            debug!("entering excellon header");
            self.session.stage = Stage::Header;
            return Ok(true);
        }

        if starts_with_ignore_case(line, "METRIC") || line.eq_ignore_ascii_case("M71") {
            self.set_units(Units::Metric, report)?;
            return Ok(true);
        }

        if starts_with_ignore_case(line, "INCH") || line.eq_ignore_ascii_case("M72") {
            self.set_units(Units::Inch, report)?;
            return Ok(true);
        }

        if starts_with_ignore_case(line, "T") {
            self.parse_tool(line, report)?;
            return Ok(true);
        }

        if line == "%" {
            if self.session.stage != Stage::Header {
                return Err(report.fatal(
                    "An unexpected occurrence of the header end command.\n\
                     The input file can contain one header only.",
                ));
            }
            if self.session.notation.units == Units::Unknown {
                return Err(report.fatal(
                    "The file header does not contain any information about the \
                     measurement system.",
                ));
            }
            debug!(tools = self.session.tools.len(), "excellon header complete");
            self.session.stage = Stage::Body;
            self.session.tool = DEFAULT_TOOL;
            return Ok(true);
        }

        Ok(false)
    }

    fn set_units(&mut self, units: Units, report: &mut Reporter<'_>) -> Result<(), ParseError> {
        if self.session.stage != Stage::Header {
            return Err(report.fatal(UNITS_OUTSIDE_HEADER));
        }

        let description = match units {
            Units::Inch => "Converting from the inch measuring system.",
            Units::Metric | Units::Unknown => "Using the metric measuring system.",
        };
        let notation = &mut self.session.notation;
        if notation.units == Units::Unknown {
            report.notice(description);
        } else {
            report.warning(format!(
                "The redefinition of the units of measurement.\n{description}"
            ));
        }
        notation.units = units;

        match (units, notation.format) {
            (Units::Metric, NumberFormat::Format24) => {
                report.warning(
                    "A mismatch was detected between the number presentation format and \
                     the current measurement system.\nThe actual number presentation format \
                     will be determined later.",
                );
                notation.format = NumberFormat::Unknown;
            }
            (Units::Inch, NumberFormat::Format32 | NumberFormat::Format33) => {
                report.warning(
                    "A mismatch was detected between the number presentation format and \
                     the current measurement system.\nThe actual number presentation format \
                     is set to 2.4.",
                );
                notation.format = NumberFormat::Format24;
            }
            (Units::Inch, NumberFormat::Unknown) => {
                report.notice("The actual number presentation format is set to 2.4.");
                notation.format = NumberFormat::Format24;
            }
            _ => {}
        }

        debug!(?units, format = %notation.format, "units selected");
        Ok(())
    }

    fn parse_tool(&mut self, line: &str, report: &mut Reporter<'_>) -> Result<(), ParseError> {
        let Some((id, diameter)) = scan_tool(line) else {
            report.warning(unknown_command(line));
            return Ok(());
        };

        self.session.tool = id;
        let tool = self.session.tools.entry(id).or_insert(Tool { id, diameter: 0 });

        let Some(diameter) = diameter else {
            return Ok(());
        };

        if self.session.notation.units == Units::Unknown {
            return Err(report.fatal(format!(
                "Unable to determine the diameter of tool #{id}. \
                 The measuring system has not yet been determined."
            )));
        }

        match self.session.notation.parse(diameter, report) {
            Some(value) => {
                tool.diameter = round_diameter(value);
                debug!(id, diameter = tool.diameter, "tool defined");
            }
            None => report.warning(unknown_command(line)),
        }
        Ok(())
    }

    fn parse_body(&mut self, line: &str, report: &mut Reporter<'_>) -> Result<bool, ParseError> {
        if line.eq_ignore_ascii_case("G90") {
            return Ok(true);
        }

        if line.eq_ignore_ascii_case("G05") {
            debug!("entering drill mode");
            self.session.stage = Stage::Drill;
            return Ok(true);
        }

        if line.eq_ignore_ascii_case("M30") {
            debug!(points = self.session.points.len(), "end of program");
            self.session.stage = Stage::Tail;
            return Ok(true);
        }

        if self.session.stage != Stage::Drill {
            return Ok(false);
        }

        if starts_with_ignore_case(line, "G") {
            return Err(report.fatal(format!(
                "Unknown G-command: '{}'. The file analysis will be interrupted to avoid \
                 problems with the interpretation of commands.",
                excerpt(line)
            )));
        }

        let Some((x, y)) = scan_coordinates(line) else {
            return Ok(false);
        };

        let notation = &mut self.session.notation;
        let resolved = notation
            .parse(x, report)
            .and_then(|x| notation.parse(y, report).map(|y| Coord::new(x, y)));

        let position = match resolved {
            Some(coord) => {
                self.session.bounds.include(coord);
                Position::Resolved(coord)
            }
            None if notation.rejects_decimal(x) || notation.rejects_decimal(y) => {
                return Ok(false);
            }
            None => {
                self.session.needs_recalculation = true;
                Position::Pending {
                    x: x.to_string(),
                    y: y.to_string(),
                }
            }
        };

        self.session.points.push(DrillPoint {
            tool: self.session.tool,
            position,
        });
        Ok(true)
    }

    /// Second pass: resolves every pending token with the now-known format.
    fn recalculate(&mut self, report: &mut Reporter<'_>) -> Result<Outcome<()>, ParseError> {
        report.started("Recalculating Points");

        let Session {
            notation,
            points,
            bounds,
            ..
        } = &mut self.session;

        if notation.format == NumberFormat::Unknown {
            return Err(report.fatal(FORMAT_ADVICE));
        }

        debug!(format = %notation.format, points = points.len(), "recalculating pending points");
        let total = u64::try_from(points.len()).unwrap_or(u64::MAX);

        for (index, point) in (0_u64..).zip(points.iter_mut()) {
            if self.cancel.is_interrupted() {
                return Ok(Outcome::Interrupted);
            }
            report.progress(index, total);

            let Position::Pending { x, y } = &point.position else {
                continue;
            };

            let resolved = notation
                .parse(x, report)
                .and_then(|x| notation.parse(y, report).map(|y| Coord::new(x, y)));
            let Some(coord) = resolved else {
                return Err(report.fatal(FORMAT_ADVICE));
            };

            bounds.include(coord);
            point.position = Position::Resolved(coord);
        }

        report.progress(total, total);
        Ok(Outcome::Completed(()))
    }

    /// Moves the session's tools and resolved points into the public model.
    fn publish(&mut self) {
        let tools = std::mem::take(&mut self.session.tools);
        let curves = self
            .session
            .points
            .drain(..)
            .filter_map(|point| match point.position {
                Position::Resolved(coord) => Some(Curve::point(point.tool, coord)),
                Position::Pending { .. } => None,
            })
            .collect();

        self.model = Model {
            tools,
            curves,
        };
        self.model.tools.entry(DEFAULT_TOOL).or_default();
    }
}

impl Parser for ExcellonParser {
    fn capability(&self) -> Capability {
        Capability::Drilling
    }

    fn clear(&mut self) {
        self.model = Model::default();
        self.session = Session::default();
        self.session.tools.insert(DEFAULT_TOOL, Tool::default());
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
            self.session.points.clear();
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

/// Converts ten-thousandths of an inch to micrometers.
fn inch_to_microns(value: i64) -> Option<i64> {
    value
        .checked_mul(INCH_NUMERATOR)
        .map(|value| value / INCH_DENOMINATOR)
}

/// Rounds a diameter in micrometers to the nearest hundredth of a millimeter,
/// rounding a last digit of 5 or more up.
pub fn round_diameter(value: i64) -> i64 {
    let fractional = value % 10;
    if fractional > 4 {
        value + 10 - fractional
    } else {
        value - fractional
    }
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Splits `T<1-4 digits>[C<decimal>]` into the tool number and the raw
/// diameter token. Trailing text after a match is ignored.
fn scan_tool(line: &str) -> Option<(u32, Option<&str>)> {
    let rest = line.get(1..)?;
    let digits = leading_digits(rest).min(4);
    if digits == 0 {
        return None;
    }
    let id = rest.get(..digits)?.parse::<u32>().ok()?;

    let diameter = rest
        .get(digits..)
        .and_then(|tail| tail.strip_prefix(['C', 'c']))
        .and_then(scan_decimal);

    Some((id, diameter))
}

/// Matches `\d*\.\d+` at the start of `text`.
fn scan_decimal(text: &str) -> Option<&str> {
    let integer = leading_digits(text);
    let after_point = text.get(integer..)?.strip_prefix('.')?;
    let fraction = leading_digits(after_point);
    if fraction == 0 {
        return None;
    }
    text.get(..integer + 1 + fraction)
}

/// Matches `[+-]?\d*\.?\d+` at the start of `text`, returning the token and
/// the remainder.
fn scan_number(text: &str) -> Option<(&str, &str)> {
    let sign = usize::from(text.starts_with(['+', '-']));
    let body = text.get(sign..)?;
    let integer = leading_digits(body);

    let mut length = integer;
    if let Some(after_point) = body.get(integer..).and_then(|tail| tail.strip_prefix('.')) {
        let fraction = leading_digits(after_point);
        if fraction > 0 {
            length = integer + 1 + fraction;
        }
    }
    if length == 0 {
        return None;
    }

    let end = sign + length;
    Some((text.get(..end)?, text.get(end..)?))
}

/// Matches `X<number>Y<number>` at the start of `line`.
fn scan_coordinates(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(['X', 'x'])?;
    let (x, rest) = scan_number(rest)?;
    let rest = rest.strip_prefix(['Y', 'y'])?;
    let (y, _) = scan_number(rest)?;
    Some((x, y))
}

fn leading_digits(text: &str) -> usize {
    text.bytes().take_while(u8::is_ascii_digit).count()
}
