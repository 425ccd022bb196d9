//! Excellon parser state types.

use std::fmt;

use serde::Serialize;

use crate::model::Coord;

/// Section of the drill program being read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    /// Before `M48`; only comments are expected.
    #[default]
    Beginning,
    /// Between `M48` and `%`.
    Header,
    /// After the header, before `G05`.
    Body,
    /// Drill mode (`G05`); coordinates become holes.
    Drill,
    /// After `M30`.
    Tail,
}

/// Digit layout of coordinates written without a decimal point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum NumberFormat {
    /// Not declared and not yet inferred.
    #[default]
    Unknown,
    /// Two integer and four fractional digits (inch).
    #[serde(rename = "2.4")]
    Format24,
    /// Three integer and two fractional digits (metric).
    #[serde(rename = "3.2")]
    Format32,
    /// Three integer and three fractional digits (metric).
    #[serde(rename = "3.3")]
    Format33,
}

impl NumberFormat {
    /// Parses the `d.d` text of a `; Format:` comment.
    pub fn from_declaration(text: &str) -> Option<Self> {
        match text {
            "2.4" => Some(Self::Format24),
            "3.2" => Some(Self::Format32),
            "3.3" => Some(Self::Format33),
            _ => None,
        }
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Format24 => write!(f, "2.4"),
            Self::Format32 => write!(f, "3.2"),
            Self::Format33 => write!(f, "3.3"),
        }
    }
}

/// Measurement system declared in the header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// No unit command seen yet.
    #[default]
    Unknown,
    /// Millimeters (`METRIC` / `M71`).
    Metric,
    /// Inches (`INCH` / `M72`).
    Inch,
}

/// Location of a hole as read in the first pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Position {
    /// Converted to micrometers.
    Resolved(Coord),
    /// Raw tokens waiting for the number format to become known.
    Pending { x: String, y: String },
}

/// A hole and the tool selected when it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DrillPoint {
    pub tool: u32,
    pub position: Position,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_map_to_formats() {
        assert_eq!(NumberFormat::from_declaration("3.3"), Some(NumberFormat::Format33));
        assert_eq!(NumberFormat::from_declaration("3.2"), Some(NumberFormat::Format32));
        assert_eq!(NumberFormat::from_declaration("2.4"), Some(NumberFormat::Format24));
        assert_eq!(NumberFormat::from_declaration("4.4"), None);
        assert_eq!(NumberFormat::from_declaration(""), None);
    }

    #[test]
    fn formats_display_as_declared() {
        assert_eq!(NumberFormat::Format33.to_string(), "3.3");
        assert_eq!(NumberFormat::Unknown.to_string(), "unknown");
    }
}
