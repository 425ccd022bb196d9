//! Tool and curve model shared by the parsers and the G-code generators.
//!
//! All coordinates and diameters are integers in thousandths of a millimeter.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::number::coordinate_to_string;

/// Identifier of the implicit default tool present in every model.
pub const DEFAULT_TOOL: u32 = 0;

/// A drill bit or cutter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tool {
    /// Tool number; 0 is the default/unassigned tool.
    pub id: u32,
    /// Diameter in micrometers, 0 when not declared.
    pub diameter: i64,
}

/// A fixed-point coordinate pair in micrometers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Coord {
    /// X coordinate.
    pub x: i64,
    /// Y coordinate.
    pub y: i64,
}

impl Coord {
    /// Creates a coordinate pair.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Classification of a [`Curve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    /// Transient pen-up position, not yet resolved to a point or discarded.
    #[default]
    None,
    /// A single location to plunge at.
    Point,
    /// A polyline of two or more vertices.
    Curve,
}

/// A point or polyline owned by a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Curve {
    /// Resolution state of the curve.
    pub kind: CurveKind,
    /// Ordered vertices.
    pub points: Vec<Coord>,
    /// Owning tool id.
    pub tool: u32,
}

impl Curve {
    /// Creates a resolved single-point curve.
    pub fn point(tool: u32, at: Coord) -> Self {
        Self {
            kind: CurveKind::Point,
            points: vec![at],
            tool,
        }
    }

    /// First vertex of the curve, if any.
    pub fn first(&self) -> Option<Coord> {
        self.points.first().copied()
    }
}

/// Axis-aligned bounds of a coordinate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    /// Minimum X coordinate.
    pub min_x: i64,
    /// Maximum X coordinate.
    pub max_x: i64,
    /// Minimum Y coordinate.
    pub min_y: i64,
    /// Maximum Y coordinate.
    pub max_y: i64,
}

impl Bounds {
    /// Bounds of a single coordinate.
    pub const fn at(coord: Coord) -> Self {
        Self {
            min_x: coord.x,
            max_x: coord.x,
            min_y: coord.y,
            max_y: coord.y,
        }
    }

    /// Expands the bounds to include `coord`.
    pub fn include(&mut self, coord: Coord) {
        self.min_x = self.min_x.min(coord.x);
        self.max_x = self.max_x.max(coord.x);
        self.min_y = self.min_y.min(coord.y);
        self.max_y = self.max_y.max(coord.y);
    }

    /// Acceptance summary logged after a successful load.
    pub fn summary(&self) -> String {
        format!(
            "The file has been successfully loaded.\nBoundaries of coordinates:\n\
             Xmin = {} mm, Xmax = {} mm, \u{394}X = {} mm,\n\
             Ymin = {} mm, Ymax = {} mm, \u{394}Y = {} mm.",
            coordinate_to_string(self.min_x),
            coordinate_to_string(self.max_x),
            coordinate_to_string(self.max_x.saturating_sub(self.min_x)),
            coordinate_to_string(self.min_y),
            coordinate_to_string(self.max_y),
            coordinate_to_string(self.max_y.saturating_sub(self.min_y)),
        )
    }
}

/// Running bounding box that starts empty and grows with each coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundsTracker(Option<Bounds>);

impl BoundsTracker {
    /// Adds a coordinate to the tracked set.
    pub fn include(&mut self, coord: Coord) {
        match &mut self.0 {
            Some(bounds) => bounds.include(coord),
            None => self.0 = Some(Bounds::at(coord)),
        }
    }

    /// Bounds of everything seen so far, `None` before the first coordinate.
    pub const fn bounds(&self) -> Option<Bounds> {
        self.0
    }
}

/// Parsed tool table and curves, published after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Model {
    /// Tool table keyed by id, always containing [`DEFAULT_TOOL`].
    pub tools: BTreeMap<u32, Tool>,
    /// Curves in source order.
    pub curves: Vec<Curve>,
}

impl Model {
    /// Diameter of tool `id`, 0 for unknown tools.
    pub fn diameter(&self, id: u32) -> i64 {
        self.tools.get(&id).map_or(0, |tool| tool.diameter)
    }

    /// Bounding box of every vertex in the model.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut tracker = BoundsTracker::default();
        for coord in self.curves.iter().flat_map(|curve| curve.points.iter()) {
            tracker.include(*coord);
        }
        tracker.bounds()
    }
}

impl Default for Model {
    fn default() -> Self {
        let mut tools = BTreeMap::new();
        tools.insert(
            DEFAULT_TOOL,
            Tool {
                id: DEFAULT_TOOL,
                diameter: 0,
            },
        );
        Self {
            tools,
            curves: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_has_default_tool() {
        let model = Model::default();
        assert_eq!(model.tools.len(), 1);
        assert_eq!(model.tools.get(&DEFAULT_TOOL), Some(&Tool::default()));
        assert!(model.curves.is_empty());
    }

    #[test]
    fn tracker_starts_empty_then_grows() {
        let mut tracker = BoundsTracker::default();
        assert_eq!(tracker.bounds(), None);
        tracker.include(Coord::new(5, -2));
        tracker.include(Coord::new(-1, 7));
        assert_eq!(
            tracker.bounds(),
            Some(Bounds {
                min_x: -1,
                max_x: 5,
                min_y: -2,
                max_y: 7,
            })
        );
    }

    #[test]
    fn summary_uses_millimeters() {
        let mut bounds = Bounds::at(Coord::new(0, -500));
        bounds.include(Coord::new(2540, 1000));
        let text = bounds.summary();
        assert!(text.contains("Xmin = 0 mm, Xmax = 2.54 mm, \u{394}X = 2.54 mm"));
        assert!(text.contains("Ymin = -0.5 mm, Ymax = 1 mm, \u{394}Y = 1.5 mm."));
    }

    #[test]
    fn unknown_tool_has_zero_diameter() {
        let model = Model::default();
        assert_eq!(model.diameter(42), 0);
    }
}
