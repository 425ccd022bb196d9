//! Machine settings driving the G-code generators.

use serde::{Deserialize, Serialize};

const DEFAULT_SPINDLE_SPEED: u32 = 10_000;
const DEFAULT_FEED_RATE: u32 = 1;
const DEFAULT_SAFE_Z: f64 = 1.0;

/// Settings for the drilling pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DrillingConfig {
    /// Plunge feed rate, emitted as `F`.
    pub feed_rate: u32,
    /// Spindle speed, emitted as `S`.
    pub spindle_speed: u32,
    /// Retract height between holes, in mm.
    pub safe_z: f64,
    /// Final drilling depth, in mm.
    pub depth: f64,
    /// Height the rapid approach stops at before feeding down, in mm.
    pub start_height: f64,
    /// Height to retract to before a tool change, in mm.
    pub tool_change_height: Option<f64>,
    /// Drill everything with one bit: no tool-change blocks, spindle started once.
    pub single_tool: bool,
    /// Text emitted verbatim before the program.
    pub prologue: String,
    /// Text emitted verbatim after the program.
    pub epilogue: String,
}

impl Default for DrillingConfig {
    fn default() -> Self {
        Self {
            feed_rate: DEFAULT_FEED_RATE,
            spindle_speed: DEFAULT_SPINDLE_SPEED,
            safe_z: DEFAULT_SAFE_Z,
            depth: 0.0,
            start_height: 0.5,
            tool_change_height: None,
            single_tool: false,
            prologue: String::new(),
            epilogue: String::new(),
        }
    }
}

/// Settings for the milling pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MillingConfig {
    /// Cutting feed rate, emitted as `F`.
    pub feed_rate: u32,
    /// Feed rate of the plunge at the start of each curve.
    pub plunge_rate: u32,
    /// Spindle speed, emitted as `S`.
    pub spindle_speed: u32,
    /// Retract height between curves, in mm.
    pub safe_z: f64,
    /// Cutting depth, in mm.
    pub depth: f64,
    /// Text emitted verbatim before the program.
    pub prologue: String,
    /// Text emitted verbatim after the program.
    pub epilogue: String,
}

impl Default for MillingConfig {
    fn default() -> Self {
        Self {
            feed_rate: DEFAULT_FEED_RATE,
            plunge_rate: DEFAULT_FEED_RATE,
            spindle_speed: DEFAULT_SPINDLE_SPEED,
            safe_z: DEFAULT_SAFE_Z,
            depth: 0.0,
            prologue: String::new(),
            epilogue: String::new(),
        }
    }
}
