//! Drilling program generator.

use tracing::debug;

use crate::model::{Model, DEFAULT_TOOL};
use crate::number::{coordinate_to_string, decimal_to_string};
use crate::session::{CancelToken, Observer, Outcome};

use super::{DrillingConfig, Program};

/// Generates a drilling program for every point of `model`, in model order.
///
/// A tool-change block is emitted whenever the owning tool changes, unless
/// [`DrillingConfig::single_tool`] is set. Returns
/// [`Outcome::Interrupted`] if `cancel` is set before the last curve.
pub fn generate_drilling(
    model: &Model,
    config: &DrillingConfig,
    cancel: &CancelToken,
    observer: &mut dyn Observer,
) -> Outcome<String> {
    observer.started("Generating Drilling Program");

    let feed_rate = config.feed_rate.to_string();
    let spindle_speed = config.spindle_speed.to_string();
    let safe_z = decimal_to_string(config.safe_z);
    let depth = decimal_to_string(config.depth);
    let start_height = decimal_to_string(config.start_height);

    let mut program = Program::default();
    program.push_block(&config.prologue);

    if !config.single_tool {
        for tool in model.tools.values().filter(|tool| tool.id > DEFAULT_TOOL) {
            program.push(format!(
                "( Drill Bit #{} / {} mm )",
                tool.id,
                coordinate_to_string(tool.diameter)
            ));
        }
    }

    program.push(format!("G0 Z{safe_z}"));
    program.push(format!("G1 F{feed_rate}"));
    if config.single_tool {
        program.push(format!("M3 S{spindle_speed}"));
    }

    let total = u64::try_from(model.curves.len()).unwrap_or(u64::MAX);
    let mut active_tool = DEFAULT_TOOL;
    let mut tool_changes = 0_usize;

    for (index, curve) in (0_u64..).zip(&model.curves) {
        observer.progress(index, total);
        if cancel.is_interrupted() {
            debug!(index, "drilling generation interrupted");
            return Outcome::Interrupted;
        }

        if !config.single_tool && curve.tool != active_tool {
            program.push("M5");
            program.push(format!(
                "( Tool Change T{} / {} mm )",
                curve.tool,
                coordinate_to_string(model.diameter(curve.tool))
            ));
            if let Some(height) = config.tool_change_height {
                program.push(format!("G0 Z{}", decimal_to_string(height)));
            }
            program.push(format!("M6 T{}", curve.tool));
            program.push(format!("G1 F{feed_rate}"));
            program.push(format!("M3 S{spindle_speed}"));
            active_tool = curve.tool;
            tool_changes += 1;
        }

        let Some(at) = curve.first() else {
            continue;
        };
        program.push(format!(
            "G0 X{} Y{}",
            coordinate_to_string(at.x),
            coordinate_to_string(at.y)
        ));
        program.push(format!("G0 Z{start_height}"));
        program.push(format!("G1 Z{depth}"));
        program.push(format!("G0 Z{safe_z}"));
    }

    program.push_block(&config.epilogue);
    observer.progress(total, total);
    observer.finished();

    debug!(
        lines = program.line_count(),
        tool_changes, "drilling program generated"
    );
    Outcome::Completed(program.finish())
}
