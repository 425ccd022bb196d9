//! Milling program generator.

use tracing::debug;

use crate::model::{CurveKind, Model};
use crate::number::{coordinate_to_string, decimal_to_string};
use crate::session::{CancelToken, Observer, Outcome};

use super::{MillingConfig, Program};

/// Generates a milling program following every resolved curve of `model`.
///
/// Each curve is entered with a rapid move to its first vertex and a plunge
/// at the plunge rate, cut at the feed rate, and left with a retract to the
/// safe height. Curves still in state [`CurveKind::None`] are skipped.
pub fn generate_milling(
    model: &Model,
    config: &MillingConfig,
    cancel: &CancelToken,
    observer: &mut dyn Observer,
) -> Outcome<String> {
    observer.started("Generating Milling Program");

    let feed_rate = config.feed_rate.to_string();
    let plunge_rate = config.plunge_rate.to_string();
    let safe_z = decimal_to_string(config.safe_z);
    let depth = decimal_to_string(config.depth);

    let mut program = Program::default();
    program.push_block(&config.prologue);
    program.push(format!("G0 Z{safe_z}"));
    program.push(format!("M3 S{}", config.spindle_speed));

    let total = u64::try_from(model.curves.len()).unwrap_or(u64::MAX);

    for (index, curve) in (0_u64..).zip(&model.curves) {
        observer.progress(index, total);
        if cancel.is_interrupted() {
            debug!(index, "milling generation interrupted");
            return Outcome::Interrupted;
        }

        if curve.kind == CurveKind::None || curve.points.is_empty() {
            continue;
        }

        for (vertex, at) in curve.points.iter().enumerate() {
            let x = coordinate_to_string(at.x);
            let y = coordinate_to_string(at.y);
            if vertex == 0 {
                program.push(format!("G0 X{x} Y{y}"));
                program.push(format!("G1 Z{depth} F{plunge_rate}"));
                program.push(format!("G1 F{feed_rate}"));
            } else {
                program.push(format!("G1 X{x} Y{y}"));
            }
        }

        program.push(format!("G0 Z{safe_z}"));
    }

    program.push_block(&config.epilogue);
    observer.progress(total, total);
    observer.finished();

    debug!(lines = program.line_count(), "milling program generated");
    Outcome::Completed(program.finish())
}
