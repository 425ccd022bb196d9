//! G-code synthesis from a parsed model.
//!
//! Both generators are pure model-to-text passes. They check the cancellation
//! token once per curve and report progress per curve.

pub mod config;
pub mod drilling;
pub mod milling;

pub use config::{DrillingConfig, MillingConfig};
pub use drilling::generate_drilling;
pub use milling::generate_milling;

/// Line-oriented program text under construction.
#[derive(Debug, Default)]
pub(crate) struct Program {
    lines: Vec<String>,
}

impl Program {
    pub(crate) fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Appends user-supplied text verbatim; empty blocks add nothing.
    pub(crate) fn push_block(&mut self, block: &str) {
        let block = block.trim_end_matches(['\r', '\n']);
        if !block.is_empty() {
            self.lines.push(block.to_string());
        }
    }

    pub(crate) fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn finish(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}
