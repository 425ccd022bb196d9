//! HPGL plotter program support.

pub mod parser;

pub use parser::HpglParser;
