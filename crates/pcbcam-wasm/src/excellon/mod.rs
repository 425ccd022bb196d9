//! Excellon drill program support.

pub mod parser;
pub mod types;

pub use parser::ExcellonParser;
pub use types::{NumberFormat, Stage, Units};
