//! Command-line interface for paperlens.

mod commands;
pub mod style;

pub use commands::{is_verbose, run};
