//! Output formatting module
//!
//! Renders executions, run reports and statistics for the CLI.

mod formatter;
mod presentation;

pub use formatter::{write_to_file, OutputFormat, ResultFormatter};
pub use presentation::{status_to_presentation, Color, PresentationHint};
