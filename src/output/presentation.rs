//! Status presentation hints
//!
//! Maps execution states to the symbol, label and color a renderer shows.

use crate::models::ExecutionStatus;

/// Terminal color used for a status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Green,
    Red,
    Yellow,
    Blue,
    Gray,
}

impl Color {
    pub fn ansi_code(&self) -> &'static str {
        match self {
            Color::Green => "32",
            Color::Red => "31",
            Color::Yellow => "33",
            Color::Blue => "34",
            Color::Gray => "90",
        }
    }

    /// Wrap `text` in this color's escape sequence
    pub fn paint(&self, text: &str) -> String {
        format!("\x1b[{}m{}\x1b[0m", self.ansi_code(), text)
    }
}

/// How a status should be displayed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentationHint {
    pub symbol: &'static str,
    pub label: &'static str,
    pub color: Color,
}

impl PresentationHint {
    /// `symbol LABEL`, colored when asked
    pub fn render(&self, colorize: bool) -> String {
        let text = format!("{} {}", self.symbol, self.label);
        if colorize {
            self.color.paint(&text)
        } else {
            text
        }
    }
}

pub fn status_to_presentation(status: ExecutionStatus) -> PresentationHint {
    let (symbol, label, color) = match status {
        ExecutionStatus::Queued => ("…", "QUEUED", Color::Gray),
        ExecutionStatus::Running => ("▶", "RUNNING", Color::Blue),
        ExecutionStatus::Completed => ("✓", "PASS", Color::Green),
        ExecutionStatus::Failed => ("✗", "FAIL", Color::Red),
        ExecutionStatus::Cancelled => ("■", "CANCELLED", Color::Yellow),
        ExecutionStatus::Skipped => ("○", "SKIP", Color::Yellow),
    };
    PresentationHint {
        symbol,
        label,
        color,
    }
}
