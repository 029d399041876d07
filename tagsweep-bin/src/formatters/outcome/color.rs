use console::Style;
use tagsweep_lib::{Item, LookupError};

use crate::formatters::color::{DIM, GREEN, PINK, YELLOW};

use super::{MAX_OUTCOME_OUTPUT_WIDTH, OutcomeFormatter, Status};

/// A colorized formatter for outcomes
///
/// This formatter is used if the terminal supports color and the user
/// has not explicitly requested plain output.
pub(crate) struct ColorFormatter;

impl ColorFormatter {
    /// Determine the color for formatted output based on the status
    fn status_color(status: Status<'_>) -> &'static Style {
        match status {
            Status::Matched => &GREEN,
            Status::Unmatched => &DIM,
            Status::Failed(LookupError::Transient(_) | LookupError::Timeout(_)) => &YELLOW,
            Status::Failed(_) => &PINK,
        }
    }

    /// Right-align the status label within the status column
    fn format_label(status: Status<'_>) -> String {
        let label = status.label();
        let padding = MAX_OUTCOME_OUTPUT_WIDTH.saturating_sub(label.len() + 2); // +2 for brackets
        format!("{}[{label}]", " ".repeat(padding))
    }
}

impl OutcomeFormatter for ColorFormatter {
    fn format_status(&self, status: Status<'_>, item: &Item) -> String {
        let label = ColorFormatter::format_label(status);
        let colored = ColorFormatter::status_color(status).apply_to(label);
        format!("{colored} {item}")
    }
}
