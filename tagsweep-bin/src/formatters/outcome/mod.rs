use tagsweep_lib::{FailedItem, Item, LookupError, Outcome};

mod color;
mod emoji;
mod plain;

pub(crate) use color::ColorFormatter;
pub(crate) use emoji::EmojiFormatter;
pub(crate) use plain::PlainFormatter;

/// Desired total width of the status column for the color formatter
///
/// The longest status is `[UNMATCHED]`, which is 11 characters long
/// (including brackets).
pub(crate) const MAX_OUTCOME_OUTPUT_WIDTH: usize = 11;

/// Status of an outcome as shown in front of the item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status<'a> {
    Matched,
    Unmatched,
    Failed(&'a LookupError),
}

impl Status<'_> {
    pub(crate) const fn label(&self) -> &'static str {
        match self {
            Status::Matched => "MATCHED",
            Status::Unmatched => "UNMATCHED",
            Status::Failed(e) => e.label(),
        }
    }
}

/// A trait for formatting the outcome of a lookup
///
/// This trait is used to convert outcomes into human-readable lines.
/// It can be implemented for different formatting styles such as
/// colorized output or plaintext.
pub(crate) trait OutcomeFormatter: Send + Sync {
    /// Format a status and its item into a single line
    fn format_status(&self, status: Status<'_>, item: &Item) -> String;

    /// Format an outcome of the main wave
    fn format_outcome(&self, outcome: &Outcome) -> String {
        match outcome {
            Outcome::Matched(item) => self.format_status(Status::Matched, item),
            Outcome::Unmatched(item) => self.format_status(Status::Unmatched, item),
            Outcome::Failed(item, cause) => self.format_status(Status::Failed(cause), item),
        }
    }

    /// Format an item that could not be resolved, including the cause
    fn format_failed(&self, failed: &FailedItem) -> String {
        format!(
            "{} | {}",
            self.format_status(Status::Failed(&failed.cause), &failed.item),
            failed.cause
        )
    }
}
