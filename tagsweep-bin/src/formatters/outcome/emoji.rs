use tagsweep_lib::{Item, LookupError};

use super::{OutcomeFormatter, Status};

/// An emoji formatter for outcomes
///
/// This formatter replaces the status label with an emoji for a more
/// visual output.
pub(crate) struct EmojiFormatter;

impl OutcomeFormatter for EmojiFormatter {
    fn format_status(&self, status: Status<'_>, item: &Item) -> String {
        let emoji = match status {
            Status::Matched => "✅",
            Status::Unmatched => "➖",
            Status::Failed(LookupError::Timeout(_)) => "⏳",
            Status::Failed(LookupError::Cancelled) => "🛑",
            Status::Failed(_) => "❌",
        };
        format!("{emoji} {item}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tagsweep_lib::Outcome;

    #[test]
    fn test_format_outcomes() {
        let item = Item::new("dave", "");
        assert_eq!(
            EmojiFormatter.format_outcome(&Outcome::Matched(item.clone())),
            "✅ dave"
        );
        assert_eq!(
            EmojiFormatter.format_outcome(&Outcome::Failed(
                item,
                LookupError::Timeout(Duration::from_secs(20))
            )),
            "⏳ dave"
        );
    }
}
