use tagsweep_lib::Item;

use super::{OutcomeFormatter, Status};

/// A basic formatter that just returns the status label and the item
///
/// This formatter is used when the user has requested raw output
/// or when the terminal does not support color.
pub(crate) struct PlainFormatter;

impl OutcomeFormatter for PlainFormatter {
    fn format_status(&self, status: Status<'_>, item: &Item) -> String {
        format!("[{}] {item}", status.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tagsweep_lib::{FailedItem, LookupError, Outcome};

    #[test]
    fn test_format_matched() {
        let outcome = Outcome::Matched(Item::new("alice", "arn:user/alice"));
        assert_eq!(
            PlainFormatter.format_outcome(&outcome),
            "[MATCHED] alice (arn:user/alice)"
        );
    }

    #[test]
    fn test_format_failed_with_cause() {
        let failed = FailedItem::from((
            Item::new("bob", ""),
            LookupError::transient("Directory responded with status code 503"),
        ));
        assert_eq!(
            PlainFormatter.format_failed(&failed),
            "[TRANSIENT] bob | Directory responded with status code 503"
        );
    }
}
