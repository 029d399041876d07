use crate::{Item, LookupError};

/// The result of a single lookup attempt for one item.
///
/// Exactly one outcome is produced per attempt: the classifier decides
/// between [`Outcome::Matched`] and [`Outcome::Unmatched`] on success,
/// a failed lookup turns into [`Outcome::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The item carries the tag pair the sweep is looking for
    Matched(Item),
    /// The item was looked up successfully but does not match
    Unmatched(Item),
    /// The lookup failed
    Failed(Item, LookupError),
}

impl Outcome {
    /// The item this outcome belongs to
    #[must_use]
    pub const fn item(&self) -> &Item {
        match self {
            Outcome::Matched(item) | Outcome::Unmatched(item) | Outcome::Failed(item, _) => item,
        }
    }

    /// Returns `true` if the item matched
    #[inline]
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        matches!(self, Outcome::Matched(_))
    }

    /// Returns `true` if the lookup failed
    #[inline]
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_, _))
    }
}

/// An item whose lookup failed, together with the last cause
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FailedItem {
    /// The item that could not be looked up
    #[serde(flatten)]
    pub item: Item,
    /// Cause of the last failed attempt
    pub cause: LookupError,
}

impl From<(Item, LookupError)> for FailedItem {
    fn from((item, cause): (Item, LookupError)) -> Self {
        Self { item, cause }
    }
}
