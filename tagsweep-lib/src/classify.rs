//! Classification of lookup results.
//!
//! Classification is a pure function of the filter and the tag set of an
//! item. It cannot fail; lookup errors are handled before an item ever
//! reaches the classifier.

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, Item, Outcome, Result, TagSet};

/// Which items a sweep is interested in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagFilter {
    /// Every item that can be looked up matches (the `list` operation)
    #[default]
    Any,
    /// Only items carrying exactly this tag pair match (the `filter` operation)
    Pair {
        /// Tag key to look for
        key: String,
        /// Tag value to look for
        value: String,
    },
}

impl TagFilter {
    /// Create a filter for a single tag pair.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MissingFilter`] if either key or value is empty.
    pub fn pair<K: Into<String>, V: Into<String>>(key: K, value: V) -> Result<Self> {
        let (key, value) = (key.into(), value.into());
        if key.is_empty() || value.is_empty() {
            return Err(ErrorKind::MissingFilter);
        }
        Ok(Self::Pair { key, value })
    }

    /// Check that a pair filter names both a key and a value.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MissingFilter`] for an incomplete pair.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Pair { key, value } if key.is_empty() || value.is_empty() => {
                Err(ErrorKind::MissingFilter)
            }
            _ => Ok(()),
        }
    }
}

/// Result of classifying a successfully looked up item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The item matched the filter
    Matched,
    /// The item did not match the filter
    Unmatched,
}

impl Classification {
    /// Turn the classification into an [`Outcome`] for the given item
    #[must_use]
    pub fn into_outcome(self, item: Item) -> Outcome {
        match self {
            Classification::Matched => Outcome::Matched(item),
            Classification::Unmatched => Outcome::Unmatched(item),
        }
    }
}

/// Classify a tag set.
///
/// An item without any tags never matches a [`TagFilter::Pair`].
#[must_use]
pub fn classify(filter: &TagFilter, tags: &TagSet) -> Classification {
    let matched = match filter {
        TagFilter::Any => true,
        TagFilter::Pair { key, value } => tags.contains(key, value),
    };
    if matched {
        Classification::Matched
    } else {
        Classification::Unmatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs.iter().copied().collect()
    }

    #[rstest]
    #[case(&[("team", "core")], Classification::Matched)]
    #[case(&[("env", "prod"), ("team", "core"), ("owner", "ops")], Classification::Matched)]
    #[case(&[("team", "core-infra")], Classification::Unmatched)]
    #[case(&[("Team", "core")], Classification::Unmatched)]
    #[case(&[("owner", "team"), ("core", "team")], Classification::Unmatched)]
    #[case(&[], Classification::Unmatched)]
    fn test_classify_pair(#[case] pairs: &[(&str, &str)], #[case] expected: Classification) {
        let filter = TagFilter::pair("team", "core").unwrap();
        assert_eq!(classify(&filter, &tags(pairs)), expected);
    }

    #[test]
    fn test_classify_any_matches_everything() {
        assert_eq!(
            classify(&TagFilter::Any, &TagSet::new()),
            Classification::Matched
        );
        assert_eq!(
            classify(&TagFilter::Any, &tags(&[("a", "b")])),
            Classification::Matched
        );
    }

    #[test]
    fn test_classify_is_idempotent() {
        let filter = TagFilter::pair("env", "prod").unwrap();
        let set = tags(&[("env", "prod"), ("team", "x")]);
        let first = classify(&filter, &set);
        for _ in 0..10 {
            assert_eq!(classify(&filter, &set.clone()), first);
        }
    }

    #[test]
    fn test_pair_requires_key_and_value() {
        assert!(matches!(
            TagFilter::pair("", "value"),
            Err(ErrorKind::MissingFilter)
        ));
        assert!(matches!(
            TagFilter::pair("key", ""),
            Err(ErrorKind::MissingFilter)
        ));
    }
}
