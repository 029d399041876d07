use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A single key/value tag attached to an [`Item`](crate::Item)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value
    pub value: String,
}

impl Tag {
    /// Create a new tag
    #[must_use]
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The tags returned by a single lookup.
///
/// Keys are unique; if a lookup returns the same key twice, the last value
/// wins. Comparison of keys and values is exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Create an empty tag set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the set holds exactly this key/value pair
    #[must_use]
    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.0.get(key).is_some_and(|v| v == value)
    }

    /// Get the value stored for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert a tag, replacing any previous value for the same key
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    /// Number of tags
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no tags
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all key/value pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().map(|t| (t.key, t.value)).collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Display for TagSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&pairs.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_exact() {
        let tags: TagSet = [("team", "core"), ("env", "prod")].into_iter().collect();

        assert!(tags.contains("team", "core"));
        assert!(!tags.contains("team", "Core"));
        assert!(!tags.contains("Team", "core"));
        assert!(!tags.contains("team", "prod"));
        assert!(!tags.contains("owner", "core"));
    }

    #[test]
    fn test_duplicate_keys_keep_last_value() {
        let tags: TagSet = vec![Tag::new("env", "dev"), Tag::new("env", "prod")]
            .into_iter()
            .collect();

        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("env"), Some("prod"));
    }

    #[test]
    fn test_display() {
        let tags: TagSet = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(tags.to_string(), "a=1,b=2");
        assert_eq!(TagSet::new().to_string(), "");
    }
}
