use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A single entry of a remote directory, e.g. a user or a role.
///
/// Items are produced by a [`PageSource`](crate::PageSource) and never change
/// afterwards; every stage of a sweep passes them around by value or by
/// reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Item {
    /// Human-readable identifier, used to look up the tags of the item
    pub name: String,
    /// Stable resource handle (for example an ARN)
    #[serde(default)]
    pub handle: String,
}

impl Item {
    /// Create a new item from a name and a resource handle
    #[must_use]
    pub fn new<N: Into<String>, H: Into<String>>(name: N, handle: H) -> Self {
        Self {
            name: name.into(),
            handle: handle.into(),
        }
    }
}

impl Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.handle.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{} ({})", self.name, self.handle)
        }
    }
}
