use std::time::Duration;

use serde::Serialize;

use crate::{FailedItem, Item};

/// Summary of a finished sweep.
///
/// A report is produced even if enumeration aborted early or the sweep was
/// cancelled; in that case it covers whatever was processed so far.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    /// Number of enumerated items
    pub total: usize,
    /// Items which matched the filter
    pub matched: Vec<Item>,
    /// Number of items which were looked up but did not match
    pub unmatched: usize,
    /// Items which still failed after the retry pass
    pub unresolved: Vec<FailedItem>,
    /// Number of failures after the main wave, before retrying
    pub first_pass_failures: usize,
    /// Number of lookups performed by the retry pass
    pub retried: usize,
    /// Number of items the retry pass managed to resolve
    pub recovered: usize,
    /// Wall-clock time of the whole sweep
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Set if paging through the directory failed
    pub enumeration_error: Option<String>,
    /// Set if the sweep was cancelled before it could finish
    pub cancelled: bool,
}

impl SweepReport {
    /// Number of items which could not be looked up
    #[inline]
    #[must_use]
    pub fn failed(&self) -> usize {
        self.unresolved.len()
    }

    /// Returns `true` if every enumerated item ended up in exactly one bucket
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.matched.len() + self.unmatched + self.unresolved.len() == self.total
    }

    /// Returns `true` if all items were looked up and the directory could
    /// be enumerated in full
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.unresolved.is_empty() && self.enumeration_error.is_none() && !self.cancelled
    }
}
