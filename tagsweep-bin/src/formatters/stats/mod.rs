mod compact;
mod detailed;
mod json;
mod markdown;
mod raw;

pub(crate) use compact::Compact;
pub(crate) use detailed::Detailed;
pub(crate) use json::Json;
pub(crate) use markdown::Markdown;
pub(crate) use raw::Raw;

use anyhow::Result;
use tagsweep_lib::{FailedItem, Item, SweepReport};

pub(crate) trait StatsFormatter {
    /// Format the report of a finished sweep
    fn format(&self, report: &SweepReport) -> Result<Option<String>>;
}

/// Matched items in a stable order, independent of completion order
fn sorted_matches(report: &SweepReport) -> Vec<&Item> {
    let mut matched: Vec<&Item> = report.matched.iter().collect();
    matched.sort();
    matched
}

/// Unresolved items in a stable order, independent of completion order
fn sorted_unresolved(report: &SweepReport) -> Vec<&FailedItem> {
    let mut unresolved: Vec<&FailedItem> = report.unresolved.iter().collect();
    unresolved.sort_by(|a, b| a.item.cmp(&b.item));
    unresolved
}
