use anyhow::{Context, Result};
use tagsweep_lib::SweepReport;

use super::StatsFormatter;

pub(crate) struct Json;

impl Json {
    pub(crate) const fn new() -> Self {
        Self {}
    }
}

impl StatsFormatter for Json {
    /// Format the report as JSON object
    fn format(&self, report: &SweepReport) -> Result<Option<String>> {
        serde_json::to_string_pretty(report)
            .map(Some)
            .context("Cannot format report as JSON")
    }
}
