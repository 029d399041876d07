use anyhow::Result;
use std::fmt::Write;
use tagsweep_lib::SweepReport;

use super::{StatsFormatter, sorted_matches};

/// Names of the matched items, one per line, for piping into other tools
pub(crate) struct Raw;

impl Raw {
    pub(crate) const fn new() -> Self {
        Self {}
    }
}

impl StatsFormatter for Raw {
    fn format(&self, report: &SweepReport) -> Result<Option<String>> {
        if report.matched.is_empty() {
            return Ok(None);
        }
        let mut output = String::new();
        for item in sorted_matches(report) {
            writeln!(output, "{}", item.name)?;
        }
        Ok(Some(output))
    }
}
