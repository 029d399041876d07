use anyhow::Result;
use console::Style;
use std::{
    fmt::{self, Display},
    sync::LazyLock,
};
use tagsweep_lib::SweepReport;

use crate::formatters::color::{BOLD_GREEN, BOLD_PINK, BOLD_YELLOW, DIM, NORMAL, color};
use crate::formatters::{duration::Duration, get_outcome_formatter};
use crate::options::OutputMode;

use super::{StatsFormatter, sorted_matches, sorted_unresolved};

struct CompactReport<'a> {
    report: &'a SweepReport,
    mode: OutputMode,
}

impl Display for CompactReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        let formatter = get_outcome_formatter(&self.mode);

        if !report.matched.is_empty() {
            color!(f, BOLD_GREEN, "Matched items ({}):\n", report.matched.len())?;
            for item in sorted_matches(report) {
                writeln!(f, "{item}")?;
            }
            writeln!(f)?;
        }

        if !report.unresolved.is_empty() {
            let noun = if report.unresolved.len() == 1 {
                "item"
            } else {
                "items"
            };
            color!(
                f,
                BOLD_PINK,
                "Could not look up {} {noun}. Find details below.\n",
                report.unresolved.len()
            )?;
            for failed in sorted_unresolved(report) {
                writeln!(f, "{}", formatter.format_failed(failed))?;
            }
            writeln!(f)?;
        }

        if let Some(error) = &report.enumeration_error {
            color!(f, BOLD_PINK, "Enumeration aborted: {}\n\n", error)?;
        }

        color!(f, NORMAL, "🔍 {} Total", report.total)?;
        color!(
            f,
            DIM,
            " (in {})",
            Duration::from(report.duration).to_string()
        )?;
        color!(f, BOLD_GREEN, " ✅ {} Matched", report.matched.len())?;
        color!(f, NORMAL, " ➖ {} Unmatched", report.unmatched)?;

        write_if_any(report.failed(), "🚫", "Unresolved", &BOLD_PINK, f)?;
        write_if_any(report.recovered, "🔁", "Recovered", &BOLD_YELLOW, f)?;
        if report.cancelled {
            color!(f, BOLD_YELLOW, " {} Cancelled", "🛑")?;
        }

        Ok(())
    }
}

fn write_if_any(
    value: usize,
    symbol: &str,
    text: &str,
    style: &LazyLock<Style>,
    f: &mut fmt::Formatter<'_>,
) -> Result<(), fmt::Error> {
    if value > 0 {
        color!(f, style, " {} {} {}", symbol, value, text)?;
    }
    Ok(())
}

pub(crate) struct Compact {
    mode: OutputMode,
}

impl Compact {
    pub(crate) const fn new(mode: OutputMode) -> Self {
        Self { mode }
    }
}

impl StatsFormatter for Compact {
    fn format(&self, report: &SweepReport) -> Result<Option<String>> {
        let compact = CompactReport {
            report,
            mode: self.mode.clone(),
        };
        Ok(Some(compact.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::stats::test_helpers::sample_report;

    #[test]
    fn test_formatter() {
        let formatter = Compact::new(OutputMode::Plain);
        let result = formatter.format(&sample_report()).unwrap().unwrap();
        let result = console::strip_ansi_codes(&result);

        assert!(result.contains("🔍 4 Total"));
        assert!(result.contains("✅ 2 Matched"));
        assert!(result.contains("➖ 1 Unmatched"));
        assert!(result.contains("🚫 1 Unresolved"));
        assert!(result.contains("🔁 1 Recovered"));
        assert!(result.contains("(in 1s)"));

        // Matches are listed in name order
        let alice = result.find("alice (arn:user/alice)").unwrap();
        let bob = result.find("bob (arn:user/bob)").unwrap();
        assert!(alice < bob);

        assert!(result.contains(
            "[TRANSIENT] erin (arn:user/erin) | Directory responded with status code 429"
        ));
    }

    #[test]
    fn test_enumeration_error_is_shown() {
        let report = SweepReport {
            enumeration_error: Some("Directory rejected the page request".into()),
            ..SweepReport::default()
        };
        let result = Compact::new(OutputMode::Plain)
            .format(&report)
            .unwrap()
            .unwrap();
        assert!(result.contains("Enumeration aborted: Directory rejected the page request"));
        assert!(!result.contains("Unresolved"));
    }
}
