use super::{StatsFormatter, sorted_matches, sorted_unresolved};
use crate::formatters::{duration::Duration, get_outcome_formatter};
use crate::options::OutputMode;

use anyhow::Result;
use std::fmt::{self, Display};
use tagsweep_lib::SweepReport;

// Maximum padding for each entry in the final statistics output
const MAX_PADDING: usize = 20;

fn write_stat(f: &mut fmt::Formatter, title: &str, stat: usize, newline: bool) -> fmt::Result {
    let fill = title.chars().count();
    f.write_str(title)?;
    write!(f, "{stat:.>width$}", width = MAX_PADDING.saturating_sub(fill))?;

    if newline {
        f.write_str("\n")?;
    }

    Ok(())
}

/// Wrap as newtype because multiple `Display` implementations are not allowed
/// for `SweepReport`
struct DetailedReport<'a> {
    report: &'a SweepReport,
    mode: OutputMode,
}

impl Display for DetailedReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        let separator = "-".repeat(MAX_PADDING + 1);

        writeln!(f, "\u{1f4dd} Summary")?; // 📝
        writeln!(f, "{separator}")?;
        write_stat(f, "\u{1f50d} Total", report.total, true)?; // 🔍
        write_stat(f, "\u{2705} Matched", report.matched.len(), true)?; // ✅
        write_stat(f, "\u{2796} Unmatched", report.unmatched, true)?; // ➖
        write_stat(f, "\u{1f501} Retried", report.retried, true)?; // 🔁
        write_stat(f, "\u{1fa79} Recovered", report.recovered, true)?; // 🩹
        write_stat(f, "\u{1f6ab} Unresolved", report.failed(), false)?; // 🚫
        write!(
            f,
            "\n\u{23f1} Duration: {}", // ⏱
            Duration::from(report.duration)
        )?;

        if report.cancelled {
            write!(f, "\n\u{1f6d1} Sweep was cancelled")?; // 🛑
        }

        if let Some(error) = &report.enumeration_error {
            write!(f, "\n\nEnumeration aborted\n{error}")?;
        }

        // Using leading newlines over trailing ones (e.g. `writeln!`)
        // lets us avoid extra newlines without any additional logic.
        if !report.matched.is_empty() {
            write!(f, "\n\nMatched items")?;
            for item in sorted_matches(report) {
                write!(f, "\n{item}")?;
            }
        }

        let formatter = get_outcome_formatter(&self.mode);
        if !report.unresolved.is_empty() {
            write!(f, "\n\nUnresolved items")?;
            for failed in sorted_unresolved(report) {
                write!(f, "\n{}", formatter.format_failed(failed))?;
            }
        }

        Ok(())
    }
}

pub(crate) struct Detailed {
    mode: OutputMode,
}

impl Detailed {
    pub(crate) const fn new(mode: OutputMode) -> Self {
        Self { mode }
    }
}

impl StatsFormatter for Detailed {
    fn format(&self, report: &SweepReport) -> Result<Option<String>> {
        let detailed = DetailedReport {
            report,
            mode: self.mode.clone(),
        };
        Ok(Some(detailed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::stats::test_helpers::sample_report;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summary_lines_are_padded() {
        let result = Detailed::new(OutputMode::Plain)
            .format(&sample_report())
            .unwrap()
            .unwrap();
        let lines: Vec<&str> = result.lines().collect();

        assert_eq!(lines[0], "\u{1f4dd} Summary");
        assert_eq!(lines[2], "\u{1f50d} Total............4");
        assert_eq!(lines[3], "\u{2705} Matched..........2");
        assert_eq!(lines[7], "\u{1f6ab} Unresolved.......1");
    }

    #[test]
    fn test_lists_items() {
        let result = Detailed::new(OutputMode::Plain)
            .format(&sample_report())
            .unwrap()
            .unwrap();

        assert!(result.contains("Matched items\nalice (arn:user/alice)\nbob (arn:user/bob)"));
        assert!(result.contains(
            "Unresolved items\n[TRANSIENT] erin (arn:user/erin) | Directory responded with status code 429"
        ));
    }
}
