use std::fmt::{self, Display};

use super::{StatsFormatter, sorted_matches, sorted_unresolved};
use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Segment},
};
use tagsweep_lib::{FailedItem, SweepReport};

#[derive(Tabled)]
struct StatsTableEntry {
    #[tabled(rename = "Outcome")]
    outcome: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

fn stats_table(report: &SweepReport) -> String {
    let stats = vec![
        StatsTableEntry {
            outcome: "Total",
            count: report.total,
        },
        StatsTableEntry {
            outcome: "Matched",
            count: report.matched.len(),
        },
        StatsTableEntry {
            outcome: "Unmatched",
            count: report.unmatched,
        },
        StatsTableEntry {
            outcome: "Unresolved",
            count: report.failed(),
        },
        StatsTableEntry {
            outcome: "Retried",
            count: report.retried,
        },
        StatsTableEntry {
            outcome: "Recovered",
            count: report.recovered,
        },
    ];
    let style = Style::markdown();

    Table::new(stats)
        .with(Modify::new(Segment::all()).with(Alignment::left()))
        .with(style)
        .to_string()
}

/// Helper function to format a single unresolved item as markdown
fn markdown_failed(failed: &FailedItem) -> String {
    format!(
        "* [{}] `{}` | {}",
        failed.cause.label(),
        failed.item,
        failed.cause
    )
}

struct MarkdownReport<'a>(&'a SweepReport);

impl Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;

        writeln!(f, "# Summary")?;
        writeln!(f)?;
        writeln!(f, "{}", stats_table(report))?;

        if let Some(error) = &report.enumeration_error {
            writeln!(f, "\n## Enumeration aborted\n\n{error}")?;
        }

        if report.cancelled {
            writeln!(f, "\nThe sweep was cancelled before it could finish.")?;
        }

        if !report.matched.is_empty() {
            writeln!(f, "\n## Matched items\n")?;
            for item in sorted_matches(report) {
                writeln!(f, "* `{item}`")?;
            }
        }

        if !report.unresolved.is_empty() {
            writeln!(f, "\n## Unresolved items\n")?;
            for failed in sorted_unresolved(report) {
                writeln!(f, "{}", markdown_failed(failed))?;
            }
        }

        Ok(())
    }
}

pub(crate) struct Markdown;

impl Markdown {
    pub(crate) const fn new() -> Self {
        Self {}
    }
}

impl StatsFormatter for Markdown {
    fn format(&self, report: &SweepReport) -> Result<Option<String>> {
        let markdown = MarkdownReport(report);
        Ok(Some(markdown.to_string()))
    }
}
