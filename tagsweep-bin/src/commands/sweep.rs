use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use tagsweep_lib::{CollectorStatus, Outcome, SweepReport, Sweeper};
use tokio_util::sync::CancellationToken;

use super::{CommandParams, create_writer};
use crate::ExitCode;
use crate::formatters::{get_outcome_formatter, get_stats_formatter};
use crate::options::Config;
use crate::progress::Progress;

/// Sweep the whole directory and write the report.
///
/// Pressing Ctrl-C cancels the sweep; items which were not looked up by then
/// are reported as unresolved.
pub(crate) async fn sweep(params: CommandParams) -> Result<ExitCode> {
    let CommandParams {
        directory,
        sweep,
        cfg,
    } = params;

    let progress = Progress::new("Sweeping directory", cfg.no_progress, cfg.verbose.is_detailed());
    let formatter = get_outcome_formatter(&cfg.mode);

    let observer_progress = progress.clone();
    let sweeper = Sweeper::builder()
        .config(sweep)
        .lookup(Arc::new(directory.clone()))
        .on_outcome(Arc::new(move |outcome: &Outcome, status: &CollectorStatus| {
            observer_progress.show(formatter.format_outcome(outcome), status);
        }))
        .build();

    let interrupt = tokio::spawn(cancel_on_interrupt(sweeper.cancellation_token()));
    let result = sweeper.run(directory.pages()).await;
    interrupt.abort();

    let report = result?;
    progress.finish("Sweep finished");

    info!(
        "Swept {} items in {}",
        report.total,
        crate::formatters::duration::Duration::from(report.duration)
    );
    write_report(&report, &cfg)?;

    Ok(exit_code(&report))
}

/// Cancel the sweep on the first Ctrl-C
async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Received interrupt, cancelling the sweep");
        cancel.cancel();
    }
}

/// Exit code for a finished sweep
///
/// A directory which could not be enumerated in full is reported even if
/// some lookups failed as well.
pub(crate) fn exit_code(report: &SweepReport) -> ExitCode {
    if report.enumeration_error.is_some() {
        ExitCode::EnumerationFailure
    } else if report.is_success() {
        ExitCode::Success
    } else {
        ExitCode::SweepFailure
    }
}

/// Write the formatted report to the configured output
fn write_report(report: &SweepReport, cfg: &Config) -> Result<()> {
    let formatter = get_stats_formatter(&cfg.format, &cfg.mode);
    if let Some(formatted) = formatter.format(report)? {
        let mut writer = create_writer(cfg.output.as_deref())?;
        writeln!(writer, "{}", formatted.trim_end_matches('\n'))?;
        writer.flush()?;
    }
    Ok(())
}
