use indicatif::{ProgressBar as Bar, ProgressStyle};
use std::{io::Write, sync::LazyLock, time::Duration};
use tagsweep_lib::CollectorStatus;

#[derive(Clone)]
struct ProgressConfig {
    template: &'static str,
    tick_interval: Duration,
}

const CONFIG: ProgressConfig = ProgressConfig {
    template: "{spinner:.162} {pos:.238} items looked up {prefix:.238} {elapsed:.238} {wide_msg}",
    tick_interval: Duration::from_millis(500),
};

static STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::with_template(CONFIG.template).expect("Valid progress bar")
});

#[derive(Clone)]
/// Report progress of a sweep to the CLI.
///
/// The total number of items is unknown until the directory has been
/// enumerated, so this is a spinner counting finished lookups.
pub(crate) struct Progress {
    bar: Option<Bar>,
    detailed: bool,
}

impl Progress {
    pub(crate) fn new(initial_message: &'static str, hide_bar: bool, detailed: bool) -> Self {
        // Showing the progress bar and detailed logging is too much information
        let bar = if hide_bar || detailed {
            None
        } else {
            let bar = Bar::new_spinner().with_style(STYLE.clone());
            bar.set_message(initial_message);
            bar.enable_steady_tick(CONFIG.tick_interval);
            Some(bar)
        };

        Progress { bar, detailed }
    }

    pub(crate) fn show(&self, out: String, status: &CollectorStatus) {
        // progress is reported on stderr and NOT on stdout
        // a closed stderr is not worth aborting the sweep for
        let _ = self.show_to_buffer(&mut std::io::stderr(), out, status);
    }

    fn show_to_buffer(
        &self,
        buffer: &mut dyn Write,
        out: String,
        status: &CollectorStatus,
    ) -> std::io::Result<()> {
        if self.detailed {
            writeln!(buffer, "{}", &out)?;
        }

        self.update(Some(out), status);
        Ok(())
    }

    fn update(&self, message: Option<String>, status: &CollectorStatus) {
        self.with_bar(|bar| {
            bar.inc(1);
            bar.set_prefix(tally(status));
            if let Some(msg) = message {
                bar.set_message(msg);
            }
        });
    }

    pub(crate) fn finish(&self, message: &'static str) {
        self.with_bar(|b| b.finish_with_message(message));
    }

    fn with_bar<F>(&self, action: F)
    where
        F: FnOnce(&Bar),
    {
        if let Some(bar) = &self.bar {
            action(bar);
        }
    }
}

/// Collected outcomes per kind, plus those still queued for a collector
fn tally(status: &CollectorStatus) -> String {
    let CollectorStatus { received, pending } = status;
    format!(
        "({} matched, {} unmatched, {} failed, {} queued)",
        received.matched,
        received.unmatched,
        received.failed,
        pending.total()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_progress_output() {
        let mut buf = Vec::new();
        Progress::new("", false, false)
            .show_to_buffer(&mut buf, "[MATCHED] alice".into(), &CollectorStatus::default())
            .unwrap();

        assert!(buf.is_empty());
    }

    #[test]
    fn test_detailed_progress_output() {
        let mut buf = Vec::new();
        Progress::new("", false, true)
            .show_to_buffer(&mut buf, "[MATCHED] alice".into(), &CollectorStatus::default())
            .unwrap();

        let buf = String::from_utf8_lossy(&buf);
        assert_eq!(buf, "[MATCHED] alice\n");
    }

    #[test]
    fn test_update_counts_lookups() {
        let progress = Progress::new("Sweeping", false, false);
        progress.update(None, &CollectorStatus::default());

        let mut status = CollectorStatus::default();
        status.received.matched = 3;
        status.received.failed = 1;
        status.pending.unmatched = 2;
        progress.update(Some("bob".into()), &status);

        let bar = progress.bar.as_ref().unwrap();
        assert_eq!(bar.position(), 2);
        assert_eq!(bar.message(), "bob");
        assert_eq!(bar.prefix(), "(3 matched, 0 unmatched, 1 failed, 2 queued)");
    }
}
