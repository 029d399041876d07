//! Log output of the command line tool.
//!
//! Records emitted by the sweep engine carry the phase they belong to, so a
//! run reads like `[INFO] retry: Retry round 2: 4 items` instead of a bare
//! message.

use env_logger::{Builder, Env};
use log::{LevelFilter, Record};
use std::io::Write;

use crate::{formatters::color::color_for_level, options::OutputMode, verbosity::Verbosity};

/// Crates whose log level follows `-v`/`-q`
const OWN_CRATES: [&str; 2] = ["tagsweep", "tagsweep_lib"];

/// Phase of the sweep a log target belongs to
fn phase(target: &str) -> Option<&'static str> {
    let module = target.strip_prefix("tagsweep_lib::")?;
    match module.split("::").next()? {
        "source" => Some("directory"),
        "ratelimit" => Some("admission"),
        "dispatch" => Some("main wave"),
        "aggregate" => Some("collect"),
        "retry" => Some("retry"),
        "sweep" => Some("sweep"),
        _ => None,
    }
}

fn message(record: &Record<'_>) -> String {
    match phase(record.target()) {
        Some(phase) => format!("{phase}: {}", record.args()),
        None => record.args().to_string(),
    }
}

/// Initialize the logging system with the given verbosity level.
///
/// `RUST_LOG` takes precedence over `-v`/`-q` when set.
pub(crate) fn init_logging(verbose: &Verbosity, mode: &OutputMode) {
    let mut builder = Builder::from_env(Env::default().filter_or("RUST_LOG", "warn"));
    builder.format_timestamp(None);

    if std::env::var("RUST_LOG").is_err() {
        // reqwest and friends only get to report warnings
        builder.filter_level(LevelFilter::Warn);
        for module in OWN_CRATES {
            builder.filter_module(module, verbose.log_level_filter());
        }
    }

    let plain = mode.is_plain();
    builder.format(move |buf, record| {
        let level = format!("[{}]", record.level());
        if plain {
            writeln!(buf, "{level} {}", message(record))
        } else {
            let level = color_for_level(record.level()).apply_to(level);
            writeln!(buf, "{level} {}", message(record))
        }
    });

    builder.init();
}
