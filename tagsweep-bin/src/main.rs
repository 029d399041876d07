//! `tagsweep` finds tagged items in large paginated directories without
//! tripping the directory's rate limits.
//!
//! The tagsweep binary is a wrapper around tagsweep-lib, which provides
//! convenience functions for calling tagsweep from the command-line.
//!
//! Find every user tagged `team=infra`:
//! ```sh
//! tagsweep --endpoint https://directory.example.com/v1/ \
//!     --filter-tag team --filter-value infra
//! ```
//!
//! List every item whose tags could be read, one lookup at a time:
//! ```sh
//! tagsweep --endpoint https://directory.example.com/v1/ \
//!     --operation list --run-mode serial
//! ```
//!
//! Print only the names of matched items, e.g. for piping into `xargs`:
//! ```sh
//! tagsweep -e https://directory.example.com/v1/ \
//!     --filter-tag env --filter-value staging --format raw --no-progress
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

use std::io::{self, ErrorKind};
use std::path::PathBuf;

use anyhow::{Error, Result, bail};
use clap::Parser;
use formatters::log::init_logging;
use log::error;

use options::TAGSWEEP_CONFIG_FILE;

mod client;
mod commands;
mod formatters;
mod options;
mod progress;
mod verbosity;

use crate::commands::CommandParams;
use crate::options::{Config, TagsweepOptions};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator.
    #[allow(unused)]
    UnexpectedFailure = 1,
    /// Some items could not be looked up, or the sweep was cancelled
    SweepFailure = 2,
    /// Invalid configuration, including a missing endpoint or filter
    ConfigFile = 3,
    /// The directory could not be enumerated in full
    EnumerationFailure = 4,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    // See: https://doc.rust-lang.org/stable/std/process/fn.exit.html
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file, command-line- and environment variables
fn load_config() -> Result<TagsweepOptions> {
    let mut opts = TagsweepOptions::parse();

    init_logging(&opts.config.verbose, &opts.config.mode);

    // Load a potentially existing config file and merge it into the config from
    // the CLI
    if let Some(config_file) = &opts.config_file {
        match Config::load_from_file(config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    } else {
        // If no config file was explicitly provided, we try to load the default
        // config file from the current directory if the file exits. This will
        // raise an error if the file is invalid, just like the explicit provided
        // config file.
        let default_config = PathBuf::from(TAGSWEEP_CONFIG_FILE);
        if default_config.is_file() {
            match Config::load_from_file(&default_config) {
                Ok(c) => opts.config.merge(c),
                Err(e) => {
                    bail!(
                        "Cannot load default configuration file `{}`: {e:?}",
                        default_config.display()
                    );
                }
            }
        }
    }

    Ok(opts)
}

/// Everything a sweep needs, checked before the runtime starts
fn prepare(opts: &TagsweepOptions) -> Result<CommandParams> {
    let sweep = opts.config.sweep_config()?;
    sweep.validate()?;
    let directory = client::create(&opts.config)?;
    Ok(CommandParams {
        directory,
        sweep,
        cfg: opts.config.clone(),
    })
}

/// Set up runtime and call tagsweep entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            error!("Error while loading config: {e}");
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let params = match prepare(&opts) {
        Ok(params) => params,
        Err(e) => {
            error!("{e:#}");
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let runtime = match opts.config.threads {
        Some(threads) => {
            // We define our own runtime instead of the `tokio::main` attribute
            // since we want to make the number of threads configurable
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(threads)
                .enable_all()
                .build()?
        }
        None => tokio::runtime::Runtime::new()?,
    };

    match runtime.block_on(commands::sweep(params)) {
        Err(e) if Some(ErrorKind::BrokenPipe) == underlying_io_error_kind(&e) => {
            exit(ExitCode::Success as i32);
        }
        res => res.map(|code| code as i32),
    }
}

/// Check if the given error can be traced back to an `io::ErrorKind`
/// This is helpful for troubleshooting the root cause of an error.
/// Code is taken from the anyhow documentation.
fn underlying_io_error_kind(error: &Error) -> Option<io::ErrorKind> {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
    }
    None
}
