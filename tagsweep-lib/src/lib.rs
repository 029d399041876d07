//! `tagsweep` is a library for sweeping the tags of every item in a
//! paginated directory, without overwhelming the directory.
//!
//! Items are enumerated page by page. Every item is looked up in its own
//! task, admitted through a burst pool and a concurrency cap. Lookups that
//! fail transiently get a second chance in a serial retry pass.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tagsweep_lib::{DirectoryBuilder, Result, SweepConfig, Sweeper, TagFilter};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let directory = DirectoryBuilder::builder()
//!       .endpoint(url::Url::parse("https://directory.example.com/api/").unwrap())
//!       .build()
//!       .directory()?;
//!
//!   let sweeper = Sweeper::builder()
//!       .config(SweepConfig {
//!           filter: TagFilter::pair("team", "infra")?,
//!           ..SweepConfig::default()
//!       })
//!       .lookup(Arc::new(directory.clone()))
//!       .build();
//!
//!   let report = sweeper.run(directory.pages()).await?;
//!   for item in &report.matched {
//!       println!("{item}");
//!   }
//!   Ok(())
//! }
//! ```
#![allow(clippy::module_name_repetitions)]

mod retry;
mod types;

pub mod aggregate;
pub mod classify;
pub mod dispatch;
pub mod ratelimit;
pub mod source;
pub mod sweep;

pub use crate::{
    aggregate::{CollectorStatus, DEFAULT_CHANNEL_CAPACITY, Tally},
    classify::{Classification, TagFilter, classify},
    dispatch::OutcomeObserver,
    ratelimit::{AdmissionConfig, AdmissionController, RunMode},
    retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_WAIT_TIME, RetryStats},
    source::{
        DEFAULT_PAGE_SIZE, DEFAULT_USER_AGENT, DirectoryBuilder, HttpDirectory, MemoryDirectory,
        Page, PageSource, TagLookup,
    },
    sweep::{SweepConfig, Sweeper},
    types::*,
};
