//! Orchestration of a complete sweep.
//!
//! A sweep runs in three phases:
//!
//! 1. the main wave enumerates the directory and looks up every item
//!    through the admission gates
//! 2. once the main wave is done, the retry pass takes a snapshot of all
//!    failures and retries them one by one
//! 3. the collectors are drained and the [`SweepReport`] is assembled
//!
//! Matched and unmatched outcomes stay deliverable until the retry pass
//! has finished.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

use crate::aggregate::{Aggregator, DEFAULT_CHANNEL_CAPACITY};
use crate::classify::TagFilter;
use crate::dispatch::{Dispatcher, OutcomeObserver};
use crate::ratelimit::{AdmissionConfig, AdmissionController, RunMode};
use crate::retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_WAIT_TIME, RetryPass};
use crate::source::{PageSource, TagLookup};
use crate::{ErrorKind, Result, SweepReport};

/// Everything that shapes a sweep apart from the directory itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Which items count as matched
    pub filter: TagFilter,
    /// Which admission gates apply
    pub mode: RunMode,
    /// Sizing of the admission gates
    pub admission: AdmissionConfig,
    /// Capacity of each outcome channel
    pub channel_capacity: usize,
    /// Number of retry rounds for transient failures
    pub max_retries: usize,
    /// Wait time before the first retry round, doubled for every further round
    #[serde(with = "humantime_serde")]
    pub retry_wait_time: Duration,
    /// Timeout for a single lookup
    #[serde(with = "humantime_serde")]
    pub lookup_timeout: Option<Duration>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            filter: TagFilter::default(),
            mode: RunMode::default(),
            admission: AdmissionConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_wait_time: DEFAULT_RETRY_WAIT_TIME,
            lookup_timeout: None,
        }
    }
}

impl SweepConfig {
    /// Check the configuration before anything is spawned.
    ///
    /// # Errors
    ///
    /// Fails for an incomplete tag filter, zero-sized admission gates or a
    /// zero channel capacity.
    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        self.admission.validate()?;
        if self.channel_capacity == 0 {
            return Err(ErrorKind::InvalidAdmission(
                "channel capacity must not be zero",
            ));
        }
        Ok(())
    }
}

/// Runs sweeps against a [`TagLookup`].
///
/// ```
/// use std::sync::Arc;
/// use tagsweep_lib::{Item, MemoryDirectory, SweepConfig, Sweeper, TagFilter, TagSet};
///
/// # #[tokio::main]
/// # async fn main() -> tagsweep_lib::Result<()> {
/// let directory = MemoryDirectory::new(
///     [
///         (Item::new("alice", "h1"), [("team", "infra")].into_iter().collect()),
///         (Item::new("bob", "h2"), TagSet::new()),
///     ],
///     10,
/// );
///
/// let sweeper = Sweeper::builder()
///     .config(SweepConfig {
///         filter: TagFilter::pair("team", "infra")?,
///         ..SweepConfig::default()
///     })
///     .lookup(Arc::new(directory.clone()))
///     .build();
///
/// let report = sweeper.run(directory.pages()).await?;
/// assert_eq!(report.matched, vec![Item::new("alice", "h1")]);
/// assert_eq!(report.unmatched, 1);
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder)]
pub struct Sweeper {
    /// Shape of the sweep
    #[builder(default)]
    config: SweepConfig,

    /// Where tags are looked up
    lookup: Arc<dyn TagLookup>,

    /// Cancels the sweep; every unfinished item ends up as a failure
    #[builder(default)]
    cancel: CancellationToken,

    /// Called for every outcome of the main wave
    #[builder(default, setter(strip_option))]
    on_outcome: Option<OutcomeObserver>,
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Sweeper {
    /// The configuration of this sweeper
    #[must_use]
    pub const fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Token which cancels running sweeps
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Sweep through every item of `source`.
    ///
    /// Enumeration errors do not fail the sweep; they are recorded in the
    /// report and everything enumerated before is still processed.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or one of the collector tasks
    /// died.
    pub async fn run<S: PageSource>(&self, mut source: S) -> Result<SweepReport> {
        self.config.validate()?;
        let start = Instant::now();

        let admission = Arc::new(AdmissionController::new(
            self.config.mode,
            &self.config.admission,
        )?);
        if self.config.mode == RunMode::Bucket {
            info!(
                "Admitting a burst of {} lookups, then {:.1} per second with at most {} in flight",
                self.config.admission.burst_capacity,
                self.config.admission.sustained_rate(),
                self.config.admission.max_concurrency
            );
        }
        let (mut aggregator, sink) = Aggregator::start(self.config.channel_capacity);
        let resolved = sink.resolved();

        let dispatcher = Dispatcher {
            lookup: Arc::clone(&self.lookup),
            filter: Arc::new(self.config.filter.clone()),
            admission: Arc::clone(&admission),
            lookup_timeout: self.config.lookup_timeout,
            cancel: self.cancel.clone(),
            observer: self.on_outcome.clone(),
        };
        let summary = dispatcher.run(&mut source, sink).await;

        let failed = aggregator.failed().await?;
        let first_pass_failures = failed.len();
        info!(
            "Main wave done: {} items, {first_pass_failures} failures, peak concurrency {}",
            summary.total,
            admission.peak_in_flight()
        );

        let retry = RetryPass {
            lookup: self.lookup.as_ref(),
            filter: &self.config.filter,
            max_retries: self.config.max_retries,
            wait_time: self.config.retry_wait_time,
            lookup_timeout: self.config.lookup_timeout,
            cancel: &self.cancel,
        }
        .run(failed, &resolved)
        .await;
        drop(resolved);

        let collected = aggregator.finish().await?;
        debug!(
            "Collected {} matched and {} unmatched items",
            collected.matched.len(),
            collected.unmatched.len()
        );

        Ok(SweepReport {
            total: summary.total,
            matched: collected.matched,
            unmatched: collected.unmatched.len(),
            unresolved: retry.unresolved,
            first_pass_failures,
            retried: retry.retried,
            recovered: retry.recovered,
            duration: start.elapsed(),
            enumeration_error: summary.enumeration_error.map(|e| e.to_string()),
            cancelled: self.cancel.is_cancelled(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryDirectory, Page};
    use crate::{Item, LookupError, TagSet};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn directory(n: usize) -> MemoryDirectory {
        MemoryDirectory::new(
            (0..n).map(|i| {
                let tags: TagSet = if i % 3 == 0 {
                    [("team", "infra")].into_iter().collect()
                } else if i % 3 == 1 {
                    [("team", "web")].into_iter().collect()
                } else {
                    TagSet::new()
                };
                (Item::new(format!("user-{i}"), format!("h{i}")), tags)
            }),
            10,
        )
    }

    fn config(filter: TagFilter) -> SweepConfig {
        SweepConfig {
            filter,
            retry_wait_time: Duration::ZERO,
            ..SweepConfig::default()
        }
    }

    #[tokio::test]
    async fn test_filter_sweep() {
        let directory = directory(30);
        let sweeper = Sweeper::builder()
            .config(config(TagFilter::pair("team", "infra").unwrap()))
            .lookup(Arc::new(directory.clone()))
            .build();

        let report = sweeper.run(directory.pages()).await.unwrap();

        assert_eq!(report.total, 30);
        assert_eq!(report.matched.len(), 10);
        assert_eq!(report.unmatched, 20);
        assert!(report.unresolved.is_empty());
        assert!(report.is_complete());
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_list_sweep_matches_everything() {
        let directory = directory(12);
        let sweeper = Sweeper::builder()
            .config(config(TagFilter::Any))
            .lookup(Arc::new(directory.clone()))
            .build();

        let report = sweeper.run(directory.pages()).await.unwrap();
        assert_eq!(report.matched.len(), 12);
        assert_eq!(report.unmatched, 0);
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let directory = directory(0);
        let sweeper = Sweeper::builder()
            .lookup(Arc::new(directory.clone()))
            .build();

        let report = sweeper.run(directory.pages()).await.unwrap();
        assert_eq!(report.total, 0);
        assert!(report.is_complete());
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_missing_filter_is_rejected() {
        let directory = directory(3);
        let sweeper = Sweeper::builder()
            .config(config(TagFilter::Pair {
                key: "team".into(),
                value: String::new(),
            }))
            .lookup(Arc::new(directory.clone()))
            .build();

        assert!(matches!(
            sweeper.run(directory.pages()).await,
            Err(ErrorKind::MissingFilter)
        ));
    }

    /// Throttles the first lookup of every item
    struct ThrottleOnce {
        inner: MemoryDirectory,
        seen: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl TagLookup for ThrottleOnce {
        async fn lookup(&self, item: &Item) -> std::result::Result<TagSet, LookupError> {
            if self.seen.lock().unwrap().insert(item.name.clone()) {
                return Err(LookupError::transient("throttled"));
            }
            self.inner.lookup(item).await
        }
    }

    #[tokio::test]
    async fn test_retry_pass_recovers_main_wave_failures() {
        let directory = directory(9);
        let sweeper = Sweeper::builder()
            .config(config(TagFilter::pair("team", "infra").unwrap()))
            .lookup(Arc::new(ThrottleOnce {
                inner: directory.clone(),
                seen: Mutex::new(HashSet::new()),
            }))
            .build();

        let report = sweeper.run(directory.pages()).await.unwrap();

        assert_eq!(report.first_pass_failures, 9);
        assert_eq!(report.retried, 9);
        assert_eq!(report.recovered, 9);
        assert_eq!(report.matched.len(), 3);
        assert_eq!(report.unmatched, 6);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_unresolved_without_retries() {
        let directory = directory(4);
        let sweeper = Sweeper::builder()
            .config(SweepConfig {
                max_retries: 0,
                ..config(TagFilter::Any)
            })
            .lookup(Arc::new(ThrottleOnce {
                inner: directory.clone(),
                seen: Mutex::new(HashSet::new()),
            }))
            .build();

        let report = sweeper.run(directory.pages()).await.unwrap();
        assert_eq!(report.failed(), 4);
        assert!(report.is_complete());
        assert!(!report.is_success());
    }

    /// Holds every lookup for a while and records how many overlap
    struct SlowLookup {
        inner: MemoryDirectory,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TagLookup for SlowLookup {
        async fn lookup(&self, item: &Item) -> std::result::Result<TagSet, LookupError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.inner.lookup(item).await
        }
    }

    #[rstest]
    #[case(RunMode::Bucket, 3, 3)]
    #[case(RunMode::Bucket, 1, 1)]
    #[case(RunMode::Serial, 10, 1)]
    #[tokio::test]
    async fn test_lookups_in_flight_are_bounded(
        #[case] mode: RunMode,
        #[case] max_concurrency: usize,
        #[case] bound: usize,
    ) {
        let directory = directory(20);
        let lookup = Arc::new(SlowLookup {
            inner: directory.clone(),
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let sweeper = Sweeper::builder()
            .config(SweepConfig {
                mode,
                admission: AdmissionConfig {
                    max_concurrency,
                    ..AdmissionConfig::default()
                },
                ..config(TagFilter::Any)
            })
            .lookup(Arc::clone(&lookup) as Arc<dyn TagLookup>)
            .build();

        let report = sweeper.run(directory.pages()).await.unwrap();

        let peak = lookup.peak.load(Ordering::SeqCst);
        assert!(peak >= 1);
        assert!(peak <= bound, "{peak} lookups in flight, expected at most {bound}");
        assert_eq!(report.matched.len(), 20);
        assert!(report.is_complete());
    }

    /// Every tenth item fails: every twentieth permanently, the others once
    /// with a throttling error
    struct FailureMix {
        inner: MemoryDirectory,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl FailureMix {
        fn calls(&self, name: &str) -> usize {
            self.calls.lock().unwrap().get(name).copied().unwrap_or_default()
        }
    }

    #[async_trait]
    impl TagLookup for FailureMix {
        async fn lookup(&self, item: &Item) -> std::result::Result<TagSet, LookupError> {
            let calls = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(item.name.clone()).or_default();
                *count += 1;
                *count
            };
            let id: usize = item.name.trim_start_matches("user-").parse().unwrap();
            if id % 20 == 0 {
                return Err(LookupError::permanent("no such item"));
            }
            if id % 10 == 0 && calls == 1 {
                return Err(LookupError::transient("throttled"));
            }
            self.inner.lookup(item).await
        }
    }

    #[tokio::test]
    async fn test_mixed_failures_are_accounted_for() {
        let directory = directory(100);
        let lookup = Arc::new(FailureMix {
            inner: directory.clone(),
            calls: Mutex::new(HashMap::new()),
        });
        let sweeper = Sweeper::builder()
            .config(SweepConfig {
                admission: AdmissionConfig {
                    burst_capacity: 20,
                    burst_interval: Duration::from_millis(1),
                    max_concurrency: 8,
                },
                ..config(TagFilter::pair("team", "infra").unwrap())
            })
            .lookup(Arc::clone(&lookup) as Arc<dyn TagLookup>)
            .build();

        let report = sweeper.run(directory.pages()).await.unwrap();

        assert_eq!(report.total, 100);
        assert_eq!(report.first_pass_failures, 10);
        assert_eq!(
            report.matched.len() + report.unmatched + report.unresolved.len(),
            report.total
        );
        // user-0 and user-60 carry the tag but fail permanently
        assert_eq!(report.matched.len(), 32);
        assert_eq!(report.unmatched, 63);

        // Only the throttled items were admitted again
        assert_eq!(report.retried, 5);
        assert_eq!(report.recovered, 5);
        assert_eq!(report.unresolved.len(), 5);
        assert!(
            report
                .unresolved
                .iter()
                .all(|f| matches!(f.cause, LookupError::Permanent(_)))
        );
        for id in (0..100).step_by(10) {
            let expected = if id % 20 == 0 { 1 } else { 2 };
            assert_eq!(lookup.calls(&format!("user-{id}")), expected, "user-{id}");
        }
        assert!(report.is_complete());
    }

    struct FailingSecondPage {
        pages: usize,
    }

    #[async_trait]
    impl PageSource for FailingSecondPage {
        async fn next_page(&mut self) -> Result<Option<Page>> {
            self.pages += 1;
            if self.pages > 1 {
                return Err(ErrorKind::InvalidPage("truncated body".into()));
            }
            Ok(Some(Page::new(
                vec![Item::new("user-0", "h0"), Item::new("user-1", "h1")],
                true,
            )))
        }
    }

    #[tokio::test]
    async fn test_enumeration_error_is_reported() {
        let sweeper = Sweeper::builder()
            .config(config(TagFilter::Any))
            .lookup(Arc::new(directory(2)))
            .build();

        let report = sweeper.run(FailingSecondPage { pages: 0 }).await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.matched.len(), 2);
        assert!(report.enumeration_error.is_some());
        assert!(report.is_complete());
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_burst_then_sustained_rate() {
        let directory = directory(30);
        let sweeper = Sweeper::builder()
            .config(SweepConfig {
                admission: AdmissionConfig {
                    burst_capacity: 10,
                    burst_interval: Duration::from_millis(20),
                    max_concurrency: 50,
                },
                ..config(TagFilter::Any)
            })
            .lookup(Arc::new(directory.clone()))
            .build();

        let start = Instant::now();
        let report = sweeper.run(directory.pages()).await.unwrap();

        // 10 immediately, the remaining 20 one every 20ms
        assert!(start.elapsed() >= Duration::from_millis(350));
        assert_eq!(report.matched.len(), 30);
    }

    #[tokio::test]
    async fn test_sweep_over_http() {
        let server = test_utils::mock_directory!(2;
            "alice" => [("team", "infra"), ("env", "prod")],
            "bob" => [("team", "web")],
            "carol" => [("team", "infra")],
            "dave" => [],
            "erin" => [("team", "infra")],
        );
        test_utils::mock_failing_tags!(server, "erin", 503, 1);
        test_utils::mock_failing_tags!(server, "dave", 404);

        let directory = crate::DirectoryBuilder::builder()
            .endpoint(url::Url::parse(&server.uri()).unwrap())
            .page_size(2_usize)
            .build()
            .directory()
            .unwrap();
        let sweeper = Sweeper::builder()
            .config(config(TagFilter::pair("team", "infra").unwrap()))
            .lookup(Arc::new(directory.clone()))
            .build();

        let report = sweeper.run(directory.pages()).await.unwrap();

        let mut matched: Vec<_> = report.matched.iter().map(|i| i.name.as_str()).collect();
        matched.sort_unstable();
        assert_eq!(matched, vec!["alice", "carol", "erin"]);
        assert_eq!(report.unmatched, 1);
        assert_eq!(report.first_pass_failures, 2);
        assert_eq!(report.recovered, 1);
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].item, Item::new("dave", "handle-dave"));
        assert!(matches!(report.unresolved[0].cause, LookupError::Permanent(_)));
        assert!(report.is_complete());
    }

    #[test]
    fn test_config_deserialization() {
        let config: SweepConfig = toml::from_str(
            r#"
            mode = "serial"
            max_retries = 3
            retry_wait_time = "2s"
            lookup_timeout = "30s"

            [filter.pair]
            key = "team"
            value = "infra"

            [admission]
            max_concurrency = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, RunMode::Serial);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_wait_time, Duration::from_secs(2));
        assert_eq!(config.lookup_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.filter, TagFilter::pair("team", "infra").unwrap());
        assert_eq!(config.admission.max_concurrency, 5);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }
}
