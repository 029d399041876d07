use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use http::StatusCode;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::aggregate::ResolvedSink;
use crate::classify::{Classification, TagFilter, classify};
use crate::dispatch::lookup_item;
use crate::source::TagLookup;
use crate::{FailedItem, Item, LookupError};

/// Default number of retry rounds, 1.
pub const DEFAULT_MAX_RETRIES: usize = 1;
/// Default wait time before the first retry round, 1 second.
pub const DEFAULT_RETRY_WAIT_TIME: Duration = Duration::from_secs(1);
/// Upper bound for the wait time between retry rounds.
const MAX_RETRY_WAIT_TIME: Duration = Duration::from_secs(30);

/// An extension trait to help determine if a failed lookup is retryable.
///
/// Modified from `Retryable` in [reqwest-middleware].
///
/// [reqwest-middleware]: https://github.com/TrueLayer/reqwest-middleware/blob/f854725791ccf4a02c401a26cab3d9db753f468c/reqwest-retry/src/retryable.rs
pub(crate) trait RetryExt {
    fn should_retry(&self) -> bool;
}

impl RetryExt for StatusCode {
    #[allow(clippy::if_same_then_else)]
    fn should_retry(&self) -> bool {
        let status = *self;
        if status.is_server_error() {
            true
        } else if status.is_success() {
            false
        } else {
            status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS
        }
    }
}

impl RetryExt for reqwest::Error {
    #[allow(clippy::if_same_then_else)]
    fn should_retry(&self) -> bool {
        if self.is_timeout() {
            true
        } else if self.is_body() || self.is_decode() || self.is_builder() || self.is_redirect() {
            false
        } else if self.is_connect() || self.is_request() {
            // Connections dropped by the directory under load surface as
            // resets; anything else (DNS, refused) won't get better
            get_source_error_type::<io::Error>(self).is_some_and(should_retry_io)
        } else if let Some(status) = self.status() {
            status.should_retry()
        } else {
            false
        }
    }
}

impl RetryExt for LookupError {
    #[allow(clippy::match_same_arms)]
    fn should_retry(&self) -> bool {
        match self {
            LookupError::Transient(_) => true,
            LookupError::Timeout(_) => true,
            LookupError::Permanent(_) => false,
            LookupError::Cancelled => false,
            LookupError::Panicked(_) => false,
        }
    }
}

/// Classifies an `io::Error` into retryable or not.
fn should_retry_io(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::TimedOut
    )
}

/// Downcasts the given err source into T.
fn get_source_error_type<T: std::error::Error + 'static>(
    err: &dyn std::error::Error,
) -> Option<&T> {
    let mut source = err.source();

    while let Some(err) = source {
        if let Some(typed) = err.downcast_ref::<T>() {
            return Some(typed);
        }

        source = err.source();
    }
    None
}

/// Statistics of a finished retry pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetryStats {
    /// Number of lookups performed
    pub retried: usize,
    /// Number of items that were resolved
    pub recovered: usize,
    /// Items that are still failing, with their last cause
    pub unresolved: Vec<FailedItem>,
}

/// Second chance for items that failed in the main wave.
///
/// Retries run one at a time and bypass both admission gates. Each round
/// works through a snapshot of the items that are still failing; failures
/// of a round go into the queue for the next one.
/// Items whose cause is not retryable skip the pass altogether.
pub struct RetryPass<'a> {
    pub(crate) lookup: &'a dyn TagLookup,
    pub(crate) filter: &'a TagFilter,
    pub(crate) max_retries: usize,
    pub(crate) wait_time: Duration,
    pub(crate) lookup_timeout: Option<Duration>,
    pub(crate) cancel: &'a CancellationToken,
}

impl RetryPass<'_> {
    /// Retry `failed` and deliver every item that resolves to `sink`
    pub async fn run(&self, failed: Vec<(Item, LookupError)>, sink: &ResolvedSink) -> RetryStats {
        let mut stats = RetryStats::default();

        let (retryable, skipped): (Vec<_>, Vec<_>) =
            failed.into_iter().partition(|(_, cause)| cause.should_retry());
        stats.unresolved.extend(skipped.into_iter().map(FailedItem::from));
        let mut queue = VecDeque::from(retryable);

        let mut wait_time = self.wait_time;
        for round in 1..=self.max_retries {
            if queue.is_empty() {
                break;
            }
            if !self.wait(wait_time).await {
                break;
            }
            wait_time = (wait_time * 2).min(MAX_RETRY_WAIT_TIME);

            info!("Retry round {round}: {} items", queue.len());
            let mut next = VecDeque::new();

            while let Some((item, _)) = queue.pop_front() {
                if self.cancel.is_cancelled() {
                    stats
                        .unresolved
                        .push(FailedItem::from((item, LookupError::Cancelled)));
                    continue;
                }

                stats.retried += 1;
                match lookup_item(self.lookup, &item, self.lookup_timeout, self.cancel).await {
                    Ok(tags) => {
                        debug!("Recovered {item}");
                        let delivered = match classify(self.filter, &tags) {
                            Classification::Matched => sink.matched(item).await,
                            Classification::Unmatched => sink.unmatched(item).await,
                        };
                        match delivered {
                            Ok(()) => stats.recovered += 1,
                            Err(e) => {
                                warn!("{e}");
                                let item = e.0.item().clone();
                                stats
                                    .unresolved
                                    .push(FailedItem::from((item, LookupError::permanent(e))));
                            }
                        }
                    }
                    Err(cause) if cause.should_retry() => next.push_back((item, cause)),
                    Err(cause) => stats.unresolved.push(FailedItem::from((item, cause))),
                }
            }
            queue = next;
        }

        stats
            .unresolved
            .extend(queue.into_iter().map(FailedItem::from));
        stats
    }

    /// Sleep before a round. Returns `false` if the sweep was cancelled
    /// in the meantime.
    async fn wait(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }
}
