//! The main wave of a sweep.
//!
//! Pages are pulled from a [`PageSource`] one after another. Every item on a
//! page gets its own task right away; the task waits for admission, looks up
//! the tags, classifies them and hands the outcome to the aggregator.
//! Enumeration never waits for lookups.

use futures::FutureExt;
use log::{debug, error, warn};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::aggregate::{ChannelClosed, CollectorStatus, OutcomeSink};
use crate::classify::{TagFilter, classify};
use crate::ratelimit::AdmissionController;
use crate::source::{PageSource, TagLookup};
use crate::{ErrorKind, Item, LookupError, Outcome, TagSet};

/// Callback invoked with every outcome of the main wave, together with the
/// state of the collectors right before the outcome is handed over
pub type OutcomeObserver = Arc<dyn Fn(&Outcome, &CollectorStatus) + Send + Sync>;

/// What happened during enumeration
#[derive(Debug, Default)]
pub struct DispatchSummary {
    /// Number of enumerated items, each of which produced one outcome
    pub total: usize,
    /// Number of pages fetched
    pub pages: usize,
    /// Set if enumeration stopped because of an error
    pub enumeration_error: Option<ErrorKind>,
}

/// Enumerates a directory and fans lookups out to tasks
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) lookup: Arc<dyn TagLookup>,
    pub(crate) filter: Arc<TagFilter>,
    pub(crate) admission: Arc<AdmissionController>,
    pub(crate) lookup_timeout: Option<Duration>,
    pub(crate) cancel: CancellationToken,
    pub(crate) observer: Option<OutcomeObserver>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("filter", &self.filter)
            .field("admission", &self.admission)
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Enumerate `source` and wait until every spawned lookup delivered its
    /// outcome to `sink`.
    ///
    /// Returns once all tasks are done. `sink` is dropped at that point,
    /// which closes the failed channel.
    pub async fn run<S>(&self, source: &mut S, sink: OutcomeSink) -> DispatchSummary
    where
        S: PageSource + ?Sized,
    {
        let mut summary = DispatchSummary::default();
        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<Id, Item> = HashMap::new();

        loop {
            let page = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    warn!("Sweep cancelled, no further pages are enumerated");
                    break;
                }
                page = source.next_page() => page,
            };

            let page = match page {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    error!("Enumeration stopped after {} items: {e}", summary.total);
                    summary.enumeration_error = Some(e);
                    break;
                }
            };

            summary.pages += 1;
            summary.total += page.items.len();
            for item in page.items {
                let handle = tasks.spawn(self.clone().process(item.clone(), sink.clone()));
                in_flight.insert(handle.id(), item);
            }

            while let Some(joined) = tasks.try_join_next_with_id() {
                self.reap(joined, &mut in_flight, &sink).await;
            }

            if !page.has_more {
                break;
            }
        }

        debug!(
            "Enumerated {} items on {} pages, waiting for lookups",
            summary.total, summary.pages
        );

        while let Some(joined) = tasks.join_next_with_id().await {
            self.reap(joined, &mut in_flight, &sink).await;
        }

        summary
    }

    async fn process(self, item: Item, sink: OutcomeSink) -> Result<(), ChannelClosed> {
        let outcome = match self.admission.acquire(&self.cancel).await {
            Ok(_permit) => {
                match lookup_item(self.lookup.as_ref(), &item, self.lookup_timeout, &self.cancel)
                    .await
                {
                    Ok(tags) => classify(&self.filter, &tags).into_outcome(item),
                    Err(e) => Outcome::Failed(item, e),
                }
            }
            Err(e) => Outcome::Failed(item, e.into()),
        };
        self.deliver(outcome, &sink).await
    }

    async fn deliver(&self, outcome: Outcome, sink: &OutcomeSink) -> Result<(), ChannelClosed> {
        if let Some(observer) = &self.observer {
            observer(&outcome, &sink.status());
        }
        sink.send(outcome).await
    }

    async fn reap(
        &self,
        joined: Result<(Id, Result<(), ChannelClosed>), JoinError>,
        in_flight: &mut HashMap<Id, Item>,
        sink: &OutcomeSink,
    ) {
        match joined {
            Ok((id, delivered)) => {
                in_flight.remove(&id);
                if let Err(e) = delivered {
                    error!("{e}");
                }
            }
            Err(e) => {
                let Some(item) = in_flight.remove(&e.id()) else {
                    error!("Lookup task {} failed: {e}", e.id());
                    return;
                };
                let cause = if e.is_panic() {
                    LookupError::Panicked(panic_message(e.into_panic().as_ref()))
                } else {
                    LookupError::Cancelled
                };
                warn!("Lookup task for {item} did not finish: {cause}");
                if let Err(e) = self.deliver(Outcome::Failed(item, cause), sink).await {
                    error!("{e}");
                }
            }
        }
    }
}

/// Look up the tags of one item, honoring the timeout and cancellation.
///
/// A panicking lookup is turned into [`LookupError::Panicked`].
pub(crate) async fn lookup_item(
    lookup: &dyn TagLookup,
    item: &Item,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<TagSet, LookupError> {
    let fut = AssertUnwindSafe(lookup.lookup(item)).catch_unwind();
    let fut = async move {
        match timeout {
            Some(t) => tokio::time::timeout(t, fut)
                .await
                .unwrap_or_else(|_| Ok(Err(LookupError::Timeout(t)))),
            None => fut.await,
        }
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(LookupError::Cancelled),
        result = fut => result.unwrap_or_else(|panic| {
            Err(LookupError::Panicked(panic_message(panic.as_ref())))
        }),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
