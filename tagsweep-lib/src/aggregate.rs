//! Collection of lookup outcomes.
//!
//! Outcomes travel over three bounded channels, one per kind of outcome.
//! Each channel has exactly one consumer task which owns the collection it
//! fills, so no collection is ever touched by two tasks at once.
//!
//! A channel closes once every sink feeding it has been dropped. Dispatch
//! holds the only [`FailedSink`], so the failed channel closes as soon as
//! the main wave is done, while matched and unmatched outcomes keep
//! arriving from the retry pass through a [`ResolvedSink`].

use log::trace;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{ErrorKind, Item, LookupError, Outcome, Result};

/// Default capacity of each outcome channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 30;

/// Per-kind outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Matched outcomes
    pub matched: usize,
    /// Unmatched outcomes
    pub unmatched: usize,
    /// Failed outcomes
    pub failed: usize,
}

impl Tally {
    /// Sum over all kinds
    #[must_use]
    pub const fn total(&self) -> usize {
        self.matched + self.unmatched + self.failed
    }
}

#[derive(Debug, Default)]
struct Counter {
    pending: AtomicUsize,
    received: AtomicUsize,
}

impl Counter {
    fn announce(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn retract(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }

    fn consume(&self) {
        self.received.fetch_add(1, Ordering::SeqCst);
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct Counters {
    matched: Counter,
    unmatched: Counter,
    failed: Counter,
}

impl Counters {
    fn tally(&self, pick: impl Fn(&Counter) -> usize) -> Tally {
        Tally {
            matched: pick(&self.matched),
            unmatched: pick(&self.unmatched),
            failed: pick(&self.failed),
        }
    }

    fn status(&self) -> CollectorStatus {
        CollectorStatus {
            received: self.tally(|c| c.received.load(Ordering::SeqCst)),
            pending: self.tally(|c| c.pending.load(Ordering::SeqCst)),
        }
    }
}

/// Snapshot of the collectors, used for progress reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectorStatus {
    /// Outcomes consumed so far, per kind
    pub received: Tally,
    /// Outcomes sent but not yet consumed, per kind
    pub pending: Tally,
}

/// The consumer of a channel went away before the outcome could be delivered
#[derive(Error, Debug)]
#[error("Outcome channel for {} closed", .0.item())]
pub struct ChannelClosed(pub Outcome);

/// Delivers matched and unmatched outcomes
#[derive(Debug, Clone)]
pub struct ResolvedSink {
    matched: mpsc::Sender<Item>,
    unmatched: mpsc::Sender<Item>,
    counters: Arc<Counters>,
}

impl ResolvedSink {
    /// Deliver a matched item
    ///
    /// # Errors
    ///
    /// Fails if the matched collector is gone.
    pub async fn matched(&self, item: Item) -> std::result::Result<(), ChannelClosed> {
        deliver(&self.matched, &self.counters.matched, item, Outcome::Matched).await
    }

    /// Deliver an unmatched item
    ///
    /// # Errors
    ///
    /// Fails if the unmatched collector is gone.
    pub async fn unmatched(&self, item: Item) -> std::result::Result<(), ChannelClosed> {
        deliver(&self.unmatched, &self.counters.unmatched, item, Outcome::Unmatched).await
    }
}

/// Delivers failed outcomes of the main wave
#[derive(Debug, Clone)]
pub struct FailedSink {
    failed: mpsc::Sender<(Item, LookupError)>,
    counters: Arc<Counters>,
}

impl FailedSink {
    /// Deliver a failed item
    ///
    /// # Errors
    ///
    /// Fails if the failed collector is gone.
    pub async fn failed(
        &self,
        item: Item,
        cause: LookupError,
    ) -> std::result::Result<(), ChannelClosed> {
        let counter = &self.counters.failed;
        counter.announce();
        self.failed.send((item, cause)).await.map_err(|e| {
            counter.retract();
            let (item, cause) = e.0;
            ChannelClosed(Outcome::Failed(item, cause))
        })
    }
}

/// Routes every kind of outcome to its channel
#[derive(Debug, Clone)]
pub struct OutcomeSink {
    resolved: ResolvedSink,
    failed: FailedSink,
}

impl OutcomeSink {
    /// A sink for matched and unmatched outcomes which does not keep the
    /// failed channel open
    #[must_use]
    pub fn resolved(&self) -> ResolvedSink {
        self.resolved.clone()
    }

    /// Current state of the collectors fed by this sink
    #[must_use]
    pub fn status(&self) -> CollectorStatus {
        self.resolved.counters.status()
    }

    /// Route `outcome` to the channel of its kind
    ///
    /// # Errors
    ///
    /// Fails if the corresponding collector is gone.
    pub async fn send(&self, outcome: Outcome) -> std::result::Result<(), ChannelClosed> {
        match outcome {
            Outcome::Matched(item) => self.resolved.matched(item).await,
            Outcome::Unmatched(item) => self.resolved.unmatched(item).await,
            Outcome::Failed(item, cause) => self.failed.failed(item, cause).await,
        }
    }
}

async fn deliver(
    tx: &mpsc::Sender<Item>,
    counter: &Counter,
    item: Item,
    outcome: fn(Item) -> Outcome,
) -> std::result::Result<(), ChannelClosed> {
    counter.announce();
    tx.send(item).await.map_err(|e| {
        counter.retract();
        ChannelClosed(outcome(e.0))
    })
}

/// Everything the collectors gathered
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Collected {
    /// Matched items in arrival order
    pub matched: Vec<Item>,
    /// Unmatched items in arrival order
    pub unmatched: Vec<Item>,
}

/// Owner of the three collector tasks
#[derive(Debug)]
pub struct Aggregator {
    counters: Arc<Counters>,
    matched: JoinHandle<Vec<Item>>,
    unmatched: JoinHandle<Vec<Item>>,
    failed: Option<JoinHandle<Vec<(Item, LookupError)>>>,
}

impl Aggregator {
    /// Spawn the collectors and return the sink feeding them.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(capacity: usize) -> (Self, OutcomeSink) {
        let capacity = capacity.max(1);
        let counters = Arc::new(Counters::default());

        let (matched_tx, matched_rx) = mpsc::channel(capacity);
        let (unmatched_tx, unmatched_rx) = mpsc::channel(capacity);
        let (failed_tx, failed_rx) = mpsc::channel(capacity);

        let matched = tokio::spawn(collect(matched_rx, Arc::clone(&counters), |c| &c.matched));
        let unmatched = tokio::spawn(collect(unmatched_rx, Arc::clone(&counters), |c| {
            &c.unmatched
        }));
        let failed = tokio::spawn(collect(failed_rx, Arc::clone(&counters), |c| &c.failed));

        let sink = OutcomeSink {
            resolved: ResolvedSink {
                matched: matched_tx,
                unmatched: unmatched_tx,
                counters: Arc::clone(&counters),
            },
            failed: FailedSink {
                failed: failed_tx,
                counters: Arc::clone(&counters),
            },
        };

        (
            Self {
                counters,
                matched,
                unmatched,
                failed: Some(failed),
            },
            sink,
        )
    }

    /// Current state of the collectors
    #[must_use]
    pub fn status(&self) -> CollectorStatus {
        self.counters.status()
    }

    /// Wait for the failed channel to close and take its collection.
    ///
    /// Resolves once every [`OutcomeSink`] has been dropped. Subsequent
    /// calls return an empty list.
    ///
    /// # Errors
    ///
    /// Fails if the collector task panicked.
    pub async fn failed(&mut self) -> Result<Vec<(Item, LookupError)>> {
        match self.failed.take() {
            Some(handle) => handle.await.map_err(ErrorKind::TaskFailed),
            None => Ok(Vec::new()),
        }
    }

    /// Wait for the matched and unmatched channels to close and take their
    /// collections.
    ///
    /// Resolves once every sink has been dropped.
    ///
    /// # Errors
    ///
    /// Fails if one of the collector tasks panicked.
    pub async fn finish(mut self) -> Result<Collected> {
        // Drain a failed collection nobody asked for, so its task is joined
        let _ = self.failed().await?;
        let (matched, unmatched) = tokio::try_join!(self.matched, self.unmatched)?;
        Ok(Collected { matched, unmatched })
    }
}

async fn collect<T: std::fmt::Debug>(
    mut rx: mpsc::Receiver<T>,
    counters: Arc<Counters>,
    counter: fn(&Counters) -> &Counter,
) -> Vec<T> {
    let mut collection = Vec::new();
    while let Some(entry) = rx.recv().await {
        trace!("Collected {entry:?}");
        counter(&counters).consume();
        collection.push(entry);
    }
    collection
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_outcomes_are_routed_by_kind() {
        let (mut aggregator, sink) = Aggregator::start(2);

        for i in 0..10 {
            let item = Item::new(format!("item-{i}"), "");
            let outcome = match i % 3 {
                0 => Outcome::Matched(item),
                1 => Outcome::Unmatched(item),
                _ => Outcome::Failed(item, LookupError::transient("boom")),
            };
            sink.send(outcome).await.unwrap();
        }
        drop(sink);

        let failed = aggregator.failed().await.unwrap();
        let collected = aggregator.finish().await.unwrap();

        assert_eq!(collected.matched.len(), 4);
        assert_eq!(collected.unmatched.len(), 3);
        assert_eq!(failed.len(), 3);
        assert_eq!(collected.matched[0], Item::new("item-0", ""));
    }

    #[tokio::test]
    async fn test_failed_closes_before_resolved() {
        let (mut aggregator, sink) = Aggregator::start(4);
        let resolved = sink.resolved();

        sink.send(Outcome::Failed(Item::new("a", ""), LookupError::Cancelled))
            .await
            .unwrap();
        drop(sink);

        // The failed channel is closed even though `resolved` is alive
        let failed = aggregator.failed().await.unwrap();
        assert_eq!(failed, vec![(Item::new("a", ""), LookupError::Cancelled)]);

        resolved.matched(Item::new("a", "")).await.unwrap();
        drop(resolved);

        let collected = aggregator.finish().await.unwrap();
        assert_eq!(collected.matched, vec![Item::new("a", "")]);
        assert!(collected.unmatched.is_empty());
    }

    #[tokio::test]
    async fn test_tally_after_close() {
        let (aggregator, sink) = Aggregator::start(1);
        for i in 0..5 {
            sink.send(Outcome::Unmatched(Item::new(i.to_string(), "")))
                .await
                .unwrap();
        }
        drop(sink);

        let counters = Arc::clone(&aggregator.counters);
        let collected = aggregator.finish().await.unwrap();
        assert_eq!(collected.unmatched.len(), 5);

        let status = counters.status();
        assert_eq!(status.pending, Tally::default());
        assert_eq!(status.received.unmatched, 5);
        assert_eq!(status.received.total(), 5);
    }

    #[tokio::test]
    async fn test_status_counts_sent_outcomes() {
        let (aggregator, sink) = Aggregator::start(8);
        sink.send(Outcome::Matched(Item::new("a", ""))).await.unwrap();
        sink.send(Outcome::Failed(Item::new("b", ""), LookupError::Cancelled))
            .await
            .unwrap();

        // Every sent outcome is either still pending or already received
        let status = sink.status();
        assert_eq!(status, aggregator.status());
        assert_eq!(status.pending.total() + status.received.total(), 2);
        assert_eq!(status.pending.matched + status.received.matched, 1);
        assert_eq!(status.pending.failed + status.received.failed, 1);

        drop(sink);
        aggregator.finish().await.unwrap();
    }
}
