use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use super::{AdmissionConfig, AdmissionError, RunMode};
use crate::{ErrorKind, Result};

type BurstLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Admits lookups through a burst pool and a concurrency cap.
///
/// The burst pool grants `burst_capacity` admissions right away and
/// afterwards replenishes one admission every `burst_interval`.
/// The concurrency cap bounds the number of lookups holding a [`SlotPermit`].
/// A caller always waits for the burst pool first, then for a slot.
#[derive(Debug)]
pub struct AdmissionController {
    mode: RunMode,

    /// Token bucket using governor's GCRA implementation
    burst: Option<BurstLimiter>,

    /// Concurrency slots
    slots: Option<Arc<Semaphore>>,

    max_concurrency: usize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl AdmissionController {
    /// Create a controller for the given mode.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the gates in `config` is sized to zero.
    pub fn new(mode: RunMode, config: &AdmissionConfig) -> Result<Self> {
        config.validate()?;

        let (burst, max_concurrency) = match mode {
            RunMode::Bucket => (Some(burst_limiter(config)?), config.max_concurrency),
            RunMode::Serial => (None, 1),
            RunMode::Concurrent => (None, 0),
        };

        let slots = (max_concurrency > 0).then(|| Arc::new(Semaphore::new(max_concurrency)));

        Ok(Self {
            mode,
            burst,
            slots,
            max_concurrency,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The mode this controller was created for
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    /// Wait for a burst token and then for a concurrency slot.
    ///
    /// The burst token is consumed even if the caller is cancelled
    /// while waiting for the slot afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Cancelled`] as soon as `cancel` fires,
    /// no matter which gate the caller is waiting at.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<SlotPermit, AdmissionError> {
        if cancel.is_cancelled() {
            return Err(AdmissionError::Cancelled);
        }

        if let Some(burst) = &self.burst {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AdmissionError::Cancelled),
                () = burst.until_ready() => {}
            }
        }

        let permit = match &self.slots {
            Some(slots) => {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(AdmissionError::Cancelled),
                    permit = Arc::clone(slots).acquire_owned() => permit,
                };
                Some(permit.map_err(|_| AdmissionError::Closed)?)
            }
            None => None,
        };

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        Ok(SlotPermit {
            in_flight: Arc::clone(&self.in_flight),
            _permit: permit,
        })
    }

    /// Number of concurrency slots currently free.
    /// Returns `None` if concurrency is not capped.
    #[must_use]
    pub fn available_slots(&self) -> Option<usize> {
        self.slots.as_ref().map(|s| s.available_permits())
    }

    /// Configured concurrency cap, if any
    #[must_use]
    pub fn max_concurrency(&self) -> Option<usize> {
        self.slots.as_ref().map(|_| self.max_concurrency)
    }

    /// Number of lookups currently holding a permit
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits held at the same time
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

fn burst_limiter(config: &AdmissionConfig) -> Result<BurstLimiter> {
    let capacity = u32::try_from(config.burst_capacity)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or(ErrorKind::InvalidAdmission("invalid burst capacity"))?;
    let quota = Quota::with_period(config.burst_interval)
        .ok_or(ErrorKind::InvalidAdmission("burst interval must not be zero"))?
        .allow_burst(capacity);
    Ok(RateLimiter::direct(quota))
}

/// Holds one concurrency slot for the lifetime of a lookup.
/// The slot is returned when the permit is dropped.
#[derive(Debug)]
pub struct SlotPermit {
    in_flight: Arc<AtomicUsize>,
    // Released after `in_flight` is decremented in `drop`
    _permit: Option<OwnedSemaphorePermit>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
