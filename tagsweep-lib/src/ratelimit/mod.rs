//! Admission control for lookups.
//!
//! Every lookup passes two gates before it may run:
//!
//! - a burst pool: the first `burst_capacity` lookups are admitted at once,
//!   afterwards one more every `burst_interval`
//! - a concurrency cap: at most `max_concurrency` lookups hold a slot
//!
//! [`RunMode`] selects which of the gates apply.

mod admission;
mod config;
mod error;

pub use admission::{AdmissionController, SlotPermit};
pub use config::{
    AdmissionConfig, DEFAULT_BURST_CAPACITY, DEFAULT_BURST_INTERVAL, DEFAULT_MAX_CONCURRENCY,
    RunMode,
};
pub use error::AdmissionError;
