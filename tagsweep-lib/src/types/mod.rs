#![allow(unreachable_pub)]

mod error;
mod item;
mod outcome;
mod report;
mod tags;

pub use error::{ErrorKind, LookupError};
pub use item::Item;
pub use outcome::{FailedItem, Outcome};
pub use report::SweepReport;
pub use tags::{Tag, TagSet};

/// The tagsweep `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
