//! Where items and their tags come from.
//!
//! A sweep needs two things from a directory: a way to page through all of
//! its items ([`PageSource`]) and a way to fetch the tags of a single item
//! ([`TagLookup`]). Both are traits so that sweeps can run against the HTTP
//! directory as well as against in-memory fixtures.

mod http;
mod memory;

use async_trait::async_trait;

use crate::{Item, LookupError, Result, TagSet};

pub use http::{DEFAULT_PAGE_SIZE, DEFAULT_USER_AGENT, DirectoryBuilder, HttpDirectory, HttpPages};
pub use memory::{MemoryDirectory, MemoryPages};

/// One page of enumerated items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Items on this page, in directory order
    pub items: Vec<Item>,
    /// Whether another page follows
    pub has_more: bool,
}

impl Page {
    /// Create a new page
    #[must_use]
    pub const fn new(items: Vec<Item>, has_more: bool) -> Self {
        Self { items, has_more }
    }
}

/// Sequential, paginated enumeration of a directory.
///
/// Implementations keep their own continuation marker. After a page with
/// `has_more == false` (or after `Ok(None)`) the sweep stops asking.
#[async_trait]
pub trait PageSource: Send {
    /// Fetch the next page of items.
    ///
    /// # Errors
    ///
    /// Any error aborts enumeration. Items from previous pages are still
    /// processed.
    async fn next_page(&mut self) -> Result<Option<Page>>;
}

/// Tag lookup for a single item.
///
/// Lookups run concurrently, so implementations must be shareable.
#[async_trait]
pub trait TagLookup: Send + Sync {
    /// Fetch the tags attached to `item`.
    ///
    /// # Errors
    ///
    /// Returns a [`LookupError`] which records whether retrying may help.
    async fn lookup(&self, item: &Item) -> std::result::Result<TagSet, LookupError>;
}

#[async_trait]
impl<T: TagLookup + ?Sized> TagLookup for std::sync::Arc<T> {
    async fn lookup(&self, item: &Item) -> std::result::Result<TagSet, LookupError> {
        (**self).lookup(item).await
    }
}

#[async_trait]
impl<P: PageSource + ?Sized> PageSource for Box<P> {
    async fn next_page(&mut self) -> Result<Option<Page>> {
        (**self).next_page().await
    }
}
