use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Page, PageSource, TagLookup};
use crate::{Item, LookupError, Result, TagSet};

/// A directory held in memory.
///
/// Useful for dry runs and for testing code which consumes a sweep.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    items: Arc<Vec<Item>>,
    tags: Arc<HashMap<String, TagSet>>,
    page_size: usize,
}

impl MemoryDirectory {
    /// Create a directory from items and their tags, in enumeration order
    pub fn new<I>(entries: I, page_size: usize) -> Self
    where
        I: IntoIterator<Item = (Item, TagSet)>,
    {
        let mut items = Vec::new();
        let mut tags = HashMap::new();
        for (item, set) in entries {
            tags.insert(item.name.clone(), set);
            items.push(item);
        }
        Self {
            items: Arc::new(items),
            tags: Arc::new(tags),
            page_size: page_size.max(1),
        }
    }

    /// Number of items in the directory
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the directory holds no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Start a new enumeration from the first page
    #[must_use]
    pub fn pages(&self) -> MemoryPages {
        MemoryPages {
            items: Arc::clone(&self.items),
            page_size: self.page_size,
            offset: 0,
        }
    }
}

#[async_trait]
impl TagLookup for MemoryDirectory {
    async fn lookup(&self, item: &Item) -> std::result::Result<TagSet, LookupError> {
        self.tags
            .get(&item.name)
            .cloned()
            .ok_or_else(|| LookupError::permanent(format!("No such item: {}", item.name)))
    }
}

/// Cursor over the pages of a [`MemoryDirectory`]
#[derive(Debug)]
pub struct MemoryPages {
    items: Arc<Vec<Item>>,
    page_size: usize,
    offset: usize,
}

#[async_trait]
impl PageSource for MemoryPages {
    async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.offset >= self.items.len() {
            return Ok(None);
        }
        let end = (self.offset + self.page_size).min(self.items.len());
        let items = self.items[self.offset..end].to_vec();
        self.offset = end;
        Ok(Some(Page::new(items, end < self.items.len())))
    }
}
