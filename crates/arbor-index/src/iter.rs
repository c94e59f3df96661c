//! Forward iterator over leaf entries.

use crate::key::{IndexKey, IndexValue};
use crate::page::leaf::LeafPageRef;
use crate::page::{page_kind, PageKind};
use arbor_buffer::BufferPoolManager;
use arbor_common::page::PageId;
use arbor_common::{ArborError, Result};
use std::marker::PhantomData;

/// Forward iterator over a tree's (key, value) pairs in key order.
///
/// Represented as `(buffer pool, leaf page ID, slot)`; the end sentinel has
/// an invalid page ID. No latch is held between steps: each step takes one
/// read latch on the current leaf, so a concurrently deleted leaf surfaces
/// as an error rather than undefined behavior.
pub struct TreeIterator<'a, K, V> {
    bpm: &'a BufferPoolManager,
    page_id: PageId,
    slot: usize,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K: IndexKey, V: IndexValue> TreeIterator<'a, K, V> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, page_id: PageId, slot: usize) -> Self {
        Self {
            bpm,
            page_id,
            slot,
            _marker: PhantomData,
        }
    }

    pub(crate) fn end(bpm: &'a BufferPoolManager) -> Self {
        Self::new(bpm, PageId::INVALID, 0)
    }

    /// Returns true if the iterator is exhausted.
    pub fn is_end(&self) -> bool {
        !self.page_id.is_valid()
    }

    /// Returns the current position as (leaf page ID, slot).
    pub fn position(&self) -> (PageId, usize) {
        (self.page_id, self.slot)
    }

    fn step(&mut self) -> Result<Option<(K, V)>> {
        while self.page_id.is_valid() {
            let guard = self.bpm.fetch_page_read(self.page_id)?;
            if page_kind(guard.data()) != Some(PageKind::Leaf) {
                return Err(ArborError::CorruptPage {
                    page_id: self.page_id,
                    reason: "iterator positioned on a non-leaf page".to_string(),
                });
            }
            let leaf = LeafPageRef::<K, V>::attach(guard.data());

            if self.slot >= leaf.size() {
                // Past this leaf (possibly shrunk since we were positioned);
                // follow the chain
                self.page_id = leaf.next_leaf();
                self.slot = 0;
                continue;
            }

            let entry = (leaf.key_at(self.slot), leaf.value_at(self.slot));

            // Advance past the entry we are about to yield
            self.slot += 1;
            if self.slot >= leaf.size() {
                self.page_id = leaf.next_leaf();
                self.slot = 0;
            }

            return Ok(Some(entry));
        }
        Ok(None)
    }
}

impl<K: IndexKey, V: IndexValue> Iterator for TreeIterator<'_, K, V> {
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(err) => {
                // Poison the iterator so a failed fetch is not retried forever
                self.page_id = PageId::INVALID;
                Some(Err(err))
            }
        }
    }
}

impl<K, V> PartialEq for TreeIterator<'_, K, V> {
    /// Two iterators are equal when they sit at the same position; end
    /// iterators compare equal only to other ends.
    fn eq(&self, other: &Self) -> bool {
        if !self.page_id.is_valid() && !other.page_id.is_valid() {
            return true;
        }
        self.page_id == other.page_id && self.slot == other.slot
    }
}

impl<K, V> std::fmt::Debug for TreeIterator<'_, K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeIterator")
            .field("page_id", &self.page_id)
            .field("slot", &self.slot)
            .finish()
    }
}
