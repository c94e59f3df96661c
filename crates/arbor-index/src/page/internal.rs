//! Internal page view.
//!
//! An internal page holds `size` slots of (key, child page ID). Slot 0's
//! key is never consulted by search; child 0 covers all keys below slot 1's
//! key. Split and rebalance keep slot 0's key equal to the subtree's lower
//! bound so that whole slots can move between siblings.

use super::{
    min_size_for, read_u16, read_u32, write_u16, write_u32, PageKind, INTERNAL_ENTRIES_OFFSET,
    KIND_OFFSET, MAX_SIZE_OFFSET, SIZE_OFFSET,
};
use crate::key::IndexKey;
use arbor_common::page::{PageData, PageId, PAGE_SIZE};
use std::marker::PhantomData;

/// Child pointer width on the page.
const CHILD_LEN: usize = 4;

/// Number of (key, child) slots an internal page can physically hold.
pub(crate) fn internal_capacity<K: IndexKey>() -> usize {
    (PAGE_SIZE - INTERNAL_ENTRIES_OFFSET) / (K::ENCODED_LEN + CHILD_LEN)
}

fn entry_offset<K: IndexKey>(slot: usize) -> usize {
    INTERNAL_ENTRIES_OFFSET + slot * (K::ENCODED_LEN + CHILD_LEN)
}

fn key_at<K: IndexKey>(data: &PageData, slot: usize) -> K {
    let off = entry_offset::<K>(slot);
    K::decode(&data[off..off + K::ENCODED_LEN])
}

fn value_at<K: IndexKey>(data: &PageData, slot: usize) -> PageId {
    PageId(read_u32(data, entry_offset::<K>(slot) + K::ENCODED_LEN))
}

/// Read-only view of an internal page.
pub(crate) struct InternalPageRef<'a, K> {
    data: &'a PageData,
    _marker: PhantomData<K>,
}

impl<'a, K: IndexKey> InternalPageRef<'a, K> {
    pub(crate) fn attach(data: &'a PageData) -> Self {
        debug_assert_eq!(data[KIND_OFFSET], PageKind::Internal as u8);
        Self {
            data,
            _marker: PhantomData,
        }
    }

    pub(crate) fn size(&self) -> usize {
        read_u16(self.data, SIZE_OFFSET) as usize
    }

    pub(crate) fn max_size(&self) -> usize {
        read_u16(self.data, MAX_SIZE_OFFSET) as usize
    }

    pub(crate) fn min_size(&self) -> usize {
        min_size_for(self.max_size())
    }

    pub(crate) fn key_at(&self, slot: usize) -> K {
        debug_assert!(slot < self.size());
        key_at::<K>(self.data, slot)
    }

    pub(crate) fn value_at(&self, slot: usize) -> PageId {
        debug_assert!(slot < self.size());
        value_at::<K>(self.data, slot)
    }

    /// Returns the slot whose child pointer equals `child`.
    ///
    /// The only child-to-slot reverse lookup in the tree; used when locating
    /// an underflowing node's position in its parent.
    pub(crate) fn value_index(&self, child: PageId) -> Option<usize> {
        (0..self.size()).find(|&slot| self.value_at(slot) == child)
    }
}

/// Mutable view of an internal page.
pub(crate) struct InternalPageMut<'a, K> {
    data: &'a mut PageData,
    _marker: PhantomData<K>,
}

impl<'a, K: IndexKey> InternalPageMut<'a, K> {
    /// Attaches to an already-initialized internal page.
    pub(crate) fn attach(data: &'a mut PageData) -> Self {
        debug_assert_eq!(data[KIND_OFFSET], PageKind::Internal as u8);
        Self {
            data,
            _marker: PhantomData,
        }
    }

    /// Formats raw bytes as an empty internal page with the given capacity.
    pub(crate) fn init(data: &'a mut PageData, max_size: usize) -> Self {
        debug_assert!(max_size <= internal_capacity::<K>());
        data[KIND_OFFSET] = PageKind::Internal as u8;
        write_u16(data, SIZE_OFFSET, 0);
        write_u16(data, MAX_SIZE_OFFSET, max_size as u16);
        Self {
            data,
            _marker: PhantomData,
        }
    }

    pub(crate) fn size(&self) -> usize {
        read_u16(self.data, SIZE_OFFSET) as usize
    }

    pub(crate) fn max_size(&self) -> usize {
        read_u16(self.data, MAX_SIZE_OFFSET) as usize
    }

    pub(crate) fn min_size(&self) -> usize {
        min_size_for(self.max_size())
    }

    pub(crate) fn set_size(&mut self, size: usize) {
        debug_assert!(size <= self.max_size());
        write_u16(self.data, SIZE_OFFSET, size as u16);
    }

    pub(crate) fn key_at(&self, slot: usize) -> K {
        key_at::<K>(self.data, slot)
    }

    pub(crate) fn value_at(&self, slot: usize) -> PageId {
        value_at::<K>(self.data, slot)
    }

    pub(crate) fn set_key_at(&mut self, slot: usize, key: K) {
        debug_assert!(slot < self.max_size());
        let off = entry_offset::<K>(slot);
        key.encode(&mut self.data[off..off + K::ENCODED_LEN]);
    }

    pub(crate) fn set_value_at(&mut self, slot: usize, child: PageId) {
        debug_assert!(slot < self.max_size());
        write_u32(self.data, entry_offset::<K>(slot) + K::ENCODED_LEN, child.0);
    }

    /// Reborrows as a read-only view.
    pub(crate) fn as_ref(&self) -> InternalPageRef<'_, K> {
        InternalPageRef::attach(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_capacity() {
        // 4096 - 8 = 4088; i64 key + u32 child = 12 bytes per slot
        assert_eq!(internal_capacity::<i64>(), 340);
    }

    #[test]
    fn test_internal_init() {
        let mut data = [0u8; PAGE_SIZE];
        let node = InternalPageMut::<i64>::init(&mut data, 4);

        assert_eq!(node.size(), 0);
        assert_eq!(node.max_size(), 4);
        assert_eq!(node.min_size(), 2);
        assert_eq!(super::super::page_kind(&data), Some(PageKind::Internal));
    }

    #[test]
    fn test_internal_set_and_get_slots() {
        let mut data = [0u8; PAGE_SIZE];
        let mut node = InternalPageMut::<i64>::init(&mut data, 4);

        node.set_size(3);
        node.set_value_at(0, PageId(10));
        node.set_key_at(1, 100);
        node.set_value_at(1, PageId(11));
        node.set_key_at(2, 200);
        node.set_value_at(2, PageId(12));

        assert_eq!(node.value_at(0), PageId(10));
        assert_eq!(node.key_at(1), 100);
        assert_eq!(node.value_at(2), PageId(12));

        let view = InternalPageRef::<i64>::attach(&data);
        assert_eq!(view.size(), 3);
        assert_eq!(view.key_at(2), 200);
        assert_eq!(view.value_at(1), PageId(11));
    }

    #[test]
    fn test_internal_value_index() {
        let mut data = [0u8; PAGE_SIZE];
        let mut node = InternalPageMut::<i64>::init(&mut data, 4);

        node.set_size(3);
        node.set_value_at(0, PageId(10));
        node.set_value_at(1, PageId(11));
        node.set_value_at(2, PageId(12));

        let view = InternalPageRef::<i64>::attach(&data);
        assert_eq!(view.value_index(PageId(10)), Some(0));
        assert_eq!(view.value_index(PageId(12)), Some(2));
        assert_eq!(view.value_index(PageId(99)), None);
    }
}
