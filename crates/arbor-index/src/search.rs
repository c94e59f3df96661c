//! In-page binary search primitives.
//!
//! Both searches are upper-bound style on the comparator's three-valued
//! result: ties land on the rightmost slot whose key is still ≤ the probe,
//! which makes insert positions well defined and keeps duplicates out.

use crate::key::{IndexKey, IndexValue, KeyComparator};
use crate::page::internal::InternalPageRef;
use crate::page::leaf::LeafPageRef;
use std::cmp::Ordering;

/// Finds the largest slot whose key is ≤ `key`.
///
/// Returns None when the leaf is empty or every key is greater than `key`.
/// Callers distinguish an exact match with one extra comparison at the
/// returned slot.
pub(crate) fn leaf_slot_for<K, V, C>(leaf: &LeafPageRef<'_, K, V>, key: &K, cmp: &C) -> Option<usize>
where
    K: IndexKey,
    V: IndexValue,
    C: KeyComparator<K>,
{
    let size = leaf.size();
    if size == 0 {
        return None;
    }

    let mut lo = 0;
    let mut hi = size - 1;
    while lo < hi {
        let mid = (lo + hi + 1) >> 1;
        if cmp.compare(&leaf.key_at(mid), key) != Ordering::Greater {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    if cmp.compare(&leaf.key_at(lo), key) == Ordering::Greater {
        None
    } else {
        Some(lo)
    }
}

/// Finds the child slot to descend into for `key`.
///
/// Returns the largest slot `i ≥ 1` whose key is ≤ `key`, or 0 when `key`
/// is below slot 1's key. Slot 0's key is never consulted. Degenerate pages
/// (size < 2) return 0; well-formed non-root internals always have
/// `size ≥ 2`.
pub(crate) fn internal_child_for<K, C>(node: &InternalPageRef<'_, K>, key: &K, cmp: &C) -> usize
where
    K: IndexKey,
    C: KeyComparator<K>,
{
    let size = node.size();
    if size < 2 {
        return 0;
    }

    let mut lo = 1;
    let mut hi = size - 1;
    while lo < hi {
        let mid = (lo + hi + 1) >> 1;
        if cmp.compare(&node.key_at(mid), key) != Ordering::Greater {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    if cmp.compare(&node.key_at(lo), key) == Ordering::Greater {
        0
    } else {
        lo
    }
}
