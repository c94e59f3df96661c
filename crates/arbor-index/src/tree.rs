//! Concurrent B+Tree index over the buffer pool.
//!
//! Every public operation opens a descent context, latches the header page
//! (write for mutators, read for readers), consults the root ID, and walks
//! down acquiring child latches under latch crabbing: writers hold the whole
//! path until a node is known safe against the operation's worst-case
//! structural effect, then release every strict ancestor. The header guard
//! is the topmost ancestor and is released as soon as the root is known
//! safe, which is exactly when no split or collapse can reach it.

use crate::context::Context;
use crate::iter::TreeIterator;
use crate::key::{IndexKey, IndexValue, KeyComparator, OrdComparator};
use crate::page::header::{HeaderPageMut, HeaderPageRef};
use crate::page::internal::{internal_capacity, InternalPageMut, InternalPageRef};
use crate::page::leaf::{leaf_capacity, LeafPageMut, LeafPageRef};
use crate::page::{
    min_size_for, page_kind, read_u16, PageKind, MAX_SIZE_OFFSET, SIZE_OFFSET,
};
use crate::search::{internal_child_for, leaf_slot_for};
use arbor_buffer::BufferPoolManager;
use arbor_common::page::{PageData, PageId};
use arbor_common::{ArborError, Result};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Mutating operations, for safety checks during the descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Insert,
    Remove,
}

/// A concurrent, disk-resident B+Tree mapping unique fixed-width keys to
/// values.
///
/// The tree owns no pages: the header page is pre-allocated by the owner
/// and everything else is allocated from (and returned to) the buffer pool
/// as the tree grows and shrinks.
pub struct BPlusTree<K, V, C = OrdComparator> {
    /// Index name, for diagnostics.
    name: String,
    /// The tree's stable entry point.
    header_page_id: PageId,
    /// Page cache every access goes through.
    bpm: Arc<BufferPoolManager>,
    /// Total order over keys.
    comparator: C,
    /// Leaf capacity in entries; a leaf splits when it fills to this.
    leaf_max_size: usize,
    /// Internal capacity in slots.
    internal_max_size: usize,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, C> BPlusTree<K, V, C>
where
    K: IndexKey,
    V: IndexValue,
    C: KeyComparator<K>,
{
    /// Creates a tree handle over a pre-allocated header page and resets the
    /// tree to empty.
    ///
    /// Size bounds are validated against the page capacity for the key and
    /// value widths; violations are configuration errors, not runtime ones.
    pub fn new(
        name: impl Into<String>,
        header_page_id: PageId,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        if leaf_max_size < 3 || leaf_max_size > leaf_capacity::<K, V>() {
            return Err(ArborError::InvalidParameter {
                name: "leaf_max_size".to_string(),
                value: leaf_max_size.to_string(),
            });
        }
        if internal_max_size < 3 || internal_max_size > internal_capacity::<K>() {
            return Err(ArborError::InvalidParameter {
                name: "internal_max_size".to_string(),
                value: internal_max_size.to_string(),
            });
        }

        {
            let mut header = bpm.fetch_page_write(header_page_id)?;
            HeaderPageMut::attach(header.data_mut()).set_root_page_id(PageId::INVALID);
        }

        Ok(Self {
            name: name.into(),
            header_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            _marker: PhantomData,
        })
    }

    /// Returns the index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the tree holds no keys.
    pub fn is_empty(&self) -> Result<bool> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        Ok(!HeaderPageRef::attach(header.data()).root_page_id().is_valid())
    }

    /// Returns the current root page ID. Observational only.
    pub fn root_page_id(&self) -> Result<PageId> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        Ok(HeaderPageRef::attach(header.data()).root_page_id())
    }

    /// Point lookup.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = HeaderPageRef::attach(header.data()).root_page_id();
        if !root_id.is_valid() {
            return Ok(None);
        }

        let mut ctx = Context::new();
        ctx.root_page_id = root_id;
        ctx.read_set.push_back(self.bpm.fetch_page_read(root_id)?);
        // Root latched; a search never mutates, so the header is safe to
        // release immediately
        drop(header);

        loop {
            let next = {
                let guard = ctx
                    .read_set
                    .back()
                    .ok_or_else(|| internal_err("read stack empty mid-descent"))?;
                match page_kind(guard.data()) {
                    Some(PageKind::Leaf) => None,
                    Some(PageKind::Internal) => {
                        let node = InternalPageRef::<K>::attach(guard.data());
                        debug_assert!(ctx.is_root(guard.page_id()) || node.size() >= 2);
                        Some(node.value_at(internal_child_for(&node, key, &self.comparator)))
                    }
                    None => return Err(corrupt_kind(guard.page_id())),
                }
            };
            match next {
                Some(child_id) => ctx.read_set.push_back(self.bpm.fetch_page_read(child_id)?),
                None => break,
            }
        }

        let guard = ctx
            .read_set
            .back()
            .ok_or_else(|| internal_err("read stack empty at leaf"))?;
        let leaf = LeafPageRef::<K, V>::attach(guard.data());
        match leaf_slot_for(&leaf, key, &self.comparator) {
            Some(slot)
                if self.comparator.compare(&leaf.key_at(slot), key) == Ordering::Equal =>
            {
                Ok(Some(leaf.value_at(slot)))
            }
            _ => Ok(None),
        }
    }

    /// Inserts a unique key.
    ///
    /// Returns false (and leaves the tree unchanged) if the key is already
    /// present.
    pub fn insert(&self, key: K, value: V) -> Result<bool> {
        let mut ctx = Context::new();
        let mut header = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_id = HeaderPageRef::attach(header.data()).root_page_id();

        if !root_id.is_valid() {
            // Empty tree: the first key starts a single-leaf tree
            let (new_root_id, mut root_guard) = self.bpm.new_page_guarded()?;
            {
                let mut leaf =
                    LeafPageMut::<K, V>::init(root_guard.data_mut(), self.leaf_max_size);
                leaf.set_size(1);
                leaf.set_at(0, key, value);
            }
            HeaderPageMut::attach(header.data_mut()).set_root_page_id(new_root_id);
            debug!(tree = %self.name, root = %new_root_id, "started new tree");
            return Ok(true);
        }

        ctx.root_page_id = root_id;
        let root_guard = self.bpm.fetch_page_write(root_id)?;
        let root_safe = Self::is_safe(root_guard.data(), Op::Insert, true);
        ctx.write_set.push_back(root_guard);
        if root_safe {
            drop(header);
        } else {
            ctx.header = Some(header);
        }

        self.find_leaf_write(&key, Op::Insert, &mut ctx)?;

        let leaf_idx = ctx.write_set.len() - 1;
        let needs_split = {
            let guard = &mut ctx.write_set[leaf_idx];
            let mut leaf = LeafPageMut::<K, V>::attach(guard.data_mut());

            let slot = leaf_slot_for(&leaf.as_ref(), &key, &self.comparator);
            if let Some(i) = slot {
                if self.comparator.compare(&leaf.key_at(i), &key) == Ordering::Equal {
                    return Ok(false);
                }
            }

            let at = slot.map_or(0, |i| i + 1);
            let size = leaf.size();
            leaf.set_size(size + 1);
            for i in (at..size).rev() {
                let (k, v) = (leaf.key_at(i), leaf.value_at(i));
                leaf.set_at(i + 1, k, v);
            }
            leaf.set_at(at, key, value);

            size + 1 == leaf.max_size()
        };

        if needs_split {
            let (split_key, new_leaf_id) = self.split_leaf(&mut ctx, leaf_idx)?;
            self.insert_into_parent(&mut ctx, split_key, new_leaf_id, leaf_idx.checked_sub(1))?;
        }
        Ok(true)
    }

    /// Deletes a key. Absent keys are a no-op.
    pub fn remove(&self, key: &K) -> Result<()> {
        let mut ctx = Context::new();
        let header = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_id = HeaderPageRef::attach(header.data()).root_page_id();
        if !root_id.is_valid() {
            return Ok(());
        }

        ctx.root_page_id = root_id;
        let root_guard = self.bpm.fetch_page_write(root_id)?;
        let root_safe = Self::is_safe(root_guard.data(), Op::Remove, true);
        ctx.write_set.push_back(root_guard);
        if root_safe {
            drop(header);
        } else {
            ctx.header = Some(header);
        }

        self.find_leaf_write(key, Op::Remove, &mut ctx)?;

        let leaf_idx = ctx.write_set.len() - 1;
        let leaf_page_id = ctx.write_set[leaf_idx].page_id();

        let underflow = {
            let guard = &mut ctx.write_set[leaf_idx];
            let mut leaf = LeafPageMut::<K, V>::attach(guard.data_mut());

            let slot = match leaf_slot_for(&leaf.as_ref(), key, &self.comparator) {
                Some(slot)
                    if self.comparator.compare(&leaf.key_at(slot), key) == Ordering::Equal =>
                {
                    slot
                }
                _ => return Ok(()),
            };

            let size = leaf.size();
            for i in slot + 1..size {
                let (k, v) = (leaf.key_at(i), leaf.value_at(i));
                leaf.set_at(i - 1, k, v);
            }
            leaf.set_size(size - 1);

            size - 1 < leaf.min_size()
        };
        if !underflow {
            return Ok(());
        }

        if ctx.is_root(leaf_page_id) {
            // A root leaf tolerates any size down to one entry
            let root_size = {
                let guard = &ctx.write_set[leaf_idx];
                LeafPageRef::<K, V>::attach(guard.data()).size()
            };
            if root_size == 0 {
                let header = ctx
                    .header
                    .as_mut()
                    .ok_or_else(|| internal_err("header released before root removal"))?;
                HeaderPageMut::attach(header.data_mut()).set_root_page_id(PageId::INVALID);
                debug!(tree = %self.name, "tree emptied");
            }
            return Ok(());
        }

        self.rebalance_leaf(&mut ctx, key, leaf_idx)
    }

    /// Iterator positioned at the first (smallest-key) entry.
    pub fn iter(&self) -> Result<TreeIterator<'_, K, V>> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = HeaderPageRef::attach(header.data()).root_page_id();
        if !root_id.is_valid() {
            return Ok(self.end());
        }
        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(header);

        // Always descend through child 0
        loop {
            let next = {
                match page_kind(guard.data()) {
                    Some(PageKind::Leaf) => None,
                    Some(PageKind::Internal) => {
                        Some(InternalPageRef::<K>::attach(guard.data()).value_at(0))
                    }
                    None => return Err(corrupt_kind(guard.page_id())),
                }
            };
            match next {
                Some(child_id) => guard = self.bpm.fetch_page_read(child_id)?,
                None => break,
            }
        }

        Ok(TreeIterator::new(&self.bpm, guard.page_id(), 0))
    }

    /// Iterator positioned at `key` if the tree contains it exactly;
    /// otherwise the end iterator.
    pub fn iter_from(&self, key: &K) -> Result<TreeIterator<'_, K, V>> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = HeaderPageRef::attach(header.data()).root_page_id();
        if !root_id.is_valid() {
            return Ok(self.end());
        }
        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(header);

        loop {
            let next = {
                match page_kind(guard.data()) {
                    Some(PageKind::Leaf) => None,
                    Some(PageKind::Internal) => {
                        let node = InternalPageRef::<K>::attach(guard.data());
                        Some(node.value_at(internal_child_for(&node, key, &self.comparator)))
                    }
                    None => return Err(corrupt_kind(guard.page_id())),
                }
            };
            match next {
                Some(child_id) => guard = self.bpm.fetch_page_read(child_id)?,
                None => break,
            }
        }

        let leaf = LeafPageRef::<K, V>::attach(guard.data());
        match leaf_slot_for(&leaf, key, &self.comparator) {
            Some(slot)
                if self.comparator.compare(&leaf.key_at(slot), key) == Ordering::Equal =>
            {
                Ok(TreeIterator::new(&self.bpm, guard.page_id(), slot))
            }
            _ => Ok(self.end()),
        }
    }

    /// The end iterator. Compares equal only to other end iterators.
    pub fn end(&self) -> TreeIterator<'_, K, V> {
        TreeIterator::end(&self.bpm)
    }

    // ------------------------------------------------------------------
    // Descent
    // ------------------------------------------------------------------

    /// Walks from the latched node at the top of the write stack down to the
    /// leaf covering `key`, crabbing: each child is write-latched and pushed,
    /// and once a child is safe every strict ancestor is released.
    fn find_leaf_write<'a>(&'a self, key: &K, op: Op, ctx: &mut Context<'a>) -> Result<()> {
        loop {
            let next = {
                let guard = ctx
                    .write_set
                    .back()
                    .ok_or_else(|| internal_err("write stack empty mid-descent"))?;
                match page_kind(guard.data()) {
                    Some(PageKind::Leaf) => None,
                    Some(PageKind::Internal) => {
                        let node = InternalPageRef::<K>::attach(guard.data());
                        debug_assert!(ctx.is_root(guard.page_id()) || node.size() >= 2);
                        Some(node.value_at(internal_child_for(&node, key, &self.comparator)))
                    }
                    None => return Err(corrupt_kind(guard.page_id())),
                }
            };
            let Some(child_id) = next else {
                return Ok(());
            };

            let child = self.bpm.fetch_page_write(child_id)?;
            let child_safe = Self::is_safe(child.data(), op, false);
            ctx.write_set.push_back(child);
            if child_safe {
                ctx.release_write_ancestors();
            }
        }
    }

    /// Can the operation's structural effects stop at this node?
    ///
    /// A leaf is insert-safe one entry shy of full, because the split
    /// trigger is reaching `max_size` after the insert.
    fn is_safe(data: &PageData, op: Op, is_root: bool) -> bool {
        let is_leaf = matches!(page_kind(data), Some(PageKind::Leaf));
        let size = read_u16(data, SIZE_OFFSET) as usize;
        let max_size = read_u16(data, MAX_SIZE_OFFSET) as usize;

        match op {
            Op::Insert => {
                if is_leaf {
                    size + 1 < max_size
                } else {
                    size < max_size
                }
            }
            Op::Remove => {
                if is_root {
                    if is_leaf {
                        size > 1
                    } else {
                        size > 2
                    }
                } else {
                    size > min_size_for(max_size)
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Splits the overfull leaf at `leaf_idx`: the new right leaf takes the
    /// high half, the chain is relinked, and the separator is returned for
    /// propagation.
    fn split_leaf<'a>(&'a self, ctx: &mut Context<'a>, leaf_idx: usize) -> Result<(K, PageId)> {
        let (new_leaf_id, mut new_guard) = self.bpm.new_page_guarded()?;

        let guard = &mut ctx.write_set[leaf_idx];
        let left_id = guard.page_id();
        let mut leaf = LeafPageMut::<K, V>::attach(guard.data_mut());
        let mut new_leaf = LeafPageMut::<K, V>::init(new_guard.data_mut(), self.leaf_max_size);

        let size = leaf.size();
        let min = leaf.min_size();
        new_leaf.set_size(size - min);
        new_leaf.set_next_leaf(leaf.next_leaf());
        leaf.set_next_leaf(new_leaf_id);

        for i in min..size {
            let (k, v) = (leaf.key_at(i), leaf.value_at(i));
            new_leaf.set_at(i - min, k, v);
        }
        leaf.set_size(min);

        let split_key = new_leaf.key_at(0);
        debug!(tree = %self.name, left = %left_id, right = %new_leaf_id, "split leaf");
        Ok((split_key, new_leaf_id))
    }

    /// Links `(key, new_child_id)` into the ancestor at `parent_index` of
    /// the write stack, splitting upward as needed. `None` means the node
    /// that split was the root, so the tree grows a level.
    fn insert_into_parent<'a>(
        &'a self,
        ctx: &mut Context<'a>,
        key: K,
        new_child_id: PageId,
        parent_index: Option<usize>,
    ) -> Result<()> {
        let Some(idx) = parent_index else {
            let old_root_id = ctx
                .write_set
                .front()
                .map(|guard| guard.page_id())
                .ok_or_else(|| internal_err("write stack empty at root split"))?;

            let (new_root_id, mut root_guard) = self.bpm.new_page_guarded()?;
            {
                let mut root =
                    InternalPageMut::<K>::init(root_guard.data_mut(), self.internal_max_size);
                root.set_size(2);
                root.set_value_at(0, old_root_id);
                root.set_key_at(1, key);
                root.set_value_at(1, new_child_id);
            }

            let header = ctx
                .header
                .as_mut()
                .ok_or_else(|| internal_err("header released before root split"))?;
            HeaderPageMut::attach(header.data_mut()).set_root_page_id(new_root_id);
            debug!(tree = %self.name, root = %new_root_id, "grew new root");
            return Ok(());
        };

        let split_pos = {
            let guard = &mut ctx.write_set[idx];
            let mut parent = InternalPageMut::<K>::attach(guard.data_mut());
            let pos = internal_child_for(&parent.as_ref(), &key, &self.comparator) + 1;

            if parent.size() < parent.max_size() {
                let size = parent.size();
                parent.set_size(size + 1);
                for i in (pos..size).rev() {
                    let (k, v) = (parent.key_at(i), parent.value_at(i));
                    parent.set_key_at(i + 1, k);
                    parent.set_value_at(i + 1, v);
                }
                parent.set_key_at(pos, key);
                parent.set_value_at(pos, new_child_id);
                None
            } else {
                Some(pos)
            }
        };
        let Some(pos) = split_pos else {
            return Ok(());
        };

        // Full parent: split it. The right page keeps its first slot's key
        // equal to the key lifted to the grandparent, so whole slots can
        // move between siblings later.
        let (new_id, mut new_guard) = self.bpm.new_page_guarded()?;
        let lifted_key = {
            let guard = &mut ctx.write_set[idx];
            let parent_id = guard.page_id();
            let mut parent = InternalPageMut::<K>::attach(guard.data_mut());
            let mut right =
                InternalPageMut::<K>::init(new_guard.data_mut(), self.internal_max_size);

            let size = parent.size();
            let min = parent.min_size();
            right.set_size(size + 1 - min);

            if pos < min {
                // New slot lands in the left (retained) half
                for i in min..size {
                    let (k, v) = (parent.key_at(i), parent.value_at(i));
                    right.set_key_at(i - min + 1, k);
                    right.set_value_at(i - min + 1, v);
                }
                let (k, v) = (parent.key_at(min - 1), parent.value_at(min - 1));
                right.set_key_at(0, k);
                right.set_value_at(0, v);
                for i in ((pos + 1)..min).rev() {
                    let (k, v) = (parent.key_at(i - 1), parent.value_at(i - 1));
                    parent.set_key_at(i, k);
                    parent.set_value_at(i, v);
                }
                parent.set_key_at(pos, key);
                parent.set_value_at(pos, new_child_id);
            } else if pos == min {
                // New slot becomes the right page's first slot; its key is
                // the one lifted
                for i in min..size {
                    let (k, v) = (parent.key_at(i), parent.value_at(i));
                    right.set_key_at(i - min + 1, k);
                    right.set_value_at(i - min + 1, v);
                }
                right.set_key_at(0, key);
                right.set_value_at(0, new_child_id);
            } else {
                // New slot lands in the right half
                for i in min..size {
                    let (k, v) = (parent.key_at(i), parent.value_at(i));
                    right.set_key_at(i - min, k);
                    right.set_value_at(i - min, v);
                }
                let rpos = pos - min;
                let rsize = size + 1 - min;
                for i in ((rpos + 1)..rsize).rev() {
                    let (k, v) = (right.key_at(i - 1), right.value_at(i - 1));
                    right.set_key_at(i, k);
                    right.set_value_at(i, v);
                }
                right.set_key_at(rpos, key);
                right.set_value_at(rpos, new_child_id);
            }

            parent.set_size(min);
            debug!(tree = %self.name, left = %parent_id, right = %new_id, "split internal");
            right.key_at(0)
        };

        self.insert_into_parent(ctx, lifted_key, new_id, idx.checked_sub(1))
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Fixes an underflowing non-root leaf by borrowing from or merging with
    /// a sibling. The parent latch is already held in the stack; the sibling
    /// is latched after the child, never before.
    fn rebalance_leaf<'a>(&'a self, ctx: &mut Context<'a>, key: &K, leaf_idx: usize) -> Result<()> {
        let parent_idx = leaf_idx - 1;
        let (pos, parent_size) = {
            let guard = &ctx.write_set[parent_idx];
            let parent = InternalPageRef::<K>::attach(guard.data());
            (
                internal_child_for(&parent, key, &self.comparator),
                parent.size(),
            )
        };

        if pos < parent_size - 1 {
            // Rebalance against the right sibling
            let right_id = {
                let guard = &ctx.write_set[parent_idx];
                InternalPageRef::<K>::attach(guard.data()).value_at(pos + 1)
            };
            let mut right_guard = self.bpm.fetch_page_write(right_id)?;

            let borrowed_sep = {
                let guard = &mut ctx.write_set[leaf_idx];
                let mut leaf = LeafPageMut::<K, V>::attach(guard.data_mut());
                let mut right = LeafPageMut::<K, V>::attach(right_guard.data_mut());

                if leaf.size() + right.size() < leaf.max_size() {
                    // Merge: append the right sibling, bypass it in the chain
                    let s = leaf.size();
                    leaf.set_size(s + right.size());
                    for i in 0..right.size() {
                        let (k, v) = (right.key_at(i), right.value_at(i));
                        leaf.set_at(s + i, k, v);
                    }
                    leaf.set_next_leaf(right.next_leaf());
                    None
                } else {
                    // Borrow the right sibling's smallest entry
                    let (k0, v0) = (right.key_at(0), right.value_at(0));
                    let size = leaf.size();
                    leaf.set_size(size + 1);
                    leaf.set_at(size, k0, v0);

                    let rsize = right.size();
                    for i in 0..rsize - 1 {
                        let (k, v) = (right.key_at(i + 1), right.value_at(i + 1));
                        right.set_at(i, k, v);
                    }
                    right.set_size(rsize - 1);
                    Some(right.key_at(0))
                }
            };

            match borrowed_sep {
                None => {
                    debug!(tree = %self.name, page = %right_id, "merged leaf into left neighbor");
                    drop(right_guard);
                    self.bpm.delete_page(right_id);
                    self.remove_from_parent(ctx, pos + 1, parent_idx)
                }
                Some(sep) => {
                    let guard = &mut ctx.write_set[parent_idx];
                    InternalPageMut::<K>::attach(guard.data_mut()).set_key_at(pos + 1, sep);
                    Ok(())
                }
            }
        } else {
            // No right sibling: rebalance against the left one
            let left_id = {
                let guard = &ctx.write_set[parent_idx];
                InternalPageRef::<K>::attach(guard.data()).value_at(pos - 1)
            };
            let mut left_guard = self.bpm.fetch_page_write(left_id)?;

            let borrowed_sep = {
                let guard = &mut ctx.write_set[leaf_idx];
                let mut leaf = LeafPageMut::<K, V>::attach(guard.data_mut());
                let mut left = LeafPageMut::<K, V>::attach(left_guard.data_mut());

                if left.size() + leaf.size() < left.max_size() {
                    // Merge this leaf into the left sibling
                    let s = left.size();
                    left.set_size(s + leaf.size());
                    for i in 0..leaf.size() {
                        let (k, v) = (leaf.key_at(i), leaf.value_at(i));
                        left.set_at(s + i, k, v);
                    }
                    left.set_next_leaf(leaf.next_leaf());
                    None
                } else {
                    // Borrow the left sibling's largest entry
                    let size = leaf.size();
                    leaf.set_size(size + 1);
                    for i in (1..=size).rev() {
                        let (k, v) = (leaf.key_at(i - 1), leaf.value_at(i - 1));
                        leaf.set_at(i, k, v);
                    }
                    let lsize = left.size();
                    let (k, v) = (left.key_at(lsize - 1), left.value_at(lsize - 1));
                    leaf.set_at(0, k, v);
                    left.set_size(lsize - 1);
                    Some(leaf.key_at(0))
                }
            };

            match borrowed_sep {
                None => {
                    drop(left_guard);
                    // This leaf merged away: release its latch, then free it
                    let merged = ctx
                        .write_set
                        .pop_back()
                        .ok_or_else(|| internal_err("write stack empty during merge"))?;
                    let merged_id = merged.page_id();
                    drop(merged);
                    debug!(tree = %self.name, page = %merged_id, "merged leaf into left neighbor");
                    self.bpm.delete_page(merged_id);
                    self.remove_from_parent(ctx, pos, parent_idx)
                }
                Some(sep) => {
                    let guard = &mut ctx.write_set[parent_idx];
                    InternalPageMut::<K>::attach(guard.data_mut()).set_key_at(pos, sep);
                    Ok(())
                }
            }
        }
    }

    /// Deletes slot `value_index` from the ancestor at `idx` of the write
    /// stack, then fixes any underflow there: root collapse, or
    /// borrow/merge with a sibling located through the grandparent.
    fn remove_from_parent<'a>(
        &'a self,
        ctx: &mut Context<'a>,
        value_index: usize,
        idx: usize,
    ) -> Result<()> {
        let node_page_id = ctx.write_set[idx].page_id();

        let underflow = {
            let guard = &mut ctx.write_set[idx];
            let mut node = InternalPageMut::<K>::attach(guard.data_mut());
            let size = node.size();
            for i in value_index + 1..size {
                let (k, v) = (node.key_at(i), node.value_at(i));
                node.set_key_at(i - 1, k);
                node.set_value_at(i - 1, v);
            }
            node.set_size(size - 1);
            size - 1 < node.min_size()
        };
        if !underflow {
            return Ok(());
        }

        if ctx.is_root(node_page_id) {
            // Root collapse: a single remaining child becomes the new root.
            // The old root page stays latched in the stack; its frame goes
            // back to the pool once the operation finishes.
            let only_child = {
                let guard = &ctx.write_set[idx];
                let node = InternalPageRef::<K>::attach(guard.data());
                if node.size() == 1 {
                    Some(node.value_at(0))
                } else {
                    None
                }
            };
            if let Some(child_id) = only_child {
                let header = ctx
                    .header
                    .as_mut()
                    .ok_or_else(|| internal_err("header released before root collapse"))?;
                HeaderPageMut::attach(header.data_mut()).set_root_page_id(child_id);
                debug!(tree = %self.name, root = %child_id, "collapsed root");
            }
            return Ok(());
        }

        let parent_idx = idx - 1;
        let (pos, parent_size) = {
            let guard = &ctx.write_set[parent_idx];
            let parent = InternalPageRef::<K>::attach(guard.data());
            let pos = parent.value_index(node_page_id).ok_or_else(|| {
                internal_err("underflowing node missing from its parent")
            })?;
            (pos, parent.size())
        };

        if pos < parent_size - 1 {
            let right_id = {
                let guard = &ctx.write_set[parent_idx];
                InternalPageRef::<K>::attach(guard.data()).value_at(pos + 1)
            };
            let mut right_guard = self.bpm.fetch_page_write(right_id)?;

            let borrowed_sep = {
                let guard = &mut ctx.write_set[idx];
                let mut node = InternalPageMut::<K>::attach(guard.data_mut());
                let mut right = InternalPageMut::<K>::attach(right_guard.data_mut());

                if node.size() + right.size() <= node.max_size() {
                    // Merge: whole slots concatenate, slot-0 keys included
                    let s = node.size();
                    node.set_size(s + right.size());
                    for i in 0..right.size() {
                        let (k, v) = (right.key_at(i), right.value_at(i));
                        node.set_key_at(s + i, k);
                        node.set_value_at(s + i, v);
                    }
                    None
                } else {
                    let s = node.size();
                    node.set_size(s + 1);
                    let (k0, v0) = (right.key_at(0), right.value_at(0));
                    node.set_key_at(s, k0);
                    node.set_value_at(s, v0);

                    let rsize = right.size();
                    for i in 0..rsize - 1 {
                        let (k, v) = (right.key_at(i + 1), right.value_at(i + 1));
                        right.set_key_at(i, k);
                        right.set_value_at(i, v);
                    }
                    right.set_size(rsize - 1);
                    Some(right.key_at(0))
                }
            };

            match borrowed_sep {
                None => {
                    debug!(tree = %self.name, page = %right_id, "merged internal into left neighbor");
                    drop(right_guard);
                    self.bpm.delete_page(right_id);
                    self.remove_from_parent(ctx, pos + 1, parent_idx)
                }
                Some(sep) => {
                    let guard = &mut ctx.write_set[parent_idx];
                    InternalPageMut::<K>::attach(guard.data_mut()).set_key_at(pos + 1, sep);
                    Ok(())
                }
            }
        } else {
            let left_id = {
                let guard = &ctx.write_set[parent_idx];
                InternalPageRef::<K>::attach(guard.data()).value_at(pos - 1)
            };
            let mut left_guard = self.bpm.fetch_page_write(left_id)?;

            let borrowed_sep = {
                let guard = &mut ctx.write_set[idx];
                let mut node = InternalPageMut::<K>::attach(guard.data_mut());
                let mut left = InternalPageMut::<K>::attach(left_guard.data_mut());

                if left.size() + node.size() <= left.max_size() {
                    let s = left.size();
                    left.set_size(s + node.size());
                    for i in 0..node.size() {
                        let (k, v) = (node.key_at(i), node.value_at(i));
                        left.set_key_at(s + i, k);
                        left.set_value_at(s + i, v);
                    }
                    None
                } else {
                    let size = node.size();
                    node.set_size(size + 1);
                    for i in (1..=size).rev() {
                        let (k, v) = (node.key_at(i - 1), node.value_at(i - 1));
                        node.set_key_at(i, k);
                        node.set_value_at(i, v);
                    }
                    let lsize = left.size();
                    let (k, v) = (left.key_at(lsize - 1), left.value_at(lsize - 1));
                    node.set_key_at(0, k);
                    node.set_value_at(0, v);
                    left.set_size(lsize - 1);
                    Some(node.key_at(0))
                }
            };

            match borrowed_sep {
                None => {
                    drop(left_guard);
                    // The merged-away node is still latched mid-stack, so its
                    // page is left for the pool to reclaim
                    debug!(tree = %self.name, page = %node_page_id, "merged internal into left neighbor");
                    self.remove_from_parent(ctx, pos, parent_idx)
                }
                Some(sep) => {
                    let guard = &mut ctx.write_set[parent_idx];
                    InternalPageMut::<K>::attach(guard.data_mut()).set_key_at(pos, sep);
                    Ok(())
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Integrity checking (debug)
    // ------------------------------------------------------------------

    /// Verifies the tree's structural invariants: in-page sortedness,
    /// uniform leaf depth, fill bounds, separator bounds, and the leaf
    /// chain. Intended for tests and debugging on a quiesced tree; walks
    /// with pin-only guards.
    pub fn check_integrity(&self) -> Result<()> {
        let root_id = self.root_page_id()?;
        if !root_id.is_valid() {
            return Ok(());
        }

        let mut leaves = Vec::new();
        self.check_subtree(root_id, true, &mut leaves)?;

        // The next-leaf chain must visit exactly the leaves, in order
        let mut cursor = leaves[0];
        let mut visited = 0;
        while cursor.is_valid() {
            if visited >= leaves.len() || leaves[visited] != cursor {
                return Err(internal_err("leaf chain disagrees with tree order"));
            }
            let guard = self.bpm.fetch_page_basic(cursor)?;
            let data = guard.data();
            cursor = LeafPageRef::<K, V>::attach(&data).next_leaf();
            visited += 1;
        }
        if visited != leaves.len() {
            return Err(internal_err("leaf chain terminated early"));
        }
        Ok(())
    }

    fn check_subtree(
        &self,
        page_id: PageId,
        is_root: bool,
        leaves: &mut Vec<PageId>,
    ) -> Result<SubtreeSummary<K>> {
        let guard = self.bpm.fetch_page_basic(page_id)?;
        let data = guard.data();

        match page_kind(&data) {
            Some(PageKind::Leaf) => {
                let leaf = LeafPageRef::<K, V>::attach(&data);
                let size = leaf.size();
                if leaf.max_size() != self.leaf_max_size {
                    return Err(internal_err("leaf max_size field drifted"));
                }
                if is_root {
                    if size < 1 {
                        return Err(internal_err("root leaf is empty"));
                    }
                } else if size < leaf.min_size() || size >= leaf.max_size() {
                    return Err(internal_err("leaf fill bounds violated"));
                }
                for i in 1..size {
                    if self.comparator.compare(&leaf.key_at(i - 1), &leaf.key_at(i))
                        != Ordering::Less
                    {
                        return Err(internal_err("leaf keys not strictly increasing"));
                    }
                }
                leaves.push(page_id);
                Ok(SubtreeSummary {
                    depth: 1,
                    first_key: leaf.key_at(0),
                    last_key: leaf.key_at(size - 1),
                })
            }
            Some(PageKind::Internal) => {
                let node = InternalPageRef::<K>::attach(&data);
                let size = node.size();
                if node.max_size() != self.internal_max_size {
                    return Err(internal_err("internal max_size field drifted"));
                }
                if is_root {
                    if size < 2 {
                        return Err(internal_err("root internal below two children"));
                    }
                } else if size < node.min_size() || size > node.max_size() {
                    return Err(internal_err("internal fill bounds violated"));
                }
                for i in 2..size {
                    if self.comparator.compare(&node.key_at(i - 1), &node.key_at(i))
                        != Ordering::Less
                    {
                        return Err(internal_err("separator keys not strictly increasing"));
                    }
                }

                let children: Vec<(usize, K, PageId)> = (0..size)
                    .map(|i| (i, node.key_at(i), node.value_at(i)))
                    .collect();
                drop(data);
                drop(guard);

                let mut depth = None;
                let mut prev: Option<SubtreeSummary<K>> = None;
                let mut first_key = None;
                let mut last_key = None;
                for (i, sep, child_id) in children {
                    let summary = self.check_subtree(child_id, false, leaves)?;
                    match depth {
                        None => depth = Some(summary.depth),
                        Some(d) if d != summary.depth => {
                            return Err(internal_err("leaves at different depths"));
                        }
                        Some(_) => {}
                    }
                    if i >= 1 {
                        // The separator bounds its child below and the
                        // previous child above
                        if self.comparator.compare(&summary.first_key, &sep) == Ordering::Less {
                            return Err(internal_err("child key below its separator"));
                        }
                        if let Some(prev) = &prev {
                            if self.comparator.compare(&prev.last_key, &sep) != Ordering::Less {
                                return Err(internal_err("separator not above left subtree"));
                            }
                        }
                    }
                    if first_key.is_none() {
                        first_key = Some(summary.first_key);
                    }
                    last_key = Some(summary.last_key);
                    prev = Some(summary);
                }

                Ok(SubtreeSummary {
                    depth: depth.ok_or_else(|| internal_err("internal page has no children"))? + 1,
                    first_key: first_key
                        .ok_or_else(|| internal_err("internal page has no children"))?,
                    last_key: last_key
                        .ok_or_else(|| internal_err("internal page has no children"))?,
                })
            }
            None => Err(corrupt_kind(page_id)),
        }
    }
}

/// Per-subtree facts carried up by the integrity walk.
struct SubtreeSummary<K> {
    depth: usize,
    first_key: K,
    last_key: K,
}

// ----------------------------------------------------------------------
// File-driven test harness
// ----------------------------------------------------------------------

impl<K, V, C> BPlusTree<K, V, C>
where
    K: IndexKey + From<i64>,
    V: IndexValue + From<i64>,
    C: KeyComparator<K>,
{
    /// Inserts every whitespace-separated integer key in the file, using the
    /// integer as both key and value. Returns the number of keys inserted.
    pub fn insert_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let mut applied = 0;
        for token in content.split_whitespace() {
            let Ok(raw) = token.parse::<i64>() else {
                warn!(token, "skipping non-integer key");
                continue;
            };
            if self.insert(K::from(raw), V::from(raw))? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Removes every whitespace-separated integer key in the file. Returns
    /// the number of keys processed.
    pub fn remove_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let mut applied = 0;
        for token in content.split_whitespace() {
            let Ok(raw) = token.parse::<i64>() else {
                warn!(token, "skipping non-integer key");
                continue;
            };
            self.remove(&K::from(raw))?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Applies `(op, key)` pairs from the file, where op is `i` (insert) or
    /// `d` (delete). Returns the number of operations applied.
    pub fn batch_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let mut tokens = content.split_whitespace();
        let mut applied = 0;
        while let Some(op) = tokens.next() {
            let Some(key_token) = tokens.next() else {
                break;
            };
            let Ok(raw) = key_token.parse::<i64>() else {
                warn!(token = key_token, "skipping non-integer key");
                continue;
            };
            match op {
                "i" => {
                    self.insert(K::from(raw), V::from(raw))?;
                    applied += 1;
                }
                "d" => {
                    self.remove(&K::from(raw))?;
                    applied += 1;
                }
                _ => warn!(op, "skipping unknown batch op"),
            }
        }
        Ok(applied)
    }
}

fn internal_err(message: &str) -> ArborError {
    ArborError::Internal(message.to_string())
}

fn corrupt_kind(page_id: PageId) -> ArborError {
    ArborError::CorruptPage {
        page_id,
        reason: "unknown page kind".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_buffer::{BufferPoolConfig, DiskConfig, DiskManager};
    use tempfile::tempdir;

    type TestTree = BPlusTree<i64, i64, OrdComparator>;

    fn create_tree(
        leaf_max: usize,
        internal_max: usize,
    ) -> (tempfile::TempDir, Arc<BufferPoolManager>, TestTree) {
        let dir = tempdir().unwrap();
        let mut config = DiskConfig::new(dir.path().join("tree.arb"));
        config.fsync_enabled = false;
        let disk = DiskManager::new(config).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(
            BufferPoolConfig { num_frames: 256 },
            disk,
        ));

        let (header_id, header_guard) = bpm.new_page_guarded().unwrap();
        drop(header_guard);

        let tree = BPlusTree::new(
            "test_index",
            header_id,
            Arc::clone(&bpm),
            OrdComparator,
            leaf_max,
            internal_max,
        )
        .unwrap();
        (dir, bpm, tree)
    }

    fn collect(tree: &TestTree) -> Vec<i64> {
        tree.iter()
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect()
    }

    /// Reads the leaves left-to-right as key vectors, via the chain.
    fn leaf_contents(tree: &TestTree, bpm: &BufferPoolManager) -> Vec<Vec<i64>> {
        let mut out = Vec::new();
        let (mut cursor, _) = tree.iter().unwrap().position();
        while cursor.is_valid() {
            let guard = bpm.fetch_page_basic(cursor).unwrap();
            let data = guard.data();
            let leaf = LeafPageRef::<i64, i64>::attach(&data);
            out.push((0..leaf.size()).map(|i| leaf.key_at(i)).collect());
            cursor = leaf.next_leaf();
        }
        out
    }

    fn root_separators(tree: &TestTree, bpm: &BufferPoolManager) -> Vec<i64> {
        let root_id = tree.root_page_id().unwrap();
        let guard = bpm.fetch_page_basic(root_id).unwrap();
        let data = guard.data();
        let node = InternalPageRef::<i64>::attach(&data);
        (1..node.size()).map(|i| node.key_at(i)).collect()
    }

    #[test]
    fn test_new_tree_is_empty() {
        let (_dir, _bpm, tree) = create_tree(4, 4);

        assert!(tree.is_empty().unwrap());
        assert_eq!(tree.root_page_id().unwrap(), PageId::INVALID);
        assert_eq!(tree.get(&1).unwrap(), None);
        assert!(tree.iter().unwrap().is_end());
        assert_eq!(tree.name(), "test_index");
    }

    #[test]
    fn test_size_bounds_validation() {
        let (_dir, bpm, _tree) = create_tree(4, 4);
        let (header_id, guard) = bpm.new_page_guarded().unwrap();
        drop(guard);

        let too_small: Result<TestTree> = BPlusTree::new(
            "bad",
            header_id,
            Arc::clone(&bpm),
            OrdComparator,
            2,
            4,
        );
        assert!(matches!(
            too_small,
            Err(ArborError::InvalidParameter { .. })
        ));

        let too_large: Result<TestTree> = BPlusTree::new(
            "bad",
            header_id,
            Arc::clone(&bpm),
            OrdComparator,
            4,
            100_000,
        );
        assert!(matches!(
            too_large,
            Err(ArborError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_single_leaf_inserts() {
        let (_dir, _bpm, tree) = create_tree(4, 4);

        for k in [1, 2, 3] {
            assert!(tree.insert(k, k).unwrap());
        }

        assert!(!tree.is_empty().unwrap());
        assert_eq!(tree.get(&2).unwrap(), Some(2));
        assert_eq!(collect(&tree), vec![1, 2, 3]);

        // Still a single leaf root
        let root_id = tree.root_page_id().unwrap();
        let guard = tree.bpm.fetch_page_basic(root_id).unwrap();
        let data = guard.data();
        assert_eq!(page_kind(&data), Some(PageKind::Leaf));
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_first_leaf_split() {
        let (_dir, bpm, tree) = create_tree(4, 4);

        for k in [1, 2, 3, 4] {
            tree.insert(k, k * 10).unwrap();
        }

        // The fourth insert fills the leaf to max and splits it
        assert_eq!(leaf_contents(&tree, &bpm), vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(root_separators(&tree, &bpm), vec![3]);
        assert_eq!(collect(&tree), vec![1, 2, 3, 4]);
        for k in [1, 2, 3, 4] {
            assert_eq!(tree.get(&k).unwrap(), Some(k * 10));
        }
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_sequential_inserts_chain() {
        let (_dir, bpm, tree) = create_tree(4, 4);

        for k in 1..=7 {
            tree.insert(k, k).unwrap();
        }

        assert_eq!(
            leaf_contents(&tree, &bpm),
            vec![vec![1, 2], vec![3, 4], vec![5, 6, 7]]
        );
        assert_eq!(root_separators(&tree, &bpm), vec![3, 5]);
        assert_eq!(collect(&tree), (1..=7).collect::<Vec<_>>());
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_delete_borrows_from_right_sibling() {
        let (_dir, bpm, tree) = create_tree(4, 4);
        for k in 1..=7 {
            tree.insert(k, k).unwrap();
        }

        tree.remove(&4).unwrap();

        // [3,4] underflowed to [3]; borrowing 5 from [5,6,7] updates the
        // separator to the right sibling's new smallest key
        assert_eq!(
            leaf_contents(&tree, &bpm),
            vec![vec![1, 2], vec![3, 5], vec![6, 7]]
        );
        assert_eq!(root_separators(&tree, &bpm), vec![3, 6]);
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_delete_merges_with_right_sibling() {
        let (_dir, bpm, tree) = create_tree(4, 4);
        for k in 1..=7 {
            tree.insert(k, k).unwrap();
        }
        tree.remove(&4).unwrap();

        tree.remove(&3).unwrap();

        // [3,5] underflowed to [5]; merging with [6,7] drops a separator
        assert_eq!(leaf_contents(&tree, &bpm), vec![vec![1, 2], vec![5, 6, 7]]);
        assert_eq!(collect(&tree), vec![1, 2, 5, 6, 7]);
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_duplicate_rejection() {
        let (_dir, _bpm, tree) = create_tree(4, 4);

        assert!(tree.insert(5, 50).unwrap());
        assert!(!tree.insert(5, 99).unwrap());

        // The first value wins
        assert_eq!(tree.get(&5).unwrap(), Some(50));

        // Also after splits
        for k in 1..=20 {
            tree.insert(k * 100, k).unwrap();
        }
        assert!(!tree.insert(500, 0).unwrap());
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let (_dir, _bpm, tree) = create_tree(4, 4);

        tree.remove(&1).unwrap(); // empty tree

        tree.insert(1, 1).unwrap();
        tree.insert(2, 2).unwrap();
        tree.remove(&99).unwrap();

        assert_eq!(collect(&tree), vec![1, 2]);
    }

    #[test]
    fn test_remove_last_key_empties_tree() {
        let (_dir, _bpm, tree) = create_tree(4, 4);

        tree.insert(7, 7).unwrap();
        tree.remove(&7).unwrap();

        assert!(tree.is_empty().unwrap());
        assert_eq!(tree.root_page_id().unwrap(), PageId::INVALID);

        // The tree is reusable after emptying
        tree.insert(8, 8).unwrap();
        assert_eq!(tree.get(&8).unwrap(), Some(8));
    }

    #[test]
    fn test_insert_remove_roundtrip_restores_key_set() {
        let (_dir, _bpm, tree) = create_tree(4, 4);

        for k in 1..=10 {
            tree.insert(k, k).unwrap();
        }
        let before = collect(&tree);

        tree.insert(42, 42).unwrap();
        tree.remove(&42).unwrap();

        assert_eq!(collect(&tree), before);
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_bulk_ascending_then_descending_delete() {
        let (_dir, _bpm, tree) = create_tree(4, 4);

        for k in 1..=100 {
            assert!(tree.insert(k, k).unwrap());
        }
        assert_eq!(collect(&tree), (1..=100).collect::<Vec<_>>());
        tree.check_integrity().unwrap();

        for k in (1..=100).rev() {
            tree.remove(&k).unwrap();
        }

        assert!(tree.is_empty().unwrap());
        assert_eq!(tree.root_page_id().unwrap(), PageId::INVALID);
    }

    #[test]
    fn test_bulk_ascending_delete() {
        let (_dir, _bpm, tree) = create_tree(4, 4);

        for k in 1..=100 {
            tree.insert(k, k).unwrap();
        }
        for k in 1..=100 {
            tree.remove(&k).unwrap();
            if k % 10 == 0 {
                tree.check_integrity().unwrap();
            }
        }

        assert!(tree.is_empty().unwrap());
    }

    #[test]
    fn test_descending_inserts() {
        let (_dir, _bpm, tree) = create_tree(4, 4);

        for k in (1..=50).rev() {
            tree.insert(k, k).unwrap();
        }

        assert_eq!(collect(&tree), (1..=50).collect::<Vec<_>>());
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_larger_fanout() {
        let (_dir, _bpm, tree) = create_tree(32, 16);

        for k in 0..2000 {
            // A scattered but deterministic order
            let key = (k * 379) % 2000;
            tree.insert(key, key).unwrap();
        }

        assert_eq!(collect(&tree), (0..2000).collect::<Vec<_>>());
        tree.check_integrity().unwrap();

        for k in 0..1000 {
            tree.remove(&((k * 577) % 2000)).unwrap();
        }
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_iter_from_exact_match() {
        let (_dir, _bpm, tree) = create_tree(4, 4);
        for k in [1, 3, 5, 7, 9] {
            tree.insert(k, k * 2).unwrap();
        }

        let rest: Vec<i64> = tree
            .iter_from(&5)
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect();
        assert_eq!(rest, vec![5, 7, 9]);
    }

    #[test]
    fn test_iter_from_non_exact_is_end() {
        let (_dir, _bpm, tree) = create_tree(4, 4);
        for k in [1, 3, 5, 7, 9] {
            tree.insert(k, k).unwrap();
        }

        // This iterator does not do lower-bound: misses land at end
        assert!(tree.iter_from(&4).unwrap().is_end());
        assert!(tree.iter_from(&0).unwrap().is_end());
        assert!(tree.iter_from(&10).unwrap().is_end());
        assert_eq!(tree.iter_from(&4).unwrap(), tree.end());
    }

    #[test]
    fn test_end_iterators_compare_equal() {
        let (_dir, _bpm, tree) = create_tree(4, 4);
        tree.insert(1, 1).unwrap();

        assert_eq!(tree.end(), tree.end());
        assert!(tree.iter().unwrap() != tree.end());
    }

    #[test]
    fn test_values_survive_structure_changes() {
        let (_dir, _bpm, tree) = create_tree(4, 4);

        for k in 1..=60 {
            tree.insert(k, k * 1000).unwrap();
        }
        for k in (1..=60).filter(|k| k % 3 == 0) {
            tree.remove(&k).unwrap();
        }

        for k in 1..=60 {
            let expected = if k % 3 == 0 { None } else { Some(k * 1000) };
            assert_eq!(tree.get(&k).unwrap(), expected, "key {}", k);
        }
        tree.check_integrity().unwrap();
    }
}
