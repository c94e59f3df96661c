//! Scoped page guards.
//!
//! A guard couples a pin on a buffer frame with (for read/write guards) the
//! page latch, and releases both deterministically when dropped. Guards are
//! move-only; dropping one explicitly is the way to release a page early
//! during latch crabbing.

use crate::frame::BufferFrame;
use arbor_common::page::{PageData, PageId};
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

/// Shared-latch guard over a pinned page.
///
/// Holds the page latch in shared mode for its whole lifetime; releases the
/// latch and unpins on drop.
pub struct ReadPageGuard<'a> {
    pub(crate) page_id: PageId,
    pub(crate) frame: &'a BufferFrame,
    pub(crate) latch: Option<RwLockReadGuard<'a, Box<PageData>>>,
}

impl<'a> ReadPageGuard<'a> {
    /// Returns the guarded page's ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &PageData {
        self.latch.as_ref().expect("latch held for guard lifetime")
    }
}

impl Drop for ReadPageGuard<'_> {
    fn drop(&mut self) {
        // Latch released before the pin so eviction never sees a latched
        // unpinned frame.
        self.latch.take();
        self.frame.unpin();
    }
}

/// Exclusive-latch guard over a pinned page.
///
/// Holds the page latch in exclusive mode for its whole lifetime; releases
/// the latch, marks the frame dirty, and unpins on drop.
pub struct WritePageGuard<'a> {
    pub(crate) page_id: PageId,
    pub(crate) frame: &'a BufferFrame,
    pub(crate) latch: Option<RwLockWriteGuard<'a, Box<PageData>>>,
}

impl<'a> WritePageGuard<'a> {
    /// Returns the guarded page's ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &PageData {
        self.latch.as_ref().expect("latch held for guard lifetime")
    }

    /// Returns mutable access to the page bytes.
    pub fn data_mut(&mut self) -> &mut PageData {
        self.latch.as_mut().expect("latch held for guard lifetime")
    }
}

impl Drop for WritePageGuard<'_> {
    fn drop(&mut self) {
        self.frame.set_dirty(true);
        self.latch.take();
        self.frame.unpin();
    }
}

/// Pin-only guard, without a latch.
///
/// Keeps the page resident but takes no latch; each data access acquires a
/// momentary shared lock. Intended for debug walks and integrity checks,
/// not for operations that must observe a stable page.
pub struct BasicPageGuard<'a> {
    pub(crate) page_id: PageId,
    pub(crate) frame: &'a BufferFrame,
}

impl<'a> BasicPageGuard<'a> {
    /// Returns the guarded page's ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Reads the page bytes under a momentary shared lock.
    pub fn data(&self) -> RwLockReadGuard<'_, Box<PageData>> {
        self.frame.read_data()
    }
}

impl Drop for BasicPageGuard<'_> {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}
