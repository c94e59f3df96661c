//! Buffer pool manager.

use crate::disk::DiskManager;
use crate::frame::{BufferFrame, FrameId};
use crate::guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};
use crate::page_table::PageTable;
use crate::replacer::{ClockReplacer, Replacer};
use arbor_common::page::{PageId, PAGE_SIZE};
use arbor_common::{ArborError, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU32, Ordering};
use sysinfo::System;
use tracing::{debug, warn};

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { num_frames: 1024 }
    }
}

/// Buffer pool manager.
///
/// Manages a fixed-size pool of page frames with:
/// - Page ID to frame ID mapping (lock-free page table)
/// - Free frame list for new pages
/// - Clock replacement for eviction, with dirty write-back
/// - Pin counting plus per-page latches, exposed through scoped guards
///
/// Fetching blocks until the requested latch mode is granted; the fetched
/// page stays pinned (hence resident) for the guard's lifetime.
pub struct BufferPoolManager {
    /// Configuration.
    config: BufferPoolConfig,
    /// Array of buffer frames.
    frames: Vec<BufferFrame>,
    /// Page ID to frame ID mapping (lock-free reads).
    page_table: PageTable,
    /// List of free frame IDs.
    free_list: Mutex<Vec<FrameId>>,
    /// Page replacement policy.
    replacer: ClockReplacer,
    /// Backing store for page data.
    disk: DiskManager,
    /// Next page number to allocate. Never reused.
    next_page_id: AtomicU32,
    /// Serializes miss handling: disk loads, eviction, new-page allocation.
    load_lock: Mutex<()>,
    /// Guards table-membership/pin atomicity between the hit path (shared)
    /// and eviction or deletion (exclusive).
    mapping: RwLock<()>,
}

impl BufferPoolManager {
    /// Creates a new buffer pool over the given disk manager.
    pub fn new(config: BufferPoolConfig, disk: DiskManager) -> Self {
        let num_frames = config.num_frames;

        let frames: Vec<_> = (0..num_frames)
            .map(|i| BufferFrame::new(FrameId(i as u32)))
            .collect();

        // All frames start in the free list
        let free_list: Vec<_> = (0..num_frames).map(|i| FrameId(i as u32)).collect();

        let next_page_id = AtomicU32::new(disk.num_pages());

        Self {
            config,
            frames,
            page_table: PageTable::new(num_frames),
            free_list: Mutex::new(free_list),
            replacer: ClockReplacer::new(num_frames),
            disk,
            next_page_id,
            load_lock: Mutex::new(()),
            mapping: RwLock::new(()),
        }
    }

    /// Creates a buffer pool sized to 25% of available system RAM.
    ///
    /// Minimum 1,000 frames so caching stays useful on low-memory systems.
    pub fn auto_sized(disk: DiskManager) -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4; // 25% of available RAM
        let num_frames = (target_bytes / PAGE_SIZE).max(1_000);

        Self::new(BufferPoolConfig { num_frames }, disk)
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Returns the number of pages currently in the pool.
    pub fn page_count(&self) -> usize {
        self.page_table.len()
    }

    /// Checks if a page is resident in the buffer pool.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.page_table.contains(page_id)
    }

    /// Fetches a page under a shared latch.
    ///
    /// Blocks until the latch is granted. The page is pinned for the
    /// guard's lifetime.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard<'_>> {
        let frame = self.pin_or_load(page_id)?;
        let latch = frame.read_data();
        Ok(ReadPageGuard {
            page_id,
            frame,
            latch: Some(latch),
        })
    }

    /// Fetches a page under an exclusive latch.
    ///
    /// Blocks until the latch is granted. The page is pinned for the
    /// guard's lifetime and marked dirty when the guard drops.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard<'_>> {
        let frame = self.pin_or_load(page_id)?;
        let latch = frame.write_data();
        Ok(WritePageGuard {
            page_id,
            frame,
            latch: Some(latch),
        })
    }

    /// Fetches a page with a pin but no latch. Debug use only.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard<'_>> {
        let frame = self.pin_or_load(page_id)?;
        Ok(BasicPageGuard { page_id, frame })
    }

    /// Allocates a fresh zeroed page and returns it under an exclusive latch.
    pub fn new_page_guarded(&self) -> Result<(PageId, WritePageGuard<'_>)> {
        let _io = self.load_lock.lock();

        let frame_id = self.allocate_frame()?;
        let page_id = PageId(self.next_page_id.fetch_add(1, Ordering::AcqRel));

        let frame = &self.frames[frame_id.0 as usize];
        // Pin before publishing so eviction never selects the frame
        frame.pin();
        frame.set_page_id(Some(page_id));
        {
            let _map = self.mapping.write();
            self.page_table.insert(page_id, frame_id);
        }
        self.replacer.record_access(frame_id);

        let latch = frame.write_data();
        Ok((
            page_id,
            WritePageGuard {
                page_id,
                frame,
                latch: Some(latch),
            },
        ))
    }

    /// Deletes a page from the buffer pool.
    ///
    /// Returns true if the page was deleted. Returns false if the page is
    /// pinned or not resident. The page's ID is retired, never reused; a
    /// later fetch reports `PageNotFound` unless the page is still on disk.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let map = self.mapping.write();
        let Some(frame_id) = self.page_table.remove(page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.0 as usize];

        // Cannot delete a pinned page - reinsert
        if frame.is_pinned() {
            self.page_table.insert(page_id, frame_id);
            return false;
        }

        self.replacer.remove(frame_id);
        frame.set_page_id(None);
        drop(map);

        frame.reset();
        self.free_list.lock().push(frame_id);
        true
    }

    /// Flushes a page to disk if it is resident and dirty.
    ///
    /// Returns true if the page was written.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let Some(frame) = self.pin_resident(page_id) else {
            return Ok(false);
        };
        let flushed = self.flush_frame(page_id, frame);
        frame.unpin();
        flushed
    }

    /// Flushes all dirty resident pages.
    ///
    /// Returns the number of pages flushed.
    pub fn flush_all(&self) -> Result<usize> {
        let mut resident = Vec::new();
        self.page_table.for_each(|page_id, _| {
            resident.push(page_id);
            true
        });

        let mut flushed = 0;
        for page_id in resident {
            if self.flush_page(page_id)? {
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned_count = 0;
        let mut dirty_count = 0;

        self.page_table.for_each(|_, frame_id| {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_pinned() {
                pinned_count += 1;
            }
            if frame.is_dirty() {
                dirty_count += 1;
            }
            true
        });

        BufferPoolStats {
            total_frames: self.config.num_frames,
            free_frames: self.free_count(),
            used_frames: self.page_table.len(),
            pinned_frames: pinned_count,
            dirty_frames: dirty_count,
        }
    }

    fn flush_frame(&self, page_id: PageId, frame: &BufferFrame) -> Result<bool> {
        if !frame.is_dirty() {
            return Ok(false);
        }
        {
            let data = frame.read_data();
            self.disk.write_page(page_id, &data)?;
        }
        frame.set_dirty(false);
        Ok(true)
    }

    /// Pins the page if it is resident. The shared mapping lock makes the
    /// lookup-and-pin atomic with respect to eviction and deletion.
    fn pin_resident(&self, page_id: PageId) -> Option<&BufferFrame> {
        let _map = self.mapping.read();
        let frame_id = self.page_table.get(page_id)?;
        let frame = &self.frames[frame_id.0 as usize];
        frame.pin();
        self.replacer.record_access(frame_id);
        Some(frame)
    }

    /// Pins the page, loading it from disk on a miss.
    fn pin_or_load(&self, page_id: PageId) -> Result<&BufferFrame> {
        if let Some(frame) = self.pin_resident(page_id) {
            return Ok(frame);
        }

        let _io = self.load_lock.lock();

        // Another thread may have loaded it while we waited
        if let Some(frame) = self.pin_resident(page_id) {
            return Ok(frame);
        }

        let data = self.disk.read_page(page_id)?;
        let frame_id = self.allocate_frame()?;
        let frame = &self.frames[frame_id.0 as usize];
        frame.copy_from(&data);
        frame.pin();
        frame.set_page_id(Some(page_id));
        {
            let _map = self.mapping.write();
            self.page_table.insert(page_id, frame_id);
        }
        self.replacer.record_access(frame_id);
        Ok(frame)
    }

    /// Produces an empty frame, evicting if necessary.
    ///
    /// Caller must hold `load_lock`. The returned frame is unpinned, clean,
    /// unmapped, and zeroed.
    fn allocate_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        let victim = {
            let _map = self.mapping.write();
            let victim = self.replacer.evict(&|fid| {
                let frame = &self.frames[fid.0 as usize];
                !frame.is_pinned() && !frame.is_empty()
            });
            let Some(victim) = victim else {
                warn!("buffer pool exhausted: every frame is pinned");
                return Err(ArborError::BufferPoolExhausted);
            };

            let frame = &self.frames[victim.0 as usize];
            if let Some(old_id) = frame.page_id() {
                self.page_table.remove(old_id);
                self.replacer.remove(victim);
                // Unmapped: no new pin can arrive. Write back outside the
                // mapping lock.
                if frame.is_dirty() {
                    debug!(page = %old_id, frame = %victim, "evicting dirty page");
                    drop(_map);
                    let data = frame.read_data();
                    self.disk.write_page(old_id, &data)?;
                    drop(data);
                    frame.set_dirty(false);
                }
            }
            victim
        };

        let frame = &self.frames[victim.0 as usize];
        frame.reset();
        Ok(victim)
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of frames with pages.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}
