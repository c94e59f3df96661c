//! Buffer pool manager for ArborDB.
//!
//! This crate provides:
//! - Buffer frames holding page data behind per-page reader/writer latches
//! - A lock-free page table mapping page IDs to frames
//! - Clock page replacement
//! - A synchronous disk manager for page-level file I/O
//! - Scoped page guards (read / write / basic) with deterministic release

mod disk;
mod frame;
mod guard;
mod page_table;
mod pool;
mod replacer;

pub use disk::{DiskConfig, DiskManager};
pub use frame::{BufferFrame, FrameId};
pub use guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};
pub use pool::{BufferPoolConfig, BufferPoolManager, BufferPoolStats};
pub use replacer::{ClockReplacer, Replacer};
