//! Disk manager for page-level file I/O.

use arbor_common::page::{PageData, PageId, PAGE_SIZE};
use arbor_common::{ArborError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

/// Configuration for the disk manager.
#[derive(Debug, Clone)]
pub struct DiskConfig {
    /// Path to the index data file.
    pub path: PathBuf,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl DiskConfig {
    /// Creates a configuration for the given data file with fsync enabled.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fsync_enabled: true,
        }
    }
}

/// Manages reading and writing pages of a single index file.
///
/// Pages are addressed by their page number; the file grows as higher
/// page numbers are written.
pub struct DiskManager {
    /// Configuration.
    config: DiskConfig,
    /// Open file handle.
    file: Mutex<File>,
    /// Number of pages the file currently spans.
    num_pages: AtomicU32,
}

impl DiskManager {
    /// Opens or creates the data file.
    pub fn new(config: DiskConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&config.path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            config,
            file: Mutex::new(file),
            num_pages: AtomicU32::new(num_pages),
        })
    }

    /// Returns the data file path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Returns the number of pages the file currently spans.
    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Acquire)
    }

    /// Reads a page from disk.
    pub fn read_page(&self, page_id: PageId) -> Result<Box<PageData>> {
        if !page_id.is_valid() || page_id.0 >= self.num_pages() {
            return Err(ArborError::PageNotFound { page_id });
        }

        let mut file = self.file.lock();
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = Box::new([0u8; PAGE_SIZE]);
        file.read_exact(&mut buffer[..])?;

        Ok(buffer)
    }

    /// Writes a page to disk, extending the file if needed.
    pub fn write_page(&self, page_id: PageId, data: &PageData) -> Result<()> {
        if !page_id.is_valid() {
            return Err(ArborError::PageNotFound { page_id });
        }

        let mut file = self.file.lock();
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        if self.config.fsync_enabled {
            file.sync_data()?;
        }

        self.num_pages.fetch_max(page_id.0 + 1, Ordering::AcqRel);
        Ok(())
    }

    /// Forces all buffered writes to disk.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}
