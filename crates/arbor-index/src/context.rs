//! Per-operation descent context.
//!
//! A descent records the root ID it observed, the latches it holds (read
//! stack for lookups, write stack for mutators), and — for mutators — the
//! header page guard. The stacks are the only place ancestor information is
//! kept; pages never store parent pointers. Dropping the context releases
//! every held guard, which makes error propagation with `?` safe at any
//! point in an operation.

use arbor_buffer::{ReadPageGuard, WritePageGuard};
use arbor_common::page::PageId;
use std::collections::VecDeque;

/// State of one tree operation's descent.
pub(crate) struct Context<'a> {
    /// Root page ID observed when the descent started.
    pub(crate) root_page_id: PageId,
    /// Header page guard; mutators hold it until the root is known safe.
    pub(crate) header: Option<WritePageGuard<'a>>,
    /// Latches held by a read descent, top-down.
    pub(crate) read_set: VecDeque<ReadPageGuard<'a>>,
    /// Latches held by a write descent, top-down.
    pub(crate) write_set: VecDeque<WritePageGuard<'a>>,
}

impl<'a> Context<'a> {
    pub(crate) fn new() -> Self {
        Self {
            root_page_id: PageId::INVALID,
            header: None,
            read_set: VecDeque::new(),
            write_set: VecDeque::new(),
        }
    }

    /// Returns true if the given page was the root when the descent began.
    pub(crate) fn is_root(&self, page_id: PageId) -> bool {
        self.root_page_id == page_id
    }

    /// Releases every strict ancestor in the write stack, keeping only the
    /// most recently latched page. Called when that page is known safe.
    pub(crate) fn release_write_ancestors(&mut self) {
        while self.write_set.len() > 1 {
            self.write_set.pop_front();
        }
    }
}
