//! Concurrent disk-resident B+Tree index for ArborDB.
//!
//! This crate provides:
//! - A B+Tree mapping fixed-width keys to record identifiers, backed by the
//!   `arbor-buffer` page pool
//! - Latch-crabbing concurrency: safe under parallel readers and writers
//! - Point lookup, unique insert, delete, and a forward range iterator
//! - Typed views over raw page bytes for header, internal, and leaf pages
//!
//! The tree never holds raw page pointers outside a live page guard; every
//! descent keeps its latches in a context stack that releases them
//! deterministically, including on error paths.

mod context;
mod iter;
mod key;
mod page;
mod search;
mod tree;

pub use iter::TreeIterator;
pub use key::{IndexKey, IndexValue, KeyComparator, OrdComparator, RecordId};
pub use tree::BPlusTree;
