//! Strata - the storage core of a disk-oriented database
//!
//! This crate provides the memory-management substrate a disk-oriented DBMS
//! builds its access methods on: a buffer pool that caches fixed-size pages
//! in a bounded set of frames, an LRU-K replacement policy deciding what to
//! evict under pressure, and scoped page guards that tie pins and latches to
//! lexical scope. A self-contained persistent trie rounds out the crate as a
//! value-versioned key-value map.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk I/O
//!   - `DiskManager`: reads and writes pages against the database file
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: caches pages in frames, evicting as needed
//!   - `LruKReplacer`: LRU-K page replacement policy
//!   - `FrameHeader`: per-frame metadata, page bytes, and the frame latch
//!   - `BasicPageGuard`/`ReadPageGuard`/`WritePageGuard`: RAII pin (and
//!     latch) handles
//!
//! - **Recovery** (`recovery`): `LogManager`, an opaque WAL handle the pool
//!   carries for future use
//!
//! - **Trie** (`trie`): persistent copy-on-write map with structural sharing
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::buffer::BufferPoolManager;
//! use strata::storage::disk::DiskManager;
//!
//! let disk = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = BufferPoolManager::new(64, disk, 2, None);
//!
//! // Allocate a page and write through a guard; the pin is released when
//! // the guard leaves scope.
//! let page_id = {
//!     let mut guard = bpm.new_page_guarded().unwrap().unwrap();
//!     guard.data_mut()[0] = 42;
//!     guard.page_id()
//! };
//!
//! bpm.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod recovery;
pub mod storage;
pub mod trie;

// Re-export commonly used types at the crate root
pub use common::{PageId, Result, StrataError};
pub use trie::Trie;
