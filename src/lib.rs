//! siltdb - a disk-oriented relational database engine in Rust
//!
//! The engine stores data in fixed-size pages on disk and mediates all page
//! access through a buffer pool with LRU-K replacement. On top of the pool
//! sit a concurrent B+Tree index and a pull-based (Volcano) query executor.
//!
//! # Architecture
//!
//! - **Storage** (`storage`): disk I/O and page organization
//!   - `DiskManager` / `DiskScheduler`: whole-page reads and writes
//!   - `TablePage` / `TableHeap`: slotted tuple storage with tombstones
//!
//! - **Buffer pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: pinning, dirty tracking, eviction
//!   - `LruKReplacer`: LRU-K victim selection
//!   - `BasicPageGuard` / `ReadPageGuard` / `WritePageGuard`: scoped pins,
//!     optionally holding the page latch
//!
//! - **Index** (`index`): a concurrent B+Tree with latch crabbing
//!
//! - **Catalog** (`catalog`): table and index metadata
//!
//! - **Execution** (`execution`): plans, expressions, Volcano operators,
//!   and the engine driver; `optimizer` holds the plan rewrites
//!
//! - **Trie** (`trie`): a standalone persistent copy-on-write trie
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use siltdb::buffer::BufferPoolManager;
//! use siltdb::storage::disk::DiskManager;
//!
//! let disk = Arc::new(DiskManager::new("demo.db").unwrap());
//! let bpm = BufferPoolManager::new(64, 2, disk);
//!
//! let page_id = bpm.new_page().unwrap();
//! {
//!     let mut guard = bpm.fetch_write(page_id).unwrap();
//!     guard.data_mut()[0] = 42;
//! }
//! bpm.unpin_page(page_id, false);
//! bpm.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod execution;
pub mod index;
pub mod optimizer;
pub mod storage;
pub mod trie;
pub mod types;

// Re-export commonly used types at the crate root
pub use common::{DbError, FrameId, Oid, PageId, Result, Rid, SlotId};
