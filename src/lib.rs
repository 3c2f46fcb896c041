//! # gorseek
//!
//! Random-access seeking in large, key-sorted genomic text files:
//! - Binary search over buffered lines with leftmost-duplicate semantics
//! - GORIv2 sparse index files, generated atomically
//! - Bounded position caches shared per file identity across threads
//! - Plain and block-compressed (GORZ) seek iterators
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │         SeekableIterator / GorzSeekableIterator              │
//! │             (one per caller thread)                          │
//! └──────┬──────────────────────┬───────────────────────┬───────┘
//!        │ brackets / exact     │ windows               │ blocks
//!        ▼ positions            ▼                       ▼
//! ┌─────────────┐        ┌─────────────┐         ┌─────────────┐
//! │ PositionCache│◄──────│ LineBuffer  │         │ GORZ codec  │
//! │  (RwLock)   │  load  │  (search)   │         │ (zlib/zstd) │
//! └──────┬──────┘        └──────┬──────┘         └─────────────┘
//!        │                      │
//!        ▼                      ▼
//! ┌─────────────┐        ┌─────────────┐
//! │CacheRegistry│        │SeekableSource│
//! │ (LRU, Mutex)│        │ (file, mem) │
//! └──────▲──────┘        └─────────────┘
//!        │ merged once
//! ┌──────┴──────┐
//! │ Sparse index│
//! │  (.gori)    │
//! └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod key;
pub mod search;
pub mod cache;
pub mod index;
pub mod source;
pub mod seek;
pub mod gorz;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, SeekError};
pub use config::Config;
pub use key::{Key, KeyLayout, Position};
pub use cache::{CacheRegistry, PositionCache};
pub use index::IndexGranularity;
pub use source::{FileSource, MemorySource, SeekableSource, SourceIdentity};
pub use seek::{GorzSeekableIterator, SeekableIterator};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of gorseek
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
