//! Position Cache Module
//!
//! Bounded, shared tables of known `(key → file offset)` pairs.
//!
//! ## Responsibilities
//! - Answer bracket queries: the tightest known offsets around a target key
//! - Absorb exact positions discovered while seeking, and the sparse index
//! - Stay within a size bound derived from the file size
//! - Share one cache per file identity across iterators and threads
//!
//! ## Entry Semantics
//! An entry `(K, O)` means "the line ending at byte `O` has key `K`". `O` is
//! therefore always the start of the following line (or the end of the file):
//!
//! ```text
//!            lower bound              upper bound
//!            (K1 < target)            (K2 >= target)
//!                 │                        │
//!   ... K1 line\n │ ... lines ...  K2 line\n│ ...
//!                 O1                       O2
//!   first line with key >= target starts in [O1, O2)
//! ```
//!
//! ## Concurrency
//! - `PositionCache`: one `RwLock` around the sorted table (bracket queries
//!   share, inserts and evictions are exclusive)
//! - `CacheRegistry`: one `Mutex` around the LRU map of file identities
//! - Critical sections are short; no I/O happens while a lock is held

mod registry;
mod table;

pub use registry::CacheRegistry;
pub use table::PositionCache;

/// Bytes per GiB, the unit of the cache density heuristic
pub(crate) const GB: u64 = 1024 * 1024 * 1024;

/// Entry bound for a cache covering `[data_start, file_size)`
///
/// `positions_per_gb` entries for every started GiB (at least one), capped
/// at `max_positions`.
pub fn max_positions_for(
    data_start: u64,
    file_size: u64,
    positions_per_gb: usize,
    max_positions: usize,
) -> usize {
    let size = file_size.saturating_sub(data_start);
    let gigabytes = size.div_ceil(GB).max(1);
    let bound = (gigabytes as usize).saturating_mul(positions_per_gb);
    bound.min(max_positions)
}
