//! Position cache table
//!
//! Sorted `(key → offset)` table for a single file identity.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::ops::Bound;

use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::key::{Key, Position};

/// Known exact positions in one data file
///
/// ## Concurrency:
/// - `entries`: Protected by RwLock (many concurrent bracket queries, exclusive writer)
/// - `index_loaded`: Mutex held for the whole index load so it happens once
/// - All methods use `&self`; share with `Arc<PositionCache>`
#[derive(Debug)]
pub struct PositionCache {
    /// Content fingerprint this cache is valid for
    unique_id: Option<String>,

    /// Offset of the first data line (lower sentinel)
    data_start: u64,

    /// Size of the data file (upper sentinel)
    file_size: u64,

    /// Entry bound; exceeding it evicts one entry
    max_positions: usize,

    /// Sorted table: key → offset of the end of a line with that key
    entries: RwLock<BTreeMap<Key, u64>>,

    /// Whether the sparse index was merged in already
    index_loaded: Mutex<bool>,
}

impl PositionCache {
    /// Create an empty cache for `[data_start, file_size)`
    pub fn new(unique_id: Option<String>, data_start: u64, file_size: u64, max_positions: usize) -> Self {
        Self {
            unique_id,
            data_start,
            file_size,
            max_positions,
            entries: RwLock::new(BTreeMap::new()),
            index_loaded: Mutex::new(false),
        }
    }

    /// Tightest cached position whose key is strictly smaller than `key`,
    /// or the start-of-data sentinel
    pub fn lower_bound(&self, key: &Key) -> Position {
        let entries = self.entries.read();
        match entries.range((Bound::Unbounded, Bound::Excluded(key))).next_back() {
            Some((k, &offset)) => Position::new(k.clone(), offset),
            None => Position::sentinel(self.data_start),
        }
    }

    /// Tightest cached position whose key is `>= key`, or the end-of-file sentinel
    pub fn upper_bound(&self, key: &Key) -> Position {
        let entries = self.entries.read();
        match entries.range(key..).next() {
            Some((k, &offset)) => Position::new(k.clone(), offset),
            None => Position::sentinel(self.file_size),
        }
    }

    /// Both brackets under a single read lock
    pub fn bracket(&self, key: &Key) -> (Position, Position) {
        let entries = self.entries.read();
        let lower = match entries.range((Bound::Unbounded, Bound::Excluded(key))).next_back() {
            Some((k, &offset)) => Position::new(k.clone(), offset),
            None => Position::sentinel(self.data_start),
        };
        let upper = match entries.range(key..).next() {
            Some((k, &offset)) => Position::new(k.clone(), offset),
            None => Position::sentinel(self.file_size),
        };
        (lower, upper)
    }

    /// Insert or overwrite an exact entry, evicting one entry if over the bound
    pub fn put(&self, key: Key, offset: u64) {
        let mut entries = self.entries.write();
        entries.insert(key, offset);
        if entries.len() > self.max_positions {
            if let Some(victim) = least_useful_key(&entries) {
                entries.remove(&victim);
            }
        }
    }

    /// Evict the entry whose removal costs the least bracketing resolution
    ///
    /// Returns the evicted key, or `None` if the cache is too small to prune.
    pub fn remove_least_useful_key(&self) -> Option<Key> {
        let mut entries = self.entries.write();
        let victim = least_useful_key(&entries)?;
        entries.remove(&victim);
        Some(victim)
    }

    /// Merge a sparse index into this cache, at most once per cache
    ///
    /// Returns the number of index entries read (0 if already loaded).
    pub fn load_index<R: BufRead>(&self, reader: R) -> Result<usize> {
        let mut loaded = self.index_loaded.lock();
        if *loaded {
            return Ok(0);
        }
        let count = crate::index::load_into(reader, self)?;
        *loaded = true;
        Ok(count)
    }

    /// Whether the sparse index was merged in
    pub fn is_index_loaded(&self) -> bool {
        *self.index_loaded.lock()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of all entries in key order
    pub fn entries(&self) -> Vec<(Key, u64)> {
        self.entries
            .read()
            .iter()
            .map(|(k, &offset)| (k.clone(), offset))
            .collect()
    }

    /// Content fingerprint this cache belongs to
    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    /// Entry bound
    pub fn max_positions(&self) -> usize {
        self.max_positions
    }

    /// Lower sentinel offset
    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Upper sentinel offset
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}

/// Pick the entry to evict
///
/// Entries at the ends of the table or of a chromosome are kept. Among the
/// rest, the one with the smallest `gap_left * gap_right` goes; ties pick the
/// lowest key. If every entry is a chromosome edge, chromosome edges are
/// considered too (table ends never are).
fn least_useful_key(entries: &BTreeMap<Key, u64>) -> Option<Key> {
    if entries.len() < 3 {
        return None;
    }
    let items: Vec<(&Key, u64)> = entries.iter().map(|(k, &offset)| (k, offset)).collect();

    let score = |i: usize| -> u128 {
        let left = items[i - 1].1;
        let me = items[i].1;
        let right = items[i + 1].1;
        u128::from(right.saturating_sub(me)) * u128::from(me.saturating_sub(left))
    };
    let inside_chromosome = |i: usize| {
        let chrom = &items[i].0.chromosome;
        items[i - 1].0.chromosome == *chrom && items[i + 1].0.chromosome == *chrom
    };

    let interior = 1..items.len() - 1;
    interior
        .clone()
        .filter(|&i| inside_chromosome(i))
        .min_by_key(|&i| score(i))
        .or_else(|| interior.min_by_key(|&i| score(i)))
        .map(|i| items[i].0.clone())
}
