//! Key Module
//!
//! The total order every data file, index and cache is sorted by.
//!
//! ## Ordering
//! A key is `(chromosome, position)`. Chromosomes compare **lexicographically**
//! by their bytes, positions numerically:
//!
//! ```text
//! chr1:5 < chr1:10 < chr10:1 < chr2:1 < chrX:1
//! ```
//!
//! Files and indexes are written in this order, so `chr10` sorts between
//! `chr1` and `chr2`.

mod layout;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use layout::{KeyLayout, KeyRef};
pub(crate) use layout::strip_cr;

/// A sort key: chromosome name and position on it
///
/// The derived `Ord` compares the chromosome first (byte-wise) and then the
/// position, which is exactly the file order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Chromosome / contig name (may be empty)
    pub chromosome: String,
    /// Position on the chromosome
    pub position: u64,
}

impl Key {
    /// Create a new key
    pub fn new(chromosome: impl Into<String>, position: u64) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
        }
    }

    /// Borrow this key in the form produced by line parsing
    pub fn as_key_ref(&self) -> KeyRef<'_> {
        KeyRef {
            chromosome: self.chromosome.as_bytes(),
            position: self.position,
        }
    }

    /// Estimate where this key falls between `left` and `right`, as a fraction
    /// of the byte distance between them.
    ///
    /// Positions on a single chromosome are assumed to be spread evenly through
    /// the file. The estimate is kept inside `[0.1, 0.9]`. Keys on different
    /// chromosomes fall back to the midpoint.
    pub fn interpolate(&self, left: &Key, right: &Key) -> f64 {
        if left.chromosome != right.chromosome || right.position <= left.position {
            return 0.5;
        }
        let span = (right.position - left.position) as f64;
        let offset = self.position as f64 - left.position as f64;
        (offset / span).clamp(0.1, 0.9)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chromosome, self.position)
    }
}

// =============================================================================
// Position
// =============================================================================

/// A key together with a byte offset in a data file
///
/// A `Position` with no key is an open sentinel: the start of the data
/// (lower bound) or the end of the file (upper bound).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Key of the line that ends at `offset`, or `None` for a sentinel
    pub key: Option<Key>,
    /// Byte offset in the data file
    pub offset: u64,
}

impl Position {
    /// A position with a known key
    pub fn new(key: Key, offset: u64) -> Self {
        Self {
            key: Some(key),
            offset,
        }
    }

    /// An open bound at `offset`
    pub fn sentinel(offset: u64) -> Self {
        Self { key: None, offset }
    }

    /// Whether this is an open bound
    pub fn is_sentinel(&self) -> bool {
        self.key.is_none()
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Positions are ordered by file offset
impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.offset
            .cmp(&other.offset)
            .then_with(|| self.key.cmp(&other.key))
    }
}
