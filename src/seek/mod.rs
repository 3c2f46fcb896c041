//! Seek Module
//!
//! Iterators that jump to the first line at or after a key.
//!
//! ## Narrowing
//! A seek keeps a bracket `[lo, hi)` of file offsets known to contain the
//! start of the first line whose key is `>= target` (or `hi == file size`
//! when there may be no such line). It starts from the position cache and
//! shrinks with every window read:
//!
//! ```text
//!   Bracketed ──read window──┬─> Found       match with a known-smaller line before it
//!       ▲                    ├─> Exhausted   bracket closed, no line >= target
//!       │  narrowed          │
//!       └────────────────────┤
//!                            └─> Expanding   window held no usable line;
//!                                  │         double it and read again
//!                                  └──────> Bracketed
//! ```
//!
//! Windows are placed by interpolating the target between the bracket keys
//! when both are on the same chromosome, else at the bracket midpoint. Every
//! step that does not find the target doubles the window (up to
//! `max_window_size`), so a coarse index falls back to an exponential search.
//! A window that holds less than two complete lines keeps doubling past that
//! cap, up to `max_line_size`.
//!
//! ## Modules
//! - `plain`: Seek iterator over a sorted text file
//! - `compressed`: Seek iterator over a block-compressed file

mod compressed;
mod plain;

use crate::error::{Result, SeekError};
use crate::key::{Key, Position};

pub use compressed::GorzSeekableIterator;
pub use plain::SeekableIterator;

/// Where a seek stands after one window read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekState {
    /// Bracket is set and the next window can be read
    Bracketed,
    /// The last window was too small to make progress
    Expanding,
    /// The iterator is positioned at the match
    Found,
    /// No line at or after the target exists
    Exhausted,
}

/// The byte range still to search, with the keys bounding it
#[derive(Debug, Clone, PartialEq)]
pub struct Bracket {
    /// End of a line known to be smaller than the target (or start of data)
    pub lo: u64,
    pub lo_key: Option<Key>,
    /// End of a line known to be `>=` the target (or end of file)
    pub hi: u64,
    pub hi_key: Option<Key>,
    /// Bytes to read per probe
    pub window: usize,
}

impl Bracket {
    /// Bracket between two cache positions
    pub fn new(lower: Position, upper: Position, window: usize) -> Self {
        Self {
            lo: lower.offset,
            lo_key: lower.key,
            hi: upper.offset.max(lower.offset),
            hi_key: upper.key,
            window,
        }
    }

    /// Whether nothing is left to search
    pub fn is_closed(&self) -> bool {
        self.lo >= self.hi
    }

    /// Next window to read, as `(start, length)`
    ///
    /// The whole bracket when it fits, otherwise one window centered on the
    /// estimated position of `key` and kept inside the bracket.
    pub fn probe(&self, key: &Key) -> (u64, u64) {
        let span = self.hi - self.lo;
        let window = self.window as u64;
        if span <= window {
            return (self.lo, span);
        }
        let fraction = match (&self.lo_key, &self.hi_key) {
            (Some(lo_key), Some(hi_key)) => key.interpolate(lo_key, hi_key),
            _ => 0.5,
        };
        let estimate = self.lo + (span as f64 * fraction) as u64;
        let start = estimate
            .saturating_sub(window / 2)
            .clamp(self.lo, self.hi - window);
        (start, window)
    }

    /// Move the lower end up to the end of a line smaller than the target
    pub fn raise(&mut self, offset: u64, key: Key) {
        if offset > self.lo {
            self.lo = offset;
            self.lo_key = Some(key);
        }
    }

    /// Move the upper end down to the end of a line `>=` the target
    ///
    /// Returns whether the bracket shrank.
    pub fn lower(&mut self, offset: u64, key: Key) -> bool {
        if offset < self.hi {
            self.hi = offset;
            self.hi_key = Some(key);
            true
        } else {
            false
        }
    }

    /// Double the window after a step that narrowed the bracket
    pub fn widen(&mut self, max_window_size: usize) {
        self.window = self.window.saturating_mul(2).min(max_window_size.max(self.window));
    }

    /// Double the window because it did not hold enough complete lines
    pub fn expand(&mut self, max_line_size: usize) -> Result<()> {
        if self.window >= max_line_size {
            return Err(SeekError::data(format!(
                "no line end within {} bytes after offset {}; line exceeds the maximum line size",
                self.window, self.lo
            )));
        }
        self.window = self.window.saturating_mul(2).min(max_line_size);
        Ok(())
    }
}
