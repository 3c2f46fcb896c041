//! Line buffer
//!
//! Owns a byte buffer, frames it to complete lines and walks or searches them.

use crate::error::Result;
use crate::key::{strip_cr, Key, KeyLayout};

use super::{end_of_line, find_first_at_or_after, first_line_start, last_line_end, last_line_start, line_content};

/// A framed buffer of sorted lines with a read cursor
///
/// `lower..upper` is the framed region; `idx` is the start of the next line
/// to hand out. First and last keys are parsed lazily and cached until the
/// buffer is framed again.
pub struct LineBuffer {
    data: Vec<u8>,
    lower: usize,
    upper: usize,
    idx: usize,
    layout: KeyLayout,
    first_key: Option<Key>,
    last_key: Option<Key>,
}

impl LineBuffer {
    /// Create an empty buffer with room for `capacity` bytes
    pub fn new(layout: KeyLayout, capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            lower: 0,
            upper: 0,
            idx: 0,
            layout,
            first_key: None,
            last_key: None,
        }
    }

    /// Raw bytes currently held
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the raw bytes; call [`frame`](Self::frame) afterwards
    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// Replace the content and frame it as complete lines
    pub fn load(&mut self, data: Vec<u8>) {
        self.data = data;
        self.frame(true, true);
    }

    /// Recompute the framed region after the data changed
    ///
    /// `starts_at_line` / `ends_at_line` tell whether the first / last byte
    /// is known to be on a line boundary.
    pub fn frame(&mut self, starts_at_line: bool, ends_at_line: bool) {
        let len = self.data.len();
        self.lower = first_line_start(&self.data, 0, len, starts_at_line);
        self.upper = if self.lower < len {
            last_line_end(&self.data, self.lower, len, ends_at_line)
        } else {
            self.lower
        };
        self.idx = self.lower;
        self.first_key = None;
        self.last_key = None;
    }

    /// Drop all content
    pub fn clear(&mut self) {
        self.data.clear();
        self.lower = 0;
        self.upper = 0;
        self.idx = 0;
        self.first_key = None;
        self.last_key = None;
    }

    /// Whether the framed region holds any line
    pub fn is_empty(&self) -> bool {
        self.lower >= self.upper
    }

    /// Whether another line can be read
    pub fn has_next(&self) -> bool {
        self.idx < self.upper
    }

    /// Start of the first complete line
    pub fn lower(&self) -> usize {
        self.lower
    }

    /// End of the last complete line
    pub fn upper(&self) -> usize {
        self.upper
    }

    /// Start of the next line to be read
    pub fn position(&self) -> usize {
        self.idx
    }

    /// End of the first complete line
    pub fn first_line_end(&self) -> usize {
        end_of_line(&self.data, self.lower, self.upper)
    }

    /// Whether the framed region holds exactly one line
    pub fn is_single_line(&self) -> bool {
        !self.is_empty() && self.first_line_end() == self.upper
    }

    /// Key of the first complete line
    pub fn first_key(&mut self) -> Result<Key> {
        if let Some(key) = &self.first_key {
            return Ok(key.clone());
        }
        let end = self.first_line_end();
        let key = self.layout.key(line_content(&self.data, self.lower, end))?;
        self.first_key = Some(key.clone());
        Ok(key)
    }

    /// Key of the last complete line
    pub fn last_key(&mut self) -> Result<Key> {
        if let Some(key) = &self.last_key {
            return Ok(key.clone());
        }
        let start = last_line_start(&self.data, self.lower, self.upper);
        let key = self.layout.key(line_content(&self.data, start, self.upper))?;
        self.last_key = Some(key.clone());
        Ok(key)
    }

    /// Key of the line that ends exactly at `pos`, if there is one inside the region
    pub fn key_of_line_ending_at(&self, pos: usize) -> Result<Option<Key>> {
        if pos <= self.lower || pos > self.upper {
            return Ok(None);
        }
        let start = last_line_start(&self.data, self.lower, pos);
        let line = line_content(&self.data, start, pos);
        Ok(Some(self.layout.key(line)?))
    }

    /// Move the cursor to the first line whose key is `>= key`
    ///
    /// Searches the whole framed region, not just what is left after the
    /// cursor. If every line is smaller the cursor ends at `upper`.
    pub fn seek(&mut self, key: &Key) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        if *key > self.last_key()? {
            self.idx = self.upper;
        } else if *key > self.first_key()? {
            let start = self.first_line_end();
            self.idx = find_first_at_or_after(&self.data, start, self.upper, key, &self.layout)?;
        } else {
            self.idx = self.lower;
        }
        Ok(())
    }

    /// Key of the next line without consuming it
    pub fn peek_key(&self) -> Result<Option<Key>> {
        if !self.has_next() {
            return Ok(None);
        }
        let end = end_of_line(&self.data, self.idx, self.upper);
        let line = line_content(&self.data, self.idx, end);
        Ok(Some(self.layout.key(line)?))
    }

    /// Read the next line, without its terminator or trailing `\r`
    pub fn next_line(&mut self) -> Option<&[u8]> {
        if !self.has_next() {
            return None;
        }
        let start = self.idx;
        let end = end_of_line(&self.data, start, self.upper);
        self.idx = end;
        Some(strip_cr(line_content(&self.data, start, end)))
    }

    /// Bytes after the framed region (an incomplete trailing line)
    pub fn tail(&self) -> &[u8] {
        &self.data[self.upper..]
    }
}
