//! Key layout
//!
//! Locates the chromosome and position fields inside a tab-separated line.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeekError};

use super::Key;

/// Bytes of the offending line quoted in error messages
const ERROR_CONTEXT_LEN: usize = 100;

/// Which tab-separated columns form the key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLayout {
    /// Zero-based column of the chromosome
    pub chrom_col: usize,
    /// Zero-based column of the position
    pub pos_col: usize,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self {
            chrom_col: 0,
            pos_col: 1,
        }
    }
}

/// A key borrowed from a line buffer (no allocation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRef<'a> {
    pub chromosome: &'a [u8],
    pub position: u64,
}

impl<'a> KeyRef<'a> {
    /// Compare against an owned key using the file order
    pub fn cmp_key(&self, key: &Key) -> Ordering {
        self.chromosome
            .cmp(key.chromosome.as_bytes())
            .then(self.position.cmp(&key.position))
    }

    /// Copy into an owned key
    pub fn to_key(&self) -> Result<Key> {
        let chromosome = std::str::from_utf8(self.chromosome)
            .map_err(|_| SeekError::data("chromosome name is not valid UTF-8"))?;
        Ok(Key::new(chromosome, self.position))
    }
}

impl KeyLayout {
    /// Create a layout for the given columns
    pub fn new(chrom_col: usize, pos_col: usize) -> Self {
        Self { chrom_col, pos_col }
    }

    /// Extract the key fields of a single line (without its `\n`)
    ///
    /// Fails with a data error when a key column is missing or the position
    /// is not a non-negative integer.
    pub fn key_ref<'a>(&self, line: &'a [u8]) -> Result<KeyRef<'a>> {
        let line = strip_cr(line);
        let last_needed = self.chrom_col.max(self.pos_col);

        let mut chromosome = None;
        let mut position = None;
        for (col, field) in line.split(|&b| b == b'\t').enumerate() {
            if col == self.chrom_col {
                chromosome = Some(field);
            } else if col == self.pos_col {
                position = Some(field);
            }
            if col >= last_needed {
                break;
            }
        }

        match (chromosome, position) {
            (Some(chromosome), Some(position)) => Ok(KeyRef {
                chromosome,
                position: parse_position(position, line)?,
            }),
            _ => Err(SeekError::data(format!(
                "Cannot create key from {}",
                quote(line)
            ))),
        }
    }

    /// Extract an owned key from a line
    pub fn key(&self, line: &[u8]) -> Result<Key> {
        self.key_ref(line)?.to_key()
    }

    /// Compare the key of `line` with `key`
    pub fn compare(&self, line: &[u8], key: &Key) -> Result<Ordering> {
        Ok(self.key_ref(line)?.cmp_key(key))
    }
}

/// Drop a trailing carriage return (Windows line endings)
pub(crate) fn strip_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

fn parse_position(field: &[u8], line: &[u8]) -> Result<u64> {
    if field.is_empty() {
        return Err(SeekError::data(format!(
            "Empty position in line {}",
            quote(line)
        )));
    }
    let mut value: u64 = 0;
    for &b in field {
        if !b.is_ascii_digit() {
            return Err(SeekError::data(format!(
                "Cannot create key from {}",
                quote(line)
            )));
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
            .ok_or_else(|| SeekError::data(format!("Position overflow in line {}", quote(line))))?;
    }
    Ok(value)
}

fn quote(line: &[u8]) -> String {
    let end = line.len().min(ERROR_CONTEXT_LEN);
    String::from_utf8_lossy(&line[..end]).into_owned()
}
