//! Search Module
//!
//! Binary search over a byte buffer of consecutive, key-sorted text lines.
//!
//! ## Framing
//! A buffer read from the middle of a file usually starts and ends inside a
//! line. Framing trims it to the complete lines it holds:
//!
//! ```text
//!  buffer:  ...ne\tx\n chr1\t5\ta\n chr1\t6\tb\n chr1\t7\tc
//!                     ^lower                   ^upper
//! ```
//!
//! `lower` is the first line start, `upper` the end of the last complete line.
//! If the caller knows a side is already aligned (start of data, end of file,
//! or an offset taken from the position cache) it says so and nothing is trimmed.
//!
//! ## Search
//! The search itself is two primitives composed: snap a probe to the start of
//! its line, then compare the key of that line. Duplicates resolve leftward, so
//! the first line whose key is `>=` the target is returned.

mod cursor;

use std::cmp::Ordering;

use crate::error::Result;
use crate::key::{Key, KeyLayout};

pub use cursor::LineBuffer;

/// Line terminator
pub(crate) const NEWLINE: u8 = b'\n';

// =============================================================================
// Line Primitives
// =============================================================================

/// Start of the line containing byte `pos`, never looking before `floor`
///
/// `floor` must itself be a line start.
pub fn snap_to_line_start(buf: &[u8], floor: usize, pos: usize) -> usize {
    let mut idx = pos;
    while idx > floor && buf[idx - 1] != NEWLINE {
        idx -= 1;
    }
    idx
}

/// End of the line starting at `line_start`: one past its terminator, or
/// `end` when the region holds no further terminator
pub fn end_of_line(buf: &[u8], line_start: usize, end: usize) -> usize {
    match buf[line_start..end].iter().position(|&b| b == NEWLINE) {
        Some(i) => line_start + i + 1,
        None => end,
    }
}

/// First line start in `[start, end)`
///
/// Returns `end` when the region has no complete line start.
pub fn first_line_start(buf: &[u8], start: usize, end: usize, at_line_start: bool) -> usize {
    if at_line_start {
        return start;
    }
    match buf[start..end].iter().position(|&b| b == NEWLINE) {
        Some(i) => start + i + 1,
        None => end,
    }
}

/// End of the last complete line in `[start, end)`
///
/// Returns `start` when no terminator is found and the end is not aligned.
pub fn last_line_end(buf: &[u8], start: usize, end: usize, at_line_end: bool) -> usize {
    if at_line_end {
        return end;
    }
    match buf[start..end].iter().rposition(|&b| b == NEWLINE) {
        Some(i) => start + i + 1,
        None => start,
    }
}

/// Start of the last line in the framed region `[start, end)`
///
/// A trailing terminator belongs to the last line; no empty line is
/// synthesized after it.
pub fn last_line_start(buf: &[u8], start: usize, end: usize) -> usize {
    let mut idx = end;
    if idx > start && buf[idx - 1] == NEWLINE {
        idx -= 1;
    }
    snap_to_line_start(buf, start, idx)
}

/// Content of the line `[line_start, line_end)` without its terminator
pub fn line_content(buf: &[u8], line_start: usize, line_end: usize) -> &[u8] {
    let mut end = line_end;
    if end > line_start && buf[end - 1] == NEWLINE {
        end -= 1;
    }
    &buf[line_start..end]
}

/// Compare the key of the line `[line_start, line_end)` with `key`
pub fn compare_key_at(
    buf: &[u8],
    line_start: usize,
    line_end: usize,
    key: &Key,
    layout: &KeyLayout,
) -> Result<Ordering> {
    layout.compare(line_content(buf, line_start, line_end), key)
}

// =============================================================================
// Binary Search
// =============================================================================

/// Offset of the first line in `[start, end)` whose key is `>= key`, or `end`
///
/// `start` must be a line start and `end` a line end. Every probe snaps back to
/// the beginning of its line before comparing, so lines can have any length.
pub fn find_first_at_or_after(
    buf: &[u8],
    start: usize,
    end: usize,
    key: &Key,
    layout: &KeyLayout,
) -> Result<usize> {
    let mut lo = start;
    let mut hi = end;

    // lo and hi are always line boundaries; every line before lo is < key and
    // the line at hi (if any) is >= key.
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let line_start = snap_to_line_start(buf, lo, mid);
        let line_end = end_of_line(buf, line_start, end);

        if compare_key_at(buf, line_start, line_end, key, layout)? == Ordering::Less {
            lo = line_end;
        } else {
            hi = line_start;
        }
    }

    Ok(lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(rows: &[(&str, u64)]) -> Vec<u8> {
        let mut buf = Vec::new();
        for (chrom, pos) in rows {
            buf.extend_from_slice(format!("{}\t{}\tx\n", chrom, pos).as_bytes());
        }
        buf
    }

    #[test]
    fn test_snap_to_line_start() {
        let buf = b"ab\ncd\nef";
        assert_eq!(snap_to_line_start(buf, 0, 0), 0);
        assert_eq!(snap_to_line_start(buf, 0, 1), 0);
        assert_eq!(snap_to_line_start(buf, 0, 2), 0);
        assert_eq!(snap_to_line_start(buf, 0, 3), 3);
        assert_eq!(snap_to_line_start(buf, 0, 4), 3);
        assert_eq!(snap_to_line_start(buf, 0, 7), 6);
    }

    #[test]
    fn test_framing_without_terminator() {
        let buf = b"chr1\t1";
        assert_eq!(first_line_start(buf, 0, buf.len(), false), buf.len());
        assert_eq!(last_line_end(buf, 0, buf.len(), false), 0);
        assert_eq!(last_line_end(buf, 0, buf.len(), true), buf.len());
        assert_eq!(last_line_start(buf, 0, buf.len()), 0);
    }

    #[test]
    fn test_last_line_start_ignores_trailing_terminator() {
        let buf = b"a\nb\n";
        assert_eq!(last_line_start(buf, 0, buf.len()), 2);
        let buf = b"a\nb";
        assert_eq!(last_line_start(buf, 0, buf.len()), 2);
    }

    #[test]
    fn test_find_returns_leftmost_duplicate() {
        let buf = lines(&[("chr1", 1), ("chr1", 2), ("chr1", 2), ("chr1", 2), ("chr1", 3)]);
        let layout = KeyLayout::default();
        let at = find_first_at_or_after(&buf, 0, buf.len(), &Key::new("chr1", 2), &layout).unwrap();
        assert_eq!(at, "chr1\t1\tx\n".len());
    }

    #[test]
    fn test_find_past_end_and_before_start() {
        let buf = lines(&[("chr1", 1), ("chr1", 5)]);
        let layout = KeyLayout::default();
        let end = find_first_at_or_after(&buf, 0, buf.len(), &Key::new("chr9", 1), &layout).unwrap();
        assert_eq!(end, buf.len());
        let start = find_first_at_or_after(&buf, 0, buf.len(), &Key::new("chr0", 1), &layout).unwrap();
        assert_eq!(start, 0);
    }

    #[test]
    fn test_find_without_trailing_newline() {
        let mut buf = lines(&[("chr1", 1), ("chr1", 2)]);
        buf.extend_from_slice(b"chr1\t3\tx");
        let layout = KeyLayout::default();
        let at = find_first_at_or_after(&buf, 0, buf.len(), &Key::new("chr1", 3), &layout).unwrap();
        assert_eq!(&buf[at..], b"chr1\t3\tx");
    }

    #[test]
    fn test_find_uses_lexicographic_chromosomes() {
        let buf = lines(&[("chr1", 10), ("chr10", 1), ("chr2", 1)]);
        let layout = KeyLayout::default();
        let at = find_first_at_or_after(&buf, 0, buf.len(), &Key::new("chr10", 1), &layout).unwrap();
        assert_eq!(at, "chr1\t10\tx\n".len());
    }
}
