//! Index reader

use std::io::BufRead;

use tracing::debug;

use crate::cache::PositionCache;
use crate::error::{Result, SeekError};
use crate::key::{strip_cr, Key};

use super::GORI_VERSION;

/// Read every entry of an index into `cache`
///
/// Leading `##` lines are metadata; one of them must be
/// `## fileformat=GORIv2`. Entries must be strictly increasing. Returns
/// the number of entries read.
pub fn load_into<R: BufRead>(mut reader: R, cache: &PositionCache) -> Result<usize> {
    let mut line = Vec::new();
    let mut version: Option<String> = None;
    let mut line_no = 0usize;

    // Metadata lines
    let mut pending = false;
    while read_line(&mut reader, &mut line)? {
        line_no += 1;
        if !line.starts_with(b"##") {
            pending = true;
            break;
        }
        let meta = String::from_utf8_lossy(&line[2..]);
        if let Some((name, value)) = meta.trim().split_once('=') {
            if name.trim() == "fileformat" {
                version = Some(value.trim().to_string());
            }
        }
    }

    match version.as_deref() {
        Some(GORI_VERSION) => {}
        Some(other) => {
            return Err(SeekError::Index(format!(
                "unsupported index version {}, expected {}",
                other, GORI_VERSION
            )))
        }
        None => return Err(SeekError::Index("missing index header".to_string())),
    }

    let mut last: Option<Key> = None;
    let mut count = 0usize;
    while pending {
        if !line.is_empty() {
            let (key, offset) = parse_entry(&line, line_no)?;
            if let Some(prev) = &last {
                if key <= *prev {
                    return Err(SeekError::Index(format!(
                        "line {}: entry {} does not follow {}",
                        line_no, key, prev
                    )));
                }
            }
            cache.put(key.clone(), offset);
            last = Some(key);
            count += 1;
        }
        pending = read_line(&mut reader, &mut line)?;
        line_no += 1;
    }

    debug!(entries = count, "Loaded sparse index");
    Ok(count)
}

/// Read an index into a fresh cache covering `[data_start, file_size)`
pub fn load<R: BufRead>(reader: R, data_start: u64, file_size: u64, max_positions: usize) -> Result<PositionCache> {
    let cache = PositionCache::new(None, data_start, file_size, max_positions);
    cache.load_index(reader)?;
    Ok(cache)
}

/// Next line without terminator; `false` at end of input
fn read_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> Result<bool> {
    line.clear();
    if reader.read_until(b'\n', line)? == 0 {
        return Ok(false);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    let len = strip_cr(line).len();
    line.truncate(len);
    Ok(true)
}

fn parse_entry(line: &[u8], line_no: usize) -> Result<(Key, u64)> {
    let text = std::str::from_utf8(line)
        .map_err(|_| SeekError::Index(format!("line {}: not valid UTF-8", line_no)))?;
    let mut fields = text.split('\t');
    let (Some(chrom), Some(pos), Some(offset), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(SeekError::Index(format!(
            "line {}: expected 3 fields: {}",
            line_no, text
        )));
    };
    let position = pos
        .parse::<u64>()
        .map_err(|_| SeekError::Index(format!("line {}: bad position {:?}", line_no, pos)))?;
    let offset = offset
        .parse::<u64>()
        .map_err(|_| SeekError::Index(format!("line {}: bad offset {:?}", line_no, offset)))?;
    Ok((Key::new(chrom, position), offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> PositionCache {
        PositionCache::new(None, 0, 1000, usize::MAX)
    }

    #[test]
    fn test_header_only() {
        let cache = cache();
        assert_eq!(load_into(&b"## fileformat=GORIv2\n"[..], &cache).unwrap(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_loads_entries() {
        let cache = cache();
        let index = b"## fileformat=GORIv2\nchr1\t1\t100\nchr10\t2\t200\nchr2\t3\t300\n";
        assert_eq!(load_into(&index[..], &cache).unwrap(), 3);
        assert_eq!(cache.entries()[1], (Key::new("chr10", 2), 200));
    }

    #[test]
    fn test_rejects_wrong_version() {
        let err = load_into(&b"## fileformat=GORIv1\nchr1\t1\t100\n"[..], &cache()).unwrap_err();
        assert!(matches!(err, SeekError::Index(_)));
        let err = load_into(&b"chr1\t1\t100\n"[..], &cache()).unwrap_err();
        assert!(matches!(err, SeekError::Index(_)));
    }

    #[test]
    fn test_rejects_unsorted_and_malformed() {
        let unsorted = b"## fileformat=GORIv2\nchr2\t1\t100\nchr10\t1\t200\n";
        assert!(matches!(load_into(&unsorted[..], &cache()), Err(SeekError::Index(_))));
        let malformed = b"## fileformat=GORIv2\nchr1\tx\t100\n";
        assert!(matches!(load_into(&malformed[..], &cache()), Err(SeekError::Index(_))));
    }
}
