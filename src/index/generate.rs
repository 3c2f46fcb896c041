//! Index generation
//!
//! One pass over a finished data file. The index is written next to its
//! final name as `<index>.tmp` and renamed into place only once complete, so
//! a failed run never leaves a valid-looking index behind.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::error::{Result, SeekError};
use crate::key::Key;

use super::{index_path_for, IndexFile, IndexGranularity, IndexWriter};

/// Build `<data_path>.gori` for a data file with a header line
///
/// Works for plain and block-compressed files alike: both are sorted
/// `chrom\tpos\t...` lines after the header. Returns the index path.
pub fn generate(data_path: impl AsRef<Path>, granularity: IndexGranularity) -> Result<PathBuf> {
    let index_path = index_path_for(&data_path);
    generate_with(data_path, &index_path, granularity, &Config::default())?;
    Ok(index_path)
}

/// Build an index at `index_path`, using the layout and header setting of `config`
///
/// Returns the number of entries written.
pub fn generate_with(
    data_path: impl AsRef<Path>,
    index_path: impl AsRef<Path>,
    granularity: IndexGranularity,
    config: &Config,
) -> Result<usize> {
    let data_path = data_path.as_ref();
    let index_path = index_path.as_ref();

    let writer = IndexWriter::new(IndexFile::create(index_path)?, granularity)?;
    let writer = write_index(data_path, writer, config)?;
    let entries = writer.entries_written();
    writer.finish()?.commit()?;

    debug!(
        data = %data_path.display(),
        index = %index_path.display(),
        %granularity,
        entries,
        "Generated sparse index"
    );
    Ok(entries)
}

fn write_index(
    data_path: &Path,
    mut writer: IndexWriter<IndexFile>,
    config: &Config,
) -> Result<IndexWriter<IndexFile>> {
    let mut reader = BufReader::with_capacity(config.initial_window_size, File::open(data_path)?);

    let mut line = Vec::new();
    let mut offset = 0u64;
    let mut in_header = config.has_header;
    let mut last: Option<Key> = None;

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }
        offset += n as u64;

        if in_header {
            if !line.starts_with(b"##") {
                in_header = false;
            }
            continue;
        }
        if n > config.max_line_size {
            return Err(SeekError::data(format!("line ending at {} exceeds the maximum line size", offset)));
        }

        let content = line.strip_suffix(b"\n").unwrap_or(&line[..]);
        if content.is_empty() {
            return Err(SeekError::data(format!(
                "{} has an empty line ending at {}",
                data_path.display(),
                offset
            )));
        }
        let key = config.layout.key(content)?;
        if let Some(prev) = &last {
            if key < *prev {
                return Err(SeekError::data(format!(
                    "{} is not sorted: {} follows {}",
                    data_path.display(),
                    key,
                    prev
                )));
            }
        }
        writer.put_file_position(&key.chromosome, key.position, offset)?;
        last = Some(key);
    }

    Ok(writer)
}
