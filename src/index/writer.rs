//! Index writer

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SeekError};
use crate::key::Key;

use super::{IndexGranularity, GORI_VERSION, HEADER_PREFIX};

/// Streams index entries to `W` under a granularity policy
///
/// The header is written on construction, so an index with no entries is
/// still a valid (header-only) index.
pub struct IndexWriter<W: Write> {
    out: W,
    granularity: IndexGranularity,
    last: Option<Key>,
    entries_written: usize,
}

impl<W: Write> IndexWriter<W> {
    /// Start an index on `out`
    pub fn new(mut out: W, granularity: IndexGranularity) -> Result<Self> {
        writeln!(out, "{}{}", HEADER_PREFIX, GORI_VERSION)?;
        Ok(Self {
            out,
            granularity,
            last: None,
            entries_written: 0,
        })
    }

    /// Offer the key of a line ending at `offset`
    ///
    /// Returns whether an entry was written. Keys must arrive in
    /// non-decreasing order.
    pub fn put_file_position(&mut self, chromosome: &str, position: u64, offset: u64) -> Result<bool> {
        if let Some(last) = &self.last {
            let order = last
                .chromosome
                .as_str()
                .cmp(chromosome)
                .then(last.position.cmp(&position));
            if order.is_gt() {
                return Err(SeekError::Index(format!(
                    "key {}:{} written after {}",
                    chromosome, position, last
                )));
            }
            let skip = match self.granularity {
                IndexGranularity::Full => order.is_eq(),
                IndexGranularity::Chromosome => last.chromosome == chromosome,
            };
            if skip {
                return Ok(false);
            }
        }

        writeln!(self.out, "{}\t{}\t{}", chromosome, position, offset)?;
        self.last = Some(Key::new(chromosome, position));
        self.entries_written += 1;
        Ok(true)
    }

    /// Number of entries written so far
    pub fn entries_written(&self) -> usize {
        self.entries_written
    }

    /// Flush and hand back the output
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// An index file written as `<index>.tmp` and renamed into place on commit
///
/// Dropping it uncommitted removes the temporary file, so a failed run
/// leaves neither a partial index nor a stray `.tmp` behind.
pub struct IndexFile {
    out: Option<BufWriter<File>>,
    tmp_path: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl IndexFile {
    /// Create `<path>.tmp`; `path` itself is untouched until [`commit`](Self::commit)
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tmp_path = tmp_path_for(&path);
        let out = BufWriter::new(File::create(&tmp_path)?);
        Ok(Self {
            out: Some(out),
            tmp_path,
            path,
            committed: false,
        })
    }

    /// Final index path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush, sync and rename the temporary file onto the final path
    pub fn commit(mut self) -> Result<()> {
        if let Some(out) = self.out.take() {
            out.into_inner()
                .map_err(|e| SeekError::Io(e.into_error()))?
                .sync_all()?;
        }
        fs::rename(&self.tmp_path, &self.path)?;
        self.committed = true;
        Ok(())
    }

    fn sink(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.out
            .as_mut()
            .ok_or_else(|| io::Error::other("index file already closed"))
    }
}

impl Write for IndexFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink()?.flush()
    }
}

impl Drop for IndexFile {
    fn drop(&mut self) {
        if !self.committed {
            // Close before removing
            drop(self.out.take());
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// `<index>.tmp`
fn tmp_path_for(index_path: &Path) -> PathBuf {
    let mut name = index_path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(granularity: IndexGranularity, entries: &[(&str, u64, u64)]) -> String {
        let mut writer = IndexWriter::new(Vec::new(), granularity).unwrap();
        for (chrom, pos, offset) in entries {
            writer.put_file_position(chrom, *pos, *offset).unwrap();
        }
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_empty_index_is_header_only() {
        assert_eq!(written(IndexGranularity::Full, &[]), "## fileformat=GORIv2\n");
    }

    #[test]
    fn test_full_skips_repeated_keys() {
        let out = written(
            IndexGranularity::Full,
            &[("chr1", 1, 100), ("chr1", 1, 200), ("chr1", 2, 300)],
        );
        assert_eq!(out, "## fileformat=GORIv2\nchr1\t1\t100\nchr1\t2\t300\n");
    }

    #[test]
    fn test_chromosome_keeps_first_of_each() {
        let out = written(
            IndexGranularity::Chromosome,
            &[("chr1", 1, 100), ("chr1", 2, 200), ("chr10", 5, 300), ("chr2", 1, 400)],
        );
        assert_eq!(
            out,
            "## fileformat=GORIv2\nchr1\t1\t100\nchr10\t5\t300\nchr2\t1\t400\n"
        );
    }

    #[test]
    fn test_rejects_decreasing_keys() {
        let mut writer = IndexWriter::new(Vec::new(), IndexGranularity::Full).unwrap();
        writer.put_file_position("chr2", 1, 10).unwrap();
        assert!(matches!(
            writer.put_file_position("chr10", 1, 20),
            Err(SeekError::Index(_))
        ));
    }

    #[test]
    fn test_index_file_commit_and_abandon() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.gori");
        let tmp = tmp_path_for(&path);

        let mut writer = IndexWriter::new(IndexFile::create(&path).unwrap(), IndexGranularity::Full).unwrap();
        writer.put_file_position("chr1", 1, 10).unwrap();
        assert!(tmp.exists());
        assert!(!path.exists());
        drop(writer);
        assert!(!tmp.exists());
        assert!(!path.exists());

        let writer = IndexWriter::new(IndexFile::create(&path).unwrap(), IndexGranularity::Full).unwrap();
        writer.finish().unwrap().commit().unwrap();
        assert!(!tmp.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "## fileformat=GORIv2\n");
    }
}
