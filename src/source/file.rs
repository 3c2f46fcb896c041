//! Local file source

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::Result;

use super::{fingerprint, SeekableSource, SourceIdentity};

/// A file on the local filesystem
///
/// Every `open_at` opens its own handle, so one source can serve several
/// iterators at once.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Source for an existing file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // Missing files fail here, not at the first seek
        fs::metadata(&path)?;
        Ok(Self { path })
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeekableSource for FileSource {
    fn identity(&self) -> SourceIdentity {
        let path = self.path.to_string_lossy().into_owned();
        let canonical = fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());

        let (unique_id, last_modified) = match fs::metadata(&self.path) {
            Ok(meta) => match meta.modified() {
                Ok(mtime) => {
                    let nanos = mtime
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_nanos())
                        .unwrap_or_default();
                    let mut hasher = crc32fast::Hasher::new();
                    hasher.update(canonical.to_string_lossy().as_bytes());
                    hasher.update(&meta.len().to_le_bytes());
                    hasher.update(&nanos.to_le_bytes());
                    (Some(fingerprint(hasher)), Some(mtime))
                }
                Err(_) => (None, None),
            },
            Err(_) => (None, None),
        };

        SourceIdentity {
            path,
            unique_id,
            last_modified,
        }
    }

    fn length(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    fn open_at(&self, start: u64, min_length: u64) -> Result<Box<dyn Read + Send>> {
        let mut file = File::open(&self.path)?;
        if start > 0 {
            file.seek(SeekFrom::Start(start))?;
        }
        let capacity = min_length.clamp(8 * 1024, 1024 * 1024) as usize;
        Ok(Box::new(BufReader::with_capacity(capacity, file)))
    }
}
