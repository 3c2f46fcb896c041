//! Source Module
//!
//! The byte sources seek iterators read from.
//!
//! A source only has to open a stream at an arbitrary offset and report its
//! length. Remote transports, retries and read-ahead live behind this trait,
//! not in this crate; the two adapters here cover local files and memory.

mod file;
mod memory;

use std::io::{self, Read};
use std::time::SystemTime;

use crate::error::Result;

pub use file::FileSource;
pub use memory::MemorySource;

/// Identity of a source, used to decide whether cached positions still apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    /// Name the source is registered under
    pub path: String,
    /// Content fingerprint; `None` when the content cannot be vouched for
    pub unique_id: Option<String>,
    /// Last modification time, when known
    pub last_modified: Option<SystemTime>,
}

/// Random-access byte source
pub trait SeekableSource: Send + Sync {
    /// Identity of the content behind this source
    fn identity(&self) -> SourceIdentity;

    /// Total length in bytes
    fn length(&self) -> Result<u64>;

    /// Stream starting at byte `start`
    ///
    /// `min_length` is a hint of how much the caller will read; the stream
    /// may deliver more and ends at the end of the source.
    fn open_at(&self, start: u64, min_length: u64) -> Result<Box<dyn Read + Send>>;

    /// Stream over the whole source
    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let len = self.length()?;
        self.open_at(0, len)
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream
///
/// Returns the number of bytes read.
pub(crate) fn read_fully(reader: &mut dyn Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Hex rendering of a CRC32 fingerprint
pub(crate) fn fingerprint(hasher: crc32fast::Hasher) -> String {
    format!("{:08x}", hasher.finalize())
}
