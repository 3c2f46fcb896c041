//! In-memory source

use std::io::{Cursor, Read};

use bytes::Bytes;

use crate::error::Result;

use super::{fingerprint, SeekableSource, SourceIdentity};

/// Bytes held in memory, shared cheaply between iterators
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Bytes,
    unique_id: Option<String>,
}

impl MemorySource {
    /// Source named `name`, fingerprinted by its content
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&data);
        Self {
            name: name.into(),
            data,
            unique_id: Some(fingerprint(hasher)),
        }
    }

    /// Source whose content has no fingerprint; its positions are never shared
    pub fn without_unique_id(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            unique_id: None,
        }
    }

    /// The bytes behind this source
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl SeekableSource for MemorySource {
    fn identity(&self) -> SourceIdentity {
        SourceIdentity {
            path: self.name.clone(),
            unique_id: self.unique_id.clone(),
            last_modified: None,
        }
    }

    fn length(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn open_at(&self, start: u64, _min_length: u64) -> Result<Box<dyn Read + Send>> {
        let start = (start as usize).min(self.data.len());
        Ok(Box::new(Cursor::new(self.data.slice(start..))))
    }
}
