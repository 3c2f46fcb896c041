//! Seek iterator over a block-compressed file

use std::sync::Arc;

use tracing::warn;

use crate::cache::{CacheRegistry, PositionCache};
use crate::config::Config;
use crate::error::{Result, SeekError};
use crate::gorz::{decode_block_line, BLOCK_SIZE};
use crate::key::{Key, KeyLayout};
use crate::search::LineBuffer;
use crate::source::SeekableSource;

use super::SeekableIterator;

/// Iterator over the records of a block-compressed file
///
/// Block lines are located with a [`SeekableIterator`] (their keys are the
/// last key of each block), then one block at a time is decompressed and
/// searched in memory.
pub struct GorzSeekableIterator {
    blocks: SeekableIterator,
    path: String,
    header: String,
    /// Decompressed lines of the current block
    block: LineBuffer,
    closed: bool,
}

impl GorzSeekableIterator {
    /// Open an iterator over `source`, merging `index` into its cache if given
    pub fn open(
        source: Arc<dyn SeekableSource>,
        index: Option<&dyn SeekableSource>,
        registry: &CacheRegistry,
        config: &Config,
    ) -> Result<Self> {
        if !config.has_header {
            return Err(SeekError::Config(
                "block-compressed files always have a header line".to_string(),
            ));
        }
        // Block lines start with the key whatever the record layout
        let block_config = Config {
            layout: KeyLayout::default(),
            ..config.clone()
        };
        let blocks = SeekableIterator::open(source, index, registry, &block_config)?;

        let header_bytes = blocks.header_bytes().unwrap_or_default();
        let header = match header_bytes.iter().position(|&b| b == 0) {
            Some(zero) => {
                warn!(
                    path = %blocks.path(),
                    "Block file carries a column lookup table; column encoded blocks cannot be read"
                );
                String::from_utf8_lossy(&header_bytes[..zero]).into_owned()
            }
            None => String::from_utf8_lossy(header_bytes).into_owned(),
        };

        Ok(Self {
            path: blocks.path().to_string(),
            blocks,
            header,
            block: LineBuffer::new(config.layout, BLOCK_SIZE),
            closed: false,
        })
    }

    /// Column header line
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Position cache of the block lines
    pub fn cache(&self) -> &Arc<PositionCache> {
        self.blocks.cache()
    }

    /// Position at the first record whose key is `>= key`
    pub fn seek(&mut self, key: &Key) -> Result<bool> {
        self.check_open()?;

        // Still inside the current block
        if !self.block.is_empty() {
            self.block.seek(key)?;
            if self.block.has_next() && self.block.first_key()? < *key {
                return Ok(true);
            }
        }

        // The first block whose last key is >= key holds the answer
        if !self.blocks.seek(key)? {
            self.block.clear();
            return Ok(false);
        }
        while self.load_next_block()? {
            self.block.seek(key)?;
            if self.block.has_next() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether another record can be read
    pub fn has_next(&self) -> bool {
        !self.closed && (self.block.has_next() || self.blocks.has_next())
    }

    /// Next record, without its terminator
    pub fn next_line(&mut self) -> Result<Option<&[u8]>> {
        self.check_open()?;
        while !self.block.has_next() {
            if !self.load_next_block()? {
                return Ok(None);
            }
        }
        Ok(self.block.next_line())
    }

    /// Release the iterator; later calls fail with [`SeekError::IteratorClosed`]
    pub fn close(&mut self) {
        self.closed = true;
        self.block.clear();
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(SeekError::IteratorClosed)
        } else {
            Ok(())
        }
    }

    /// Decompress the next block line into `block`
    fn load_next_block(&mut self) -> Result<bool> {
        let Some(line) = self.blocks.next_line()? else {
            self.block.clear();
            return Ok(false);
        };
        let plain = decode_block_line(line, &self.path)?;
        self.block.load(plain);
        Ok(true)
    }
}
