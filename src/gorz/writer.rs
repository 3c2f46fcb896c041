//! Block file writer

use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, SeekError};
use crate::index::{index_path_for, IndexFile, IndexGranularity, IndexWriter};
use crate::key::KeyLayout;

use super::{compress_block, to_7bit, BlockCompression, BLOCK_SIZE};

/// Writes sorted lines as a block-compressed file
///
/// Lines are collected into a block until it would reach [`BLOCK_SIZE`] or
/// the chromosome changes, then the block is compressed and written as one
/// line keyed by its last record. Call [`finish`](Self::finish) to write the
/// final block.
pub struct GorzWriter<W: Write> {
    out: W,
    compression: BlockCompression,
    layout: KeyLayout,

    header: Option<String>,
    header_written: bool,

    /// Plain lines of the block being filled
    block: Vec<u8>,
    last_chrom: Vec<u8>,
    last_pos: u64,
    has_last: bool,

    /// Bytes written to `out` so far
    offset: u64,
    blocks_written: usize,
    index: Option<IndexWriter<IndexSink>>,
}

/// Destination of the block index
enum IndexSink {
    /// `<file>.gori`, renamed into place by `finish`
    File(IndexFile),
    Stream(Box<dyn Write + Send>),
}

impl IndexSink {
    fn close(self) -> Result<()> {
        match self {
            IndexSink::File(file) => file.commit(),
            IndexSink::Stream(mut out) => Ok(out.flush()?),
        }
    }
}

impl Write for IndexSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            IndexSink::File(file) => file.write(buf),
            IndexSink::Stream(out) => out.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            IndexSink::File(file) => file.flush(),
            IndexSink::Stream(out) => out.flush(),
        }
    }
}

impl GorzWriter<BufWriter<File>> {
    /// Create `path`, and `<path>.gori` alongside when `index` is given
    ///
    /// Any existing `<path>.gori` is removed since it no longer describes
    /// the file. The new index only appears once [`finish`](Self::finish)
    /// succeeds.
    pub fn create(
        path: impl AsRef<Path>,
        compression: BlockCompression,
        index: Option<IndexGranularity>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let index_path = index_path_for(path);
        match fs::remove_file(&index_path) {
            Ok(()) => debug!(index = %index_path.display(), "Removed stale index"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut writer = GorzWriter::new(BufWriter::new(File::create(path)?)).with_compression(compression);
        if let Some(granularity) = index {
            let sink = IndexSink::File(IndexFile::create(&index_path)?);
            writer.index = Some(IndexWriter::new(sink, granularity)?);
        }
        Ok(writer)
    }
}

impl<W: Write> GorzWriter<W> {
    /// Writer on `out` with zlib blocks and the default key layout
    pub fn new(out: W) -> Self {
        Self {
            out,
            compression: BlockCompression::default(),
            layout: KeyLayout::default(),
            header: None,
            header_written: false,
            block: Vec::with_capacity(BLOCK_SIZE),
            last_chrom: Vec::new(),
            last_pos: 0,
            has_last: false,
            offset: 0,
            blocks_written: 0,
            index: None,
        }
    }

    /// Use `compression` for every block
    pub fn with_compression(mut self, compression: BlockCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Locate keys in other columns than the first two
    pub fn with_layout(mut self, layout: KeyLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Also write a sparse index of the block lines to `out`
    pub fn with_index(mut self, out: impl Write + Send + 'static, granularity: IndexGranularity) -> Result<Self> {
        let sink = IndexSink::Stream(Box::new(out));
        self.index = Some(IndexWriter::new(sink, granularity)?);
        Ok(self)
    }

    /// Set the header line; only allowed before any data is written
    pub fn set_header(&mut self, header: &str) -> Result<()> {
        if self.header_written || self.header.is_some() {
            return Err(SeekError::data("header can only be set once, before any data"));
        }
        let header = header.trim_end_matches(['\n', '\r']);
        if header.ends_with('\t') {
            return Err(SeekError::data("header ends with a tab character"));
        }
        self.header = Some(header.to_string());
        Ok(())
    }

    /// Append one data line (terminator optional)
    ///
    /// Lines must arrive in key order.
    pub fn write_line(&mut self, line: &[u8]) -> Result<()> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        if line.is_empty() {
            return Err(SeekError::data("empty data line"));
        }
        let key = self.layout.key_ref(line)?;

        if self.has_last {
            let order = key
                .chromosome
                .cmp(self.last_chrom.as_slice())
                .then(key.position.cmp(&self.last_pos));
            if order.is_lt() {
                return Err(SeekError::data(format!(
                    "line out of order: {}:{} after {}:{}",
                    String::from_utf8_lossy(key.chromosome),
                    key.position,
                    String::from_utf8_lossy(&self.last_chrom),
                    self.last_pos
                )));
            }
            let chrom_changed = key.chromosome != self.last_chrom.as_slice();
            if !self.block.is_empty() && (chrom_changed || self.block.len() + line.len() + 1 >= BLOCK_SIZE) {
                self.write_block()?;
            }
        }

        self.block.extend_from_slice(line);
        self.block.push(b'\n');
        self.last_chrom.clear();
        self.last_chrom.extend_from_slice(key.chromosome);
        self.last_pos = key.position;
        self.has_last = true;
        Ok(())
    }

    /// Number of block lines written so far
    pub fn blocks_written(&self) -> usize {
        self.blocks_written
    }

    /// Write the pending block and the header if still missing, then flush
    ///
    /// A file index is committed last. Dropping the writer without finishing
    /// discards it.
    pub fn finish(mut self) -> Result<W> {
        self.write_block()?;
        self.write_header()?;
        self.out.flush()?;
        if let Some(index) = self.index.take() {
            index.finish()?.close()?;
        }
        debug!(blocks = self.blocks_written, bytes = self.offset, "Finished block file");
        Ok(self.out)
    }

    fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        let header = match self.header.take() {
            Some(header) => header,
            None => {
                warn!("No header set for block file, writing an empty one");
                String::new()
            }
        };
        self.out.write_all(header.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.offset += header.len() as u64 + 1;
        self.header_written = true;
        Ok(())
    }

    fn write_block(&mut self) -> Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }
        self.write_header()?;

        let payload = to_7bit(&compress_block(&self.block, self.compression)?);
        let pos = self.last_pos.to_string();

        self.out.write_all(&self.last_chrom)?;
        self.out.write_all(b"\t")?;
        self.out.write_all(pos.as_bytes())?;
        self.out.write_all(b"\t")?;
        self.out.write_all(&[self.compression.flag()])?;
        self.out.write_all(&payload)?;
        self.out.write_all(b"\n")?;
        self.offset += (self.last_chrom.len() + pos.len() + payload.len() + 4) as u64;
        self.blocks_written += 1;

        if let Some(index) = self.index.as_mut() {
            let chrom = std::str::from_utf8(&self.last_chrom)
                .map_err(|_| SeekError::data("chromosome name is not valid UTF-8"))?;
            index.put_file_position(chrom, self.last_pos, self.offset)?;
        }

        self.block.clear();
        Ok(())
    }
}
