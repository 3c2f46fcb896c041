//! Seek iterator over a sorted text file

use std::io::{BufReader, Read};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::{CacheRegistry, PositionCache};
use crate::config::Config;
use crate::error::{Result, SeekError};
use crate::key::{strip_cr, Key};
use crate::search::LineBuffer;
use crate::source::{read_fully, SeekableSource};

use super::{Bracket, SeekState};

/// Iterator over the lines of a sorted file that can jump to any key
///
/// Not shareable between threads; give every thread its own iterator and
/// let them share positions through a [`CacheRegistry`].
pub struct SeekableIterator {
    source: Arc<dyn SeekableSource>,
    path: String,
    config: Config,
    cache: Arc<PositionCache>,

    file_size: u64,
    data_start: u64,
    header: Option<Vec<u8>>,

    /// Loaded bytes; `buffer.data()[0]` is at file offset `buf_start`
    buffer: LineBuffer,
    buf_start: u64,

    /// Open stream and the file offset it will read next
    stream: Option<(Box<dyn Read + Send>, u64)>,
}

impl SeekableIterator {
    /// Open an iterator over `source`, merging `index` into its cache if given
    pub fn open(
        source: Arc<dyn SeekableSource>,
        index: Option<&dyn SeekableSource>,
        registry: &CacheRegistry,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;
        let identity = source.identity();
        let file_size = source.length()?;

        let (header, data_start) = if config.has_header {
            let (header, data_start) = read_header(&*source, &identity.path, file_size, config)?;
            (Some(header), data_start)
        } else {
            (None, 0)
        };

        let cache = registry.get_or_create(&identity, data_start, file_size);
        if let Some(index) = index {
            let count = cache.load_index(BufReader::new(index.open()?))?;
            if count > 0 {
                debug!(path = %identity.path, entries = count, "Merged index into position cache");
            }
        }

        Ok(Self {
            source,
            path: identity.path,
            config: config.clone(),
            cache,
            file_size,
            data_start,
            header,
            buffer: LineBuffer::new(config.layout, config.initial_window_size),
            buf_start: data_start,
            stream: None,
        })
    }

    /// Column header line, if the file has one
    pub fn header(&self) -> Option<String> {
        self.header
            .as_deref()
            .map(|h| String::from_utf8_lossy(h).into_owned())
    }

    /// Raw bytes of the header line, without its terminator
    pub fn header_bytes(&self) -> Option<&[u8]> {
        self.header.as_deref()
    }

    /// Position cache shared with other iterators on the same file
    pub fn cache(&self) -> &Arc<PositionCache> {
        &self.cache
    }

    /// Name of the underlying source
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Offset of the first data line
    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Size of the underlying source
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Position at the first line whose key is `>= key`
    ///
    /// Returns `false` when every line is smaller; [`has_next`](Self::has_next)
    /// is then `false` as well.
    pub fn seek(&mut self, key: &Key) -> Result<bool> {
        // The loaded lines already cover the target
        if !self.buffer.is_empty() && self.buffer.first_key()? < *key && *key <= self.buffer.last_key()? {
            self.buffer.seek(key)?;
            return Ok(true);
        }

        let (lower, upper) = self.cache.bracket(key);
        let mut bracket = Bracket::new(lower, upper, self.config.initial_window_size);
        bracket.lo = bracket.lo.max(self.data_start);
        bracket.hi = bracket.hi.min(self.file_size);

        let mut state = SeekState::Bracketed;
        loop {
            state = match state {
                SeekState::Bracketed => self.step(key, &mut bracket)?,
                SeekState::Expanding => {
                    bracket.expand(self.config.max_line_size)?;
                    trace!(window = bracket.window, "Expanding seek window");
                    self.step(key, &mut bracket)?
                }
                SeekState::Found => return Ok(true),
                SeekState::Exhausted => {
                    self.buffer.clear();
                    self.buf_start = self.file_size;
                    return Ok(false);
                }
            };
        }
    }

    /// Read one window of the bracket and narrow it
    fn step(&mut self, key: &Key, bracket: &mut Bracket) -> Result<SeekState> {
        if bracket.is_closed() {
            return Ok(SeekState::Exhausted);
        }

        let (start, len) = bracket.probe(key);
        trace!(lo = bracket.lo, hi = bracket.hi, start, len, "Seek probe");

        let data = self.read_window(start, len)?;
        let end = start + data.len() as u64;
        self.buf_start = start;
        *self.buffer.data_mut() = data;
        self.buffer.frame(
            start == bracket.lo,
            end == bracket.hi || end == self.file_size,
        );
        if self.buffer.is_empty() {
            return Ok(SeekState::Expanding);
        }

        let region_start = start + self.buffer.lower() as u64;
        let region_end = start + self.buffer.upper() as u64;
        let first_key = self.buffer.first_key()?;
        let last_key = self.buffer.last_key()?;
        self.cache
            .put(first_key.clone(), start + self.buffer.first_line_end() as u64);
        self.cache.put(last_key.clone(), region_end);

        self.buffer.seek(key)?;
        let idx = self.buffer.position();

        if idx < self.buffer.upper() {
            // A line >= key is loaded; it is the first one in the file if
            // something smaller is known to come right before it
            if region_start <= bracket.lo || idx > self.buffer.lower() {
                if let Some(pred) = self.buffer.key_of_line_ending_at(idx)? {
                    self.cache.put(pred, start + idx as u64);
                }
                return Ok(SeekState::Found);
            }
            let single_line = self.buffer.is_single_line();
            let shrank = bracket.lower(start + self.buffer.first_line_end() as u64, first_key);
            if single_line || !shrank {
                return Ok(SeekState::Expanding);
            }
        } else {
            bracket.raise(region_end, last_key);
        }

        bracket.widen(self.config.max_window_size);
        Ok(SeekState::Bracketed)
    }

    /// Whether another line can be read
    pub fn has_next(&self) -> bool {
        self.buffer.has_next() || self.read_pos() < self.file_size
    }

    /// Next line, without its terminator
    pub fn next_line(&mut self) -> Result<Option<&[u8]>> {
        if !self.buffer.has_next() && !self.refill()? {
            return Ok(None);
        }
        Ok(self.buffer.next_line())
    }

    /// Key of the next line without consuming it
    pub fn peek_key(&mut self) -> Result<Option<Key>> {
        if !self.buffer.has_next() && !self.refill()? {
            return Ok(None);
        }
        self.buffer.peek_key()
    }

    /// File offset just past the loaded bytes
    fn read_pos(&self) -> u64 {
        self.buf_start + self.buffer.data().len() as u64
    }

    /// Replace the consumed part of the buffer with the following lines
    fn refill(&mut self) -> Result<bool> {
        let upper = self.buffer.upper();
        let mut data = std::mem::take(self.buffer.data_mut());
        data.drain(..upper);
        self.buf_start += upper as u64;

        let mut want = self.config.initial_window_size;
        loop {
            let read_pos = self.buf_start + data.len() as u64;
            let n = if read_pos < self.file_size {
                self.read_append(&mut data, read_pos, want)?
            } else {
                0
            };
            // A short read means the end of the source
            let at_end = n < want || read_pos + n as u64 >= self.file_size;

            *self.buffer.data_mut() = data;
            self.buffer.frame(true, at_end);
            if !self.buffer.is_empty() {
                return Ok(true);
            }
            if at_end {
                return Ok(false);
            }

            data = std::mem::take(self.buffer.data_mut());
            if data.len() > self.config.max_line_size {
                return Err(SeekError::data(format!(
                    "line at offset {} of {} exceeds the maximum line size",
                    self.buf_start, self.path
                )));
            }
            want = want.saturating_mul(2);
        }
    }

    /// Read `[start, start + len)`, shorter only at the end of the source
    fn read_window(&mut self, start: u64, len: u64) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.read_append(&mut data, start, len as usize)?;
        Ok(data)
    }

    /// Append up to `len` bytes read at `start`, reusing the open stream when
    /// it is already there
    fn read_append(&mut self, data: &mut Vec<u8>, start: u64, len: usize) -> Result<usize> {
        let mut stream = match self.stream.take() {
            Some((stream, pos)) if pos == start => stream,
            _ => self.source.open_at(start, len as u64)?,
        };

        let old_len = data.len();
        data.resize(old_len + len, 0);
        // On error the stream is dropped and the buffer left as it was
        let n = match read_fully(&mut stream, &mut data[old_len..]) {
            Ok(n) => n,
            Err(e) => {
                data.truncate(old_len);
                return Err(e);
            }
        };
        data.truncate(old_len + n);
        self.stream = Some((stream, start + n as u64));
        Ok(n)
    }
}

/// Read the header of `source`, skipping `##` metadata lines
///
/// Returns the header without terminator and the offset after it.
fn read_header(source: &dyn SeekableSource, path: &str, file_size: u64, config: &Config) -> Result<(Vec<u8>, u64)> {
    let chunk = config.initial_window_size;
    let mut stream = source.open_at(0, chunk as u64)?;
    let mut data = Vec::new();
    let mut line_start = 0usize;
    let mut scanned = 0usize;
    loop {
        if let Some(i) = data[scanned..].iter().position(|&b| b == b'\n') {
            let end = scanned + i + 1;
            if data[line_start..].starts_with(b"##") {
                line_start = end;
                scanned = end;
                continue;
            }
            let header = strip_cr(&data[line_start..end - 1]).to_vec();
            return Ok((header, end as u64));
        }
        scanned = data.len();
        if scanned - line_start > config.max_line_size {
            return Err(SeekError::data(format!(
                "header of {} exceeds the maximum line size",
                path
            )));
        }

        let n = if (data.len() as u64) < file_size {
            let old_len = data.len();
            data.resize(old_len + chunk, 0);
            let n = read_fully(&mut stream, &mut data[old_len..])?;
            data.truncate(old_len + n);
            n
        } else {
            0
        };
        if n == 0 {
            // Unterminated last line, or nothing but metadata
            let rest = &data[line_start..];
            let header = if rest.starts_with(b"##") {
                Vec::new()
            } else {
                strip_cr(rest).to_vec()
            };
            return Ok((header, data.len() as u64));
        }
    }
}
