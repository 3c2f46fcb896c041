//! GORZ Module
//!
//! Block-compressed sorted files.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ header line                                            \n    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ chrom \t pos \t flag │ 7-bit payload                   \n    │  block 0
//! ├──────────────────────────────────────────────────────────────┤
//! │ chrom \t pos \t flag │ 7-bit payload                   \n    │  block 1
//! ├──────────────────────────────────────────────────────────────┤
//! │ ...                                                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - `chrom\tpos` is the key of the **last** record in the block, so a block
//!   file is itself a sorted line file and seeks with the plain machinery.
//! - `flag`: bit 0 column-encoded (not supported), bit 1 zstd (else zlib).
//! - payload: compressed block bytes re-encoded 7 bits per byte, each value
//!   offset by 33, so it never contains `\n` or `\t`.
//! - A block holds at most one chromosome and about 32 KiB of plain text.
//!
//! ## Modules
//! - `codec`: 7-bit encoding and block (de)compression
//! - `writer`: Produces block files and, optionally, their index

mod codec;
mod writer;

use serde::{Deserialize, Serialize};

pub use codec::{compress_block, decode_block_line, decompress_block, from_7bit, to_7bit};
pub use writer::GorzWriter;

/// Uncompressed size at which a block is cut
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Flag bit: block is column encoded
pub const FLAG_COLUMN_ENCODED: u8 = 0x01;

/// Flag bit: block is zstd compressed (zlib otherwise)
pub const FLAG_ZSTD: u8 = 0x02;

/// Offset added to every 7-bit value
pub const SEVEN_BIT_OFFSET: u8 = 33;

/// File extension of block-compressed files
pub const GORZ_EXTENSION: &str = "gorz";

/// Compression used for new blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockCompression {
    #[default]
    Zlib,
    Zstd,
}

impl BlockCompression {
    /// Flag byte written before the payload
    pub fn flag(self) -> u8 {
        match self {
            BlockCompression::Zlib => 0,
            BlockCompression::Zstd => FLAG_ZSTD,
        }
    }
}

/// Whether `path` names a block-compressed file
pub fn is_gorz_path(path: impl AsRef<std::path::Path>) -> bool {
    path.as_ref()
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(GORZ_EXTENSION))
}
