//! Block codec
//!
//! 7-bit text encoding of compressed bytes, and zlib/zstd block compression.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Result, SeekError};

use super::{BlockCompression, FLAG_COLUMN_ENCODED, FLAG_ZSTD, SEVEN_BIT_OFFSET};

/// zstd level for new blocks
const ZSTD_LEVEL: i32 = 3;

// =============================================================================
// 7-bit Encoding
// =============================================================================

/// Re-encode bytes as a stream of 7-bit values offset by 33
///
/// Bits are taken least significant first. The output is
/// `ceil(len * 8 / 7)` bytes, all in `33..=160`.
pub fn to_7bit(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity((input.len() * 8).div_ceil(7));
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    for &byte in input {
        acc |= u32::from(byte) << bits;
        bits += 8;
        while bits >= 7 {
            out.push((acc & 0x7f) as u8 + SEVEN_BIT_OFFSET);
            acc >>= 7;
            bits -= 7;
        }
    }
    if bits > 0 {
        out.push((acc & 0x7f) as u8 + SEVEN_BIT_OFFSET);
    }
    out
}

/// Inverse of [`to_7bit`]
///
/// Fails on values outside `33..=160`.
pub fn from_7bit(input: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(input.len() * 7 / 8);
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    for (i, &value) in input.iter().enumerate() {
        let digit = value
            .checked_sub(SEVEN_BIT_OFFSET)
            .filter(|d| *d < 0x80)
            .ok_or_else(|| format!("byte {} of payload is out of range: {}", i, value))?;
        acc |= u32::from(digit) << bits;
        bits += 7;
        if bits >= 8 {
            out.push((acc & 0xff) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    Ok(out)
}

// =============================================================================
// Compression
// =============================================================================

/// Compress a block of plain lines
pub fn compress_block(plain: &[u8], compression: BlockCompression) -> Result<Vec<u8>> {
    match compression {
        BlockCompression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::with_capacity(plain.len() / 4), Compression::fast());
            encoder.write_all(plain)?;
            Ok(encoder.finish()?)
        }
        BlockCompression::Zstd => Ok(zstd::bulk::compress(plain, ZSTD_LEVEL)?),
    }
}

/// Decompress a block payload according to its flag byte
///
/// `path` only labels errors.
pub fn decompress_block(flag: u8, compressed: &[u8], path: &str) -> Result<Vec<u8>> {
    let corrupt = |message: String| SeekError::CorruptBlock {
        path: path.to_string(),
        message,
    };

    if flag & FLAG_COLUMN_ENCODED != 0 {
        return Err(corrupt("column encoded blocks are not supported".to_string()));
    }
    if flag & !(FLAG_COLUMN_ENCODED | FLAG_ZSTD) != 0 {
        return Err(corrupt(format!("unknown block flag {:#04x}", flag)));
    }

    let mut plain = Vec::with_capacity(compressed.len() * 4);
    if flag & FLAG_ZSTD != 0 {
        let mut decoder = zstd::stream::read::Decoder::new(compressed)
            .map_err(|e| corrupt(format!("zstd: {}", e)))?;
        decoder
            .read_to_end(&mut plain)
            .map_err(|e| corrupt(format!("zstd: {}", e)))?;
    } else {
        ZlibDecoder::new(compressed)
            .read_to_end(&mut plain)
            .map_err(|e| corrupt(format!("zlib: {}", e)))?;
    }
    Ok(plain)
}

/// Decode one block line (`chrom\tpos\t<flag><payload>`, without `\n`) into plain lines
pub fn decode_block_line(line: &[u8], path: &str) -> Result<Vec<u8>> {
    let corrupt = |message: &str| SeekError::CorruptBlock {
        path: path.to_string(),
        message: message.to_string(),
    };

    let mut tabs = line
        .iter()
        .enumerate()
        .filter(|(_, &b)| b == b'\t')
        .map(|(i, _)| i);
    let (Some(_), Some(second)) = (tabs.next(), tabs.next()) else {
        return Err(corrupt("block line has no key"));
    };
    let body = &line[second + 1..];
    let Some((&flag, payload)) = body.split_first() else {
        return Err(corrupt("block line has no payload"));
    };

    let compressed = from_7bit(payload).map_err(|message| SeekError::CorruptBlock {
        path: path.to_string(),
        message,
    })?;
    decompress_block(flag, &compressed, path)
}
