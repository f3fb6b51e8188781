//! Block compression for ORC streams.
//!
//! A compressed stream is a sequence of blocks, each prefixed by a 3-byte
//! little-endian header holding `length * 2 + is_original`. Blocks that did
//! not shrink are stored as-is with the original flag set.

mod block;
mod writer;

pub use block::{
    decode_header, decompress_block, encode_header, peek_length, BlockHeader, BlockStream,
    HEADER_SIZE, MAX_BLOCK_SIZE,
};
pub use writer::BlockWriter;

use std::io::{Read, Write};
use std::sync::Arc;

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{OrcError, Result};

pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionKind {
    None,
    #[default]
    Zlib,
    Snappy,
    Lzo,
    Lz4,
    Zstd,
}

impl TryFrom<u64> for CompressionKind {
    type Error = OrcError;

    fn try_from(value: u64) -> Result<Self> {
        match value {
            0 => Ok(CompressionKind::None),
            1 => Ok(CompressionKind::Zlib),
            2 => Ok(CompressionKind::Snappy),
            3 => Ok(CompressionKind::Lzo),
            4 => Ok(CompressionKind::Lz4),
            5 => Ok(CompressionKind::Zstd),
            _ => Err(OrcError::InvalidFormat(format!(
                "Unknown compression kind: {}",
                value
            ))),
        }
    }
}

impl From<CompressionKind> for u64 {
    fn from(kind: CompressionKind) -> u64 {
        match kind {
            CompressionKind::None => 0,
            CompressionKind::Zlib => 1,
            CompressionKind::Snappy => 2,
            CompressionKind::Lzo => 3,
            CompressionKind::Lz4 => 4,
            CompressionKind::Zstd => 5,
        }
    }
}

impl std::fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompressionKind::None => "NONE",
            CompressionKind::Zlib => "ZLIB",
            CompressionKind::Snappy => "SNAPPY",
            CompressionKind::Lzo => "LZO",
            CompressionKind::Lz4 => "LZ4",
            CompressionKind::Zstd => "ZSTD",
        };
        f.write_str(name)
    }
}

/// A block codec. Implementations must be stateless between calls so one
/// instance can be shared by every stream of a file.
pub trait CompressionCodec: Send + Sync {
    fn kind(&self) -> CompressionKind;

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Inflates `input` into `output` and returns the number of bytes
    /// produced. An `output` that cannot hold the whole block is reported as
    /// [`OrcError::BufferTooSmall`].
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize>;
}

pub type SharedCodec = Arc<dyn CompressionCodec>;

/// Raw deflate (no zlib header), as used by ORC's ZLIB kind.
#[derive(Debug, Clone, Copy)]
pub struct ZlibCodec {
    level: u32,
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self::new(6)
    }
}

impl ZlibCodec {
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }

    /// Inflated size of `input`, capped at one past the largest legal block.
    fn inflated_len(input: &[u8]) -> Result<usize> {
        let limit = MAX_BLOCK_SIZE as u64 + 1;
        let mut decoder = flate2::read::DeflateDecoder::new(input).take(limit);
        let inflated = std::io::copy(&mut decoder, &mut std::io::sink())
            .map_err(|e| OrcError::Decompression(e.to_string()))?;
        Ok(inflated as usize)
    }
}

impl CompressionCodec for ZlibCodec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Zlib
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = flate2::write::DeflateEncoder::new(
            Vec::with_capacity(input.len() / 2),
            flate2::Compression::new(self.level),
        );
        encoder.write_all(input)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let mut inflater = Decompress::new(false);
        let status = inflater
            .decompress(input, output, FlushDecompress::Finish)
            .map_err(|e| OrcError::Decompression(e.to_string()))?;
        let produced = inflater.total_out() as usize;
        match status {
            Status::StreamEnd => Ok(produced),
            _ if produced == output.len() => {
                let required = Self::inflated_len(input)?;
                if required > output.len() {
                    Err(OrcError::BufferTooSmall {
                        required,
                        provided: output.len(),
                    })
                } else {
                    Ok(required)
                }
            }
            _ => Err(OrcError::Decompression(format!(
                "deflate block ended early after {} bytes",
                produced
            ))),
        }
    }
}

/// Resolves the codec for a compression kind; `None` for uncompressed files.
pub fn codec_for(kind: CompressionKind, level: u32) -> Result<Option<SharedCodec>> {
    match kind {
        CompressionKind::None => Ok(None),
        CompressionKind::Zlib => Ok(Some(Arc::new(ZlibCodec::new(level)))),
        other => Err(OrcError::Unsupported(format!(
            "Compression codec {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zlib_round_trip() {
        let codec = ZlibCodec::default();
        let input: Vec<u8> = (0..10_000).map(|i| (i % 17) as u8).collect();
        let compressed = codec.compress(&input).unwrap();
        assert!(compressed.len() < input.len());
        let mut output = vec![0u8; input.len()];
        let n = codec.decompress(&compressed, &mut output).unwrap();
        assert_eq!(n, input.len());
        assert_eq!(output, input);
    }

    #[test]
    fn test_zlib_output_larger_than_needed() {
        let codec = ZlibCodec::default();
        let compressed = codec.compress(b"hello hello hello").unwrap();
        let mut output = vec![0u8; 1024];
        let n = codec.decompress(&compressed, &mut output).unwrap();
        assert_eq!(&output[..n], b"hello hello hello");
    }

    #[test]
    fn test_zlib_buffer_too_small_reports_sizes() {
        let codec = ZlibCodec::default();
        let compressed = codec.compress(&vec![7u8; 262144]).unwrap();
        let mut output = vec![0u8; 1024];
        match codec.decompress(&compressed, &mut output) {
            Err(OrcError::BufferTooSmall { required, provided }) => {
                assert_eq!(required, 262144);
                assert_eq!(provided, 1024);
            }
            other => panic!("expected BufferTooSmall, got {:?}", other),
        }
    }

    #[test]
    fn test_zlib_oversized_block_reports_capped_size() {
        let codec = ZlibCodec::default();
        let compressed = codec.compress(&vec![0u8; MAX_BLOCK_SIZE + 4096]).unwrap();
        let mut output = vec![0u8; 1024];
        match codec.decompress(&compressed, &mut output) {
            Err(OrcError::BufferTooSmall { required, provided }) => {
                assert_eq!(required, MAX_BLOCK_SIZE + 1);
                assert_eq!(provided, 1024);
            }
            other => panic!("expected BufferTooSmall, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_codecs() {
        assert!(codec_for(CompressionKind::None, 6).unwrap().is_none());
        assert!(codec_for(CompressionKind::Zlib, 6).unwrap().is_some());
        for kind in [
            CompressionKind::Snappy,
            CompressionKind::Lzo,
            CompressionKind::Lz4,
            CompressionKind::Zstd,
        ] {
            assert!(matches!(codec_for(kind, 6), Err(OrcError::Unsupported(_))));
        }
    }

    #[test]
    fn test_kind_codes() {
        for code in 0..6u64 {
            let kind = CompressionKind::try_from(code).unwrap();
            assert_eq!(u64::from(kind), code);
        }
        assert!(CompressionKind::try_from(9).is_err());
    }
}
