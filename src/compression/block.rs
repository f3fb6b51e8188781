use std::io::Read;

use log::trace;

use super::SharedCodec;
use crate::encoding::{ByteSource, PositionCursor};
use crate::error::{OrcError, Result};

pub const HEADER_SIZE: usize = 3;

/// The length field holds 23 bits.
pub const MAX_BLOCK_SIZE: usize = (1 << 23) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub length: usize,
    pub is_original: bool,
}

pub fn encode_header(length: usize, is_original: bool) -> Result<[u8; HEADER_SIZE]> {
    if length > MAX_BLOCK_SIZE {
        return Err(OrcError::InvalidFormat(format!(
            "compression block of {} bytes does not fit a 23-bit header",
            length
        )));
    }
    let raw = (length << 1) | is_original as usize;
    Ok([raw as u8, (raw >> 8) as u8, (raw >> 16) as u8])
}

pub fn decode_header(bytes: &[u8]) -> Result<BlockHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(OrcError::read_past_end(format!(
            "compression block header needs {} bytes, {} available",
            HEADER_SIZE,
            bytes.len()
        )));
    }
    let raw = bytes[0] as usize | (bytes[1] as usize) << 8 | (bytes[2] as usize) << 16;
    Ok(BlockHeader {
        length: raw >> 1,
        is_original: raw & 1 == 1,
    })
}

/// Length of the block body announced by the header at the start of `bytes`.
pub fn peek_length(bytes: &[u8]) -> Result<usize> {
    decode_header(bytes).map(|h| h.length)
}

/// Decodes the single block at the start of `input` into `output`.
///
/// Returns `(bytes consumed from input, bytes written to output)`.
pub fn decompress_block(
    codec: &dyn super::CompressionCodec,
    input: &[u8],
    output: &mut [u8],
) -> Result<(usize, usize)> {
    let header = decode_header(input)?;
    let end = HEADER_SIZE + header.length;
    if input.len() < end {
        return Err(OrcError::read_past_end(format!(
            "compression block declares {} bytes, {} available",
            header.length,
            input.len() - HEADER_SIZE
        )));
    }
    let body = &input[HEADER_SIZE..end];
    if header.is_original {
        if output.len() < body.len() {
            return Err(OrcError::BufferTooSmall {
                required: body.len(),
                provided: output.len(),
            });
        }
        output[..body.len()].copy_from_slice(body);
        Ok((end, body.len()))
    } else {
        let produced = codec.decompress(body, output)?;
        Ok((end, produced))
    }
}

/// Presents a stream's blocks as one continuous byte sequence.
///
/// Blocks are inflated lazily as the previous one runs dry. Without a codec
/// the stream carries no block headers and is read straight through.
pub struct BlockStream<'a> {
    data: &'a [u8],
    codec: Option<SharedCodec>,
    next_block: usize,
    block: Vec<u8>,
    block_size: usize,
    owned: bool,
    pos: usize,
    end: usize,
}

impl<'a> BlockStream<'a> {
    pub fn new(data: &'a [u8], codec: Option<SharedCodec>, block_size: usize) -> Self {
        let compressed = codec.is_some();
        Self {
            data,
            codec,
            next_block: if compressed { 0 } else { data.len() },
            block: Vec::new(),
            block_size,
            owned: false,
            pos: 0,
            end: if compressed { 0 } else { data.len() },
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.codec.is_some()
    }

    fn chunk(&self) -> &[u8] {
        if self.owned {
            &self.block[self.pos..self.end]
        } else {
            &self.data[self.pos..self.end]
        }
    }

    /// Loads the block at `self.next_block`. Returns `false` when there is
    /// none left.
    fn load_block(&mut self) -> Result<bool> {
        let Some(codec) = self.codec.as_ref() else {
            return Ok(false);
        };
        if self.next_block >= self.data.len() {
            return Ok(false);
        }
        let input = &self.data[self.next_block..];
        let header = decode_header(input)?;
        let body_start = self.next_block + HEADER_SIZE;
        let body_end = body_start + header.length;
        if body_end > self.data.len() {
            return Err(OrcError::read_past_end(format!(
                "compression block at {} declares {} bytes, {} available",
                self.next_block,
                header.length,
                self.data.len() - body_start
            )));
        }
        trace!(
            "block at {}: {} bytes, original={}",
            self.next_block,
            header.length,
            header.is_original
        );
        if header.is_original {
            self.owned = false;
            self.pos = body_start;
            self.end = body_end;
        } else {
            if self.block.len() < self.block_size {
                self.block.resize(self.block_size, 0);
            }
            let produced = codec.decompress(&self.data[body_start..body_end], &mut self.block)?;
            self.owned = true;
            self.pos = 0;
            self.end = produced;
        }
        self.next_block = body_end;
        Ok(true)
    }

    /// Makes sure at least one byte is buffered, loading blocks as needed.
    fn ensure(&mut self) -> Result<bool> {
        while self.pos == self.end {
            if !self.load_block()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Moves to a row-index position: `[byte offset]` for an uncompressed
    /// stream, `[block offset, offset within block]` for a compressed one.
    pub fn seek(&mut self, positions: &mut PositionCursor) -> Result<()> {
        let offset = positions.next()? as usize;
        if self.codec.is_none() {
            if offset > self.data.len() {
                return Err(OrcError::InvalidFormat(format!(
                    "seek to {} in a stream of {} bytes",
                    offset,
                    self.data.len()
                )));
            }
            self.pos = offset;
            self.end = self.data.len();
            return Ok(());
        }

        let within = positions.next()? as usize;
        if offset > self.data.len() {
            return Err(OrcError::InvalidFormat(format!(
                "seek to block {} in a stream of {} bytes",
                offset,
                self.data.len()
            )));
        }
        self.next_block = offset;
        self.pos = 0;
        self.end = 0;
        self.owned = false;
        if !self.load_block()? {
            if within == 0 {
                return Ok(());
            }
            return Err(OrcError::read_past_end("seek past the last block"));
        }
        if within > self.end - self.pos {
            return Err(OrcError::InvalidFormat(format!(
                "seek to offset {} in a block of {} bytes",
                within,
                self.end - self.pos
            )));
        }
        self.pos += within;
        Ok(())
    }

    /// Drains the rest of the stream, inflating every remaining block.
    pub fn read_to_vec(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while self.ensure()? {
            out.extend_from_slice(self.chunk());
            self.pos = self.end;
        }
        Ok(out)
    }
}

impl Read for BlockStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let more = self
            .ensure()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        if !more {
            return Ok(0);
        }
        let chunk = self.chunk();
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl ByteSource for BlockStream<'_> {
    fn next_byte(&mut self) -> Result<Option<u8>> {
        if !self.ensure()? {
            return Ok(None);
        }
        let byte = if self.owned {
            self.block[self.pos]
        } else {
            self.data[self.pos]
        };
        self.pos += 1;
        Ok(Some(byte))
    }

    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if !self.ensure()? {
                return Err(OrcError::read_past_end(format!(
                    "stream ended after {} of {} bytes",
                    filled,
                    buf.len()
                )));
            }
            let chunk = self.chunk();
            let n = chunk.len().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&chunk[..n]);
            self.pos += n;
            filled += n;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{BlockWriter, ZlibCodec};
    use crate::encoding::ByteSink;
    use std::sync::Arc;

    fn zlib() -> Option<SharedCodec> {
        Some(Arc::new(ZlibCodec::default()))
    }

    #[test]
    fn test_header_round_trip() {
        for (len, original) in [(0, false), (5, true), (100_000, false), (MAX_BLOCK_SIZE, true)] {
            let header = encode_header(len, original).unwrap();
            assert_eq!(peek_length(&header).unwrap(), len);
            assert_eq!(decode_header(&header).unwrap().is_original, original);
        }
        assert!(encode_header(MAX_BLOCK_SIZE + 1, false).is_err());
    }

    #[test]
    fn test_known_header_bytes() {
        // 5 bytes, original: raw = 11.
        assert_eq!(encode_header(5, true).unwrap(), [0x0b, 0x00, 0x00]);
        let header = decode_header(&[0x40, 0x0d, 0x03]).unwrap();
        assert_eq!(header.length, 0x030d40 >> 1);
        assert!(!header.is_original);
    }

    #[test]
    fn test_uncompressed_block_passthrough() {
        let mut input = encode_header(5, true).unwrap().to_vec();
        input.extend_from_slice(b"hello");
        let mut output = [0u8; 16];
        let codec = ZlibCodec::default();
        let (consumed, produced) = decompress_block(&codec, &input, &mut output).unwrap();
        assert_eq!((consumed, produced), (8, 5));
        assert_eq!(&output[..5], b"hello");
    }

    #[test]
    fn test_original_block_too_small() {
        let mut input = encode_header(5, true).unwrap().to_vec();
        input.extend_from_slice(b"hello");
        let mut output = [0u8; 3];
        let err = decompress_block(&ZlibCodec::default(), &input, &mut output).unwrap_err();
        assert!(matches!(
            err,
            OrcError::BufferTooSmall {
                required: 5,
                provided: 3
            }
        ));
    }

    #[test]
    fn test_truncated_block_body() {
        let mut input = encode_header(10, true).unwrap().to_vec();
        input.extend_from_slice(b"abc");
        let mut output = [0u8; 16];
        assert!(matches!(
            decompress_block(&ZlibCodec::default(), &input, &mut output),
            Err(OrcError::ReadPastEnd(_))
        ));
    }

    #[test]
    fn test_stream_spans_blocks() {
        let payload: Vec<u8> = (0..5000u32).map(|i| (i * 31 % 251) as u8).collect();
        let mut writer = BlockWriter::new(zlib(), 1024);
        writer.write_bytes(&payload).unwrap();
        let encoded = writer.finish().unwrap();

        let mut stream = BlockStream::new(&encoded, zlib(), 1024);
        let mut decoded = Vec::new();
        stream.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, payload);

        // A drained stream keeps returning zero-length reads.
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
        assert_eq!(stream.next_byte().unwrap(), None);
    }

    #[test]
    fn test_seek_to_recorded_position() {
        let payload: Vec<u8> = (0..4000u32).map(|i| (i % 97) as u8).collect();
        let mut writer = BlockWriter::new(zlib(), 512);
        let mut positions = Vec::new();
        for (i, &b) in payload.iter().enumerate() {
            if i == 2345 {
                writer.record_position(&mut positions);
            }
            writer.write_byte(b).unwrap();
        }
        let encoded = writer.finish().unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[1], 2345 % 512);

        let mut stream = BlockStream::new(&encoded, zlib(), 512);
        stream.seek(&mut PositionCursor::new(&positions)).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, payload[2345..].to_vec());
    }

    #[test]
    fn test_uncompressed_stream_seek() {
        let data = b"0123456789";
        let mut stream = BlockStream::new(data, None, 0);
        stream.seek(&mut PositionCursor::new(&[4])).unwrap();
        assert_eq!(stream.next_byte().unwrap(), Some(b'4'));
        assert!(!stream.is_compressed());
    }
}
