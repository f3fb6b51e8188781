use super::block::encode_header;
use super::SharedCodec;
use crate::encoding::ByteSink;
use crate::error::Result;

/// Buffers one stream's bytes and frames them into compression blocks.
///
/// A full block is compressed as soon as it fills, so the buffered part is
/// always shorter than the block size and a recorded position never points
/// at the end of a block.
pub struct BlockWriter {
    codec: Option<SharedCodec>,
    block_size: usize,
    output: Vec<u8>,
    buffer: Vec<u8>,
}

impl BlockWriter {
    pub fn new(codec: Option<SharedCodec>, block_size: usize) -> Self {
        Self {
            codec,
            block_size: block_size.max(1),
            output: Vec::new(),
            buffer: Vec::new(),
        }
    }

    fn spill(&mut self) -> Result<()> {
        let Some(codec) = self.codec.as_ref() else {
            return Ok(());
        };
        if self.buffer.is_empty() {
            return Ok(());
        }
        let compressed = codec.compress(&self.buffer)?;
        if compressed.len() < self.buffer.len() {
            self.output
                .extend_from_slice(&encode_header(compressed.len(), false)?);
            self.output.extend_from_slice(&compressed);
        } else {
            self.output
                .extend_from_slice(&encode_header(self.buffer.len(), true)?);
            self.output.extend_from_slice(&self.buffer);
        }
        self.buffer.clear();
        Ok(())
    }

    /// Bytes produced so far, counting the uncompressed tail.
    pub fn estimated_size(&self) -> usize {
        self.output.len() + self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty() && self.buffer.is_empty()
    }

    /// Flushes the final partial block and returns the framed stream.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.spill()?;
        Ok(self.output)
    }
}

impl ByteSink for BlockWriter {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.codec.is_none() {
            self.output.push(byte);
            return Ok(());
        }
        self.buffer.push(byte);
        if self.buffer.len() == self.block_size {
            self.spill()?;
        }
        Ok(())
    }

    fn write_bytes(&mut self, mut bytes: &[u8]) -> Result<()> {
        if self.codec.is_none() {
            self.output.extend_from_slice(bytes);
            return Ok(());
        }
        while !bytes.is_empty() {
            let room = self.block_size - self.buffer.len();
            let n = room.min(bytes.len());
            self.buffer.extend_from_slice(&bytes[..n]);
            bytes = &bytes[n..];
            if self.buffer.len() == self.block_size {
                self.spill()?;
            }
        }
        Ok(())
    }

    fn record_position(&self, positions: &mut Vec<u64>) {
        positions.push(self.output.len() as u64);
        if self.codec.is_some() {
            positions.push(self.buffer.len() as u64);
        }
    }
}
