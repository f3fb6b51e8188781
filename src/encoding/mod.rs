pub mod bitpack;
pub mod bits;
pub mod boolean;
pub mod byte_rle;
pub mod int_rle_v1;
pub mod rle_v2;

pub use bitpack::{BitReader, BitWriter};
pub use bits::BitPacking;
pub use boolean::{BooleanDecoder, BooleanEncoder};
pub use byte_rle::{ByteRleDecoder, ByteRleEncoder};
pub use int_rle_v1::RleV1Decoder;
pub use rle_v2::{RleV2Decoder, RleV2Encoder};

use crate::error::{OrcError, Result};

/// A forward-only source of bytes that the stream decoders pull from.
///
/// `next_byte` returns `Ok(None)` at a clean end of data; a decoder that is
/// part-way through a run turns that into [`OrcError::ReadPastEnd`].
pub trait ByteSource {
    fn next_byte(&mut self) -> Result<Option<u8>>;

    fn require_byte(&mut self) -> Result<u8> {
        self.next_byte()?
            .ok_or_else(|| OrcError::read_past_end("stream ended inside a run"))
    }

    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.require_byte()?;
        }
        Ok(())
    }
}

impl ByteSource for &[u8] {
    fn next_byte(&mut self) -> Result<Option<u8>> {
        match self.split_first() {
            Some((&byte, rest)) => {
                *self = rest;
                Ok(Some(byte))
            }
            None => Ok(None),
        }
    }

    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.len() < buf.len() {
            return Err(OrcError::read_past_end(format!(
                "needed {} bytes, {} available",
                buf.len(),
                self.len()
            )));
        }
        let (head, rest) = self.split_at(buf.len());
        buf.copy_from_slice(head);
        *self = rest;
        Ok(())
    }
}

/// An append-only byte destination that can report its current position for
/// the row index.
pub trait ByteSink {
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    /// Appends the sink's seek coordinates (one entry for a plain stream,
    /// two for a compressed one).
    fn record_position(&self, positions: &mut Vec<u64>);
}

impl ByteSink for Vec<u8> {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.push(byte);
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn record_position(&self, positions: &mut Vec<u64>) {
        positions.push(self.len() as u64);
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        (**self).write_byte(byte)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn record_position(&self, positions: &mut Vec<u64>) {
        (**self).record_position(positions)
    }
}

/// Reads the seek coordinates of one row-index entry in recording order.
#[derive(Debug, Clone)]
pub struct PositionCursor<'a> {
    positions: &'a [u64],
    idx: usize,
}

impl<'a> PositionCursor<'a> {
    pub fn new(positions: &'a [u64]) -> Self {
        Self { positions, idx: 0 }
    }

    pub fn next(&mut self) -> Result<u64> {
        let value = self.positions.get(self.idx).copied().ok_or_else(|| {
            OrcError::InvalidFormat(format!(
                "row index entry has only {} positions",
                self.positions.len()
            ))
        })?;
        self.idx += 1;
        Ok(value)
    }

    pub fn remaining(&self) -> usize {
        self.positions.len() - self.idx
    }
}

/// Integer decoders share this surface so column readers can treat RLE v1
/// and RLE v2 streams alike.
pub trait IntegerDecoder {
    /// Fills `out` completely or fails with `ReadPastEnd`.
    fn read(&mut self, out: &mut [i64]) -> Result<()>;

    fn skip(&mut self, count: usize) -> Result<()>;

    fn next(&mut self) -> Result<i64> {
        let mut one = [0i64; 1];
        self.read(&mut one)?;
        Ok(one[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_source_clean_end() {
        let mut src: &[u8] = &[1, 2];
        assert_eq!(src.next_byte().unwrap(), Some(1));
        assert_eq!(src.next_byte().unwrap(), Some(2));
        assert_eq!(src.next_byte().unwrap(), None);
        assert!(matches!(src.require_byte(), Err(OrcError::ReadPastEnd(_))));
    }

    #[test]
    fn test_position_cursor_exhaustion() {
        let mut cursor = PositionCursor::new(&[4, 0]);
        assert_eq!(cursor.next().unwrap(), 4);
        assert_eq!(cursor.remaining(), 1);
        assert_eq!(cursor.next().unwrap(), 0);
        assert!(matches!(cursor.next(), Err(OrcError::InvalidFormat(_))));
    }

    #[test]
    fn test_vec_sink_position() {
        let mut out = Vec::new();
        out.write_bytes(&[1, 2, 3]).unwrap();
        let mut positions = Vec::new();
        out.record_position(&mut positions);
        assert_eq!(positions, vec![3]);
    }
}
