use super::byte_rle::{ByteRleDecoder, ByteRleEncoder};
use super::{ByteSink, ByteSource};
use crate::error::{OrcError, Result};

/// Booleans packed MSB-first into bytes, which are then byte-RLE encoded.
/// Used for PRESENT streams and BOOLEAN columns.
pub struct BooleanDecoder<S> {
    bytes: ByteRleDecoder<S>,
    current: u8,
    bits_left: u32,
}

impl<S: ByteSource> BooleanDecoder<S> {
    pub fn new(source: S) -> Self {
        Self {
            bytes: ByteRleDecoder::new(source),
            current: 0,
            bits_left: 0,
        }
    }

    fn load(&mut self) -> Result<()> {
        self.current = self
            .bytes
            .next()?
            .ok_or_else(|| OrcError::read_past_end("boolean stream exhausted"))?;
        self.bits_left = 8;
        Ok(())
    }

    pub fn next(&mut self) -> Result<bool> {
        if self.bits_left == 0 {
            self.load()?;
        }
        self.bits_left -= 1;
        Ok((self.current >> self.bits_left) & 1 == 1)
    }

    pub fn read(&mut self, out: &mut [bool]) -> Result<()> {
        for slot in out.iter_mut() {
            *slot = self.next()?;
        }
        Ok(())
    }

    /// Reads `out.len()` bits and returns how many were set.
    pub fn read_counting(&mut self, out: &mut [bool]) -> Result<usize> {
        let mut set = 0;
        for slot in out.iter_mut() {
            *slot = self.next()?;
            set += *slot as usize;
        }
        Ok(set)
    }

    pub fn skip(&mut self, mut count: usize) -> Result<()> {
        let buffered = (self.bits_left as usize).min(count);
        self.bits_left -= buffered as u32;
        count -= buffered;
        if count >= 8 {
            self.bytes.skip(count / 8)?;
            count %= 8;
        }
        if count > 0 {
            self.load()?;
            self.bits_left -= count as u32;
        }
        Ok(())
    }

    /// Positions the decoder from a row-index entry: whole bytes to skip in
    /// the byte-RLE layer, then bits already consumed from the next byte.
    pub fn seek(&mut self, byte_values: u64, bits: u64) -> Result<()> {
        self.bits_left = 0;
        self.bytes.skip(byte_values as usize)?;
        if bits > 8 {
            return Err(OrcError::InvalidFormat(format!(
                "boolean position has {} consumed bits",
                bits
            )));
        }
        if bits > 0 {
            self.load()?;
            self.bits_left -= bits as u32;
        }
        Ok(())
    }
}

pub struct BooleanEncoder<W> {
    bytes: ByteRleEncoder<W>,
    current: u8,
    bits_left: u32,
}

impl<W: ByteSink> BooleanEncoder<W> {
    pub fn new(sink: W) -> Self {
        Self {
            bytes: ByteRleEncoder::new(sink),
            current: 0,
            bits_left: 8,
        }
    }

    pub fn write(&mut self, value: bool) -> Result<()> {
        self.bits_left -= 1;
        if value {
            self.current |= 1 << self.bits_left;
        }
        if self.bits_left == 0 {
            self.bytes.write(self.current)?;
            self.current = 0;
            self.bits_left = 8;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.bits_left != 8 {
            self.bytes.write(self.current)?;
            self.current = 0;
            self.bits_left = 8;
        }
        self.bytes.flush()
    }

    pub fn record_position(&self, positions: &mut Vec<u64>) {
        self.bytes.record_position(positions);
        positions.push((8 - self.bits_left) as u64);
    }

    pub fn sink(&self) -> &W {
        self.bytes.sink()
    }

    pub fn sink_mut(&mut self) -> &mut W {
        self.bytes.sink_mut()
    }

    pub fn into_inner(self) -> W {
        self.bytes.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(bits: &[bool]) -> Vec<u8> {
        let mut encoder = BooleanEncoder::new(Vec::new());
        for &b in bits {
            encoder.write(b).unwrap();
        }
        encoder.flush().unwrap();
        encoder.into_inner()
    }

    #[test]
    fn test_msb_first_bits() {
        let encoded = encode(&[true, false, true]);
        // One literal byte 0b1010_0000.
        assert_eq!(encoded, vec![0xff, 0xa0]);
    }

    #[test]
    fn test_round_trip_and_count() {
        let bits: Vec<bool> = (0..1000).map(|i| i % 3 != 0).collect();
        let encoded = encode(&bits);
        let mut decoder = BooleanDecoder::new(&encoded[..]);
        let mut out = vec![false; bits.len()];
        let set = decoder.read_counting(&mut out).unwrap();
        assert_eq!(out, bits);
        assert_eq!(set, bits.iter().filter(|b| **b).count());
    }

    #[test]
    fn test_skip_within_and_across_bytes() {
        let bits: Vec<bool> = (0..64).map(|i| i % 5 == 0).collect();
        let encoded = encode(&bits);
        let mut decoder = BooleanDecoder::new(&encoded[..]);
        decoder.skip(3).unwrap();
        assert_eq!(decoder.next().unwrap(), bits[3]);
        decoder.skip(20).unwrap();
        assert_eq!(decoder.next().unwrap(), bits[24]);
        decoder.skip(30).unwrap();
        assert_eq!(decoder.next().unwrap(), bits[55]);
    }

    #[test]
    fn test_seek_from_position() {
        let bits: Vec<bool> = (0..40).map(|i| i % 2 == 1).collect();
        let mut encoder = BooleanEncoder::new(Vec::new());
        let mut positions = Vec::new();
        for (i, &b) in bits.iter().enumerate() {
            if i == 19 {
                encoder.record_position(&mut positions);
            }
            encoder.write(b).unwrap();
        }
        encoder.flush().unwrap();
        let encoded = encoder.into_inner();
        // Two bytes buffered in the RLE layer, three bits into the third.
        assert_eq!(positions, vec![0, 2, 3]);

        let mut decoder = BooleanDecoder::new(&encoded[positions[0] as usize..]);
        decoder.seek(positions[1], positions[2]).unwrap();
        let mut rest = vec![false; 21];
        decoder.read(&mut rest).unwrap();
        assert_eq!(rest, bits[19..].to_vec());
    }
}
