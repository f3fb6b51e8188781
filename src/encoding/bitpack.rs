use super::{ByteSink, ByteSource};
use crate::error::Result;

/// Leftover-bit state for reading MSB-first packed integers.
///
/// The byte source is passed to every call instead of being owned, so one
/// cursor can be carried across several reads of the same run.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitReader {
    current: u8,
    bits_left: u32,
}

impl BitReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read<S: ByteSource>(&mut self, src: &mut S, width: u32) -> Result<u64> {
        let mut result = 0u64;
        let mut to_read = width;
        while to_read > self.bits_left {
            if self.bits_left > 0 {
                result = (result << self.bits_left)
                    | (self.current as u64 & ((1u64 << self.bits_left) - 1));
            }
            to_read -= self.bits_left;
            self.current = src.require_byte()?;
            self.bits_left = 8;
        }
        if to_read > 0 {
            self.bits_left -= to_read;
            result = (result << to_read)
                | ((self.current as u64 >> self.bits_left) & ((1u64 << to_read) - 1));
        }
        Ok(result)
    }

    /// Drops the remainder of a partially consumed byte.
    pub fn align(&mut self) {
        self.bits_left = 0;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BitWriter {
    current: u8,
    bits_left: u32,
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            current: 0,
            bits_left: 8,
        }
    }

    pub fn write<S: ByteSink>(&mut self, out: &mut S, value: u64, width: u32) -> Result<()> {
        let mut value = if width >= 64 {
            value
        } else {
            value & ((1u64 << width) - 1)
        };
        let mut to_write = width;
        while to_write > self.bits_left {
            self.current |= (value >> (to_write - self.bits_left)) as u8;
            to_write -= self.bits_left;
            value &= (1u64 << to_write) - 1;
            out.write_byte(self.current)?;
            self.current = 0;
            self.bits_left = 8;
        }
        self.bits_left -= to_write;
        self.current |= (value << self.bits_left) as u8;
        if self.bits_left == 0 {
            out.write_byte(self.current)?;
            self.current = 0;
            self.bits_left = 8;
        }
        Ok(())
    }

    pub fn flush<S: ByteSink>(&mut self, out: &mut S) -> Result<()> {
        if self.bits_left != 8 {
            out.write_byte(self.current)?;
            self.current = 0;
            self.bits_left = 8;
        }
        Ok(())
    }
}

/// Unpacks `out.len()` values of `width` bits starting on a byte boundary.
/// A width of zero yields zeros without touching the source.
pub fn unpack<S: ByteSource>(src: &mut S, width: u32, out: &mut [u64]) -> Result<()> {
    if width == 0 {
        out.iter_mut().for_each(|v| *v = 0);
        return Ok(());
    }
    let mut reader = BitReader::new();
    for slot in out.iter_mut() {
        *slot = reader.read(src, width)?;
    }
    Ok(())
}

/// Packs `values` at `width` bits and pads the final byte.
pub fn pack<S: ByteSink>(out: &mut S, width: u32, values: &[u64]) -> Result<()> {
    if width == 0 || values.is_empty() {
        return Ok(());
    }
    let mut writer = BitWriter::new();
    for &value in values {
        writer.write(out, value, width)?;
    }
    writer.flush(out)
}
