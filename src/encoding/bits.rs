use super::{ByteSink, ByteSource};
use crate::error::{OrcError, Result};

/// Widths that can be written in a 5-bit width code, indexed by code - 24.
const WIDE_WIDTHS: [u32; 8] = [26, 28, 30, 32, 40, 48, 56, 64];

/// Chooses how the RLE v2 writer rounds a bit width for DIRECT and DELTA
/// runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitPacking {
    /// Smallest encodable width >= the requested width.
    #[default]
    Nearest,
    /// Widths that pack evenly into bytes (1, 2, 4, 8, 16, 24, ...).
    Aligned,
}

impl BitPacking {
    pub fn round(self, bits: u32) -> u32 {
        match self {
            BitPacking::Nearest => closest_fixed_bits(bits),
            BitPacking::Aligned => closest_aligned_fixed_bits(bits),
        }
    }
}

#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[inline]
pub fn zigzag_encode_i128(value: i128) -> u128 {
    ((value << 1) ^ (value >> 127)) as u128
}

#[inline]
pub fn zigzag_decode_i128(value: u128) -> i128 {
    ((value >> 1) as i128) ^ -((value & 1) as i128)
}

pub fn write_vulong<S: ByteSink>(out: &mut S, mut value: u64) -> Result<()> {
    while value >= 0x80 {
        out.write_byte((value as u8 & 0x7f) | 0x80)?;
        value >>= 7;
    }
    out.write_byte(value as u8)
}

pub fn write_vslong<S: ByteSink>(out: &mut S, value: i64) -> Result<()> {
    write_vulong(out, zigzag_encode(value))
}

pub fn read_vulong<S: ByteSource>(src: &mut S) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = src.require_byte()?;
        if shift >= 64 || (shift == 63 && byte & 0x7e != 0) {
            return Err(OrcError::InvalidFormat("Varint too long".into()));
        }
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

pub fn read_vslong<S: ByteSource>(src: &mut S) -> Result<i64> {
    read_vulong(src).map(zigzag_decode)
}

pub fn write_vu128<S: ByteSink>(out: &mut S, mut value: u128) -> Result<()> {
    while value >= 0x80 {
        out.write_byte((value as u8 & 0x7f) | 0x80)?;
        value >>= 7;
    }
    out.write_byte(value as u8)
}

pub fn write_vs128<S: ByteSink>(out: &mut S, value: i128) -> Result<()> {
    write_vu128(out, zigzag_encode_i128(value))
}

pub fn read_vs128<S: ByteSource>(src: &mut S) -> Result<i128> {
    let mut result = 0u128;
    let mut shift = 0u32;
    loop {
        let byte = src.require_byte()?;
        if shift >= 128 {
            return Err(OrcError::InvalidFormat("Decimal varint too long".into()));
        }
        result |= ((byte & 0x7f) as u128) << shift;
        if byte & 0x80 == 0 {
            return Ok(zigzag_decode_i128(result));
        }
        shift += 7;
    }
}

/// Reads `width` bytes as a big-endian unsigned value.
pub fn read_long_be<S: ByteSource>(src: &mut S, width: usize) -> Result<u64> {
    let mut result = 0u64;
    for _ in 0..width {
        result = (result << 8) | src.require_byte()? as u64;
    }
    Ok(result)
}

pub fn write_long_be<S: ByteSink>(out: &mut S, value: u64, width: usize) -> Result<()> {
    for i in (0..width).rev() {
        out.write_byte((value >> (i * 8)) as u8)?;
    }
    Ok(())
}

/// Maps a 5-bit width code to a bit width.
pub fn decode_bit_width(code: u8) -> u32 {
    let code = (code & 0x1f) as u32;
    if code < 24 {
        code + 1
    } else {
        WIDE_WIDTHS[(code - 24) as usize]
    }
}

/// Inverse of [`decode_bit_width`], after rounding `bits` to the nearest
/// encodable width.
pub fn encode_bit_width(bits: u32) -> u8 {
    let bits = closest_fixed_bits(bits);
    if bits <= 24 {
        (bits - 1) as u8
    } else {
        let idx = WIDE_WIDTHS.iter().position(|&w| w == bits).unwrap_or(7);
        (24 + idx) as u8
    }
}

pub fn closest_fixed_bits(bits: u32) -> u32 {
    match bits {
        0 => 1,
        1..=24 => bits,
        _ => WIDE_WIDTHS
            .iter()
            .copied()
            .find(|&w| w >= bits)
            .unwrap_or(64),
    }
}

pub fn closest_aligned_fixed_bits(bits: u32) -> u32 {
    match bits {
        0 | 1 => 1,
        2 => 2,
        3..=4 => 4,
        5..=8 => 8,
        9..=16 => 16,
        17..=24 => 24,
        25..=32 => 32,
        33..=40 => 40,
        41..=48 => 48,
        49..=56 => 56,
        _ => 64,
    }
}

/// Number of significant bits in `value`, rounded up to an encodable width.
pub fn find_closest_num_bits(value: u64) -> u32 {
    closest_fixed_bits(64 - value.leading_zeros())
}

/// Bit width needed so that the `p` fraction of `data` fits without
/// patching; `p` is in (0, 1].
pub fn percentile_bits(data: &[u64], p: f64) -> u32 {
    if !(p > 0.0 && p <= 1.0) || data.is_empty() {
        return 0;
    }
    let mut hist = [0usize; 32];
    for &value in data {
        hist[encode_bit_width(find_closest_num_bits(value)) as usize] += 1;
    }
    let mut remaining = (data.len() as f64 * (1.0 - p)) as i64;
    for code in (0..hist.len()).rev() {
        remaining -= hist[code] as i64;
        if remaining < 0 {
            return decode_bit_width(code as u8);
        }
    }
    0
}

#[inline]
pub fn is_safe_subtract(left: i64, right: i64) -> bool {
    left.checked_sub(right).is_some()
}
