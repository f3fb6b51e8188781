use super::{DELTA, DIRECT, MAX_SCOPE, PATCHED_BASE, SHORT_REPEAT};
use crate::encoding::bitpack::unpack;
use crate::encoding::bits::{
    closest_fixed_bits, decode_bit_width, read_long_be, read_vslong, read_vulong, zigzag_decode,
};
use crate::encoding::{ByteSource, IntegerDecoder};
use crate::error::{OrcError, Result};

pub struct RleV2Decoder<S> {
    source: S,
    signed: bool,
    literals: Vec<i64>,
    used: usize,
    scratch: Vec<u64>,
}

impl<S: ByteSource> RleV2Decoder<S> {
    pub fn new(source: S, signed: bool) -> Self {
        Self {
            source,
            signed,
            literals: Vec::with_capacity(MAX_SCOPE),
            used: 0,
            scratch: Vec::with_capacity(MAX_SCOPE),
        }
    }

    fn read_run(&mut self) -> Result<()> {
        let header = self
            .source
            .next_byte()?
            .ok_or_else(|| OrcError::read_past_end("integer RLE v2 stream exhausted"))?;
        self.literals.clear();
        self.used = 0;
        match header >> 6 {
            SHORT_REPEAT => self.read_short_repeat(header),
            DIRECT => self.read_direct(header),
            PATCHED_BASE => self.read_patched_base(header),
            DELTA => self.read_delta(header),
            _ => unreachable!("two-bit tag"),
        }
    }

    fn read_short_repeat(&mut self, header: u8) -> Result<()> {
        let width = (((header >> 3) & 0x07) + 1) as usize;
        let count = (header & 0x07) as usize + super::MIN_REPEAT;
        let raw = read_long_be(&mut self.source, width)?;
        let value = if self.signed {
            zigzag_decode(raw)
        } else {
            raw as i64
        };
        self.literals.resize(count, value);
        Ok(())
    }

    fn read_length(&mut self, header: u8) -> Result<usize> {
        let low = self.source.require_byte()? as usize;
        Ok((((header & 0x01) as usize) << 8) | low)
    }

    fn read_direct(&mut self, header: u8) -> Result<()> {
        let width = decode_bit_width((header >> 1) & 0x1f);
        let len = self.read_length(header)? + 1;
        self.scratch.resize(len, 0);
        unpack(&mut self.source, width, &mut self.scratch)?;
        let signed = self.signed;
        self.literals.extend(self.scratch.iter().map(|&v| {
            if signed {
                zigzag_decode(v)
            } else {
                v as i64
            }
        }));
        Ok(())
    }

    fn read_patched_base(&mut self, header: u8) -> Result<()> {
        let width = decode_bit_width((header >> 1) & 0x1f);
        let len = self.read_length(header)? + 1;

        let third = self.source.require_byte()?;
        let base_bytes = (((third >> 5) & 0x07) + 1) as usize;
        let patch_width = decode_bit_width(third & 0x1f);

        let fourth = self.source.require_byte()?;
        let gap_width = (((fourth >> 5) & 0x07) + 1) as u32;
        let patch_len = (fourth & 0x1f) as usize;
        if width + patch_width > 64 {
            return Err(OrcError::InvalidFormat(format!(
                "value width {} + patch width {} exceeds 64 bits",
                width, patch_width
            )));
        }

        // Sign lives in the MSB of the base, not in zigzag form.
        let raw_base = read_long_be(&mut self.source, base_bytes)?;
        let sign_bit = 1u64 << (base_bytes * 8 - 1);
        let base = if raw_base & sign_bit != 0 {
            -((raw_base & !sign_bit) as i64)
        } else {
            raw_base as i64
        };

        self.scratch.resize(len, 0);
        unpack(&mut self.source, width, &mut self.scratch)?;

        if patch_width + gap_width > 64 {
            return Err(OrcError::InvalidFormat(format!(
                "patch width {} + gap width {} exceeds 64 bits",
                patch_width, gap_width
            )));
        }
        let mut patches = vec![0u64; patch_len];
        unpack(
            &mut self.source,
            closest_fixed_bits(patch_width + gap_width),
            &mut patches,
        )?;

        let mut cursor = PatchCursor::new(&patches, patch_width);
        let mut next_patch = cursor.advance()?;
        for (i, &value) in self.scratch.iter().enumerate() {
            let mut value = value;
            if let Some((gap, patch)) = next_patch {
                if i == gap {
                    value |= patch << width;
                    next_patch = cursor.advance()?.map(|(g, p)| (g + i, p));
                }
            }
            self.literals.push(base.wrapping_add(value as i64));
        }
        if next_patch.is_some() {
            return Err(OrcError::InvalidFormat(
                "patch list points beyond the end of the run".into(),
            ));
        }
        Ok(())
    }

    fn read_delta(&mut self, header: u8) -> Result<()> {
        let code = (header >> 1) & 0x1f;
        let width = if code == 0 { 0 } else { decode_bit_width(code) };
        // Stored length excludes the first value.
        let len = self.read_length(header)?;

        let first = if self.signed {
            read_vslong(&mut self.source)?
        } else {
            read_vulong(&mut self.source)? as i64
        };
        self.literals.push(first);

        let delta_base = read_vslong(&mut self.source)?;
        if width == 0 {
            let mut prev = first;
            for _ in 0..len {
                prev = prev.wrapping_add(delta_base);
                self.literals.push(prev);
            }
            return Ok(());
        }

        let mut prev = first.wrapping_add(delta_base);
        self.literals.push(prev);
        let remaining = len.saturating_sub(1);
        self.scratch.resize(remaining, 0);
        unpack(&mut self.source, width, &mut self.scratch)?;
        for &magnitude in &self.scratch {
            prev = if delta_base < 0 {
                prev.wrapping_sub(magnitude as i64)
            } else {
                prev.wrapping_add(magnitude as i64)
            };
            self.literals.push(prev);
        }
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ByteSource> IntegerDecoder for RleV2Decoder<S> {
    fn read(&mut self, out: &mut [i64]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.used == self.literals.len() {
                self.read_run()?;
            }
            let n = (self.literals.len() - self.used).min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&self.literals[self.used..self.used + n]);
            self.used += n;
            filled += n;
        }
        Ok(())
    }

    fn skip(&mut self, mut count: usize) -> Result<()> {
        while count > 0 {
            if self.used == self.literals.len() {
                self.read_run()?;
            }
            let n = (self.literals.len() - self.used).min(count);
            self.used += n;
            count -= n;
        }
        Ok(())
    }
}

/// Walks a gap/patch list, folding 255-gap sentinels into the next entry.
struct PatchCursor<'a> {
    entries: &'a [u64],
    idx: usize,
    patch_width: u32,
}

impl<'a> PatchCursor<'a> {
    fn new(entries: &'a [u64], patch_width: u32) -> Self {
        Self {
            entries,
            idx: 0,
            patch_width,
        }
    }

    fn split(&self, entry: u64) -> (usize, u64) {
        let mask = if self.patch_width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.patch_width) - 1
        };
        let gap = if self.patch_width >= 64 {
            0
        } else {
            entry >> self.patch_width
        };
        (gap as usize, entry & mask)
    }

    /// Next (relative gap, patch) pair, or `None` when the list is used up.
    fn advance(&mut self) -> Result<Option<(usize, u64)>> {
        let mut gap_total = 0usize;
        loop {
            let Some(&entry) = self.entries.get(self.idx) else {
                if gap_total > 0 {
                    return Err(OrcError::InvalidFormat(
                        "patch list ends with a gap sentinel".into(),
                    ));
                }
                return Ok(None);
            };
            self.idx += 1;
            let (gap, patch) = self.split(entry);
            if gap == 255 && patch == 0 {
                gap_total += 255;
                continue;
            }
            return Ok(Some((gap_total + gap, patch)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8], signed: bool, count: usize) -> Vec<i64> {
        let mut decoder = RleV2Decoder::new(bytes, signed);
        let mut out = vec![0i64; count];
        decoder.read(&mut out).unwrap();
        out
    }

    #[test]
    fn test_short_repeat_fixture() {
        assert_eq!(decode(&[0x0a, 0x27, 0x10], false, 5), vec![10000; 5]);
    }

    #[test]
    fn test_direct_fixture() {
        let bytes = [0x5e, 0x03, 0x5c, 0xa1, 0xab, 0x1e, 0xde, 0xad, 0xbe, 0xef];
        assert_eq!(decode(&bytes, false, 4), vec![23713, 43806, 57005, 48879]);
    }

    #[test]
    fn test_delta_fixture() {
        let bytes = [0xc6, 0x09, 0x02, 0x02, 0x22, 0x42, 0x42, 0x46];
        assert_eq!(
            decode(&bytes, false, 10),
            vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]
        );
    }

    #[test]
    fn test_patched_base_fixture() {
        let bytes = [
            0x8e, 0x13, 0x2b, 0x21, 0x07, 0xd0, 0x1e, 0x00, 0x14, 0x70, 0x28, 0x32, 0x3c, 0x46,
            0x50, 0x5a, 0x64, 0x6e, 0x78, 0x82, 0x8c, 0x96, 0xa0, 0xaa, 0xb4, 0xbe, 0xfc, 0xe8,
        ];
        let mut expected = vec![2030, 2000, 2020, 1000000];
        expected.extend((2040..=2190).step_by(10));
        assert_eq!(decode(&bytes, false, 20), expected);
    }

    #[test]
    fn test_fixed_delta_run() {
        // DELTA, width 0, 4 values: first 10 (unsigned), fixed delta -3.
        let bytes = [0xc0, 0x03, 0x0a, 0x05];
        assert_eq!(decode(&bytes, false, 4), vec![10, 7, 4, 1]);
    }

    #[test]
    fn test_signed_short_repeat() {
        // zigzag(-3) = 5, one byte wide, 3 copies.
        assert_eq!(decode(&[0x00, 0x05], true, 3), vec![-3, -3, -3]);
    }

    #[test]
    fn test_truncated_run_is_fatal() {
        let mut decoder = RleV2Decoder::new(&[0x5e, 0x03, 0x5c, 0xa1][..], false);
        let mut out = [0i64; 4];
        assert!(matches!(decoder.read(&mut out), Err(OrcError::ReadPastEnd(_))));
    }

    #[test]
    fn test_reading_past_last_run_is_fatal() {
        let mut decoder = RleV2Decoder::new(&[0x0a, 0x27, 0x10][..], false);
        let mut out = [0i64; 6];
        assert!(matches!(decoder.read(&mut out), Err(OrcError::ReadPastEnd(_))));
    }

    #[test]
    fn test_patch_width_overflow_rejected() {
        // Patched base, width 8, len 1, base 1 byte, patch width 64 (code 31),
        // gap width 8, one patch.
        let bytes = [0x8e, 0x00, 0x1f, 0xe1, 0x00, 0x00];
        let mut decoder = RleV2Decoder::new(&bytes[..], false);
        assert!(matches!(decoder.next(), Err(OrcError::InvalidFormat(_))));
    }

    #[test]
    fn test_patched_value_width_overflow_rejected() {
        // Patched base, width 64, len 1, patch width 1, gap width 1, one patch.
        let bytes = [0xbe, 0x00, 0x00, 0x01, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0x01];
        let mut decoder = RleV2Decoder::new(&bytes[..], false);
        let mut out = [0i64; 1];
        assert!(matches!(decoder.read(&mut out), Err(OrcError::InvalidFormat(_))));
    }

    #[test]
    fn test_skip_across_runs() {
        let mut bytes = vec![0x0a, 0x27, 0x10];
        bytes.extend_from_slice(&[0x5e, 0x03, 0x5c, 0xa1, 0xab, 0x1e, 0xde, 0xad, 0xbe, 0xef]);
        let mut decoder = RleV2Decoder::new(&bytes[..], false);
        decoder.skip(6).unwrap();
        assert_eq!(decoder.next().unwrap(), 43806);
    }
}
