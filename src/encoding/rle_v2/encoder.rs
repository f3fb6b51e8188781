use super::{DELTA, DIRECT, MAX_SCOPE, MAX_SHORT_REPEAT, MIN_REPEAT, PATCHED_BASE, SHORT_REPEAT};
use crate::encoding::bitpack::pack;
use crate::encoding::bits::{
    closest_fixed_bits, encode_bit_width, find_closest_num_bits, is_safe_subtract,
    percentile_bits, write_long_be, write_vslong, write_vulong, zigzag_encode, BitPacking,
};
use crate::encoding::ByteSink;
use crate::error::Result;

/// Bases at or above this magnitude cannot be stored in a patched-base
/// header together with the sign bit.
const BASE_VALUE_LIMIT: u64 = 1 << 56;

/// The sub-encoding picked for the buffered literals.
#[derive(Debug)]
enum Run {
    ShortRepeat,
    Direct { width: u32 },
    Delta { fixed_delta: Option<i64>, width: u32 },
    PatchedBase(PatchPlan),
}

#[derive(Debug)]
struct PatchPlan {
    base: i64,
    width: u32,
    patch_width: u32,
    gap_width: u32,
    gap_patch_list: Vec<u64>,
}

pub struct RleV2Encoder<W> {
    sink: W,
    signed: bool,
    packing: BitPacking,
    literals: Vec<i64>,
    num_literals: usize,
    prev_delta: i64,
    fixed_run_length: usize,
    variable_run_length: usize,
    zigzag_literals: Vec<u64>,
    base_reduced: Vec<u64>,
    adj_deltas: Vec<u64>,
}

impl<W: ByteSink> RleV2Encoder<W> {
    pub fn new(sink: W, signed: bool) -> Self {
        Self::with_packing(sink, signed, BitPacking::Nearest)
    }

    pub fn with_packing(sink: W, signed: bool, packing: BitPacking) -> Self {
        Self {
            sink,
            signed,
            packing,
            literals: vec![0; MAX_SCOPE],
            num_literals: 0,
            prev_delta: 0,
            fixed_run_length: 0,
            variable_run_length: 0,
            zigzag_literals: vec![0; MAX_SCOPE],
            base_reduced: vec![0; MAX_SCOPE],
            adj_deltas: vec![0; MAX_SCOPE],
        }
    }

    fn init_literals(&mut self, value: i64) {
        self.literals[0] = value;
        self.num_literals = 1;
        self.fixed_run_length = 1;
        self.variable_run_length = 1;
    }

    fn push(&mut self, value: i64) {
        self.literals[self.num_literals] = value;
        self.num_literals += 1;
    }

    pub fn write(&mut self, value: i64) -> Result<()> {
        if self.num_literals == 0 {
            self.init_literals(value);
            return Ok(());
        }

        if self.num_literals == 1 {
            self.prev_delta = value.wrapping_sub(self.literals[0]);
            self.push(value);
            if value == self.literals[0] {
                self.fixed_run_length = 2;
                self.variable_run_length = 0;
            } else {
                self.fixed_run_length = 0;
                self.variable_run_length = 2;
            }
            return Ok(());
        }

        let current_delta = value.wrapping_sub(self.literals[self.num_literals - 1]);
        if self.prev_delta == 0 && current_delta == 0 {
            self.push(value);
            if self.variable_run_length > 0 {
                self.fixed_run_length = 2;
            }
            self.fixed_run_length += 1;

            // A repeat just formed at the tail of a variable run: flush the
            // variable part and carry the repeated values over.
            if self.fixed_run_length >= MIN_REPEAT && self.variable_run_length > 0 {
                self.num_literals -= MIN_REPEAT;
                self.variable_run_length -= MIN_REPEAT - 1;
                let mut tail = [0i64; MIN_REPEAT];
                tail.copy_from_slice(
                    &self.literals[self.num_literals..self.num_literals + MIN_REPEAT],
                );
                let run = self.determine_encoding();
                self.write_run(run)?;
                for v in tail {
                    self.push(v);
                }
            }

            if self.fixed_run_length == MAX_SCOPE {
                let run = self.determine_encoding();
                self.write_run(run)?;
            }
            return Ok(());
        }

        if self.fixed_run_length >= MIN_REPEAT {
            let run = if self.fixed_run_length <= MAX_SHORT_REPEAT {
                Run::ShortRepeat
            } else {
                Run::Delta {
                    fixed_delta: Some(0),
                    width: 0,
                }
            };
            self.write_run(run)?;
        }

        if self.fixed_run_length > 0
            && self.fixed_run_length < MIN_REPEAT
            && value != self.literals[self.num_literals - 1]
        {
            self.variable_run_length = self.fixed_run_length;
            self.fixed_run_length = 0;
        }

        if self.num_literals == 0 {
            self.init_literals(value);
        } else {
            self.prev_delta = value.wrapping_sub(self.literals[self.num_literals - 1]);
            self.push(value);
            self.variable_run_length += 1;
            if self.variable_run_length == MAX_SCOPE {
                let run = self.determine_encoding();
                self.write_run(run)?;
            }
        }
        Ok(())
    }

    pub fn write_all(&mut self, values: &[i64]) -> Result<()> {
        for &v in values {
            self.write(v)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.num_literals == 0 {
            return Ok(());
        }
        if self.variable_run_length != 0 {
            let run = self.determine_encoding();
            self.write_run(run)
        } else if self.fixed_run_length != 0 {
            if self.fixed_run_length < MIN_REPEAT {
                self.variable_run_length = self.fixed_run_length;
                let run = self.determine_encoding();
                self.write_run(run)
            } else if self.fixed_run_length <= MAX_SHORT_REPEAT {
                self.write_run(Run::ShortRepeat)
            } else {
                self.write_run(Run::Delta {
                    fixed_delta: Some(0),
                    width: 0,
                })
            }
        } else {
            Ok(())
        }
    }

    /// Sink position followed by the count of values not yet emitted.
    pub fn record_position(&self, positions: &mut Vec<u64>) {
        self.sink.record_position(positions);
        positions.push(self.num_literals as u64);
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn determine_encoding(&mut self) -> Run {
        let n = self.num_literals;
        for i in 0..n {
            self.zigzag_literals[i] = if self.signed {
                zigzag_encode(self.literals[i])
            } else {
                self.literals[i] as u64
            };
        }
        let zz_bits_100p = percentile_bits(&self.zigzag_literals[..n], 1.0);

        if n <= MIN_REPEAT {
            return Run::Direct {
                width: zz_bits_100p,
            };
        }

        let mut is_increasing = true;
        let mut is_decreasing = true;
        let mut is_fixed_delta = true;
        let mut min = self.literals[0];
        let mut max = self.literals[0];
        let initial_delta = self.literals[1].wrapping_sub(self.literals[0]);
        let mut current_delta = 0i64;
        let mut delta_max = 0u64;
        for i in 1..n {
            let l1 = self.literals[i];
            let l0 = self.literals[i - 1];
            current_delta = l1.wrapping_sub(l0);
            min = min.min(l1);
            max = max.max(l1);
            is_increasing &= l0 <= l1;
            is_decreasing &= l0 >= l1;
            is_fixed_delta &= current_delta == initial_delta;
            if i > 1 {
                self.adj_deltas[i - 1] = current_delta.unsigned_abs();
                delta_max = delta_max.max(self.adj_deltas[i - 1]);
            }
        }

        if !is_safe_subtract(max, min) {
            return Run::Direct {
                width: zz_bits_100p,
            };
        }

        if min == max {
            return Run::Delta {
                fixed_delta: Some(0),
                width: 0,
            };
        }

        if is_fixed_delta {
            return Run::Delta {
                fixed_delta: Some(current_delta),
                width: 0,
            };
        }

        // A zero first delta leaves the direction of the run unknown.
        if initial_delta != 0 && (is_increasing || is_decreasing) {
            return Run::Delta {
                fixed_delta: None,
                width: find_closest_num_bits(delta_max),
            };
        }

        let zz_bits_90p = percentile_bits(&self.zigzag_literals[..n], 0.9);
        if zz_bits_100p.saturating_sub(zz_bits_90p) <= 1 {
            return Run::Direct {
                width: zz_bits_100p,
            };
        }

        for i in 0..n {
            self.base_reduced[i] = self.literals[i].wrapping_sub(min) as u64;
        }
        let br_bits_95p = percentile_bits(&self.base_reduced[..n], 0.95);
        let br_bits_100p = percentile_bits(&self.base_reduced[..n], 1.0);
        if br_bits_100p != br_bits_95p && min.unsigned_abs() < BASE_VALUE_LIMIT {
            Run::PatchedBase(self.prepare_patches(min, br_bits_95p, br_bits_100p))
        } else {
            Run::Direct {
                width: zz_bits_100p,
            }
        }
    }

    /// Strips the bits above the 95th-percentile width off the base-reduced
    /// literals and records them as (gap, patch) entries.
    fn prepare_patches(&mut self, base: i64, br_bits_95p: u32, br_bits_100p: u32) -> PatchPlan {
        let n = self.num_literals;
        let mut width = br_bits_95p;
        let mut patch_width = closest_fixed_bits(br_bits_100p - br_bits_95p);
        // Gap and patch must share one 64-bit entry.
        if patch_width == 64 {
            patch_width = 56;
            width = 8;
        }
        let mask = (1u64 << width) - 1;

        let mut gaps = Vec::new();
        let mut patches = Vec::new();
        let mut prev = 0usize;
        let mut max_gap = 0usize;
        for i in 0..n {
            if self.base_reduced[i] > mask {
                let gap = i - prev;
                max_gap = max_gap.max(gap);
                prev = i;
                gaps.push(gap as u64);
                patches.push(self.base_reduced[i] >> width);
                self.base_reduced[i] &= mask;
            }
        }

        let gap_width = if max_gap == 0 && !gaps.is_empty() {
            1
        } else {
            find_closest_num_bits(max_gap as u64).min(8)
        };

        let mut gap_patch_list = Vec::with_capacity(gaps.len() + 2);
        for (mut gap, patch) in gaps.into_iter().zip(patches) {
            while gap > 255 {
                gap_patch_list.push(255u64 << patch_width);
                gap -= 255;
            }
            gap_patch_list.push((gap << patch_width) | patch);
        }

        PatchPlan {
            base,
            width,
            patch_width,
            gap_width,
            gap_patch_list,
        }
    }

    fn write_length_header(&mut self, tag: u8, width_code: u8, len: usize) -> Result<()> {
        self.sink
            .write_byte((tag << 6) | (width_code << 1) | ((len >> 8) & 0x01) as u8)?;
        self.sink.write_byte((len & 0xff) as u8)
    }

    fn write_run(&mut self, run: Run) -> Result<()> {
        let n = self.num_literals;
        if n == 0 {
            return Ok(());
        }
        match run {
            Run::ShortRepeat => {
                let value = if self.signed {
                    zigzag_encode(self.literals[0])
                } else {
                    self.literals[0] as u64
                };
                let bytes = find_closest_num_bits(value).div_ceil(8) as usize;
                let header = (SHORT_REPEAT << 6) | (((bytes - 1) as u8) << 3) | (n - MIN_REPEAT) as u8;
                self.sink.write_byte(header)?;
                write_long_be(&mut self.sink, value, bytes)?;
                self.fixed_run_length = 0;
            }
            Run::Direct { width } => {
                let width = self.packing.round(width);
                self.write_length_header(DIRECT, encode_bit_width(width), n - 1)?;
                pack(&mut self.sink, width, &self.zigzag_literals[..n])?;
                self.variable_run_length = 0;
            }
            Run::Delta { fixed_delta, width } => {
                let width_code = match fixed_delta {
                    Some(_) => 0,
                    None => {
                        let mut width = self.packing.round(width);
                        // Code 0 means "fixed delta", so 1-bit deltas use 2 bits.
                        if width == 1 {
                            width = 2;
                        }
                        encode_bit_width(width)
                    }
                };
                self.write_length_header(DELTA, width_code, n - 1)?;
                if self.signed {
                    write_vslong(&mut self.sink, self.literals[0])?;
                } else {
                    write_vulong(&mut self.sink, self.literals[0] as u64)?;
                }
                match fixed_delta {
                    Some(delta) => {
                        write_vslong(&mut self.sink, delta)?;
                        if self.fixed_run_length > MIN_REPEAT {
                            self.fixed_run_length = 0;
                        } else {
                            self.variable_run_length = 0;
                        }
                    }
                    None => {
                        let initial_delta = self.literals[1].wrapping_sub(self.literals[0]);
                        write_vslong(&mut self.sink, initial_delta)?;
                        let width = crate::encoding::bits::decode_bit_width(width_code);
                        pack(&mut self.sink, width, &self.adj_deltas[1..n - 1])?;
                        self.variable_run_length = 0;
                    }
                }
            }
            Run::PatchedBase(plan) => {
                self.write_length_header(PATCHED_BASE, encode_bit_width(plan.width), n - 1)?;

                let is_negative = plan.base < 0;
                let mut base = plan.base.unsigned_abs();
                let base_width = find_closest_num_bits(base) + 1;
                let base_bytes = base_width.div_ceil(8) as usize;
                if is_negative {
                    base |= 1u64 << (base_bytes * 8 - 1);
                }
                self.sink
                    .write_byte((((base_bytes - 1) as u8) << 5) | encode_bit_width(plan.patch_width))?;
                self.sink.write_byte(
                    (((plan.gap_width - 1) as u8) << 5) | plan.gap_patch_list.len() as u8,
                )?;
                write_long_be(&mut self.sink, base, base_bytes)?;

                pack(
                    &mut self.sink,
                    closest_fixed_bits(plan.width),
                    &self.base_reduced[..n],
                )?;
                pack(
                    &mut self.sink,
                    closest_fixed_bits(plan.gap_width + plan.patch_width),
                    &plan.gap_patch_list,
                )?;
                self.variable_run_length = 0;
            }
        }
        self.num_literals = 0;
        self.prev_delta = 0;
        Ok(())
    }
}
