use super::bits::{read_vslong, read_vulong};
use super::{ByteSource, IntegerDecoder};
use crate::error::{OrcError, Result};

const MIN_REPEAT: usize = 3;
const MAX_LITERAL: usize = 128;

/// Decoder for the original integer RLE used by the DIRECT and DICTIONARY
/// column encodings.
pub struct RleV1Decoder<S> {
    source: S,
    signed: bool,
    literals: [i64; MAX_LITERAL],
    num_literals: usize,
    used: usize,
    repeat: bool,
    delta: i64,
}

impl<S: ByteSource> RleV1Decoder<S> {
    pub fn new(source: S, signed: bool) -> Self {
        Self {
            source,
            signed,
            literals: [0; MAX_LITERAL],
            num_literals: 0,
            used: 0,
            repeat: false,
            delta: 0,
        }
    }

    fn read_value(&mut self) -> Result<i64> {
        if self.signed {
            read_vslong(&mut self.source)
        } else {
            read_vulong(&mut self.source).map(|v| v as i64)
        }
    }

    fn read_run(&mut self) -> Result<()> {
        let control = self
            .source
            .next_byte()?
            .ok_or_else(|| OrcError::read_past_end("integer RLE v1 stream exhausted"))?;
        self.used = 0;
        if control < 0x80 {
            self.repeat = true;
            self.num_literals = control as usize + MIN_REPEAT;
            self.delta = self.source.require_byte()? as i8 as i64;
            self.literals[0] = self.read_value()?;
        } else {
            self.repeat = false;
            self.num_literals = 0x100 - control as usize;
            for i in 0..self.num_literals {
                self.literals[i] = self.read_value()?;
            }
        }
        Ok(())
    }
}

impl<S: ByteSource> IntegerDecoder for RleV1Decoder<S> {
    fn read(&mut self, out: &mut [i64]) -> Result<()> {
        for slot in out.iter_mut() {
            if self.used == self.num_literals {
                self.read_run()?;
            }
            *slot = if self.repeat {
                self.literals[0].wrapping_add(self.used as i64 * self.delta)
            } else {
                self.literals[self.used]
            };
            self.used += 1;
        }
        Ok(())
    }

    fn skip(&mut self, mut count: usize) -> Result<()> {
        while count > 0 {
            if self.used == self.num_literals {
                self.read_run()?;
            }
            let n = (self.num_literals - self.used).min(count);
            self.used += n;
            count -= n;
        }
        Ok(())
    }
}
