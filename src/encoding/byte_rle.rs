use super::{ByteSink, ByteSource};
use crate::error::{OrcError, Result};

const MIN_REPEAT: usize = 3;
const MAX_LITERAL: usize = 128;
const MAX_REPEAT: usize = 127 + MIN_REPEAT;

pub struct ByteRleDecoder<S> {
    source: S,
    literals: [u8; MAX_LITERAL],
    num_literals: usize,
    used: usize,
    repeat: bool,
}

impl<S: ByteSource> ByteRleDecoder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            literals: [0; MAX_LITERAL],
            num_literals: 0,
            used: 0,
            repeat: false,
        }
    }

    /// Loads the next run. Returns `false` at a clean end of data.
    fn read_run(&mut self) -> Result<bool> {
        let control = match self.source.next_byte()? {
            Some(c) => c,
            None => return Ok(false),
        };
        self.used = 0;
        if control < 0x80 {
            self.repeat = true;
            self.num_literals = control as usize + MIN_REPEAT;
            self.literals[0] = self.source.require_byte()?;
        } else {
            self.repeat = false;
            self.num_literals = 0x100 - control as usize;
            self.source
                .read_exact_into(&mut self.literals[..self.num_literals])?;
        }
        Ok(true)
    }

    pub fn next(&mut self) -> Result<Option<u8>> {
        if self.used == self.num_literals && !self.read_run()? {
            return Ok(None);
        }
        let value = if self.repeat {
            self.literals[0]
        } else {
            self.literals[self.used]
        };
        self.used += 1;
        Ok(Some(value))
    }

    /// Fills `out` completely; running out of runs is a truncation error.
    pub fn read(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.used == self.num_literals && !self.read_run()? {
                return Err(OrcError::read_past_end(format!(
                    "byte RLE stream ended after {} of {} values",
                    filled,
                    out.len()
                )));
            }
            let n = (self.num_literals - self.used).min(out.len() - filled);
            if self.repeat {
                out[filled..filled + n].fill(self.literals[0]);
            } else {
                out[filled..filled + n]
                    .copy_from_slice(&self.literals[self.used..self.used + n]);
            }
            self.used += n;
            filled += n;
        }
        Ok(())
    }

    pub fn skip(&mut self, mut count: usize) -> Result<()> {
        while count > 0 {
            if self.used == self.num_literals && !self.read_run()? {
                return Err(OrcError::read_past_end("byte RLE skip past end of stream"));
            }
            let n = (self.num_literals - self.used).min(count);
            self.used += n;
            count -= n;
        }
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

pub struct ByteRleEncoder<W> {
    sink: W,
    literals: [u8; MAX_LITERAL],
    num_literals: usize,
    repeat: bool,
    tail_run_length: usize,
}

impl<W: ByteSink> ByteRleEncoder<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            literals: [0; MAX_LITERAL],
            num_literals: 0,
            repeat: false,
            tail_run_length: 0,
        }
    }

    fn write_values(&mut self) -> Result<()> {
        if self.num_literals != 0 {
            if self.repeat {
                self.sink
                    .write_byte((self.num_literals - MIN_REPEAT) as u8)?;
                self.sink.write_byte(self.literals[0])?;
            } else {
                self.sink
                    .write_byte((0x100 - self.num_literals) as u8)?;
                self.sink
                    .write_bytes(&self.literals[..self.num_literals])?;
            }
            self.repeat = false;
            self.tail_run_length = 0;
            self.num_literals = 0;
        }
        Ok(())
    }

    pub fn write(&mut self, value: u8) -> Result<()> {
        if self.num_literals == 0 {
            self.literals[0] = value;
            self.num_literals = 1;
            self.tail_run_length = 1;
        } else if self.repeat {
            if value == self.literals[0] {
                self.num_literals += 1;
                if self.num_literals == MAX_REPEAT {
                    self.write_values()?;
                }
            } else {
                self.write_values()?;
                self.literals[0] = value;
                self.num_literals = 1;
                self.tail_run_length = 1;
            }
        } else {
            if value == self.literals[self.num_literals - 1] {
                self.tail_run_length += 1;
            } else {
                self.tail_run_length = 1;
            }
            if self.tail_run_length == MIN_REPEAT {
                if self.num_literals + 1 == MIN_REPEAT {
                    self.repeat = true;
                    self.num_literals += 1;
                } else {
                    // Cut the literal run just before the two bytes that
                    // started the repeat.
                    self.num_literals -= MIN_REPEAT - 1;
                    self.write_values()?;
                    self.literals[0] = value;
                    self.repeat = true;
                    self.num_literals = MIN_REPEAT;
                }
            } else {
                self.literals[self.num_literals] = value;
                self.num_literals += 1;
                if self.num_literals == MAX_LITERAL {
                    self.write_values()?;
                }
            }
        }
        Ok(())
    }

    pub fn write_all(&mut self, values: &[u8]) -> Result<()> {
        for &v in values {
            self.write(v)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.write_values()
    }

    /// Sink position followed by the number of buffered values.
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<u8> {
        let mut decoder = ByteRleDecoder::new(bytes);
        let mut out = Vec::new();
        while let Some(b) = decoder.next().unwrap() {
            out.push(b);
        }
        out
    }

    fn encode(values: &[u8]) -> Vec<u8> {
        let mut encoder = ByteRleEncoder::new(Vec::new());
        encoder.write_all(values).unwrap();
        encoder.flush().unwrap();
        encoder.into_inner()
    }

    #[test]
    fn test_repeat_run() {
        assert_eq!(decode_all(&[0x61, 0x00]), vec![0u8; 100]);
    }

    #[test]
    fn test_literal_run() {
        assert_eq!(decode_all(&[0xfe, 0x44, 0x45]), vec![0x44, 0x45]);
    }

    #[test]
    fn test_reencode_is_byte_identical() {
        let fixtures: Vec<Vec<u8>> = vec![
            vec![0x61, 0x00],
            vec![0xfe, 0x44, 0x45],
            vec![0xfd, 0x01, 0x02, 0x03, 0x02, 0x07, 0xff, 0x09],
            vec![0x7f, 0x11, 0x7f, 0x11, 0x00, 0x12],
        ];
        for encoded in fixtures {
            let decoded = decode_all(&encoded);
            assert_eq!(encode(&decoded), encoded);
        }
    }

    #[test]
    fn test_literal_stops_before_repeat() {
        // 1,2 literal then 5,5,5 repeat.
        let encoded = encode(&[1, 2, 5, 5, 5]);
        assert_eq!(encoded, vec![0xfe, 1, 2, 0x00, 5]);
    }

    #[test]
    fn test_long_literal_splits_at_128() {
        let values: Vec<u8> = (0..200).map(|i| i as u8).collect();
        let encoded = encode(&values);
        assert_eq!(encoded[0], 0x80);
        assert_eq!(encoded[129], (0x100 - 72) as u8);
        assert_eq!(decode_all(&encoded), values);
    }

    #[test]
    fn test_truncated_literal_is_fatal() {
        let mut decoder = ByteRleDecoder::new(&[0xfd, 0x01][..]);
        assert!(matches!(decoder.next(), Err(OrcError::ReadPastEnd(_))));
    }

    #[test]
    fn test_read_and_skip() {
        let encoded = encode(&[9, 9, 9, 9, 1, 2, 3]);
        let mut decoder = ByteRleDecoder::new(&encoded[..]);
        decoder.skip(3).unwrap();
        let mut out = [0u8; 4];
        decoder.read(&mut out).unwrap();
        assert_eq!(out, [9, 1, 2, 3]);
        assert!(decoder.read(&mut out[..1]).is_err());
    }

    #[test]
    fn test_position_counts_buffered() {
        let mut encoder = ByteRleEncoder::new(Vec::new());
        encoder.write_all(&[4, 4]).unwrap();
        let mut positions = Vec::new();
        encoder.record_position(&mut positions);
        assert_eq!(positions, vec![0, 2]);
    }
}
