//! Per-type column decoders over one stripe's streams.

use chrono::{DateTime, NaiveDateTime};

use super::buffer::{BufferPool, ColumnBuffer, TypedBuffer};
use super::stripe::StripeReader;
use crate::compression::BlockStream;
use crate::encoding::bits::read_vs128;
use crate::encoding::{
    BooleanDecoder, ByteRleDecoder, ByteSource, IntegerDecoder, PositionCursor, RleV1Decoder,
    RleV2Decoder,
};
use crate::error::{OrcError, Result};
use crate::proto::{ColumnEncodingKind, StreamKind};
use crate::schema::DataType;
use crate::table::{date_from_days, Decimal};

/// Seconds from the Unix epoch to 2015-01-01 00:00:00 UTC, the origin of
/// timestamp DATA streams.
pub const TIMESTAMP_BASE_SECONDS: i64 = 1_420_070_400;

/// Decodes a SECONDARY nanosecond value: the low three bits count stripped
/// trailing zeros, minus one.
pub fn decode_nanos(encoded: u64) -> u32 {
    let zeros = (encoded & 7) as u32;
    let mut nanos = encoded >> 3;
    if zeros != 0 {
        nanos *= 10u64.pow(zeros + 1);
    }
    nanos as u32
}

/// Inverse of [`decode_nanos`].
pub fn encode_nanos(nanos: u32) -> u64 {
    if nanos == 0 {
        return 0;
    }
    if nanos % 100 != 0 {
        return (nanos as u64) << 3;
    }
    let mut value = nanos as u64 / 100;
    let mut zeros = 1;
    while value % 10 == 0 && zeros < 7 {
        value /= 10;
        zeros += 1;
    }
    (value << 3) | zeros
}

/// Rebuilds a timestamp from the stored seconds and nanos.
pub fn timestamp_from_parts(stored_seconds: i64, nanos: u32) -> Result<NaiveDateTime> {
    let mut seconds = stored_seconds + TIMESTAMP_BASE_SECONDS;
    if seconds < 0 && nanos > 999_999 {
        seconds -= 1;
    }
    DateTime::from_timestamp(seconds, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| {
            OrcError::InvalidFormat(format!("timestamp {}s {}ns out of range", seconds, nanos))
        })
}

type IntStream<'a> = Box<dyn IntegerDecoder + 'a>;

fn int_decoder<'a>(
    stream: BlockStream<'a>,
    signed: bool,
    encoding: ColumnEncodingKind,
) -> IntStream<'a> {
    if encoding.is_v2() {
        Box::new(RleV2Decoder::new(stream, signed))
    } else {
        Box::new(RleV1Decoder::new(stream, signed))
    }
}

enum Values<'a> {
    Boolean(BooleanDecoder<BlockStream<'a>>),
    Byte(ByteRleDecoder<BlockStream<'a>>),
    Integer(IntStream<'a>),
    Float(BlockStream<'a>),
    Double(BlockStream<'a>),
    Direct {
        data: BlockStream<'a>,
        lengths: IntStream<'a>,
        utf8: bool,
    },
    Dictionary {
        indexes: IntStream<'a>,
        dictionary: Vec<String>,
    },
    Decimal {
        data: BlockStream<'a>,
        scales: IntStream<'a>,
        scale: u32,
    },
    Date(IntStream<'a>),
    Timestamp {
        seconds: IntStream<'a>,
        nanos: IntStream<'a>,
    },
}

/// Reads one column of a stripe, either from the start or from a row
/// group's recorded positions.
pub struct ColumnDecoder<'a> {
    column: u32,
    present: Option<BooleanDecoder<BlockStream<'a>>>,
    values: Values<'a>,
}

struct Opener<'s, 'a> {
    stripe: &'a StripeReader,
    column: u32,
    cursor: Option<&'s mut PositionCursor<'a>>,
}

impl<'s, 'a> Opener<'s, 'a> {
    fn stream(&mut self, kind: StreamKind) -> Result<BlockStream<'a>> {
        let mut stream = self.stripe.stream(self.column, kind, true)?;
        if let Some(cursor) = self.cursor.as_deref_mut() {
            stream.seek(cursor)?;
        }
        Ok(stream)
    }

    fn skip_count(&mut self) -> Result<usize> {
        match self.cursor.as_deref_mut() {
            Some(cursor) => Ok(cursor.next()? as usize),
            None => Ok(0),
        }
    }

    fn booleans(&mut self, kind: StreamKind) -> Result<BooleanDecoder<BlockStream<'a>>> {
        let mut decoder = BooleanDecoder::new(self.stream(kind)?);
        if let Some(cursor) = self.cursor.as_deref_mut() {
            let bytes = cursor.next()?;
            let bits = cursor.next()?;
            decoder.seek(bytes, bits)?;
        }
        Ok(decoder)
    }

    fn integers(
        &mut self,
        kind: StreamKind,
        signed: bool,
        encoding: ColumnEncodingKind,
    ) -> Result<IntStream<'a>> {
        let mut decoder = int_decoder(self.stream(kind)?, signed, encoding);
        let skip = self.skip_count()?;
        decoder.skip(skip)?;
        Ok(decoder)
    }

    /// Streams that are read whole, never positioned.
    fn unpositioned(&self, kind: StreamKind) -> Result<BlockStream<'a>> {
        self.stripe.stream(self.column, kind, true)
    }
}

impl<'a> ColumnDecoder<'a> {
    pub fn new(
        stripe: &'a StripeReader,
        column: u32,
        data_type: DataType,
        positions: Option<&mut PositionCursor<'a>>,
    ) -> Result<Self> {
        let encoding = stripe.encoding(column)?;
        let mut open = Opener {
            stripe,
            column,
            cursor: positions,
        };

        let present = if stripe.has_stream(column, StreamKind::Present) {
            Some(open.booleans(StreamKind::Present)?)
        } else {
            None
        };

        let values = match data_type {
            DataType::Boolean => Values::Boolean(open.booleans(StreamKind::Data)?),
            DataType::Byte => {
                let mut bytes = ByteRleDecoder::new(open.stream(StreamKind::Data)?);
                let skip = open.skip_count()?;
                bytes.skip(skip)?;
                Values::Byte(bytes)
            }
            DataType::Short | DataType::Int | DataType::Long => {
                Values::Integer(open.integers(StreamKind::Data, true, encoding)?)
            }
            DataType::Date => Values::Date(open.integers(StreamKind::Data, true, encoding)?),
            DataType::Float => Values::Float(open.stream(StreamKind::Data)?),
            DataType::Double => Values::Double(open.stream(StreamKind::Data)?),
            DataType::String
            | DataType::Varchar { .. }
            | DataType::Char { .. }
            | DataType::Binary => {
                let utf8 = data_type != DataType::Binary;
                if encoding.is_dictionary() {
                    if !utf8 {
                        return Err(OrcError::InvalidFormat(format!(
                            "binary column {} uses dictionary encoding",
                            column
                        )));
                    }
                    let size = stripe.dictionary_size(column)?;
                    let dictionary = read_dictionary(&open, size, encoding)?;
                    let indexes = open.integers(StreamKind::Data, false, encoding)?;
                    Values::Dictionary {
                        indexes,
                        dictionary,
                    }
                } else {
                    let data = open.stream(StreamKind::Data)?;
                    let lengths = open.integers(StreamKind::Length, false, encoding)?;
                    Values::Direct {
                        data,
                        lengths,
                        utf8,
                    }
                }
            }
            DataType::Decimal { scale, .. } => {
                let data = open.stream(StreamKind::Data)?;
                let scales = open.integers(StreamKind::Secondary, true, encoding)?;
                Values::Decimal {
                    data,
                    scales,
                    scale,
                }
            }
            DataType::Timestamp => {
                let seconds = open.integers(StreamKind::Data, true, encoding)?;
                let nanos = open.integers(StreamKind::Secondary, false, encoding)?;
                Values::Timestamp { seconds, nanos }
            }
        };

        Ok(Self {
            column,
            present,
            values,
        })
    }

    /// Skips `rows` rows, nulls included.
    pub fn skip_rows(&mut self, rows: usize, pool: &BufferPool) -> Result<()> {
        let values = match self.present.as_mut() {
            Some(present) => {
                let mut bits = pool.bools.rent(rows);
                present.read_counting(&mut bits)?
            }
            None => rows,
        };
        self.skip_values(values, pool)
    }

    fn skip_values(&mut self, count: usize, pool: &BufferPool) -> Result<()> {
        match &mut self.values {
            Values::Boolean(d) => d.skip(count),
            Values::Byte(d) => d.skip(count),
            Values::Integer(d) | Values::Date(d) => d.skip(count),
            Values::Float(s) => skip_bytes(s, count * 4, pool),
            Values::Double(s) => skip_bytes(s, count * 8, pool),
            Values::Direct { data, lengths, .. } => {
                let mut lens = pool.longs.rent(count);
                lengths.read(&mut lens)?;
                let total = lens.iter().try_fold(0usize, |acc, &l| {
                    usize::try_from(l).ok().map(|l| acc + l)
                });
                let total = total
                    .ok_or_else(|| OrcError::InvalidFormat("negative string length".into()))?;
                skip_bytes(data, total, pool)
            }
            Values::Dictionary { indexes, .. } => indexes.skip(count),
            Values::Decimal { data, scales, .. } => {
                for _ in 0..count {
                    read_vs128(data)?;
                }
                scales.skip(count)
            }
            Values::Timestamp { seconds, nanos } => {
                seconds.skip(count)?;
                nanos.skip(count)
            }
        }
    }

    /// Appends `rows` rows to `out`, placing nulls where PRESENT is unset.
    pub fn fill(&mut self, rows: usize, out: &mut ColumnBuffer, pool: &BufferPool) -> Result<()> {
        let room = out.capacity() - out.len();
        if rows > room {
            return Err(OrcError::BufferTooSmall {
                required: out.len() + rows,
                provided: out.capacity(),
            });
        }

        let mut present = pool.bools.rent(rows);
        let count = match self.present.as_mut() {
            Some(decoder) => decoder.read_counting(&mut present)?,
            None => {
                present.fill(true);
                rows
            }
        };

        let column = self.column;
        match (&mut self.values, out) {
            (Values::Boolean(d), ColumnBuffer::Boolean(buf)) => {
                let mut values = pool.bools.rent(count);
                d.read(&mut values)?;
                interleave(&present, values.iter().copied(), buf)
            }
            (Values::Byte(d), ColumnBuffer::Integer(buf)) => {
                let mut values = pool.bytes.rent(count);
                d.read(&mut values)?;
                interleave(&present, values.iter().map(|&b| b as i8 as i64), buf)
            }
            (Values::Integer(d), ColumnBuffer::Integer(buf)) => {
                let mut values = pool.longs.rent(count);
                d.read(&mut values)?;
                interleave(&present, values.iter().copied(), buf)
            }
            (Values::Float(s), ColumnBuffer::Float(buf)) => {
                let mut raw = pool.bytes.rent(count * 4);
                s.read_exact_into(&mut raw)?;
                let values = raw
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]));
                interleave(&present, values, buf)
            }
            (Values::Double(s), ColumnBuffer::Double(buf)) => {
                let mut raw = pool.bytes.rent(count * 8);
                s.read_exact_into(&mut raw)?;
                let values = raw.chunks_exact(8).map(|c| {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(c);
                    f64::from_le_bytes(bytes)
                });
                interleave(&present, values, buf)
            }
            (Values::Direct { data, lengths, utf8 }, out) => {
                let mut lens = pool.longs.rent(count);
                lengths.read(&mut lens)?;
                let mut values = Vec::with_capacity(count);
                for &len in lens.iter() {
                    let len = usize::try_from(len).map_err(|_| {
                        OrcError::InvalidFormat(format!("negative length in column {}", column))
                    })?;
                    let mut bytes = vec![0u8; len];
                    data.read_exact_into(&mut bytes)?;
                    values.push(bytes);
                }
                match out {
                    ColumnBuffer::String(buf) if *utf8 => {
                        let strings = values
                            .into_iter()
                            .map(|b| {
                                String::from_utf8(b).map_err(|e| {
                                    OrcError::InvalidFormat(format!(
                                        "column {} holds invalid UTF-8: {}",
                                        column, e
                                    ))
                                })
                            })
                            .collect::<Result<Vec<_>>>()?;
                        interleave(&present, strings.into_iter(), buf)
                    }
                    ColumnBuffer::Binary(buf) if !*utf8 => {
                        interleave(&present, values.into_iter(), buf)
                    }
                    _ => Err(mismatch(column)),
                }
            }
            (Values::Dictionary { indexes, dictionary }, ColumnBuffer::String(buf)) => {
                let mut idx = pool.longs.rent(count);
                indexes.read(&mut idx)?;
                let mut values = Vec::with_capacity(count);
                for &i in idx.iter() {
                    let entry = usize::try_from(i)
                        .ok()
                        .and_then(|i| dictionary.get(i))
                        .ok_or_else(|| {
                            OrcError::InvalidFormat(format!(
                                "dictionary index {} out of range ({} entries)",
                                i,
                                dictionary.len()
                            ))
                        })?;
                    values.push(entry.clone());
                }
                interleave(&present, values.into_iter(), buf)
            }
            (
                Values::Decimal {
                    data,
                    scales,
                    scale,
                },
                ColumnBuffer::Decimal(buf),
            ) => {
                let mut stored_scales = pool.longs.rent(count);
                let mut unscaled = Vec::with_capacity(count);
                for _ in 0..count {
                    unscaled.push(read_vs128(data)?);
                }
                scales.read(&mut stored_scales)?;
                let mut values = Vec::with_capacity(count);
                for (&u, &s) in unscaled.iter().zip(stored_scales.iter()) {
                    let stored = u32::try_from(s).map_err(|_| {
                        OrcError::InvalidFormat(format!("negative decimal scale {}", s))
                    })?;
                    let value = Decimal::new(u, stored).rescale(*scale).ok_or_else(|| {
                        OrcError::InvalidFormat(format!(
                            "decimal {} does not fit scale {}",
                            Decimal::new(u, stored),
                            scale
                        ))
                    })?;
                    values.push(value);
                }
                interleave(&present, values.into_iter(), buf)
            }
            (Values::Date(d), ColumnBuffer::Date(buf)) => {
                let mut days = pool.longs.rent(count);
                d.read(&mut days)?;
                let values = days
                    .iter()
                    .map(|&d| {
                        date_from_days(d).ok_or_else(|| {
                            OrcError::InvalidFormat(format!("date {} days out of range", d))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                interleave(&present, values.into_iter(), buf)
            }
            (Values::Timestamp { seconds, nanos }, ColumnBuffer::Timestamp(buf)) => {
                let mut secs = pool.longs.rent(count);
                let mut ns = pool.longs.rent(count);
                seconds.read(&mut secs)?;
                nanos.read(&mut ns)?;
                let values = secs
                    .iter()
                    .zip(ns.iter())
                    .map(|(&s, &n)| timestamp_from_parts(s, decode_nanos(n as u64)))
                    .collect::<Result<Vec<_>>>()?;
                interleave(&present, values.into_iter(), buf)
            }
            _ => Err(mismatch(column)),
        }
    }
}

fn mismatch(column: u32) -> OrcError {
    OrcError::SchemaMismatch(format!(
        "output buffer does not match the type of column {}",
        column
    ))
}

fn skip_bytes(stream: &mut BlockStream<'_>, count: usize, pool: &BufferPool) -> Result<()> {
    let mut scratch = pool.bytes.rent(count);
    stream.read_exact_into(&mut scratch)
}

fn read_dictionary(
    open: &Opener<'_, '_>,
    size: usize,
    encoding: ColumnEncodingKind,
) -> Result<Vec<String>> {
    let mut blob = open.unpositioned(StreamKind::DictionaryData)?;
    let mut lengths = int_decoder(open.unpositioned(StreamKind::Length)?, false, encoding);
    let mut lens = vec![0i64; size];
    lengths.read(&mut lens)?;
    let mut dictionary = Vec::with_capacity(size);
    for len in lens {
        let len = usize::try_from(len)
            .map_err(|_| OrcError::InvalidFormat("negative dictionary entry length".into()))?;
        let mut bytes = vec![0u8; len];
        blob.read_exact_into(&mut bytes)?;
        let entry = String::from_utf8(bytes)
            .map_err(|e| OrcError::InvalidFormat(format!("dictionary entry: {}", e)))?;
        dictionary.push(entry);
    }
    Ok(dictionary)
}

fn interleave<T>(
    present: &[bool],
    values: impl Iterator<Item = T>,
    out: &mut TypedBuffer<T>,
) -> Result<()> {
    let mut values = values;
    for &is_set in present {
        if is_set {
            let value = values.next().ok_or_else(|| {
                OrcError::read_past_end("fewer values than PRESENT bits")
            })?;
            out.push(Some(value))?;
        } else {
            out.push(None)?;
        }
    }
    Ok(())
}
