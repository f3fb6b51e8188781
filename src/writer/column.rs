//! Per-column stream writers for one stripe at a time.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::compression::{BlockWriter, SharedCodec};
use crate::encoding::bits::write_vs128;
use crate::encoding::{BitPacking, BooleanEncoder, ByteRleEncoder, ByteSink, RleV2Encoder};
use crate::error::{OrcError, Result};
use crate::proto::{
    ColumnEncoding, ColumnEncodingKind, ColumnStatistics, Message, RowIndex, RowIndexEntry,
    StreamKind,
};
use crate::reader::column::{encode_nanos, TIMESTAMP_BASE_SECONDS};
use crate::schema::DataType;
use crate::stats::StatisticsBuilder;
use crate::table::{days_from_date, Decimal, Value};

/// Stream settings shared by every column of one writer.
#[derive(Clone)]
pub struct StreamSettings {
    pub codec: Option<SharedCodec>,
    pub block_size: usize,
    pub packing: BitPacking,
    pub dictionary_threshold: f64,
}

impl StreamSettings {
    fn block(&self) -> BlockWriter {
        BlockWriter::new(self.codec.clone(), self.block_size)
    }

    fn rle(&self, signed: bool) -> RleV2Encoder<BlockWriter> {
        RleV2Encoder::with_packing(self.block(), signed, self.packing)
    }
}

/// What one column contributes to a finished stripe.
pub struct ColumnStripe {
    pub encoding: ColumnEncoding,
    pub index: Vec<u8>,
    pub streams: Vec<(StreamKind, Vec<u8>)>,
    pub statistics: ColumnStatistics,
}

#[derive(Default)]
struct PendingEntry {
    present: Vec<u64>,
    data: Vec<u64>,
    value_offset: usize,
    statistics: Option<ColumnStatistics>,
}

enum ValueWriter {
    Boolean(BooleanEncoder<BlockWriter>),
    Byte(ByteRleEncoder<BlockWriter>),
    Integer(RleV2Encoder<BlockWriter>),
    Float(BlockWriter),
    Double(BlockWriter),
    /// Strings are held until the stripe closes, when the dictionary
    /// decision is made.
    String {
        values: Vec<String>,
        bytes: usize,
    },
    Binary {
        data: BlockWriter,
        lengths: RleV2Encoder<BlockWriter>,
    },
    Decimal {
        data: BlockWriter,
        scales: RleV2Encoder<BlockWriter>,
        scale: u32,
    },
    Timestamp {
        seconds: RleV2Encoder<BlockWriter>,
        nanos: RleV2Encoder<BlockWriter>,
    },
}

impl ValueWriter {
    fn new(data_type: &DataType, settings: &StreamSettings) -> Self {
        match data_type {
            DataType::Boolean => ValueWriter::Boolean(BooleanEncoder::new(settings.block())),
            DataType::Byte => ValueWriter::Byte(ByteRleEncoder::new(settings.block())),
            DataType::Short | DataType::Int | DataType::Long | DataType::Date => {
                ValueWriter::Integer(settings.rle(true))
            }
            DataType::Float => ValueWriter::Float(settings.block()),
            DataType::Double => ValueWriter::Double(settings.block()),
            DataType::String | DataType::Varchar { .. } | DataType::Char { .. } => {
                ValueWriter::String {
                    values: Vec::new(),
                    bytes: 0,
                }
            }
            DataType::Binary => ValueWriter::Binary {
                data: settings.block(),
                lengths: settings.rle(false),
            },
            DataType::Decimal { scale, .. } => ValueWriter::Decimal {
                data: settings.block(),
                scales: settings.rle(true),
                scale: *scale,
            },
            DataType::Timestamp => ValueWriter::Timestamp {
                seconds: settings.rle(true),
                nanos: settings.rle(false),
            },
        }
    }

    fn record_position(&self, positions: &mut Vec<u64>) {
        match self {
            ValueWriter::Boolean(e) => e.record_position(positions),
            ValueWriter::Byte(e) => e.record_position(positions),
            ValueWriter::Integer(e) => e.record_position(positions),
            ValueWriter::Float(w) | ValueWriter::Double(w) => w.record_position(positions),
            // Recorded when the stripe closes and the encoding is known.
            ValueWriter::String { .. } => {}
            ValueWriter::Binary { data, lengths } => {
                data.record_position(positions);
                lengths.record_position(positions);
            }
            ValueWriter::Decimal { data, scales, .. } => {
                data.record_position(positions);
                scales.record_position(positions);
            }
            ValueWriter::Timestamp { seconds, nanos } => {
                seconds.record_position(positions);
                nanos.record_position(positions);
            }
        }
    }

    fn estimated_size(&self) -> usize {
        match self {
            ValueWriter::Boolean(e) => e.sink().estimated_size(),
            ValueWriter::Byte(e) => e.sink().estimated_size(),
            ValueWriter::Integer(e) => e.sink().estimated_size(),
            ValueWriter::Float(w) | ValueWriter::Double(w) => w.estimated_size(),
            ValueWriter::String { bytes, .. } => *bytes,
            ValueWriter::Binary { data, lengths } => {
                data.estimated_size() + lengths.sink().estimated_size()
            }
            ValueWriter::Decimal { data, scales, .. } => {
                data.estimated_size() + scales.sink().estimated_size()
            }
            ValueWriter::Timestamp { seconds, nanos } => {
                seconds.sink().estimated_size() + nanos.sink().estimated_size()
            }
        }
    }

    /// Encodes one non-null value already checked against the column type.
    fn write(&mut self, value: &Value) -> Result<()> {
        match (self, value) {
            (ValueWriter::Boolean(e), Value::Boolean(b)) => e.write(*b),
            (ValueWriter::Byte(e), Value::Integer(v)) => e.write(*v as i8 as u8),
            (ValueWriter::Integer(e), Value::Integer(v)) => e.write(*v),
            (ValueWriter::Integer(e), Value::Date(d)) => e.write(days_from_date(*d)),
            (ValueWriter::Float(w), Value::Float(v)) => w.write_bytes(&(*v as f32).to_le_bytes()),
            (ValueWriter::Double(w), Value::Float(v)) => w.write_bytes(&v.to_le_bytes()),
            (ValueWriter::String { values, bytes }, Value::String(s)) => {
                *bytes += s.len();
                values.push(s.clone());
                Ok(())
            }
            (ValueWriter::Binary { data, lengths }, Value::Binary(b)) => {
                data.write_bytes(b)?;
                lengths.write(b.len() as i64)
            }
            (ValueWriter::Decimal { data, scales, scale }, Value::Decimal(d)) => {
                write_vs128(data, d.unscaled)?;
                scales.write(*scale as i64)
            }
            (ValueWriter::Timestamp { seconds, nanos }, Value::Timestamp(ts)) => {
                let (secs, ns) = timestamp_parts(ts);
                seconds.write(secs)?;
                nanos.write(encode_nanos(ns) as i64)
            }
            (_, other) => Err(OrcError::SchemaMismatch(format!(
                "cannot encode {:?} in this column",
                other
            ))),
        }
    }
}

/// Splits a timestamp into stored seconds (relative to 2015-01-01, rounded
/// toward zero for pre-1970 values) and nanoseconds.
pub fn timestamp_parts(ts: &NaiveDateTime) -> (i64, u32) {
    let utc = ts.and_utc();
    let mut seconds = utc.timestamp();
    let nanos = utc.timestamp_subsec_nanos();
    if seconds < 0 && nanos > 999_999 {
        seconds += 1;
    }
    (seconds - TIMESTAMP_BASE_SECONDS, nanos)
}

/// Coerces a row cell into the form stored for `data_type`: narrow
/// integers are range checked, VARCHAR is truncated, CHAR padded and
/// decimals rescaled.
pub fn normalize(data_type: &DataType, value: &Value) -> Result<Value> {
    let mismatch = || {
        OrcError::SchemaMismatch(format!(
            "value {:?} does not fit column type {}",
            value, data_type
        ))
    };
    let normalized = match (data_type, value) {
        (_, Value::Null) => Value::Null,
        (DataType::Boolean, Value::Boolean(_)) => value.clone(),
        (DataType::Byte, Value::Integer(v)) if i8::try_from(*v).is_ok() => value.clone(),
        (DataType::Short, Value::Integer(v)) if i16::try_from(*v).is_ok() => value.clone(),
        (DataType::Int, Value::Integer(v)) if i32::try_from(*v).is_ok() => value.clone(),
        (DataType::Long, Value::Integer(_)) => value.clone(),
        (DataType::Float | DataType::Double, Value::Float(_)) => value.clone(),
        (DataType::Float | DataType::Double, Value::Integer(v)) => Value::Float(*v as f64),
        (DataType::String, Value::String(_)) => value.clone(),
        (DataType::Varchar { max_length }, Value::String(s)) => {
            Value::String(s.chars().take(*max_length as usize).collect())
        }
        (DataType::Char { max_length }, Value::String(s)) => {
            let mut padded: String = s.chars().take(*max_length as usize).collect();
            let width = padded.chars().count();
            padded.extend(std::iter::repeat(' ').take(*max_length as usize - width));
            Value::String(padded)
        }
        (DataType::Binary, Value::Binary(_)) => value.clone(),
        (DataType::Decimal { precision, scale }, Value::Decimal(d)) => {
            let d = d.rescale(*scale).ok_or_else(mismatch)?;
            if d.unscaled.unsigned_abs() >= 10u128.pow(*precision) {
                return Err(mismatch());
            }
            Value::Decimal(d)
        }
        (DataType::Decimal { precision, scale }, Value::Integer(v)) => {
            let d = Decimal::new(*v as i128, 0)
                .rescale(*scale)
                .ok_or_else(mismatch)?;
            if d.unscaled.unsigned_abs() >= 10u128.pow(*precision) {
                return Err(mismatch());
            }
            Value::Decimal(d)
        }
        (DataType::Date, Value::Date(_)) => value.clone(),
        (DataType::Timestamp, Value::Timestamp(_)) => value.clone(),
        _ => return Err(mismatch()),
    };
    Ok(normalized)
}

/// Writes one schema column. Row-index positions are captured at the start
/// of every row group; statistics roll up row group to stripe to file.
pub struct ColumnWriter {
    id: u32,
    data_type: DataType,
    settings: StreamSettings,
    present: BooleanEncoder<BlockWriter>,
    has_nulls: bool,
    values: ValueWriter,
    non_null: usize,
    entries: Vec<PendingEntry>,
    current: PendingEntry,
    row_group_stats: StatisticsBuilder,
    stripe_stats: StatisticsBuilder,
    file_stats: StatisticsBuilder,
}

impl ColumnWriter {
    pub fn new(id: u32, data_type: DataType, settings: StreamSettings) -> Self {
        let mut writer = Self {
            id,
            present: BooleanEncoder::new(settings.block()),
            values: ValueWriter::new(&data_type, &settings),
            has_nulls: false,
            non_null: 0,
            entries: Vec::new(),
            current: PendingEntry::default(),
            row_group_stats: StatisticsBuilder::new(data_type),
            stripe_stats: StatisticsBuilder::new(data_type),
            file_stats: StatisticsBuilder::new(data_type),
            data_type,
            settings,
        };
        writer.begin_row_group();
        writer
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    fn begin_row_group(&mut self) {
        let mut entry = PendingEntry {
            value_offset: self.non_null,
            ..PendingEntry::default()
        };
        self.present.record_position(&mut entry.present);
        self.values.record_position(&mut entry.data);
        self.current = entry;
    }

    /// Writes a value produced by [`normalize`].
    pub fn write(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            self.has_nulls = true;
            self.present.write(false)?;
        } else {
            self.values.write(value)?;
            self.present.write(true)?;
            self.non_null += 1;
        }
        self.row_group_stats.update(value)
    }

    /// Closes the current row group's index entry and opens the next.
    pub fn end_row_group(&mut self) {
        let mut entry = std::mem::take(&mut self.current);
        entry.statistics = Some(self.row_group_stats.build());
        self.stripe_stats.merge(&self.row_group_stats);
        self.row_group_stats.reset();
        self.entries.push(entry);
        self.begin_row_group();
    }

    pub fn estimated_size(&self) -> usize {
        self.present.sink().estimated_size() + self.values.estimated_size()
    }

    pub fn file_statistics(&self) -> ColumnStatistics {
        self.file_stats.build()
    }

    /// Flushes every stream of the stripe and resets for the next one. The
    /// caller closes the last row group first.
    pub fn finish_stripe(&mut self) -> Result<ColumnStripe> {
        let values = std::mem::replace(
            &mut self.values,
            ValueWriter::new(&self.data_type, &self.settings),
        );
        let present = std::mem::replace(
            &mut self.present,
            BooleanEncoder::new(self.settings.block()),
        );
        let mut entries = std::mem::take(&mut self.entries);

        let mut streams = Vec::new();
        if self.has_nulls {
            let mut present = present;
            present.flush()?;
            streams.push((StreamKind::Present, present.into_inner().finish()?));
        }

        let mut encoding = ColumnEncoding {
            kind: ColumnEncodingKind::DirectV2,
            dictionary_size: 0,
        };
        match values {
            ValueWriter::Boolean(mut e) => {
                encoding.kind = ColumnEncodingKind::Direct;
                e.flush()?;
                streams.push((StreamKind::Data, e.into_inner().finish()?));
            }
            ValueWriter::Byte(mut e) => {
                encoding.kind = ColumnEncodingKind::Direct;
                e.flush()?;
                streams.push((StreamKind::Data, e.into_inner().finish()?));
            }
            ValueWriter::Integer(mut e) => {
                e.flush()?;
                streams.push((StreamKind::Data, e.into_inner().finish()?));
            }
            ValueWriter::Float(w) | ValueWriter::Double(w) => {
                encoding.kind = ColumnEncodingKind::Direct;
                streams.push((StreamKind::Data, w.finish()?));
            }
            ValueWriter::String { values, .. } => {
                encoding = self.write_strings(values, &mut entries, &mut streams)?;
            }
            ValueWriter::Binary { data, mut lengths } => {
                lengths.flush()?;
                streams.push((StreamKind::Data, data.finish()?));
                streams.push((StreamKind::Length, lengths.into_inner().finish()?));
            }
            ValueWriter::Decimal {
                data, mut scales, ..
            } => {
                scales.flush()?;
                streams.push((StreamKind::Data, data.finish()?));
                streams.push((StreamKind::Secondary, scales.into_inner().finish()?));
            }
            ValueWriter::Timestamp {
                mut seconds,
                mut nanos,
            } => {
                seconds.flush()?;
                nanos.flush()?;
                streams.push((StreamKind::Data, seconds.into_inner().finish()?));
                streams.push((StreamKind::Secondary, nanos.into_inner().finish()?));
            }
        }

        let keep_present = self.has_nulls;
        let index = RowIndex {
            entries: entries
                .into_iter()
                .map(|e| {
                    let mut positions = if keep_present { e.present } else { Vec::new() };
                    positions.extend(e.data);
                    RowIndexEntry {
                        positions,
                        statistics: e.statistics,
                    }
                })
                .collect(),
        };
        let index = compress(&self.settings, &index.encode())?;

        let statistics = self.stripe_stats.build();
        self.file_stats.merge(&self.stripe_stats);
        self.stripe_stats.reset();
        self.has_nulls = false;
        self.non_null = 0;
        self.begin_row_group();

        Ok(ColumnStripe {
            encoding,
            index,
            streams,
            statistics,
        })
    }

    fn write_strings(
        &self,
        values: Vec<String>,
        entries: &mut [PendingEntry],
        streams: &mut Vec<(StreamKind, Vec<u8>)>,
    ) -> Result<ColumnEncoding> {
        let mut dictionary: BTreeMap<&str, u32> = BTreeMap::new();
        for v in &values {
            dictionary.entry(v.as_str()).or_insert(0);
        }
        let use_dictionary = !values.is_empty()
            && dictionary.len() as f64 <= self.settings.dictionary_threshold * values.len() as f64;

        if use_dictionary {
            let mut blob = self.settings.block();
            let mut lengths = self.settings.rle(false);
            for (i, (key, slot)) in dictionary.iter_mut().enumerate() {
                *slot = i as u32;
                blob.write_bytes(key.as_bytes())?;
                lengths.write(key.len() as i64)?;
            }
            let mut data = self.settings.rle(false);
            replay(&values, entries, |v, positions| {
                if let Some(positions) = positions {
                    data.record_position(positions);
                }
                match v {
                    Some(v) => data.write(dictionary[v.as_str()] as i64),
                    None => Ok(()),
                }
            })?;
            data.flush()?;
            lengths.flush()?;
            streams.push((StreamKind::Data, data.into_inner().finish()?));
            streams.push((StreamKind::Length, lengths.into_inner().finish()?));
            streams.push((StreamKind::DictionaryData, blob.finish()?));
            Ok(ColumnEncoding {
                kind: ColumnEncodingKind::DictionaryV2,
                dictionary_size: dictionary.len() as u32,
            })
        } else {
            let mut data = self.settings.block();
            let mut lengths = self.settings.rle(false);
            replay(&values, entries, |v, positions| {
                if let Some(positions) = positions {
                    data.record_position(positions);
                    lengths.record_position(positions);
                }
                match v {
                    Some(v) => {
                        data.write_bytes(v.as_bytes())?;
                        lengths.write(v.len() as i64)
                    }
                    None => Ok(()),
                }
            })?;
            lengths.flush()?;
            streams.push((StreamKind::Data, data.finish()?));
            streams.push((StreamKind::Length, lengths.into_inner().finish()?));
            Ok(ColumnEncoding {
                kind: ColumnEncodingKind::DirectV2,
                dictionary_size: 0,
            })
        }
    }
}

/// Feeds buffered values to `write`, asking it to record positions for each
/// row-group entry just before the group's first value. Entries that start
/// after the last value are recorded at the end.
fn replay<F>(values: &[String], entries: &mut [PendingEntry], mut write: F) -> Result<()>
where
    F: FnMut(Option<&String>, Option<&mut Vec<u64>>) -> Result<()>,
{
    let mut next = 0;
    for (i, v) in values.iter().enumerate() {
        while next < entries.len() && entries[next].value_offset <= i {
            write(None, Some(&mut entries[next].data))?;
            next += 1;
        }
        write(Some(v), None)?;
    }
    for entry in &mut entries[next..] {
        write(None, Some(&mut entry.data))?;
    }
    Ok(())
}

/// Frames a metadata section (index, stripe footer, file footer) with the
/// file's codec.
pub fn compress(settings: &StreamSettings, bytes: &[u8]) -> Result<Vec<u8>> {
    let mut writer = settings.block();
    writer.write_bytes(bytes)?;
    writer.finish()
}
