//! Writing ORC files: rows in, stripes and a file tail out.

pub mod column;

pub use column::{normalize, ColumnStripe, ColumnWriter, StreamSettings};

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{debug, info};

use crate::compression::{codec_for, CompressionKind, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE};
use crate::encoding::BitPacking;
use crate::error::{OrcError, Result};
use crate::proto::{
    ColumnEncoding, ColumnEncodingKind, Footer, Message, Metadata, PostScript, RowIndex,
    RowIndexEntry, Stream, StreamKind, StripeFooter, StripeInformation, StripeStatistics,
    UserMetadataItem, MAGIC,
};
use crate::schema::Schema;
use crate::stats::root_statistics;
use crate::table::{Row, Table};

pub const DEFAULT_STRIPE_SIZE: usize = 64 * 1024 * 1024;
pub const DEFAULT_ROW_INDEX_STRIDE: u32 = 10_000;
pub const DEFAULT_DICTIONARY_KEY_SIZE_THRESHOLD: f64 = 0.8;
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Writer identity recorded in the postscript.
const WRITER_VERSION: u32 = 6;
const FILE_VERSION: [u32; 2] = [0, 12];
const WRITER_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub stripe_size: usize,
    pub row_index_stride: u32,
    pub compression: CompressionKind,
    pub compression_block_size: usize,
    pub compression_level: u32,
    pub bit_packing: BitPacking,
    pub dictionary_key_size_threshold: f64,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            stripe_size: DEFAULT_STRIPE_SIZE,
            row_index_stride: DEFAULT_ROW_INDEX_STRIDE,
            compression: CompressionKind::Zlib,
            compression_block_size: DEFAULT_BLOCK_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            bit_packing: BitPacking::Nearest,
            dictionary_key_size_threshold: DEFAULT_DICTIONARY_KEY_SIZE_THRESHOLD,
        }
    }
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stripe_size(mut self, bytes: usize) -> Self {
        self.stripe_size = bytes.max(1);
        self
    }

    /// Rows per row group; 0 disables the row index.
    pub fn with_row_index_stride(mut self, rows: u32) -> Self {
        self.row_index_stride = rows;
        self
    }

    pub fn with_compression(mut self, kind: CompressionKind) -> Self {
        self.compression = kind;
        self
    }

    pub fn with_compression_block_size(mut self, bytes: usize) -> Self {
        self.compression_block_size = bytes.clamp(1, MAX_BLOCK_SIZE);
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn with_bit_packing(mut self, packing: BitPacking) -> Self {
        self.bit_packing = packing;
        self
    }

    pub fn with_dictionary_key_size_threshold(mut self, threshold: f64) -> Self {
        self.dictionary_key_size_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

/// Streams rows into an ORC file.
///
/// Rows are buffered per column until the stripe reaches its target size,
/// then flushed as one stripe. [`OrcWriter::close`] writes the tail and
/// must be called; dropping the writer loses buffered rows.
pub struct OrcWriter<W: Write> {
    sink: W,
    offset: u64,
    schema: Schema,
    options: WriterOptions,
    settings: StreamSettings,
    columns: Vec<ColumnWriter>,
    rows_in_stripe: u64,
    rows_in_row_group: u64,
    row_groups_in_stripe: usize,
    total_rows: u64,
    stripes: Vec<StripeInformation>,
    stripe_stats: Vec<StripeStatistics>,
    user_metadata: Vec<UserMetadataItem>,
}

impl OrcWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, schema: Schema, options: WriterOptions) -> Result<Self> {
        let path = path.as_ref();
        info!("creating {}", path.display());
        Self::new(BufWriter::new(File::create(path)?), schema, options)
    }
}

impl<W: Write> OrcWriter<W> {
    pub fn new(mut sink: W, schema: Schema, options: WriterOptions) -> Result<Self> {
        if schema.column_count() == 0 {
            return Err(OrcError::SchemaMismatch(
                "a file needs at least one column".into(),
            ));
        }
        let codec = codec_for(options.compression, options.compression_level)?;
        let settings = StreamSettings {
            codec,
            block_size: options.compression_block_size,
            packing: options.bit_packing,
            dictionary_threshold: options.dictionary_key_size_threshold,
        };
        let columns = schema
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| ColumnWriter::new(i as u32 + 1, c.data_type, settings.clone()))
            .collect();
        sink.write_all(MAGIC.as_bytes())?;
        Ok(Self {
            sink,
            offset: MAGIC.len() as u64,
            schema,
            options,
            settings,
            columns,
            rows_in_stripe: 0,
            rows_in_row_group: 0,
            row_groups_in_stripe: 0,
            total_rows: 0,
            stripes: Vec::new(),
            stripe_stats: Vec::new(),
            user_metadata: Vec::new(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows_written(&self) -> u64 {
        self.total_rows + self.rows_in_stripe
    }

    /// Appends one row. The row is checked against the schema before any
    /// column is touched, so a rejected row leaves the file unchanged.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        if row.values.len() != self.columns.len() {
            return Err(OrcError::SchemaMismatch(format!(
                "row has {} values, schema has {} columns",
                row.values.len(),
                self.columns.len()
            )));
        }
        let values = self
            .schema
            .columns
            .iter()
            .zip(&row.values)
            .map(|(c, v)| {
                normalize(&c.data_type, v).map_err(|e| match e {
                    OrcError::SchemaMismatch(msg) => {
                        OrcError::SchemaMismatch(format!("column '{}': {}", c.name, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for (writer, value) in self.columns.iter_mut().zip(&values) {
            writer.write(value)?;
        }
        self.rows_in_stripe += 1;
        self.rows_in_row_group += 1;

        let stride = self.options.row_index_stride as u64;
        if stride > 0 && self.rows_in_row_group == stride {
            self.end_row_group();
            if self.estimated_stripe_size() >= self.options.stripe_size {
                self.flush_stripe()?;
            }
        } else if stride == 0 && self.estimated_stripe_size() >= self.options.stripe_size {
            self.flush_stripe()?;
        }
        Ok(())
    }

    pub fn write_rows<'a>(&mut self, rows: impl IntoIterator<Item = &'a Row>) -> Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    pub fn write_table(&mut self, table: &Table) -> Result<()> {
        if table.schema != self.schema {
            return Err(OrcError::SchemaMismatch(format!(
                "table schema {} differs from writer schema {}",
                table.schema, self.schema
            )));
        }
        self.write_rows(&table.rows)
    }

    pub fn add_user_metadata(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        let name = name.into();
        let value = value.into();
        match self.user_metadata.iter_mut().find(|item| item.name == name) {
            Some(item) => item.value = value,
            None => self.user_metadata.push(UserMetadataItem { name, value }),
        }
    }

    fn estimated_stripe_size(&self) -> usize {
        self.columns.iter().map(|c| c.estimated_size()).sum()
    }

    fn end_row_group(&mut self) {
        for column in &mut self.columns {
            column.end_row_group();
        }
        self.rows_in_row_group = 0;
        self.row_groups_in_stripe += 1;
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        column::compress(&self.settings, bytes)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    /// Writes buffered rows as a stripe: index streams, data streams, then
    /// the stripe footer.
    pub fn flush_stripe(&mut self) -> Result<()> {
        if self.rows_in_stripe == 0 {
            return Ok(());
        }
        if self.rows_in_row_group > 0 || self.row_groups_in_stripe == 0 {
            self.end_row_group();
        }

        let mut finished = Vec::with_capacity(self.columns.len());
        for column in &mut self.columns {
            finished.push(column.finish_stripe()?);
        }

        let root_stats = root_statistics(self.rows_in_stripe);
        let root_index = RowIndex {
            entries: (0..self.row_groups_in_stripe)
                .map(|rg| {
                    let stride = self.options.row_index_stride as u64;
                    let rows = if stride == 0 {
                        self.rows_in_stripe
                    } else {
                        (self.rows_in_stripe - rg as u64 * stride).min(stride)
                    };
                    RowIndexEntry {
                        positions: Vec::new(),
                        statistics: Some(root_statistics(rows)),
                    }
                })
                .collect(),
        };

        let mut streams = Vec::new();
        let mut index_bytes = Vec::new();
        let mut data_bytes = Vec::new();
        if self.options.row_index_stride > 0 {
            let root = self.compress(&root_index.encode())?;
            streams.push(Stream {
                kind: StreamKind::RowIndex,
                column: 0,
                length: root.len() as u64,
            });
            index_bytes.extend_from_slice(&root);
            for (column, stripe) in self.columns.iter().zip(&finished) {
                streams.push(Stream {
                    kind: StreamKind::RowIndex,
                    column: column.id(),
                    length: stripe.index.len() as u64,
                });
                index_bytes.extend_from_slice(&stripe.index);
            }
        }
        for (column, stripe) in self.columns.iter().zip(&finished) {
            for (kind, bytes) in &stripe.streams {
                streams.push(Stream {
                    kind: *kind,
                    column: column.id(),
                    length: bytes.len() as u64,
                });
                data_bytes.extend_from_slice(bytes);
            }
        }

        let mut encodings = vec![ColumnEncoding {
            kind: ColumnEncodingKind::Direct,
            dictionary_size: 0,
        }];
        encodings.extend(finished.iter().map(|s| s.encoding));
        let footer = StripeFooter {
            streams,
            columns: encodings,
            writer_timezone: Some(WRITER_TIMEZONE.to_string()),
        };
        let footer_bytes = self.compress(&footer.encode())?;

        let info = StripeInformation {
            offset: self.offset,
            index_length: index_bytes.len() as u64,
            data_length: data_bytes.len() as u64,
            footer_length: footer_bytes.len() as u64,
            number_of_rows: self.rows_in_stripe,
        };
        self.write_bytes(&index_bytes)?;
        self.write_bytes(&data_bytes)?;
        self.write_bytes(&footer_bytes)?;
        debug!(
            "wrote stripe {}: {} rows, {} bytes at offset {}",
            self.stripes.len(),
            info.number_of_rows,
            info.total_length(),
            info.offset
        );

        let mut col_stats = vec![root_stats];
        col_stats.extend(finished.into_iter().map(|s| s.statistics));
        self.stripe_stats.push(StripeStatistics { col_stats });
        self.stripes.push(info);
        self.total_rows += self.rows_in_stripe;
        self.rows_in_stripe = 0;
        self.rows_in_row_group = 0;
        self.row_groups_in_stripe = 0;
        Ok(())
    }

    /// Flushes the last stripe, writes metadata, footer and postscript, and
    /// returns the underlying sink.
    pub fn close(mut self) -> Result<W> {
        self.flush_stripe()?;

        let metadata = Metadata {
            stripe_stats: std::mem::take(&mut self.stripe_stats),
        };
        let metadata_bytes = self.compress(&metadata.encode())?;
        self.write_bytes(&metadata_bytes)?;

        let mut statistics = vec![root_statistics(self.total_rows)];
        statistics.extend(self.columns.iter().map(|c| c.file_statistics()));
        let footer = Footer {
            header_length: MAGIC.len() as u64,
            content_length: self.offset - metadata_bytes.len() as u64,
            stripes: std::mem::take(&mut self.stripes),
            types: self.schema.to_types(),
            metadata: std::mem::take(&mut self.user_metadata),
            number_of_rows: self.total_rows,
            statistics,
            row_index_stride: self.options.row_index_stride,
        };
        let footer_bytes = self.compress(&footer.encode())?;
        self.write_bytes(&footer_bytes)?;

        let postscript = PostScript {
            footer_length: footer_bytes.len() as u64,
            compression: self.options.compression,
            compression_block_size: Some(self.options.compression_block_size as u64),
            version: FILE_VERSION.to_vec(),
            metadata_length: metadata_bytes.len() as u64,
            writer_version: Some(WRITER_VERSION),
            magic: Some(MAGIC.to_string()),
        };
        let ps_bytes = postscript.encode();
        let ps_len = u8::try_from(ps_bytes.len()).map_err(|_| {
            OrcError::InvalidFormat(format!("postscript of {} bytes", ps_bytes.len()))
        })?;
        self.write_bytes(&ps_bytes)?;
        self.write_bytes(&[ps_len])?;
        self.sink.flush()?;
        info!(
            "closed ORC file: {} rows in {} stripes, {} bytes",
            footer.number_of_rows,
            footer.stripes.len(),
            self.offset
        );
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, DataType};
    use crate::table::Value;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Int),
            Column::new("name", DataType::String),
        ])
    }

    #[test]
    fn test_empty_file_layout() {
        let writer = OrcWriter::new(Vec::new(), schema(), WriterOptions::default()).unwrap();
        let bytes = writer.close().unwrap();
        assert_eq!(&bytes[..3], b"ORC");
        let ps_len = *bytes.last().unwrap() as usize;
        let ps = PostScript::decode(&bytes[bytes.len() - 1 - ps_len..bytes.len() - 1]).unwrap();
        assert_eq!(ps.magic.as_deref(), Some("ORC"));
        assert_eq!(ps.version, vec![0, 12]);
        assert_eq!(ps.writer_version, Some(6));
        assert_eq!(ps.compression, CompressionKind::Zlib);
    }

    #[test]
    fn test_rejected_row_leaves_writer_untouched() {
        let mut writer = OrcWriter::new(Vec::new(), schema(), WriterOptions::default()).unwrap();
        let bad = Row::new(vec![Value::String("x".into()), Value::Integer(1)]);
        assert!(matches!(
            writer.write_row(&bad),
            Err(OrcError::SchemaMismatch(_))
        ));
        let short = Row::new(vec![Value::Integer(1)]);
        assert!(writer.write_row(&short).is_err());
        assert_eq!(writer.rows_written(), 0);
    }

    #[test]
    fn test_unsupported_compression() {
        let options = WriterOptions::default().with_compression(CompressionKind::Snappy);
        assert!(matches!(
            OrcWriter::new(Vec::new(), schema(), options),
            Err(OrcError::Unsupported(_))
        ));
    }

    #[test]
    fn test_user_metadata_replaces_by_name() {
        let mut writer = OrcWriter::new(Vec::new(), schema(), WriterOptions::default()).unwrap();
        writer.add_user_metadata("k", b"v1".to_vec());
        writer.add_user_metadata("k", b"v2".to_vec());
        assert_eq!(writer.user_metadata.len(), 1);
        assert_eq!(writer.user_metadata[0].value, b"v2");
    }

    #[test]
    fn test_options_builder() {
        let options = WriterOptions::default()
            .with_stripe_size(0)
            .with_row_index_stride(500)
            .with_compression_block_size(usize::MAX)
            .with_dictionary_key_size_threshold(2.0);
        assert_eq!(options.stripe_size, 1);
        assert_eq!(options.row_index_stride, 500);
        assert_eq!(options.compression_block_size, MAX_BLOCK_SIZE);
        assert_eq!(options.dictionary_key_size_threshold, 1.0);
    }
}
