use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use log::{debug, trace};

use super::buffer::{BufferPool, ColumnBuffer};
use super::column::ColumnDecoder;
use crate::compression::{BlockStream, SharedCodec};
use crate::encoding::PositionCursor;
use crate::error::{OrcError, Result};
use crate::proto::{
    ColumnEncodingKind, ColumnStatistics, Message, RowIndex, StreamKind, StripeFooter,
    StripeInformation,
};
use crate::schema::{DataType, Schema};

/// File-level settings every stripe of one file is decoded with.
#[derive(Clone)]
pub struct StripeContext {
    pub codec: Option<SharedCodec>,
    pub block_size: usize,
    pub row_index_stride: u32,
    pub schema: Arc<Schema>,
    pub pool: Arc<BufferPool>,
}

impl StripeContext {
    /// Reads a whole compressed region (footer, metadata, index) into memory.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        BlockStream::new(data, self.codec.clone(), self.block_size).read_to_vec()
    }

    pub fn decode<M: Message>(&self, data: &[u8]) -> Result<M> {
        M::decode(&self.decompress(data)?)
    }
}

/// One stripe loaded into memory, with its stream directory resolved.
pub struct StripeReader {
    index: usize,
    info: StripeInformation,
    data: Vec<u8>,
    footer: StripeFooter,
    streams: HashMap<(u32, StreamKind), Range<usize>>,
    row_indexes: Vec<Option<RowIndex>>,
    context: StripeContext,
}

impl StripeReader {
    /// Parses a stripe from its bytes, `info.total_length()` of them starting
    /// at `info.offset`.
    pub fn new(
        index: usize,
        info: StripeInformation,
        data: Vec<u8>,
        context: StripeContext,
    ) -> Result<Self> {
        if data.len() as u64 != info.total_length() {
            return Err(OrcError::SizeMismatch {
                requested: info.total_length() as usize,
                actual: data.len(),
            });
        }
        let body_len = (info.index_length + info.data_length) as usize;
        let footer_end = body_len + info.footer_length as usize;
        let footer: StripeFooter = context.decode(&data[body_len..footer_end])?;

        let mut streams = HashMap::with_capacity(footer.streams.len());
        let mut offset = 0usize;
        for stream in &footer.streams {
            let end = offset + stream.length as usize;
            if end > body_len {
                return Err(OrcError::InvalidFormat(format!(
                    "stream {:?} of column {} ends at {}, past the stripe body of {} bytes",
                    stream.kind, stream.column, end, body_len
                )));
            }
            trace!(
                "stripe {} stream {:?} column {} at {}..{}",
                index,
                stream.kind,
                stream.column,
                offset,
                end
            );
            streams.insert((stream.column, stream.kind), offset..end);
            offset = end;
        }

        let column_count = context.schema.column_count() + 1;
        if footer.columns.len() < column_count {
            return Err(OrcError::InvalidFormat(format!(
                "stripe {} has {} column encodings, expected {}",
                index,
                footer.columns.len(),
                column_count
            )));
        }

        let mut row_indexes = Vec::with_capacity(column_count);
        for column in 0..column_count as u32 {
            let row_index = match streams.get(&(column, StreamKind::RowIndex)) {
                Some(range) => Some(context.decode::<RowIndex>(&data[range.clone()])?),
                None => None,
            };
            row_indexes.push(row_index);
        }

        debug!(
            "loaded stripe {}: {} rows, {} streams, {} bytes",
            index,
            info.number_of_rows,
            footer.streams.len(),
            data.len()
        );
        Ok(Self {
            index,
            info,
            data,
            footer,
            streams,
            row_indexes,
            context,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn information(&self) -> &StripeInformation {
        &self.info
    }

    pub fn footer(&self) -> &StripeFooter {
        &self.footer
    }

    pub fn schema(&self) -> &Schema {
        &self.context.schema
    }

    pub fn number_of_rows(&self) -> u64 {
        self.info.number_of_rows
    }

    pub fn writer_timezone(&self) -> Option<&str> {
        self.footer.writer_timezone.as_deref()
    }

    /// Raw bytes of a stream, still in compression blocks.
    pub fn get_stream(&self, column: u32, kind: StreamKind) -> Option<&[u8]> {
        self.streams
            .get(&(column, kind))
            .map(|range| &self.data[range.clone()])
    }

    pub fn has_stream(&self, column: u32, kind: StreamKind) -> bool {
        self.streams.contains_key(&(column, kind))
    }

    /// Opens a stream for decoding. A missing optional stream reads as empty.
    pub fn stream(&self, column: u32, kind: StreamKind, required: bool) -> Result<BlockStream<'_>> {
        let data = match self.get_stream(column, kind) {
            Some(data) => data,
            None if required => {
                return Err(OrcError::InvalidFormat(format!(
                    "stripe {} column {} has no {:?} stream",
                    self.index, column, kind
                )))
            }
            None => &[],
        };
        Ok(BlockStream::new(
            data,
            self.context.codec.clone(),
            self.context.block_size,
        ))
    }

    pub fn encoding(&self, column: u32) -> Result<ColumnEncodingKind> {
        self.footer
            .columns
            .get(column as usize)
            .map(|e| e.kind)
            .ok_or_else(|| OrcError::InvalidFormat(format!("no encoding for column {}", column)))
    }

    pub fn dictionary_size(&self, column: u32) -> Result<usize> {
        self.footer
            .columns
            .get(column as usize)
            .map(|e| e.dictionary_size as usize)
            .ok_or_else(|| OrcError::InvalidFormat(format!("no encoding for column {}", column)))
    }

    pub fn row_group_count(&self) -> usize {
        let stride = self.context.row_index_stride as u64;
        if stride == 0 {
            return 1;
        }
        self.info.number_of_rows.div_ceil(stride).max(1) as usize
    }

    /// Rows in a row group: the stride, or the remainder for the last one.
    pub fn row_group_rows(&self, row_group: usize) -> u64 {
        let stride = self.context.row_index_stride as u64;
        if stride == 0 {
            return self.info.number_of_rows;
        }
        let start = row_group as u64 * stride;
        self.info.number_of_rows.saturating_sub(start).min(stride)
    }

    pub fn row_index(&self, column: u32) -> Result<&RowIndex> {
        self.row_indexes
            .get(column as usize)
            .and_then(|i| i.as_ref())
            .ok_or_else(|| {
                OrcError::InvalidFormat(format!(
                    "stripe {} has no row index for column {}",
                    self.index, column
                ))
            })
    }

    /// Seek coordinates for a row group, in PRESENT then data stream order.
    pub fn get_positions(&self, column: u32, row_group: usize) -> Result<&[u64]> {
        let index = self.row_index(column)?;
        index
            .entries
            .get(row_group)
            .map(|e| e.positions.as_slice())
            .ok_or_else(|| {
                OrcError::InvalidFormat(format!(
                    "row group {} out of range for column {} ({} entries)",
                    row_group,
                    column,
                    index.entries.len()
                ))
            })
    }

    pub fn row_group_statistics(&self, column: u32, row_group: usize) -> Option<&ColumnStatistics> {
        self.row_indexes
            .get(column as usize)?
            .as_ref()?
            .entries
            .get(row_group)?
            .statistics
            .as_ref()
    }

    fn column_type(&self, column: usize) -> Result<DataType> {
        self.context
            .schema
            .columns
            .get(column)
            .map(|c| c.data_type)
            .ok_or_else(|| OrcError::ColumnNotFound(format!("column #{}", column)))
    }

    fn decoder(&self, column: usize, row_group: Option<usize>) -> Result<ColumnDecoder<'_>> {
        let data_type = self.column_type(column)?;
        let id = column as u32 + 1;
        match row_group {
            Some(rg) if rg > 0 => {
                let mut cursor = PositionCursor::new(self.get_positions(id, rg)?);
                ColumnDecoder::new(self, id, data_type, Some(&mut cursor))
            }
            _ => ColumnDecoder::new(self, id, data_type, None),
        }
    }

    /// Decodes a whole column of the stripe. `column` is a schema position.
    pub fn read_column(&self, column: usize) -> Result<ColumnBuffer> {
        let rows = self.info.number_of_rows as usize;
        let mut out = ColumnBuffer::for_type(&self.column_type(column)?, rows);
        self.decoder(column, None)?
            .fill(rows, &mut out, &self.context.pool)?;
        Ok(out)
    }

    /// Decodes one row group into `out`, replacing its contents.
    pub fn fill_row_group(
        &self,
        column: usize,
        row_group: usize,
        out: &mut ColumnBuffer,
    ) -> Result<()> {
        if row_group >= self.row_group_count() {
            return Err(OrcError::InvalidFormat(format!(
                "row group {} out of range, stripe {} has {}",
                row_group,
                self.index,
                self.row_group_count()
            )));
        }
        let rows = self.row_group_rows(row_group) as usize;
        if rows > out.capacity() {
            return Err(OrcError::BufferTooSmall {
                required: rows,
                provided: out.capacity(),
            });
        }
        out.clear();
        self.decoder(column, Some(row_group))?
            .fill(rows, out, &self.context.pool)
    }

    pub fn read_row_group(&self, column: usize, row_group: usize) -> Result<ColumnBuffer> {
        let rows = self.row_group_rows(row_group) as usize;
        let mut out = ColumnBuffer::for_type(&self.column_type(column)?, rows);
        self.fill_row_group(column, row_group, &mut out)?;
        Ok(out)
    }

    /// Decodes an arbitrary row range, seeking to the row group that holds
    /// its first row when a row index is available.
    pub fn read_rows(&self, column: usize, rows: Range<u64>) -> Result<ColumnBuffer> {
        if rows.end > self.info.number_of_rows || rows.start > rows.end {
            return Err(OrcError::InvalidFormat(format!(
                "rows {:?} out of range, stripe {} has {}",
                rows, self.index, self.info.number_of_rows
            )));
        }
        let stride = self.context.row_index_stride as u64;
        let id = column as u32 + 1;
        let (row_group, group_start) = if stride > 0 && self.row_index(id).is_ok() {
            let rg = rows.start / stride;
            (Some(rg as usize), rg * stride)
        } else {
            (None, 0)
        };

        let count = (rows.end - rows.start) as usize;
        let mut out = ColumnBuffer::for_type(&self.column_type(column)?, count);
        let mut decoder = self.decoder(column, row_group)?;
        decoder.skip_rows((rows.start - group_start) as usize, &self.context.pool)?;
        decoder.fill(count, &mut out, &self.context.pool)?;
        Ok(out)
    }
}
