//! Reading ORC files: tail parsing, stripe loading and column decoding.

pub mod buffer;
pub mod column;
pub mod stripe;

pub use buffer::{BufferPool, ColumnBuffer, TypedBuffer};
pub use column::ColumnDecoder;
pub use stripe::{StripeContext, StripeReader};

use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::compression::{codec_for, CompressionKind, DEFAULT_BLOCK_SIZE};
use crate::error::{OrcError, Result};
use crate::io::{
    AsyncByteRangeProvider, AsyncFileByteRangeProvider, ByteRangeProvider, FileByteRangeProvider,
};
use crate::proto::{
    ColumnStatistics, Footer, Message, Metadata, PostScript, StripeInformation, StripeStatistics,
    UserMetadataItem, MAGIC,
};
use crate::schema::{Column, Schema};
use crate::table::{Row, Table};

/// Bytes fetched from the end of the file on open, enough for the tail of
/// most files in one read.
pub const DEFAULT_TAIL_READ_SIZE: usize = 16 * 1024;

/// The postscript is at most 255 bytes plus its length byte.
const MIN_TAIL_READ_SIZE: usize = 256;

/// Newest file version this reader understands.
const SUPPORTED_VERSION: [u32; 2] = [0, 12];

#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub tail_read_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            tail_read_size: DEFAULT_TAIL_READ_SIZE,
        }
    }
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tail_read_size(mut self, size: usize) -> Self {
        self.tail_read_size = size.max(MIN_TAIL_READ_SIZE);
        self
    }
}

/// Everything after the last stripe: metadata, footer and postscript.
#[derive(Debug, Clone)]
pub struct FileTail {
    pub postscript: PostScript,
    pub footer: Footer,
    pub metadata: Metadata,
    pub file_length: u64,
}

/// Warns when the leading bytes are not the magic. Readers rely on the
/// postscript magic, so a damaged header alone does not fail the open.
fn check_header(header: &[u8]) -> bool {
    let valid = header == MAGIC.as_bytes();
    if !valid {
        warn!(
            "file header {:?} is not {:?}; continuing with the postscript",
            String::from_utf8_lossy(header),
            MAGIC
        );
    }
    valid
}

/// Decodes the postscript from the end of `tail` and returns it with the
/// number of trailing bytes the whole tail occupies.
fn read_postscript(tail: &[u8], file_length: u64) -> Result<(PostScript, usize)> {
    let (&ps_len, rest) = tail
        .split_last()
        .ok_or_else(|| OrcError::InvalidFormat("empty file".into()))?;
    let ps_len = ps_len as usize;
    if ps_len == 0 || ps_len > rest.len() {
        return Err(OrcError::InvalidFormat(format!(
            "postscript length {} does not fit a file of {} bytes",
            ps_len, file_length
        )));
    }
    let postscript = PostScript::decode(&rest[rest.len() - ps_len..])?;
    if postscript.magic.as_deref() != Some(MAGIC) {
        return Err(OrcError::InvalidFormat(format!(
            "bad postscript magic {:?}",
            postscript.magic
        )));
    }
    if postscript.version.as_slice() > SUPPORTED_VERSION.as_slice() {
        warn!(
            "file version {:?} is newer than {:?}; reading anyway",
            postscript.version, SUPPORTED_VERSION
        );
    }
    let needed = 1 + ps_len + postscript.footer_length as usize + postscript.metadata_length as usize;
    if needed as u64 + MAGIC.len() as u64 > file_length {
        return Err(OrcError::InvalidFormat(format!(
            "tail of {} bytes does not fit a file of {} bytes",
            needed, file_length
        )));
    }
    Ok((postscript, needed))
}

impl FileTail {
    /// Parses a tail whose last `needed` bytes hold metadata, footer and
    /// postscript.
    fn parse(tail: &[u8], postscript: PostScript, file_length: u64) -> Result<(Self, StripeContext)> {
        let ps_len = tail[tail.len() - 1] as usize;
        let footer_end = tail.len() - 1 - ps_len;
        let footer_start = footer_end - postscript.footer_length as usize;
        let metadata_start = footer_start - postscript.metadata_length as usize;

        let codec = codec_for(postscript.compression, 6)?;
        let block_size = postscript
            .compression_block_size
            .map_or(DEFAULT_BLOCK_SIZE, |s| s as usize);
        let bootstrap = StripeContext {
            codec,
            block_size,
            row_index_stride: 0,
            schema: Arc::new(Schema::new(Vec::new())),
            pool: Arc::new(BufferPool::new()),
        };

        let footer: Footer = bootstrap.decode(&tail[footer_start..footer_end])?;
        let metadata: Metadata = if postscript.metadata_length == 0 {
            Metadata::default()
        } else {
            bootstrap.decode(&tail[metadata_start..footer_start])?
        };

        let schema = Schema::from_types(&footer.types)?;
        let tail_start = file_length - (tail.len() - metadata_start) as u64;
        let mut rows = 0;
        for (i, stripe) in footer.stripes.iter().enumerate() {
            if stripe.offset + stripe.total_length() > tail_start {
                return Err(OrcError::InvalidFormat(format!(
                    "stripe {} at {} (+{}) overlaps the file tail at {}",
                    i,
                    stripe.offset,
                    stripe.total_length(),
                    tail_start
                )));
            }
            rows += stripe.number_of_rows;
        }
        if rows != footer.number_of_rows {
            warn!(
                "footer claims {} rows but stripes hold {}",
                footer.number_of_rows, rows
            );
        }

        let context = StripeContext {
            row_index_stride: footer.row_index_stride,
            schema: Arc::new(schema),
            ..bootstrap
        };
        Ok((
            Self {
                postscript,
                footer,
                metadata,
                file_length,
            },
            context,
        ))
    }
}

/// An open ORC file over a byte-range provider `P`.
///
/// The blocking methods need `P: ByteRangeProvider`, the `_async` ones
/// `P: AsyncByteRangeProvider`.
pub struct OrcReader<P> {
    provider: P,
    tail: FileTail,
    context: StripeContext,
}

impl<P> OrcReader<P> {
    pub fn schema(&self) -> &Schema {
        &self.context.schema
    }

    pub fn postscript(&self) -> &PostScript {
        &self.tail.postscript
    }

    pub fn footer(&self) -> &Footer {
        &self.tail.footer
    }

    pub fn file_length(&self) -> u64 {
        self.tail.file_length
    }

    pub fn number_of_rows(&self) -> u64 {
        self.tail.footer.number_of_rows
    }

    pub fn compression(&self) -> CompressionKind {
        self.tail.postscript.compression
    }

    pub fn compression_block_size(&self) -> usize {
        self.context.block_size
    }

    pub fn row_index_stride(&self) -> u32 {
        self.context.row_index_stride
    }

    pub fn file_version(&self) -> String {
        self.tail
            .postscript
            .version
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn writer_version(&self) -> Option<u32> {
        self.tail.postscript.writer_version
    }

    pub fn stripes(&self) -> &[StripeInformation] {
        &self.tail.footer.stripes
    }

    /// File-level statistics, one entry per column id (0 is the root).
    pub fn statistics(&self) -> &[ColumnStatistics] {
        &self.tail.footer.statistics
    }

    pub fn column_statistics(&self, name: &str) -> Result<&ColumnStatistics> {
        let index = self
            .schema()
            .column_index(name)
            .ok_or_else(|| OrcError::ColumnNotFound(name.to_string()))?;
        self.tail.footer.statistics.get(index + 1).ok_or_else(|| {
            OrcError::InvalidFormat(format!("no statistics for column '{}'", name))
        })
    }

    pub fn stripe_statistics(&self) -> &[StripeStatistics] {
        &self.tail.metadata.stripe_stats
    }

    pub fn user_metadata(&self) -> &[UserMetadataItem] {
        &self.tail.footer.metadata
    }

    pub fn user_metadata_value(&self, name: &str) -> Option<&[u8]> {
        self.tail
            .footer
            .metadata
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.value.as_slice())
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.context.pool
    }

    fn stripe_info(&self, index: usize) -> Result<&StripeInformation> {
        self.tail.footer.stripes.get(index).ok_or_else(|| {
            OrcError::InvalidFormat(format!(
                "stripe {} out of range, file has {}",
                index,
                self.tail.footer.stripes.len()
            ))
        })
    }

    fn projected_schema(&self, projection: &[usize]) -> Schema {
        let columns: Vec<Column> = projection
            .iter()
            .map(|&i| self.schema().columns[i].clone())
            .collect();
        Schema::new(columns)
    }
}

fn collect_rows(stripe: &StripeReader, projection: &[usize], rows: &mut Vec<Row>) -> Result<()> {
    let buffers = projection
        .iter()
        .map(|&c| stripe.read_column(c))
        .collect::<Result<Vec<_>>>()?;
    for r in 0..stripe.number_of_rows() as usize {
        rows.push(Row::new(buffers.iter().map(|b| b.value(r)).collect()));
    }
    Ok(())
}

impl OrcReader<FileByteRangeProvider> {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("opening {}", path.display());
        Self::open(FileByteRangeProvider::open(path)?)
    }
}

impl<P: ByteRangeProvider> OrcReader<P> {
    pub fn open(provider: P) -> Result<Self> {
        Self::open_with_options(provider, ReaderOptions::default())
    }

    pub fn open_with_options(provider: P, options: ReaderOptions) -> Result<Self> {
        let file_length = provider.len()?;
        if file_length <= MAGIC.len() as u64 {
            return Err(OrcError::InvalidFormat(format!(
                "{} bytes is too short for an ORC file",
                file_length
            )));
        }
        let mut header = [0u8; 3];
        provider.fill(&mut header, 0)?;
        check_header(&header);

        let read = (options.tail_read_size as u64).min(file_length) as usize;
        let mut tail = vec![0u8; read];
        provider.fill_from_end(&mut tail, read as u64)?;

        let (postscript, needed) = read_postscript(&tail, file_length)?;
        if needed > tail.len() {
            debug!("tail needs {} bytes, re-reading", needed);
            tail = vec![0u8; needed];
            provider.fill_from_end(&mut tail, needed as u64)?;
        }
        let (tail, context) = FileTail::parse(&tail, postscript, file_length)?;
        debug!(
            "opened ORC file: {} rows in {} stripes, compression {}",
            tail.footer.number_of_rows,
            tail.footer.stripes.len(),
            tail.postscript.compression
        );
        Ok(Self {
            provider,
            tail,
            context,
        })
    }

    /// Loads stripe `index` into memory.
    pub fn stripe(&self, index: usize) -> Result<StripeReader> {
        let info = self.stripe_info(index)?.clone();
        let mut data = vec![0u8; info.total_length() as usize];
        self.provider.fill(&mut data, info.offset)?;
        StripeReader::new(index, info, data, self.context.clone())
    }

    /// Reads the selected columns (all when `None`) of every stripe.
    pub fn read_table(&self, columns: Option<&[String]>) -> Result<Table> {
        let projection = self.schema().resolve(columns)?;
        let mut rows = Vec::with_capacity(self.number_of_rows() as usize);
        for index in 0..self.stripes().len() {
            collect_rows(&self.stripe(index)?, &projection, &mut rows)?;
        }
        Ok(Table::with_rows("orc", self.projected_schema(&projection), rows))
    }
}

impl OrcReader<AsyncFileByteRangeProvider> {
    pub async fn open_path_async(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("opening {}", path.display());
        Self::open_async(AsyncFileByteRangeProvider::open(path).await?).await
    }
}

impl<P: AsyncByteRangeProvider> OrcReader<P> {
    pub async fn open_async(provider: P) -> Result<Self> {
        Self::open_async_with_options(provider, ReaderOptions::default()).await
    }

    pub async fn open_async_with_options(provider: P, options: ReaderOptions) -> Result<Self> {
        let file_length = provider.len().await?;
        if file_length <= MAGIC.len() as u64 {
            return Err(OrcError::InvalidFormat(format!(
                "{} bytes is too short for an ORC file",
                file_length
            )));
        }
        let mut header = [0u8; 3];
        provider.fill(&mut header, 0).await?;
        check_header(&header);

        let read = (options.tail_read_size as u64).min(file_length) as usize;
        let mut tail = vec![0u8; read];
        provider.fill_from_end(&mut tail, read as u64).await?;

        let (postscript, needed) = read_postscript(&tail, file_length)?;
        if needed > tail.len() {
            debug!("tail needs {} bytes, re-reading", needed);
            tail = vec![0u8; needed];
            provider.fill_from_end(&mut tail, needed as u64).await?;
        }
        let (tail, context) = FileTail::parse(&tail, postscript, file_length)?;
        Ok(Self {
            provider,
            tail,
            context,
        })
    }

    pub async fn stripe_async(&self, index: usize) -> Result<StripeReader> {
        let info = self.stripe_info(index)?.clone();
        let mut data = vec![0u8; info.total_length() as usize];
        self.provider.fill(&mut data, info.offset).await?;
        StripeReader::new(index, info, data, self.context.clone())
    }

    pub async fn read_table_async(&self, columns: Option<&[String]>) -> Result<Table> {
        let projection = self.schema().resolve(columns)?;
        let mut rows = Vec::with_capacity(self.number_of_rows() as usize);
        for index in 0..self.stripes().len() {
            let stripe = self.stripe_async(index).await?;
            collect_rows(&stripe, &projection, &mut rows)?;
        }
        Ok(Table::with_rows("orc", self.projected_schema(&projection), rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::InMemoryByteRangeProvider;

    #[test]
    fn test_too_short_file() {
        let provider = InMemoryByteRangeProvider::new(b"ORC".to_vec());
        assert!(matches!(
            OrcReader::open(provider),
            Err(OrcError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_postscript_length_out_of_range() {
        let mut bytes = b"ORC".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 200]);
        let provider = InMemoryByteRangeProvider::new(bytes);
        assert!(matches!(
            OrcReader::open(provider),
            Err(OrcError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_check_header() {
        assert!(check_header(b"ORC"));
        assert!(!check_header(b"PAR"));
    }

    #[test]
    fn test_bad_magic() {
        let ps = PostScript {
            footer_length: 0,
            compression: CompressionKind::None,
            compression_block_size: None,
            version: vec![0, 12],
            metadata_length: 0,
            writer_version: Some(6),
            magic: Some("ORX".into()),
        };
        let encoded = ps.encode();
        let mut bytes = b"ORC".to_vec();
        bytes.extend_from_slice(&encoded);
        bytes.push(encoded.len() as u8);
        let provider = InMemoryByteRangeProvider::new(bytes);
        let err = OrcReader::open(provider).err().unwrap();
        assert!(err.to_string().contains("magic"));
    }
}
