//! Byte-range providers that the reader fetches file regions from.
//!
//! Each provider serialises physical reads behind a lock, so a single
//! provider can be shared by concurrent stripe or column fills.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{OrcError, Result};

fn tail_start(len: u64, offset_from_end: u64) -> Result<u64> {
    len.checked_sub(offset_from_end)
        .ok_or(OrcError::SizeMismatch {
            requested: offset_from_end as usize,
            actual: len as usize,
        })
}

/// Blocking access to byte ranges of an ORC file.
pub trait ByteRangeProvider: Send + Sync {
    fn len(&self) -> Result<u64>;

    /// Fills `buf` completely from `position`, or fails with
    /// [`OrcError::SizeMismatch`].
    fn fill(&self, buf: &mut [u8], position: u64) -> Result<()>;

    /// Fills `buf` from `offset_from_end` bytes before the end of the file.
    fn fill_from_end(&self, buf: &mut [u8], offset_from_end: u64) -> Result<()> {
        let start = tail_start(self.len()?, offset_from_end)?;
        self.fill(buf, start)
    }
}

/// Awaitable access to byte ranges of an ORC file.
#[async_trait]
pub trait AsyncByteRangeProvider: Send + Sync {
    async fn len(&self) -> Result<u64>;

    async fn fill(&self, buf: &mut [u8], position: u64) -> Result<()>;

    async fn fill_from_end(&self, buf: &mut [u8], offset_from_end: u64) -> Result<()> {
        let start = tail_start(self.len().await?, offset_from_end)?;
        self.fill(buf, start).await
    }
}

pub struct FileByteRangeProvider {
    file: Mutex<File>,
    len: u64,
}

impl FileByteRangeProvider {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(file)
    }

    pub fn new(file: File) -> Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }
}

impl ByteRangeProvider for FileByteRangeProvider {
    fn len(&self) -> Result<u64> {
        Ok(self.len)
    }

    fn fill(&self, buf: &mut [u8], position: u64) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(position))?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(OrcError::SizeMismatch {
                    requested: buf.len(),
                    actual: filled,
                });
            }
            filled += n;
        }
        Ok(())
    }
}

pub struct AsyncFileByteRangeProvider {
    file: tokio::sync::Mutex<tokio::fs::File>,
    len: u64,
}

impl AsyncFileByteRangeProvider {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            file: tokio::sync::Mutex::new(file),
            len,
        })
    }
}

#[async_trait]
impl AsyncByteRangeProvider for AsyncFileByteRangeProvider {
    async fn len(&self) -> Result<u64> {
        Ok(self.len)
    }

    async fn fill(&self, buf: &mut [u8], position: u64) -> Result<()> {
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(position)).await?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(OrcError::SizeMismatch {
                    requested: buf.len(),
                    actual: filled,
                });
            }
            filled += n;
        }
        Ok(())
    }
}

/// A whole file held in memory. Serves both the blocking and the async path.
#[derive(Debug, Clone)]
pub struct InMemoryByteRangeProvider {
    data: Arc<[u8]>,
}

impl InMemoryByteRangeProvider {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    fn copy(&self, buf: &mut [u8], position: u64) -> Result<()> {
        let start = (position as usize).min(self.data.len());
        let available = self.data.len() - start;
        if available < buf.len() {
            return Err(OrcError::SizeMismatch {
                requested: buf.len(),
                actual: available,
            });
        }
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }
}

impl ByteRangeProvider for InMemoryByteRangeProvider {
    fn len(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn fill(&self, buf: &mut [u8], position: u64) -> Result<()> {
        self.copy(buf, position)
    }
}

#[async_trait]
impl AsyncByteRangeProvider for InMemoryByteRangeProvider {
    async fn len(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    async fn fill(&self, buf: &mut [u8], position: u64) -> Result<()> {
        self.copy(buf, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_in_memory_fill_and_tail() {
        let provider = InMemoryByteRangeProvider::new(b"ORC0123456789".to_vec());
        let mut buf = [0u8; 3];
        ByteRangeProvider::fill(&provider, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"ORC");
        ByteRangeProvider::fill_from_end(&provider, &mut buf, 3).unwrap();
        assert_eq!(&buf, b"789");
    }

    #[test]
    fn test_short_fill_is_size_mismatch() {
        let provider = InMemoryByteRangeProvider::new(vec![1u8, 2, 3, 4]);
        let mut buf = [0u8; 8];
        let err = ByteRangeProvider::fill(&provider, &mut buf, 2).unwrap_err();
        assert!(matches!(
            err,
            OrcError::SizeMismatch {
                requested: 8,
                actual: 2
            }
        ));
        assert!(ByteRangeProvider::fill_from_end(&provider, &mut buf, 10).is_err());
    }

    #[test]
    fn test_file_provider() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello, stripes").unwrap();
        file.flush().unwrap();

        let provider = FileByteRangeProvider::open(file.path()).unwrap();
        assert_eq!(provider.len().unwrap(), 14);
        let mut buf = [0u8; 7];
        provider.fill(&mut buf, 7).unwrap();
        assert_eq!(&buf, b"stripes");
        assert!(matches!(
            provider.fill(&mut buf, 10),
            Err(OrcError::SizeMismatch { requested: 7, actual: 4 })
        ));
    }

    #[tokio::test]
    async fn test_async_file_provider() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let provider = AsyncFileByteRangeProvider::open(file.path()).await.unwrap();
        let mut buf = [0u8; 4];
        provider.fill_from_end(&mut buf, 4).await.unwrap();
        assert_eq!(&buf, b"6789");
        provider.fill(&mut buf, 2).await.unwrap();
        assert_eq!(&buf, b"2345");
    }
}
