use std::fmt;
use std::path::Path;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::TransferError;
use crate::types::Chunk;

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Caller content handed to an upload.
///
/// Buffers are sliced by explicit offset; streams are read forward only.
pub enum Content {
    /// Fully materialized bytes.
    Bytes(Bytes),
    /// Incrementally readable content with an optionally declared size.
    Stream {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        size: Option<u64>,
    },
}

impl Content {
    /// Wraps a reader of unknown length.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream {
            reader: Box::new(reader),
            size: None,
        }
    }

    /// Wraps a reader whose total length is known up front.
    pub fn from_reader_with_size<R>(reader: R, size: u64) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream {
            reader: Box::new(reader),
            size: Some(size),
        }
    }

    /// Opens a file as a sized stream.
    pub async fn from_file(path: &Path) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        debug!(path = %path.display(), size, "opened file content");
        Ok(Self::from_reader_with_size(file, size))
    }

    /// Total length, if it can be determined without consuming the content.
    ///
    /// An explicitly declared size wins; buffers report their length;
    /// anything else is unknown.
    pub fn len(&self) -> Option<u64> {
        match self {
            Self::Bytes(b) => Some(b.len() as u64),
            Self::Stream { size, .. } => *size,
        }
    }

    /// `true` only when the length is known to be zero.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream { .. })
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream { size, .. } => f.debug_struct("Stream").field("size", size).finish(),
        }
    }
}

impl From<Bytes> for Content {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<u8>> for Content {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl From<&'static [u8]> for Content {
    fn from(s: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(s))
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::Bytes(Bytes::from(s))
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

// ---------------------------------------------------------------------------
// ChunkSource
// ---------------------------------------------------------------------------

/// Yields successive chunks of a [`Content`].
///
/// Chunks are contiguous and start at offset 0. An empty chunk means the
/// content is exhausted; every later call returns an empty chunk too.
pub struct ChunkSource {
    content: Content,
    total_len: Option<u64>,
    offset: u64,
    exhausted: bool,
}

impl ChunkSource {
    pub fn new(content: Content) -> Self {
        let total_len = content.len();
        Self {
            content,
            total_len,
            offset: 0,
            exhausted: false,
        }
    }

    /// Length discovered when the source was created.
    pub fn total_len(&self) -> Option<u64> {
        self.total_len
    }

    /// Offset of the next chunk.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Reads the next chunk of at most `chunk_size` bytes.
    pub async fn next(&mut self, chunk_size: usize) -> Result<Chunk, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::ZeroChunkSize);
        }
        if self.exhausted {
            return Ok(Chunk::new(self.offset, Bytes::new()));
        }

        let data = match &mut self.content {
            Content::Bytes(buf) => {
                let start = (self.offset as usize).min(buf.len());
                let end = start.saturating_add(chunk_size).min(buf.len());
                buf.slice(start..end)
            }
            Content::Stream { reader, .. } => read_up_to(reader, chunk_size).await?,
        };

        let chunk = Chunk::new(self.offset, data);
        if chunk.is_empty() {
            self.exhausted = true;
        }
        self.offset += chunk.len() as u64;
        Ok(chunk)
    }
}

/// Fills up to `limit` bytes, stopping early only at end of stream.
async fn read_up_to<R>(reader: &mut R, limit: usize) -> Result<Bytes, TransferError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < limit {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(Bytes::from(buf))
}
