//! Content sources and chunking for chunked uploads.
//!
//! Wraps caller content (in-memory buffers or async readers) and yields
//! contiguous, bounded chunks, plus the per-upload session record the
//! sequencer drives.

mod chunked;
mod types;

pub use chunked::{ChunkSource, Content};
pub use types::{Chunk, SessionState, UploadSession};

/// Default chunk size: 3 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 3 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("invalid session transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
}
