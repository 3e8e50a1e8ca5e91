//! Storage backend for the Elliptics HTTP API.
//!
//! [`Storage`] uploads content of any size as a prepare/offset/commit
//! request series, with interior chunks sent through a bounded worker pool,
//! and reads objects back in a single request.
//!
//! ```no_run
//! # async fn demo() -> Result<(), elliptics_storage::StorageError> {
//! use elliptics_storage::{Storage, StorageConfig};
//!
//! let storage = Storage::new(StorageConfig::default())?;
//! let key = storage.save("test.xml", "<xml>test data</xml>").await?;
//! let body = storage.fetch(&key).await?;
//! assert_eq!(&body[..], b"<xml>test data</xml>");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod file;
pub mod pool;
pub mod record;
pub mod sequencer;
pub mod storage;

pub use config::{StorageConfig, UnknownLength, UploadMode};
pub use elliptics_transfer::{Content, SessionState};
pub use error::StorageError;
pub use file::{Mode, ObjectFile};
pub use record::LazyRecord;
pub use sequencer::{ChunkPosition, SaveReport};
pub use storage::{SaveOptions, Storage};
