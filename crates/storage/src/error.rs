//! Storage error types.

use std::time::Duration;

use elliptics_protocol::FailureKind;

/// Errors produced by storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Request(#[from] elliptics_client::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] elliptics_transfer::TransferError),

    #[error("mode error: {0}")]
    Mode(String),

    #[error("invalid mode {0:?}: must contain one of \"r\", \"w\" or \"a\", mixed access is not supported")]
    InvalidMode(String),

    /// A parallel chunk upload did not report back in time. The chunk may
    /// or may not have been written.
    #[error("chunk upload at offset {offset} did not finish within {waited:?}")]
    SlotTimeout { offset: u64, waited: Duration },

    #[error("chunk upload task failed: {0}")]
    Task(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Request(e) => e.kind(),
            Self::Mode(_) | Self::InvalidMode(_) => FailureKind::ModeMisuse,
            Self::SlotTimeout { .. } => FailureKind::SlotTimeout,
            Self::Transfer(_)
            | Self::Task(_)
            | Self::Config(_)
            | Self::Toml(_)
            | Self::Json(_)
            | Self::Io(_) => FailureKind::Local,
        }
    }

    pub fn is_read_error(&self) -> bool {
        self.kind().is_read_error()
    }

    pub fn is_save_error(&self) -> bool {
        self.kind().is_save_error()
    }
}
