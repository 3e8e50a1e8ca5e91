//! Storage configuration.
//!
//! Stored as TOML; every field has a default so partial files are valid.
//! `ELLIPTICS_<FIELD>` environment variables override file values.

use std::path::Path;
use std::time::Duration;

use elliptics_client::RetryBudget;
use elliptics_transfer::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "ELLIPTICS_";

/// How interior chunks of a multi-request upload are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Interior chunks go through the bounded worker pool.
    #[default]
    Parallel,
    /// Every request is sent and awaited in order.
    Sequential,
}

/// Policy for content whose total length cannot be determined up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownLength {
    /// Each chunk is sent as an independent append request.
    #[default]
    Append,
    /// Prepare/commit upload with a reservation guessed from `average_object_size`.
    Reserve,
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Namespace segment placed before every key.
    #[serde(default)]
    pub prefix: String,

    /// Base URL handed out by `url()`.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Base URL for reads, writes and deletes.
    #[serde(default = "default_private_url")]
    pub private_url: String,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    #[serde(default = "default_write_retries")]
    pub write_retries: u32,

    /// Initial delay between timed-out attempts (0 = re-issue immediately).
    #[serde(default)]
    pub retry_backoff_ms: u64,

    /// Maximum bytes per upload request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum interior chunk uploads in flight per save.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Reservation hint for content of unknown length.
    #[serde(default = "default_average_object_size")]
    pub average_object_size: u64,

    #[serde(default)]
    pub upload_mode: UploadMode,

    #[serde(default)]
    pub unknown_length: UnknownLength,

    /// Added to the worst-case write time when waiting on a pool slot.
    #[serde(default = "default_slot_wait_margin")]
    pub slot_wait_margin_secs: u64,
}

fn default_public_url() -> String {
    "http://localhost:8080/".into()
}

fn default_private_url() -> String {
    "http://localhost:9000/".into()
}

fn default_read_timeout() -> u64 {
    3
}

fn default_read_retries() -> u32 {
    3
}

fn default_write_timeout() -> u64 {
    5
}

fn default_write_retries() -> u32 {
    9
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_sessions() -> usize {
    5
}

fn default_average_object_size() -> u64 {
    1024 * 1024
}

fn default_slot_wait_margin() -> u64 {
    100
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            public_url: default_public_url(),
            private_url: default_private_url(),
            read_timeout_secs: default_read_timeout(),
            read_retries: default_read_retries(),
            write_timeout_secs: default_write_timeout(),
            write_retries: default_write_retries(),
            retry_backoff_ms: 0,
            chunk_size: default_chunk_size(),
            max_sessions: default_max_sessions(),
            average_object_size: default_average_object_size(),
            upload_mode: UploadMode::default(),
            unknown_length: UnknownLength::default(),
            slot_wait_margin_secs: default_slot_wait_margin(),
        }
    }
}

impl StorageConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, StorageError> {
        let config: StorageConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file, applies environment overrides and validates.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: StorageConfig = toml::from_str(&content)?;
        config.apply_env()?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Applies `ELLIPTICS_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<(), StorageError> {
        self.apply_overrides(std::env::vars())
    }

    /// Applies `ELLIPTICS_*` overrides from `vars`; other names are ignored.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in vars {
            let Some(field) = name.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match field {
                "PREFIX" => self.prefix = value.to_string(),
                "PUBLIC_URL" => self.public_url = value.to_string(),
                "PRIVATE_URL" => self.private_url = value.to_string(),
                "READ_TIMEOUT_SECS" => self.read_timeout_secs = parse(field, value)?,
                "READ_RETRIES" => self.read_retries = parse(field, value)?,
                "WRITE_TIMEOUT_SECS" => self.write_timeout_secs = parse(field, value)?,
                "WRITE_RETRIES" => self.write_retries = parse(field, value)?,
                "RETRY_BACKOFF_MS" => self.retry_backoff_ms = parse(field, value)?,
                "CHUNK_SIZE" => self.chunk_size = parse(field, value)?,
                "MAX_SESSIONS" => self.max_sessions = parse(field, value)?,
                "AVERAGE_OBJECT_SIZE" => self.average_object_size = parse(field, value)?,
                "SLOT_WAIT_MARGIN_SECS" => self.slot_wait_margin_secs = parse(field, value)?,
                "UPLOAD_MODE" => {
                    self.upload_mode = match value {
                        "parallel" => UploadMode::Parallel,
                        "sequential" => UploadMode::Sequential,
                        other => return Err(invalid(field, other)),
                    }
                }
                "UNKNOWN_LENGTH" => {
                    self.unknown_length = match value {
                        "append" => UnknownLength::Append,
                        "reserve" => UnknownLength::Reserve,
                        other => return Err(invalid(field, other)),
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        if self.chunk_size == 0 {
            return Err(StorageError::Config("chunk_size must be positive".into()));
        }
        if self.max_sessions == 0 {
            return Err(StorageError::Config("max_sessions must be positive".into()));
        }
        Ok(())
    }

    pub fn read_budget(&self) -> RetryBudget {
        RetryBudget::new(Duration::from_secs(self.read_timeout_secs), self.read_retries)
            .with_backoff(self.backoff())
    }

    pub fn write_budget(&self) -> RetryBudget {
        RetryBudget::new(Duration::from_secs(self.write_timeout_secs), self.write_retries)
            .with_backoff(self.backoff())
    }

    /// Bound on waiting for one pool slot: `timeout × retries + margin` of the write budget.
    pub fn slot_wait(&self) -> Duration {
        self.write_budget().worst_case() + Duration::from_secs(self.slot_wait_margin_secs)
    }

    fn backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn parse<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, StorageError> {
    value.trim().parse().map_err(|_| invalid(field, value))
}

fn invalid(field: &str, value: &str) -> StorageError {
    StorageError::Config(format!("{ENV_PREFIX}{field}: invalid value {value:?}"))
}
