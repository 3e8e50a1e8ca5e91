//! Storage facade over the Elliptics HTTP API.

use std::sync::Arc;

use bytes::Bytes;
use elliptics_client::{ReqwestTransport, RequestExecutor, Transport};
use elliptics_protocol::{Method, UrlBuilder, Verb};
use elliptics_transfer::Content;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::file::{Mode, ObjectFile};
use crate::sequencer::{SaveReport, Sequencer};

/// Options for [`Storage::save_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Extend the stored object instead of replacing it.
    pub append: bool,
}

impl SaveOptions {
    pub fn append() -> Self {
        Self { append: true }
    }
}

/// Storage backend bound to one store and one key prefix.
///
/// Writes, reads and deletes go to `private_url`; [`url`](Self::url) hands
/// out `public_url` links. Connections are reused across calls.
pub struct Storage {
    config: StorageConfig,
    private: UrlBuilder,
    public: UrlBuilder,
    executor: Arc<RequestExecutor>,
    sequencer: Sequencer,
}

impl Storage {
    /// Creates a storage backend over a pooled HTTP client.
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.max_sessions)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a storage backend over any transport.
    pub fn with_transport(
        config: StorageConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, StorageError> {
        config.validate()?;
        let private = UrlBuilder::new(config.private_url.clone(), config.prefix.clone());
        let public = UrlBuilder::new(config.public_url.clone(), config.prefix.clone());
        let executor = Arc::new(RequestExecutor::new(
            transport,
            config.read_budget(),
            config.write_budget(),
        ));
        let sequencer = Sequencer::new(Arc::clone(&executor), private.clone(), &config);
        debug!(
            private_url = %config.private_url,
            public_url = %config.public_url,
            prefix = %config.prefix,
            "storage ready"
        );
        Ok(Self {
            config,
            private,
            public,
            executor,
            sequencer,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Uploads `content` under `key`, replacing any existing object.
    ///
    /// Returns the key the object was stored under.
    pub async fn save(&self, key: &str, content: impl Into<Content>) -> Result<String, StorageError> {
        self.save_with(key, content, SaveOptions::default()).await
    }

    pub async fn save_with(
        &self,
        key: &str,
        content: impl Into<Content>,
        options: SaveOptions,
    ) -> Result<String, StorageError> {
        let report = self.save_with_report(key, content, options).await?;
        Ok(report.key)
    }

    /// Like [`save_with`](Self::save_with), also reporting what was sent.
    pub async fn save_with_report(
        &self,
        key: &str,
        content: impl Into<Content>,
        options: SaveOptions,
    ) -> Result<SaveReport, StorageError> {
        self.sequencer
            .upload(key, content.into(), options.append)
            .await
    }

    /// Reads the whole object in one request.
    pub async fn fetch(&self, key: &str) -> Result<Bytes, StorageError> {
        let url = self.private.path(Verb::Get, key);
        let body = self.executor.execute_ok(Method::Get, &url, None).await?;
        debug!(key, len = body.len(), "object fetched");
        Ok(body)
    }

    /// `true` when a HEAD on the object answers 200.
    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let url = self.private.path(Verb::Get, key);
        let resp = self.executor.execute(Method::Head, &url, None).await?;
        Ok(resp.is_ok())
    }

    /// Removes the object. A missing object counts as deleted.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let url = self.private.path(Verb::Delete, key);
        let resp = self.executor.execute(Method::Post, &url, None).await?;
        match resp.status {
            200 => {
                info!(key, "object deleted");
                Ok(())
            }
            404 => {
                debug!(key, "object already absent");
                Ok(())
            }
            status => Err(elliptics_client::Error::RemoteStatus {
                phase: Method::Post.phase(),
                status,
                url,
                body: resp.body,
            }
            .into()),
        }
    }

    /// Public download URL for `key`. Issues no request.
    pub fn url(&self, key: &str) -> String {
        self.public.path(Verb::Get, key)
    }

    /// Opens a file-like handle; see [`Mode::parse`] for accepted modes.
    pub fn open(&self, key: &str, mode: &str) -> Result<ObjectFile<'_>, StorageError> {
        let mode = Mode::parse(mode)?;
        Ok(ObjectFile::new(self, key, mode))
    }
}
