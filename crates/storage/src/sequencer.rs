//! Upload sequencer.
//!
//! Turns a [`ChunkSource`] into the request series the store expects:
//! the first request reserves space with `prepare`, interior requests
//! address byte ranges (optionally in parallel), and the last request
//! carries `commit` once everything before it has landed. A one-chunk
//! upload is a single plain POST.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use elliptics_client::RequestExecutor;
use elliptics_protocol::{Method, UploadParams, UrlBuilder, Verb};
use elliptics_transfer::{Chunk, ChunkSource, Content, SessionState, UploadSession};
use tracing::{debug, error, warn};

use crate::config::{StorageConfig, UnknownLength, UploadMode};
use crate::error::StorageError;
use crate::pool::UploadPool;

/// Where a chunk sits in the upload, decided by one-chunk lookahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPosition {
    Only,
    First,
    Middle,
    Last,
}

impl ChunkPosition {
    pub fn of(first: bool, last: bool) -> Self {
        match (first, last) {
            (true, true) => Self::Only,
            (true, false) => Self::First,
            (false, false) => Self::Middle,
            (false, true) => Self::Last,
        }
    }
}

/// Query parameters for `chunk` at `position`.
///
/// `reservation` is the `prepare` value for the first request, if any.
/// The commit value is the end offset of the last chunk, i.e. the total
/// number of bytes sent.
pub fn chunk_params(position: ChunkPosition, chunk: &Chunk, reservation: Option<u64>) -> UploadParams {
    let range = UploadParams::range(chunk.offset, chunk.len() as u64);
    match position {
        ChunkPosition::Only => UploadParams::default(),
        ChunkPosition::First => UploadParams {
            prepare: reservation,
            ..range
        },
        ChunkPosition::Middle => range,
        ChunkPosition::Last => UploadParams {
            commit: Some(chunk.end()),
            ..range
        },
    }
}

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub key: String,
    pub bytes: u64,
    pub requests: u32,
    pub state: SessionState,
}

impl From<&UploadSession> for SaveReport {
    fn from(session: &UploadSession) -> Self {
        Self {
            key: session.key().to_string(),
            bytes: session.uploaded_bytes(),
            requests: session.requests_sent(),
            state: session.state(),
        }
    }
}

/// Drives one upload at a time against the private upload URL.
pub struct Sequencer {
    executor: Arc<RequestExecutor>,
    urls: UrlBuilder,
    chunk_size: usize,
    max_sessions: usize,
    slot_wait: Duration,
    mode: UploadMode,
    unknown_length: UnknownLength,
    average_object_size: u64,
}

impl Sequencer {
    pub fn new(executor: Arc<RequestExecutor>, urls: UrlBuilder, config: &StorageConfig) -> Self {
        Self {
            executor,
            urls,
            chunk_size: config.chunk_size,
            max_sessions: config.max_sessions,
            slot_wait: config.slot_wait(),
            mode: config.upload_mode,
            unknown_length: config.unknown_length,
            average_object_size: config.average_object_size,
        }
    }

    /// Uploads `content` under `key`.
    ///
    /// With `append` every chunk extends the stored object. Otherwise the
    /// object is replaced. On failure the session is aborted and the object
    /// may be left partially written and uncommitted.
    pub async fn upload(
        &self,
        key: &str,
        content: Content,
        append: bool,
    ) -> Result<SaveReport, StorageError> {
        let mut source = ChunkSource::new(content);
        let mut session = UploadSession::new(key, source.total_len());
        debug!(key, total_length = ?session.total_length(), append, "upload started");

        let result = if append {
            self.append_chunks(&mut source, &mut session, true).await
        } else if session.total_length().is_none() && self.unknown_length == UnknownLength::Append
        {
            error!(key, "content length unknown, uploading chunk by chunk with append");
            self.append_chunks(&mut source, &mut session, false).await
        } else {
            self.sequenced(&mut source, &mut session).await
        };

        match result {
            Ok(()) => {
                debug!(
                    key,
                    bytes = session.uploaded_bytes(),
                    requests = session.requests_sent(),
                    "upload finished"
                );
                Ok(SaveReport::from(&session))
            }
            Err(e) => {
                session.abort();
                warn!(
                    key,
                    uploaded = session.uploaded_bytes(),
                    requests = session.requests_sent(),
                    error = %e,
                    "upload aborted"
                );
                Err(e)
            }
        }
    }

    /// Sends every chunk as a self-contained request.
    ///
    /// When `from_start` is false the first chunk replaces the object and
    /// the rest are appended to it; an empty source then still writes an
    /// empty object. An empty append sends nothing.
    async fn append_chunks(
        &self,
        source: &mut ChunkSource,
        session: &mut UploadSession,
        from_start: bool,
    ) -> Result<(), StorageError> {
        let mut replace_first = !from_start;
        loop {
            let chunk = source.next(self.chunk_size).await?;
            if chunk.is_empty() && !replace_first {
                break;
            }
            if session.state() == SessionState::Start {
                session.transition(SessionState::Streaming)?;
            }
            let params = if replace_first {
                UploadParams::default()
            } else {
                UploadParams::append()
            };
            self.send(session, chunk.data.clone(), &params).await?;
            replace_first = false;
            if chunk.is_empty() {
                break;
            }
        }
        session.transition(SessionState::Done)?;
        Ok(())
    }

    /// Prepare/offset/commit upload with one-chunk lookahead.
    async fn sequenced(
        &self,
        source: &mut ChunkSource,
        session: &mut UploadSession,
    ) -> Result<(), StorageError> {
        let mut pool = match self.mode {
            UploadMode::Parallel => Some(UploadPool::new(
                Arc::clone(&self.executor),
                self.max_sessions,
                self.slot_wait,
            )),
            UploadMode::Sequential => None,
        };

        let result = self.lookahead(source, session, pool.as_mut()).await;
        if result.is_err() {
            if let Some(pool) = pool.as_mut() {
                if let Err(e) = pool.drain().await {
                    error!(key = session.key(), error = %e, "chunk upload failed while aborting");
                }
            }
        }
        result
    }

    async fn lookahead(
        &self,
        source: &mut ChunkSource,
        session: &mut UploadSession,
        mut pool: Option<&mut UploadPool>,
    ) -> Result<(), StorageError> {
        let mut current = source.next(self.chunk_size).await?;
        if current.is_empty() {
            self.send(session, Bytes::new(), &UploadParams::default()).await?;
            session.transition(SessionState::Done)?;
            return Ok(());
        }

        let reservation = self.reservation(session.total_length(), current.len() as u64);
        let mut first = true;
        loop {
            let next = source.next(self.chunk_size).await?;
            let last = next.is_empty();
            let position = ChunkPosition::of(first, last);
            let params = chunk_params(position, &current, reservation);

            match position {
                ChunkPosition::Only => {
                    self.send(session, current.data, &params).await?;
                    session.transition(SessionState::Done)?;
                }
                ChunkPosition::First => {
                    session.transition(SessionState::Streaming)?;
                    self.send(session, current.data, &params).await?;
                }
                ChunkPosition::Middle => match pool.as_deref_mut() {
                    Some(pool) => {
                        let url = self.urls.build(Verb::Upload, session.key(), &params);
                        let len = current.len() as u64;
                        pool.submit(url, current.offset, current.data).await?;
                        session.record_request(len);
                    }
                    None => self.send(session, current.data, &params).await?,
                },
                ChunkPosition::Last => {
                    if let Some(pool) = pool.as_deref_mut() {
                        pool.drain().await?;
                    }
                    session.transition(SessionState::Commit)?;
                    self.send(session, current.data, &params).await?;
                    session.transition(SessionState::Done)?;
                }
            }

            if last {
                return Ok(());
            }
            current = next;
            first = false;
        }
    }

    /// `prepare` value for the first of several requests.
    fn reservation(&self, total_length: Option<u64>, first_len: u64) -> Option<u64> {
        match total_length {
            Some(total) => Some(total).filter(|&total| total > first_len),
            None => Some(self.average_object_size.saturating_mul(2).max(first_len)),
        }
    }

    async fn send(
        &self,
        session: &mut UploadSession,
        body: Bytes,
        params: &UploadParams,
    ) -> Result<(), StorageError> {
        let url = self.urls.build(Verb::Upload, session.key(), params);
        let len = body.len() as u64;
        self.executor
            .execute_ok(Method::Post, &url, Some(body))
            .await?;
        session.record_request(len);
        Ok(())
    }
}
