use bytes::Bytes;

use crate::TransferError;

/// A contiguous byte range of an object being uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset within the object.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Bytes,
}

impl Chunk {
    pub fn new(offset: u64, data: Bytes) -> Self {
        Self { offset, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset one past the last byte.
    pub fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

/// Lifecycle of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Start,
    Streaming,
    Commit,
    Done,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    fn can_move_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (from, Aborted) => !from.is_terminal(),
            (Start, Streaming) | (Start, Done) => true,
            (Streaming, Commit) | (Streaming, Done) => true,
            (Commit, Done) => true,
            _ => false,
        }
    }
}

/// Ephemeral state of one upload call. Never shared across keys.
#[derive(Debug, Clone)]
pub struct UploadSession {
    key: String,
    state: SessionState,
    total_length: Option<u64>,
    uploaded_bytes: u64,
    requests_sent: u32,
}

impl UploadSession {
    /// Creates a session in [`SessionState::Start`].
    pub fn new(key: impl Into<String>, total_length: Option<u64>) -> Self {
        Self {
            key: key.into(),
            state: SessionState::Start,
            total_length,
            uploaded_bytes: 0,
            requests_sent: 0,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn total_length(&self) -> Option<u64> {
        self.total_length
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }

    pub fn requests_sent(&self) -> u32 {
        self.requests_sent
    }

    /// Moves to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: SessionState) -> Result<(), TransferError> {
        if self.state == next {
            return Ok(());
        }
        if !self.state.can_move_to(next) {
            return Err(TransferError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Marks the session aborted. No-op once terminal.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Aborted;
        }
    }

    /// Records one dispatched request carrying `bytes`.
    pub fn record_request(&mut self, bytes: u64) {
        self.uploaded_bytes += bytes;
        self.requests_sent += 1;
    }
}
