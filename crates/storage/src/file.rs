//! File-like handle over one stored object.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use bytes::Bytes;
use tracing::debug;

use crate::error::StorageError;
use crate::storage::{SaveOptions, Storage};

/// Access mode of an [`ObjectFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
    Append,
}

impl Mode {
    /// Parses a mode string such as `"r"`, `"wb"` or `"a"`.
    ///
    /// The first of `r`, `w`, `a` found (checked in that order) wins. Mixed
    /// access (`+`) is rejected.
    pub fn parse(mode: &str) -> Result<Self, StorageError> {
        if mode.contains('+') {
            return Err(StorageError::InvalidMode(mode.to_string()));
        }
        if mode.contains('r') {
            Ok(Self::Read)
        } else if mode.contains('w') {
            Ok(Self::Write)
        } else if mode.contains('a') {
            Ok(Self::Append)
        } else {
            Err(StorageError::InvalidMode(mode.to_string()))
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Write | Self::Append)
    }
}

/// Buffered handle returned by [`Storage::open`].
///
/// Reads fetch the whole object once. Writes are buffered locally and
/// uploaded on [`close`](Self::close).
pub struct ObjectFile<'a> {
    storage: &'a Storage,
    key: String,
    mode: Mode,
    buffer: Option<Cursor<Vec<u8>>>,
}

impl<'a> ObjectFile<'a> {
    pub(crate) fn new(storage: &'a Storage, key: &str, mode: Mode) -> Self {
        Self {
            storage,
            key: key.to_string(),
            mode,
            buffer: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Reads up to `size` bytes, or everything left when `None`.
    pub async fn read(&mut self, size: Option<usize>) -> Result<Bytes, StorageError> {
        if self.mode != Mode::Read {
            return Err(StorageError::Mode("file was not opened for reading".into()));
        }
        let buffer = self.loaded().await?;

        let mut out = Vec::new();
        match size {
            Some(n) => {
                Read::take(&mut *buffer, n as u64).read_to_end(&mut out)?;
            }
            None => {
                buffer.read_to_end(&mut out)?;
            }
        }
        Ok(Bytes::from(out))
    }

    /// Buffers `data` at the current position; returns the bytes written.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        if !self.mode.is_writable() {
            return Err(StorageError::Mode("file was not opened for writing".into()));
        }
        let buffer = self.buffer.get_or_insert_with(Cursor::default);
        buffer.write_all(data)?;
        Ok(data.len())
    }

    /// Moves the buffer cursor, fetching the object first in read mode.
    pub async fn seek(&mut self, pos: SeekFrom) -> Result<u64, StorageError> {
        let mode = self.mode;
        let buffer = match mode {
            Mode::Read => self.loaded().await?,
            Mode::Write | Mode::Append => self.buffer.get_or_insert_with(Cursor::default),
        };
        Ok(buffer.seek(pos)?)
    }

    /// `true` when no buffer is held.
    pub fn closed(&self) -> bool {
        self.buffer.is_none()
    }

    /// Drops the buffer, uploading it first when written.
    ///
    /// Append handles extend the stored object. Closing an untouched handle
    /// does nothing.
    pub async fn close(&mut self) -> Result<(), StorageError> {
        let Some(buffer) = self.buffer.take() else {
            return Ok(());
        };
        if !self.mode.is_writable() {
            return Ok(());
        }

        let options = SaveOptions {
            append: self.mode == Mode::Append,
        };
        let data = buffer.into_inner();
        debug!(key = %self.key, len = data.len(), append = options.append, "flushing file");
        self.storage.save_with(&self.key, data, options).await?;
        Ok(())
    }

    async fn loaded(&mut self) -> Result<&mut Cursor<Vec<u8>>, StorageError> {
        if self.buffer.is_none() {
            let body = self.storage.fetch(&self.key).await?;
            self.buffer = Some(Cursor::new(body.to_vec()));
        }
        match self.buffer.as_mut() {
            Some(buffer) => Ok(buffer),
            None => Err(StorageError::Mode("file buffer unavailable".into())),
        }
    }
}
