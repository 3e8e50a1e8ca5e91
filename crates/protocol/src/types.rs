use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::IOFLAGS_APPEND;

/// Which side of the API a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Read,
    Write,
}

impl Phase {
    /// Verb used in diagnostics: "reading" or "sending to".
    pub fn action(&self) -> &'static str {
        match self {
            Self::Read => "reading",
            Self::Write => "sending to",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Classification of a failed operation, with the phase carried as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureKind {
    /// Name resolution or transport refused the request. Never retried.
    Network,
    /// Retry budget exhausted.
    Timeout { phase: Phase },
    /// The store answered with a status other than 200.
    RemoteStatus { code: u16, phase: Phase },
    /// A file handle was used against its open mode.
    ModeMisuse,
    /// A parallel chunk upload did not report back within its bounded wait.
    SlotTimeout,
    /// Local failure: reading content, decoding, configuration or a crashed task.
    Local,
}

impl FailureKind {
    /// Timeouts count as read errors regardless of phase.
    pub fn is_read_error(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::RemoteStatus {
                    phase: Phase::Read,
                    ..
                }
        )
    }

    /// Timeouts count as save errors regardless of phase.
    pub fn is_save_error(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::SlotTimeout
                | Self::RemoteStatus {
                    phase: Phase::Write,
                    ..
                }
        )
    }
}

/// Query parameters of an `upload` request.
///
/// `prepare` reserves space before a multi-request write, `commit` finalizes
/// it; `offset`/`size` address the byte range carried by the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepare: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ioflags: Option<u32>,
}

impl UploadParams {
    /// Parameters for a self-contained append request.
    pub fn append() -> Self {
        Self {
            ioflags: Some(IOFLAGS_APPEND),
            ..Default::default()
        }
    }

    /// Addresses `[offset, offset + size)` of the object.
    pub fn range(offset: u64, size: u64) -> Self {
        Self {
            offset: Some(offset),
            size: Some(size),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn is_append(&self) -> bool {
        self.ioflags.is_some_and(|f| f & IOFLAGS_APPEND != 0)
    }

    /// Query pairs in wire order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = self.offset {
            pairs.push(("offset", v.to_string()));
        }
        if let Some(v) = self.size {
            pairs.push(("size", v.to_string()));
        }
        if let Some(v) = self.prepare {
            pairs.push(("prepare", v.to_string()));
        }
        if let Some(v) = self.commit {
            pairs.push(("commit", v.to_string()));
        }
        if let Some(v) = self.ioflags {
            pairs.push(("ioflags", v.to_string()));
        }
        pairs
    }

    /// Parses a query string produced by [`query_pairs`](Self::query_pairs).
    ///
    /// Unknown keys and malformed numbers are ignored.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "offset" => params.offset = value.parse().ok(),
                "size" => params.size = value.parse().ok(),
                "prepare" => params.prepare = value.parse().ok(),
                "commit" => params.commit = value.parse().ok(),
                "ioflags" => params.ioflags = value.parse().ok(),
                _ => {}
            }
        }
        params
    }
}
