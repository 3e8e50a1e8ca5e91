//! Request error types.

use std::time::Duration;

use bytes::Bytes;
use elliptics_protocol::{FailureKind, Method, Phase};

/// Errors from issuing requests against the store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport refused the request outright (DNS, connect). Not retried.
    #[error("incorrect elliptics request {method} \"{url}\": {message}")]
    Network {
        method: Method,
        url: String,
        message: String,
    },

    /// Every attempt allowed by the budget timed out.
    #[error(
        "{attempts} failed attempts of {allowed} to connect to Elliptics ({method} {url}). Timeout: {timeout:?}. \"{message}\""
    )]
    Timeout {
        phase: Phase,
        method: Method,
        url: String,
        attempts: u32,
        allowed: u32,
        timeout: Duration,
        message: String,
    },

    /// The store answered with a status other than 200.
    #[error("got status code {status} while {} {url}", .phase.action())]
    RemoteStatus {
        phase: Phase,
        status: u16,
        url: String,
        body: Bytes,
    },

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network { .. } | Self::Client(_) => FailureKind::Network,
            Self::Timeout { phase, .. } => FailureKind::Timeout { phase: *phase },
            Self::RemoteStatus { phase, status, .. } => FailureKind::RemoteStatus {
                code: *status,
                phase: *phase,
            },
        }
    }

    pub fn is_read_error(&self) -> bool {
        self.kind().is_read_error()
    }

    pub fn is_save_error(&self) -> bool {
        self.kind().is_save_error()
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Status code of a non-200 answer, if that is what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
