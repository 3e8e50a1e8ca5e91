//! HTTP API vocabulary shared by the Elliptics client crates.
//!
//! Describes the request surface of the store: URL verbs, HTTP methods
//! with their read/write phase, upload query parameters and the failure
//! taxonomy tag used by the higher layers.

pub mod constants;
pub mod types;
pub mod url;

pub use constants::{IOFLAGS_APPEND, Method, Verb};
pub use types::{FailureKind, Phase, UploadParams};
pub use url::UrlBuilder;
