//! URL construction for the store's HTTP API.
//!
//! A URL is `<base>/<verb>/<prefix>/<key>[?query]`. Every part after the
//! base is percent-encoded on its own; `/` inside the prefix or key is kept
//! so that nested names stay readable. Leading and trailing slashes of each
//! part are trimmed and empty parts are skipped.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::constants::Verb;
use crate::types::UploadParams;

/// Characters left untouched inside a path part.
const PATH_PART: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Builds request URLs against one base URL and namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    base: String,
    prefix: String,
}

impl UrlBuilder {
    pub fn new(base: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            prefix: prefix.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// URL for `verb` on `key` with optional upload parameters.
    pub fn build(&self, verb: Verb, key: &str, params: &UploadParams) -> String {
        let mut url = join_parts(&self.base, &[verb.as_str(), &self.prefix, key]);

        let pairs = params.query_pairs();
        if !pairs.is_empty() {
            url.push('?');
            let query: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
            url.push_str(&query.join("&"));
        }

        url
    }

    /// URL for `verb` on `key` without a query string.
    pub fn path(&self, verb: Verb, key: &str) -> String {
        self.build(verb, key, &UploadParams::default())
    }
}

fn join_parts(base: &str, parts: &[&str]) -> String {
    let mut segments = Vec::with_capacity(parts.len() + 1);

    let base = base.trim_matches('/');
    if !base.is_empty() {
        segments.push(base.to_string());
    }

    for part in parts {
        let encoded = utf8_percent_encode(part, PATH_PART).to_string();
        let trimmed = encoded.trim_matches('/');
        if !trimmed.is_empty() {
            segments.push(trimmed.to_string());
        }
    }

    segments.join("/")
}
