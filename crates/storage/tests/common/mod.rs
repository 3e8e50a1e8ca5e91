//! In-memory stand-in for the store's HTTP API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use elliptics_client::{HttpRequest, HttpResponse, Transport, TransportError};
use elliptics_protocol::{Method, UploadParams};
use elliptics_storage::{Storage, StorageConfig};

pub const PRIVATE_URL: &str = "http://store:9000/";
pub const PUBLIC_URL: &str = "http://cdn.example/";

/// One request as the store saw it.
#[derive(Debug, Clone)]
pub struct Logged {
    pub method: Method,
    pub verb: String,
    pub key: String,
    pub params: UploadParams,
    pub body: Bytes,
}

#[derive(Default)]
struct State {
    objects: HashMap<String, Vec<u8>>,
    staged: HashMap<String, Vec<u8>>,
    log: Vec<Logged>,
}

/// Emulates upload/get/delete with offset, prepare, commit and append.
///
/// Staged (prepared but uncommitted) writes are invisible to reads.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
    fail_offset: Mutex<Option<u64>>,
    timeouts_left: AtomicU32,
    always_timeout: Mutex<bool>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answers 500 to interior or final uploads addressing `offset`.
    pub fn fail_at_offset(&self, offset: u64) {
        *self.fail_offset.lock().unwrap() = Some(offset);
    }

    /// Times out the next `n` requests.
    pub fn time_out_next(&self, n: u32) {
        self.timeouts_left.store(n, Ordering::SeqCst);
    }

    pub fn time_out_always(&self) {
        *self.always_timeout.lock().unwrap() = true;
    }

    pub fn insert(&self, key: &str, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), data.to_vec());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn log(&self) -> Vec<Logged> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn uploads(&self) -> Vec<Logged> {
        self.log().into_iter().filter(|r| r.verb == "upload").collect()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    /// Highest number of uploads observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn parse(url: &str) -> (String, String, UploadParams) {
        let rest = url.strip_prefix(PRIVATE_URL).unwrap_or(url);
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let (verb, key) = path.split_once('/').unwrap_or((path, ""));
        (verb.to_string(), key.to_string(), UploadParams::from_query(query))
    }

    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let (verb, key, params) = Self::parse(&request.url);
        let body = request.body.clone().unwrap_or_default();

        let mut state = self.state.lock().unwrap();
        state.log.push(Logged {
            method: request.method,
            verb: verb.clone(),
            key: key.clone(),
            params: params.clone(),
            body: body.clone(),
        });

        match (request.method, verb.as_str()) {
            (Method::Get, "get") => match state.objects.get(&key) {
                Some(data) => HttpResponse::new(200, data.clone()),
                None => HttpResponse::new(404, "not found"),
            },
            (Method::Head, "get") => {
                let status = if state.objects.contains_key(&key) { 200 } else { 404 };
                HttpResponse::new(status, Bytes::new())
            }
            (Method::Post, "delete") => match state.objects.remove(&key) {
                Some(_) => HttpResponse::new(200, Bytes::new()),
                None => HttpResponse::new(404, Bytes::new()),
            },
            (Method::Post, "upload") => {
                if params.offset.is_some() && *self.fail_offset.lock().unwrap() == params.offset {
                    return HttpResponse::new(500, "injected failure");
                }
                if params.is_append() {
                    state.objects.entry(key).or_default().extend_from_slice(&body);
                } else if let Some(offset) = params.offset {
                    if params.prepare.is_some() {
                        state.staged.insert(key.clone(), Vec::new());
                    }
                    let staged = state.staged.entry(key.clone()).or_default();
                    let start = offset as usize;
                    if staged.len() < start + body.len() {
                        staged.resize(start + body.len(), 0);
                    }
                    staged[start..start + body.len()].copy_from_slice(&body);
                    if let Some(commit) = params.commit {
                        let mut data = state.staged.remove(&key).unwrap_or_default();
                        data.truncate(commit as usize);
                        state.objects.insert(key, data);
                    }
                } else {
                    state.objects.insert(key, body.to_vec());
                }
                HttpResponse::new(200, Bytes::new())
            }
            _ => HttpResponse::new(400, "bad request"),
        }
    }
}

impl Transport for FakeStore {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
        Box::pin(async move {
            let timed_out = *self.always_timeout.lock().unwrap()
                || self
                    .timeouts_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
            if timed_out {
                self.state.lock().unwrap().log.push(Logged {
                    method: request.method,
                    verb: "timeout".into(),
                    key: request.url.clone(),
                    params: UploadParams::default(),
                    body: Bytes::new(),
                });
                return Err(TransportError::Timeout("operation timed out".into()));
            }

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            let resp = self.handle(&request);
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(resp)
        })
    }
}

pub fn config(chunk_size: usize) -> StorageConfig {
    StorageConfig {
        private_url: PRIVATE_URL.into(),
        public_url: PUBLIC_URL.into(),
        chunk_size,
        ..Default::default()
    }
}

pub fn storage(store: &Arc<FakeStore>, config: StorageConfig) -> Storage {
    Storage::with_transport(config, store.clone()).unwrap()
}

/// `len` bytes of a repeating, offset-dependent pattern.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
