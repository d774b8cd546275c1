//! Fetch types and the network seam.
//!
//! The controller never talks to a socket directly: everything goes through
//! the [`Network`] trait so install-time pre-caching and runtime
//! interception can be driven against a scripted backend. A fetch resolves
//! with a response for any reachable URL (including error statuses); it
//! fails only when the network itself is unreachable, mirroring how the
//! platform's fetch reports failure.

use crate::cache::CacheEntry;
use hashbrown::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use thiserror::Error;
use tracing::trace;

/// Fetch errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The network could not be reached for this URL.
    #[error("Network unreachable: {0}")]
    Unreachable(String),

    /// No active worker is controlling the page.
    #[error("No active controller")]
    NoController,
}

/// What kind of resource a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// A full-page navigation.
    Document,
    Script,
    Style,
    Image,
    Font,
    /// Anything else (API calls, beacons, ...).
    Other,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Request path.
    pub url: String,

    /// Resource kind.
    pub destination: Destination,
}

impl FetchRequest {
    /// Create a request.
    pub fn new(url: impl Into<String>, destination: Destination) -> Self {
        Self {
            url: url.into(),
            destination,
        }
    }

    /// Create a full-page navigation request.
    pub fn navigation(url: impl Into<String>) -> Self {
        Self::new(url, Destination::Document)
    }

    /// Whether this is a full-page navigation.
    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Network,
}

/// A resolved response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Status code.
    pub status: u16,

    /// Content type.
    pub content_type: String,

    /// Response body.
    pub body: Vec<u8>,

    /// Whether the cache or the live network produced this.
    pub served_from: ServedFrom,
}

impl FetchResponse {
    /// A successful network response.
    pub fn ok(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
            body: body.into(),
            served_from: ServedFrom::Network,
        }
    }

    /// A network response with an explicit status.
    pub fn with_status(status: u16, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
            served_from: ServedFrom::Network,
        }
    }

    /// Rebuild a response from a cache entry, verbatim.
    pub fn from_entry(entry: &CacheEntry) -> Self {
        Self {
            status: entry.status,
            content_type: entry.content_type.clone(),
            body: entry.body.clone(),
            served_from: ServedFrom::Cache,
        }
    }

    /// Convert into a cache entry stored under `url`.
    pub fn into_entry(self, url: impl Into<String>) -> CacheEntry {
        CacheEntry {
            url: url.into(),
            status: self.status,
            content_type: self.content_type,
            body: self.body,
        }
    }

    /// Whether the status is in the success range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for logging and assertions.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Pluggable network backend.
pub trait Network: Send + Sync {
    /// Resolve a request. Errors only when the network is unreachable.
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

enum Route {
    Ok { content_type: String, body: Vec<u8> },
    /// Connection drops for this path even while the network is up.
    Drop,
}

/// Scriptable in-memory network for harnesses and tests.
///
/// Routes are exact paths. Unrouted paths resolve to 404 responses, the way
/// a live origin would; only `set_offline(true)` or a dropped route makes a
/// fetch fail outright.
#[derive(Default)]
pub struct StaticNetwork {
    routes: RwLock<HashMap<String, Route>>,
    offline: AtomicBool,
    fetches: AtomicU64,
}

impl StaticNetwork {
    /// Create an empty, online network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `path`.
    pub fn route(&self, path: impl Into<String>, content_type: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.routes.write().unwrap().insert(
            path.into(),
            Route::Ok {
                content_type: content_type.into(),
                body: body.into(),
            },
        );
    }

    /// Serve an HTML page at `path`.
    pub fn page(&self, path: impl Into<String>, html: impl Into<Vec<u8>>) {
        self.route(path, "text/html", html);
    }

    /// Make fetches to `path` fail at the connection level.
    pub fn drop_route(&self, path: impl Into<String>) {
        self.routes.write().unwrap().insert(path.into(), Route::Drop);
    }

    /// Simulate losing or regaining connectivity.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches that reached this backend.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Network for StaticNetwork {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            trace!(url = %request.url, "fetch while offline");
            return Err(FetchError::Unreachable(request.url.clone()));
        }

        let routes = self.routes.read().unwrap();
        match routes.get(&request.url) {
            Some(Route::Ok { content_type, body }) => {
                trace!(url = %request.url, "fetch resolved");
                Ok(FetchResponse::ok(content_type.clone(), body.clone()))
            }
            Some(Route::Drop) => Err(FetchError::Unreachable(request.url.clone())),
            None => Ok(FetchResponse::with_status(404, "text/plain", b"not found".to_vec())),
        }
    }
}
