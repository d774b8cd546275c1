//! # SmartStore Service Worker
//!
//! Worker-side offline cache controller for the SmartStore PWA.
//!
//! ## Features
//!
//! - **Lifecycle**: explicit install / waiting / activate state machine
//! - **Versioned caching**: one committed cache generation at a time
//! - **Fetch interception**: cache-first with an offline navigation fallback
//! - **Push**: UTF-8 payload to platform notification relay
//! - **Clients**: controlled-page registry with claim and focus
//!
//! ## Architecture
//!
//! ```text
//! Registration
//!     ├── installing (CacheController)
//!     ├── waiting    (CacheController)
//!     ├── active     (CacheController) ──┐
//!     │                                  │ intercepts
//!     ├── CacheStorage                   ▼
//!     │       └── Cache (one per version) ── entries
//!     ├── Clients ── controlled pages
//!     └── events (update found, state change, controller change)
//! ```
//!
//! The cache is populated only at install time: a successful runtime fetch
//! is returned to the page but never written back, so each generation is an
//! install-time snapshot rather than a growing cache.

use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub mod cache;
pub mod clients;
pub mod lifecycle;
pub mod net;
pub mod push;

pub use cache::{Cache, CacheEntry, CacheStorage, CacheVersion};
pub use clients::{Client, ClientId, Clients};
pub use lifecycle::{CacheController, Registration, SwEvent, WorkerState, SKIP_WAITING};
pub use net::{
    Destination, FetchError, FetchRequest, FetchResponse, Network, ServedFrom, StaticNetwork,
};
pub use push::{Notification, NotificationCenter, NotificationId, PushManager, PushSubscription};

// ==================== Errors ====================

/// Errors that can occur in controller operations.
#[derive(Error, Debug, Clone)]
pub enum SwError {
    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Message error: {0}")]
    Message(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

// ==================== Types ====================

/// Unique identifier for a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}
