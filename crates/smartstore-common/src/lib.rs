//! # SmartStore Common
//!
//! Shared configuration, logging setup, and error types for the SmartStore
//! offline runtime.
//!
//! ## Features
//!
//! - Offline runtime configuration (cache version, pre-cache manifest,
//!   notification defaults) with JSON load/save
//! - Logging configuration and setup on top of `tracing`

pub mod config;
pub mod logging;

pub use config::{ConfigError, NotificationConfig, OfflineConfig};
pub use logging::{init_logging, LogConfig, LogFormat};
