//! Offline runtime configuration.
//!
//! One `OfflineConfig` describes a single deployment of the cache
//! controller: which cache generation it owns, which resources must be
//! pre-cached, and how push notifications are presented. Changing the
//! version string or the manifest is the only supported way to invalidate
//! old caches.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Offline runtime configuration for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Name of the cache generation owned by this deployment.
    pub cache_version: String,

    /// Paths that must be cached before install completes.
    pub precache: Vec<String>,

    /// Pre-cached page served when a navigation fails offline.
    pub offline_path: String,

    /// Notification presentation defaults.
    pub notifications: NotificationConfig,
}

/// How push notifications are presented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Fixed notification title.
    pub title: String,

    /// Notification icon path.
    pub icon: String,

    /// Notification badge path.
    pub badge: String,

    /// Body used when a push carries no payload.
    pub default_body: String,

    /// Page opened or focused on notification click.
    pub click_target: String,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            cache_version: "smartstore-v1".to_string(),
            precache: vec![
                "/".to_string(),
                "/dashboard".to_string(),
                "/inventory".to_string(),
                "/drivers".to_string(),
                "/sentiment".to_string(),
                "/chat".to_string(),
                "/login".to_string(),
                "/signup".to_string(),
                "/offline".to_string(),
                "/icon-192x192.png".to_string(),
                "/icon-512x512.png".to_string(),
            ],
            offline_path: "/offline".to_string(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "SmartStore Alert".to_string(),
            icon: "/icon-192x192.png".to_string(),
            badge: "/icon-192x192.png".to_string(),
            default_body: "New notification from SmartStore".to_string(),
            click_target: "/dashboard".to_string(),
        }
    }
}

impl OfflineConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Save the configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check the manifest for problems a deployment should catch early.
    ///
    /// The controller itself does not enforce this: a missing offline page
    /// degrades to a plain fetch failure at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.is_empty() {
            return Err(ConfigError::Invalid("cache_version is empty".into()));
        }
        if self.precache.is_empty() {
            return Err(ConfigError::Invalid("precache manifest is empty".into()));
        }
        if !self.precache.contains(&self.offline_path) {
            return Err(ConfigError::Invalid(format!(
                "offline path {} is not in the precache manifest",
                self.offline_path
            )));
        }
        Ok(())
    }

    /// Derive the config for the next deployment, bumping the version name.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.cache_version = version.into();
        self
    }
}
