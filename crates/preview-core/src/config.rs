//! Configuration types for preview monitoring
//!
//! This module defines the configuration consumed by the monitor and by the
//! service implementations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::model::ProjectHandle;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "https://tuist.dev";

/// Main monitor configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Project handle in the format "account-handle/project-handle"
    pub full_handle: String,

    /// Server connection settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Interval between update checks (in milliseconds)
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Build version string of the running application, sent with each query
    #[serde(default)]
    pub build_version: Option<String>,

    /// Capacity of the monitor event channel, when one is installed
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl MonitorConfig {
    /// Create a configuration with defaults for everything but the project
    /// and credential
    pub fn new(full_handle: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            full_handle: full_handle.into(),
            server: ServerConfig {
                api_key: api_key.into(),
                ..ServerConfig::default()
            },
            check_interval_ms: default_check_interval_ms(),
            build_version: None,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Set the server URL
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server.url = url.into();
        self
    }

    /// Set the check interval
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Set the build version sent with each query
    pub fn with_build_version(mut self, version: impl Into<String>) -> Self {
        self.build_version = Some(version.into());
        self
    }

    /// Interval between update checks
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    /// Parsed project handle
    pub fn project(&self) -> Result<ProjectHandle, crate::Error> {
        ProjectHandle::parse(&self.full_handle)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.project()?;

        if self.check_interval_ms == 0 {
            return Err(crate::Error::config("Check interval must be > 0"));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.server.validate()
    }
}

impl fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("full_handle", &self.full_handle)
            .field("server", &self.server)
            .field("check_interval_ms", &self.check_interval_ms)
            .field("build_version", &self.build_version)
            .field("event_channel_capacity", &self.event_channel_capacity)
            .finish()
    }
}

/// Server connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the server
    #[serde(default = "default_server_url")]
    pub url: String,

    /// API key (account token) attached as a bearer credential
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub api_key: String,

    /// HTTP request timeout (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Parsed base URL
    pub fn base_url(&self) -> Result<Url, crate::Error> {
        let url = Url::parse(&self.url)
            .map_err(|e| crate::Error::config(format!("Invalid server URL {}: {}", self.url, e)))?;
        if url.cannot_be_a_base() {
            return Err(crate::Error::config(format!(
                "Server URL cannot be used as a base: {}",
                self.url
            )));
        }
        Ok(url)
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the server settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_key.is_empty() {
            return Err(crate::Error::config("API key cannot be empty"));
        }

        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(crate::Error::config(format!(
                "Server URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// Custom Debug implementation that hides the API key
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("api_key", &"<REDACTED>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_check_interval_ms() -> u64 {
    600_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    100
}
