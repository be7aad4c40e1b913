//! Device configuration (rokuctl.toml)

use std::path::Path;

use serde::{Deserialize, Serialize};

use rokuctl_core::ports::LogPort;
use rokuctl_core::prelude::*;

/// Connection settings for one device.
///
/// Only `host` is required; everything else has a sensible default.
///
/// ```toml
/// host = "192.168.1.40"
/// ecp_port = 8060
/// dev_password = "hunter2"
/// log_port = "main"
/// grace_ms = 1000
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DeviceConfig {
    /// Device hostname or IP address
    pub host: String,

    /// External control port (HTTP)
    #[serde(default = "default_ecp_port")]
    pub ecp_port: u16,

    /// Developer-mode password, needed for sideloading
    #[serde(default)]
    pub dev_password: Option<String>,

    /// Debug log port to attach on construction: a subsystem name
    /// (`main`, `sg`, `task1`...) or a raw port number
    #[serde(default)]
    pub log_port: Option<String>,

    /// Backlog grace window in milliseconds
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
}

fn default_ecp_port() -> u16 {
    8060
}

fn default_grace_ms() -> u64 {
    1000
}

impl DeviceConfig {
    /// Config with defaults for the given host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ecp_port: default_ecp_port(),
            dev_password: None,
            log_port: None,
            grace_ms: default_grace_ms(),
        }
    }

    /// Load a config file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    /// The configured log port, parsed. `None` when no port is configured.
    pub fn log_port(&self) -> Result<Option<LogPort>> {
        self.log_port.as_deref().map(str::parse).transpose()
    }
}
