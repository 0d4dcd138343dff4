use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ipc::address::socket_dir;

/// Canvas settings (from config file)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding canvas sockets (defaults to `<tmp>/opencode-canvas`)
    #[serde(default)]
    pub socket_dir: Option<PathBuf>,

    /// Client settings
    #[serde(default)]
    pub client: ClientSettings,
}

/// Client timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Bound on dialing a canvas socket, in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Bound on writing a request and reading its response, in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5_000
}

fn default_request_timeout() -> u64 {
    10_000
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl ClientSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Settings {
    /// Load settings from a config file
    ///
    /// Tries `path` first, then the default config locations, and falls back
    /// to defaults when no file exists.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(p) = path {
            if p.exists() {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {:?}", p))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", p));
            }
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("opencode-canvas/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/opencode-canvas/config.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", path));
            }
        }

        Ok(Self::default())
    }

    /// Validate and normalize settings values
    ///
    /// A zero timeout would fail every call, so timeouts are clamped to 1ms.
    pub fn validate(&mut self) {
        const MIN_TIMEOUT_MS: u64 = 1;

        if self.client.connect_timeout_ms < MIN_TIMEOUT_MS {
            self.client.connect_timeout_ms = MIN_TIMEOUT_MS;
        }
        if self.client.request_timeout_ms < MIN_TIMEOUT_MS {
            self.client.request_timeout_ms = MIN_TIMEOUT_MS;
        }
    }

    /// Effective socket directory
    pub fn socket_dir(&self) -> PathBuf {
        self.socket_dir.clone().unwrap_or_else(socket_dir)
    }
}
