//! Configuration system for Spillway.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SPILLWAY_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/spillway/config.toml
//!   3. ~/.config/spillway/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpillwayConfig {
    pub server: ServerConfig,
    pub render: RenderConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Budget for boundaries without a timeout marker of their own, in ms.
    pub default_timeout_ms: u64,
    /// `<title>` of streamed documents.
    pub document_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Multiplier applied to every simulated network delay.
    pub network_scale: f64,
    pub details_delay_ms: u64,
    pub reviews_delay_ms: u64,
    /// Budget of the movie page's outer suspense boundary.
    pub max_duration_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5000,
            document_title: "Spillway".into(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            network_scale: 1.0,
            details_delay_ms: 800,
            reviews_delay_ms: 1500,
            max_duration_ms: 1000,
        }
    }
}

impl RenderConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("spillway")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SpillwayConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::parse(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            SpillwayConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SPILLWAY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&SpillwayConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply SPILLWAY_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("SPILLWAY_SERVER__HOST") {
            self.server.host = v;
        }
        if let Some(p) = var("SPILLWAY_SERVER__PORT").and_then(|v| v.parse().ok()) {
            self.server.port = p;
        }
        if let Some(ms) = var("SPILLWAY_RENDER__DEFAULT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.render.default_timeout_ms = ms;
        }
        if let Some(title) = var("SPILLWAY_RENDER__DOCUMENT_TITLE") {
            self.render.document_title = title;
        }
        if let Some(scale) = var("SPILLWAY_DEMO__NETWORK_SCALE").and_then(|v| v.parse().ok()) {
            self.demo.network_scale = scale;
        }
    }
}
