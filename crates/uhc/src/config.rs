//! Transport configuration.
//!
//! `UhcConfig` holds the values the transport adapter needs: timeouts, an optional base URL
//! that relative operation paths are resolved against, and the user agent. It can be built in
//! code or read from TOML:
//!
//! ```toml
//! request-timeout = "30s"
//! connect-timeout = "1500ms"
//! base-url = "https://api.example.com"
//! ```
//!
//! Durations are either integer milliseconds or a number with an `ms`, `s`, `m` or `h` suffix.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Configuration for [`ReqwestUhc`](crate::ReqwestUhc).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UhcConfig {
    /// Total time allowed for one request, body included.
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    /// Time allowed to establish a connection.
    #[serde(deserialize_with = "deserialize_duration")]
    pub connect_timeout: Duration,
    /// Base URL for relative operation paths.
    pub base_url: Option<String>,
    /// User agent sent with every request.
    pub user_agent: Option<String>,
}

impl Default for UhcConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            base_url: None,
            user_agent: Some(format!("uhc/{} (Rust)", env!("CARGO_PKG_VERSION"))),
        }
    }
}

impl UhcConfig {
    /// Parse configuration from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read '{}': {}", path.display(), e)))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(target: "uhc::config", "Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Set the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the base URL for relative paths. A trailing slash is removed.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Parse `"1500ms"`, `"30s"`, `"2m"`, `"1h"` or bare milliseconds.
pub fn parse_duration(text: &str) -> std::result::Result<Duration, String> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{text}'"))?;
    let seconds_per_unit = match unit.trim() {
        "" | "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        other => return Err(format!("unknown duration unit '{other}' in '{text}'")),
    };
    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{text}' is too large"))
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
