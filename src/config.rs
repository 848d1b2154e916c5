//! Client configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const FALLBACK_TOKEN_PATH: &str = ".clawphones/token.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL '{0}' (expected http:// or https://)")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeouts: Timeouts,
    pub token_path: PathBuf,
    pub system_prompt: Option<String>,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `CLAWPHONES_BASE_URL`: default `http://127.0.0.1:8080`
    /// - `CLAWPHONES_REQUEST_TIMEOUT_SECS`: default 60
    /// - `CLAWPHONES_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CLAWPHONES_TOKEN_PATH`: default `$HOME/.config/clawphones/token.json`
    /// - `CLAWPHONES_SYSTEM_PROMPT`: sent when a conversation is created
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] but reads through `lookup`, so tests
    /// do not have to mutate the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an http(s) URL.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(lookup("CLAWPHONES_BASE_URL").as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        let timeouts = Timeouts {
            request_secs: parse_u64(lookup("CLAWPHONES_REQUEST_TIMEOUT_SECS"), DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_u64(lookup("CLAWPHONES_CONNECT_TIMEOUT_SECS"), DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let token_path = lookup("CLAWPHONES_TOKEN_PATH")
            .filter(|p| !p.trim().is_empty())
            .map_or_else(|| default_token_path(lookup("HOME")), PathBuf::from);
        let system_prompt = lookup("CLAWPHONES_SYSTEM_PROMPT").filter(|p| !p.trim().is_empty());

        Ok(Self { base_url, timeouts, token_path, system_prompt })
    }
}

/// Validate an http(s) base URL and strip trailing slashes.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for any other scheme or an empty host.
pub fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let lower = trimmed.to_ascii_lowercase();
    let host = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    match host {
        Some(host) if !host.is_empty() => Ok(trimmed.to_string()),
        _ => Err(ConfigError::InvalidBaseUrl(raw.to_string())),
    }
}

fn parse_u64(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn default_token_path(home: Option<String>) -> PathBuf {
    match home {
        Some(home) if !home.is_empty() => PathBuf::from(home)
            .join(".config")
            .join("clawphones")
            .join("token.json"),
        _ => PathBuf::from(FALLBACK_TOKEN_PATH),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
