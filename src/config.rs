use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_SERVER_BIN: &str = "llama-server";

/// Resolved configuration shared by the client and the process manager.
///
/// Immutable for the lifetime of the process. Built once from the
/// environment (or assembled directly in tests) and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the llama-server HTTP API, without a trailing slash.
    pub base_url: String,
    /// Deadline applied to every outbound request.
    pub timeout: Duration,
    /// Path to the llama-server executable used by `ServerManager::start`.
    pub server_bin: PathBuf,
}

impl Config {
    pub fn new(base_url: impl Into<String>, timeout: Duration, server_bin: impl Into<PathBuf>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            server_bin: server_bin.into(),
        }
    }

    /// Resolve configuration from `LLAMA_SERVER_URL`, `LLAMA_SERVER_TIMEOUT_MS`
    /// and `LLAMA_SERVER_BIN`, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("LLAMA_SERVER_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        reqwest::Url::parse(&base_url)
            .with_context(|| format!("LLAMA_SERVER_URL is not a valid URL: {}", base_url))?;

        let timeout_ms = match env::var("LLAMA_SERVER_TIMEOUT_MS") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("LLAMA_SERVER_TIMEOUT_MS is not a number: {}", raw))?,
            Err(_) => DEFAULT_TIMEOUT_MS,
        };
        if timeout_ms == 0 {
            anyhow::bail!("LLAMA_SERVER_TIMEOUT_MS must be positive");
        }

        let server_bin = env::var("LLAMA_SERVER_BIN").unwrap_or_else(|_| DEFAULT_SERVER_BIN.to_string());

        Ok(Self::new(base_url, Duration::from_millis(timeout_ms), server_bin))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            DEFAULT_BASE_URL,
            Duration::from_millis(DEFAULT_TIMEOUT_MS),
            DEFAULT_SERVER_BIN,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped() {
        let config = Config::new("http://localhost:8080/", Duration::from_secs(1), "llama-server");
        assert_eq!(config.base_url, "http://localhost:8080");
    }

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.timeout, Duration::from_millis(60_000));
        assert_eq!(config.server_bin, PathBuf::from("llama-server"));
    }
}
