// src/config.rs
//! Unified client configuration - environment driven with builder overrides

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::core::api_client::DEFAULT_TIMEOUT_SECS;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub bearer_token: Option<String>,
    pub poll_interval: Duration,
    pub timeout_seconds: u64,
    pub cache_db_path: PathBuf,
}

impl ClientConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let api_base_url =
            std::env::var("MEDIKARIYER_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let bearer_token = std::env::var("MEDIKARIYER_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let poll_interval_secs = std::env::var("PHOTO_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let cache_db_path = match std::env::var("PHOTO_CACHE_DB") {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                let base_dir =
                    std::env::current_dir().context("Failed to get current directory")?;
                base_dir.join("data").join("photo_cache.db")
            }
        };

        info!(
            "Loaded client configuration: api={}, poll={}s",
            api_base_url, poll_interval_secs
        );

        Ok(Self {
            api_base_url,
            bearer_token,
            poll_interval: Duration::from_secs(poll_interval_secs),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            cache_db_path,
        })
    }

    pub fn with_api_base_url(mut self, url: String) -> Self {
        self.api_base_url = url;
        self
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_cache_db_path(mut self, path: PathBuf) -> Self {
        self.cache_db_path = path;
        self
    }
}
