// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the verdict client.

use std::sync::Arc;
use std::time::Duration;

use url::Url;
use verdict_protocol::{StaticToken, TokenProvider, TransportConfig};

use crate::error::{ClientError, Result};

const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";
const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8080/ws";

/// Configuration for the judge client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the request/response API.
    pub api_url: Url,
    /// Base URL of the duplex channels.
    pub ws_url: Url,
    /// Access token for channels and API calls.
    pub token: Option<String>,
    /// Channel connect timeout.
    pub connect_timeout: Duration,
    /// One-shot API request timeout.
    pub request_timeout: Duration,
    /// How long a finished judging status stays visible.
    pub status_hide_delay: Duration,
    /// Execution inactivity watchdog; `None` disables it.
    pub run_watchdog: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default api url is valid"),
            ws_url: Url::parse(DEFAULT_WS_URL).expect("default ws url is valid"),
            token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            status_hide_delay: Duration::from_millis(3000),
            run_watchdog: None,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for a development server on `127.0.0.1:<port>`.
    pub fn localhost(port: u16) -> Result<Self> {
        Ok(Self {
            api_url: parse_url("api url", &format!("http://127.0.0.1:{}/api", port))?,
            ws_url: parse_url("ws url", &format!("ws://127.0.0.1:{}/ws", port))?,
            ..Self::default()
        })
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `VERDICT_API_URL`: API base URL (default: "http://127.0.0.1:8080/api")
    /// - `VERDICT_WS_URL`: channel base URL (default: "ws://127.0.0.1:8080/ws")
    /// - `VERDICT_TOKEN`: access token (default: none)
    /// - `VERDICT_CONNECT_TIMEOUT_MS`: channel connect timeout (default: 10000)
    /// - `VERDICT_REQUEST_TIMEOUT_MS`: API request timeout (default: 30000)
    /// - `VERDICT_STATUS_HIDE_MS`: judging status auto-hide delay (default: 3000)
    /// - `VERDICT_RUN_WATCHDOG_MS`: execution watchdog, 0 disables (default: 0)
    pub fn from_env() -> Result<Self> {
        let api_url = parse_url(
            "VERDICT_API_URL",
            &std::env::var("VERDICT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
        )?;
        let ws_url = parse_url(
            "VERDICT_WS_URL",
            &std::env::var("VERDICT_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string()),
        )?;
        let token = std::env::var("VERDICT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let watchdog_ms = env_millis("VERDICT_RUN_WATCHDOG_MS", 0)?;

        Ok(Self {
            api_url,
            ws_url,
            token,
            connect_timeout: Duration::from_millis(env_millis("VERDICT_CONNECT_TIMEOUT_MS", 10_000)?),
            request_timeout: Duration::from_millis(env_millis("VERDICT_REQUEST_TIMEOUT_MS", 30_000)?),
            status_hide_delay: Duration::from_millis(env_millis("VERDICT_STATUS_HIDE_MS", 3000)?),
            run_watchdog: (watchdog_ms > 0).then(|| Duration::from_millis(watchdog_ms)),
        })
    }

    pub fn with_api_url(mut self, url: Url) -> Self {
        self.api_url = url;
        self
    }

    pub fn with_ws_url(mut self, url: Url) -> Self {
        self.ws_url = url;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_status_hide_delay(mut self, delay: Duration) -> Self {
        self.status_hide_delay = delay;
        self
    }

    pub fn with_run_watchdog(mut self, timeout: Option<Duration>) -> Self {
        self.run_watchdog = timeout;
        self
    }

    /// Settings for the WebSocket transport.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.ws_url.clone(),
            connect_timeout_ms: self.connect_timeout.as_millis() as u64,
        }
    }

    /// The configured token as an injectable provider.
    pub fn token_provider(&self) -> Arc<dyn TokenProvider> {
        Arc::new(StaticToken(self.token.clone()))
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| ClientError::Config(format!("invalid {}: {}", name, e)))
}

fn env_millis(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| ClientError::Config(format!("invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
