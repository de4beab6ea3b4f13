//! HTTP implementation of [`ScanEngine`].
//!
//! Posts `{url, wcag_level}` to the engine service's `/scan` endpoint and
//! decodes the JSON response. One request per scan; the engine handles its
//! own browser pooling.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use accesspulse_core::wcag::WcagLevel;

use crate::engine::{EngineError, ScanEngine, ScanOutcome};

/// Default engine request timeout. Page scans can legitimately take a
/// while on heavy pages, so this is generous.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default engine base URL.
const DEFAULT_BASE_URL: &str = "http://localhost:9700";

/// Configuration for the HTTP scan-engine client.
#[derive(Debug, Clone)]
pub struct HttpEngineConfig {
    /// Base URL of the engine service, e.g. `http://engine:9700`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpEngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable              | Required | Default                  |
    /// |-----------------------|----------|--------------------------|
    /// | `SCAN_ENGINE_URL`     | no       | `http://localhost:9700`  |
    /// | `SCAN_ENGINE_TIMEOUT_SECS` | no  | `120`                    |
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("SCAN_ENGINE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: std::env::var("SCAN_ENGINE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        }
    }
}

/// Production scan engine talking to the engine service over HTTP.
pub struct HttpScanEngine {
    config: HttpEngineConfig,
    client: reqwest::Client,
}

impl HttpScanEngine {
    /// Create a client with a pre-configured HTTP connection pool.
    pub fn new(config: HttpEngineConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to build scan engine HTTP client");
        Self { config, client }
    }
}

#[async_trait]
impl ScanEngine for HttpScanEngine {
    async fn scan(&self, url: &str, level: WcagLevel) -> Result<ScanOutcome, EngineError> {
        let endpoint = format!("{}/scan", self.config.base_url);
        let response = self
            .client
            .post(&endpoint)
            .json(&json!({
                "url": url,
                "wcag_level": level.as_str(),
            }))
            .send()
            .await
            .map_err(|e| EngineError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ScanFailed(format!(
                "engine returned HTTP {status}: {body}"
            )));
        }

        let outcome = response
            .json::<ScanOutcome>()
            .await
            .map_err(|e| EngineError::MalformedResponse(e.to_string()))?;

        tracing::debug!(
            url,
            issues = outcome.issues.len(),
            passes = outcome.passes,
            duration_ms = outcome.duration_ms,
            "Engine scan finished"
        );
        Ok(outcome)
    }
}
