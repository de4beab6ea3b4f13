//! Server configuration loaded from environment variables.

/// Default bind host.
const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
const DEFAULT_PORT: u16 = 8080;

/// Default per-request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration for the API server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address, from `HOST` (defaults to `0.0.0.0`).
    pub host: String,
    /// Bind port, from `PORT` (defaults to `8080`).
    pub port: u16,
    /// Allowed CORS origins, from `CORS_ORIGINS` (comma-separated).
    /// Empty means same-origin only.
    pub cors_origins: Vec<String>,
    /// Per-request timeout in seconds, from `REQUEST_TIMEOUT_SECS`.
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        std::env::remove_var("HOST");
        std::env::remove_var("PORT");
        std::env::remove_var("CORS_ORIGINS");
        let config = ServerConfig::from_env();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(config.cors_origins.is_empty());
    }
}
