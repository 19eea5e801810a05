//! API Configuration Module
//!
//! Server, CORS, rate limiting, upload and loader settings. Configuration is
//! loaded from environment variables with sensible defaults for development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use taskboard_loader::{Dispatch, LoaderConfig};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for the HTTP surface and per-request loaders.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the server binds to.
    pub bind_addr: String,

    /// Deployment environment ("development", "production", ...).
    pub environment: String,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Rate Limiting Configuration
    // ========================================================================
    /// Whether rate limiting is enabled.
    pub rate_limit_enabled: bool,

    /// Requests allowed per client per window.
    pub rate_limit_max_requests: u32,

    /// Window size for rate limiting.
    pub rate_limit_window: Duration,

    // ========================================================================
    // Uploads
    // ========================================================================
    /// Directory uploaded files are written to and served from.
    pub upload_dir: PathBuf,

    /// Largest accepted upload in bytes.
    pub upload_max_bytes: usize,

    // ========================================================================
    // Request-scoped loaders
    // ========================================================================
    /// Keys per batch call; 0 means unlimited.
    pub loader_max_batch: usize,

    /// Dispatch delay for GraphQL loaders; 0 dispatches on the next yield.
    pub loader_delay: Duration,

    /// Capacity of the subscription broadcast channel.
    pub event_capacity: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            environment: "development".to_string(),
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400,
            rate_limit_enabled: true,
            rate_limit_max_requests: 100,
            rate_limit_window: Duration::from_secs(15 * 60),
            upload_dir: PathBuf::from("public/uploads"),
            upload_max_bytes: 5 * 1024 * 1024,
            loader_max_batch: 0,
            loader_delay: Duration::from_millis(1),
            event_capacity: 1024,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TASKBOARD_BIND_ADDR`: bind address (default: 0.0.0.0:3000); `PORT` overrides the port
    /// - `TASKBOARD_ENVIRONMENT`: deployment environment (default: development)
    /// - `TASKBOARD_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `TASKBOARD_RATE_LIMIT_ENABLED`: "true" or "false" (default: true)
    /// - `TASKBOARD_RATE_LIMIT_MAX_REQUESTS`: requests per window per client (default: 100)
    /// - `TASKBOARD_RATE_LIMIT_WINDOW_SECS`: window length (default: 900)
    /// - `TASKBOARD_UPLOAD_DIR`: upload directory (default: public/uploads)
    /// - `TASKBOARD_UPLOAD_MAX_BYTES`: upload size limit (default: 5 MiB)
    /// - `TASKBOARD_LOADER_MAX_BATCH`: keys per batch call (default: 0, unlimited)
    /// - `TASKBOARD_LOADER_DELAY_MS`: loader dispatch delay (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut bind_addr =
            std::env::var("TASKBOARD_BIND_ADDR").unwrap_or(defaults.bind_addr);
        if let Ok(port) = std::env::var("PORT") {
            let host = bind_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            bind_addr = format!("{}:{}", host, port);
        }

        let cors_origins = std::env::var("TASKBOARD_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            bind_addr,
            environment: std::env::var("TASKBOARD_ENVIRONMENT")
                .unwrap_or(defaults.environment)
                .to_lowercase(),
            cors_origins,
            cors_max_age_secs: env_parse("TASKBOARD_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            rate_limit_enabled: std::env::var("TASKBOARD_RATE_LIMIT_ENABLED")
                .ok()
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(defaults.rate_limit_enabled),
            rate_limit_max_requests: env_parse("TASKBOARD_RATE_LIMIT_MAX_REQUESTS")
                .unwrap_or(defaults.rate_limit_max_requests),
            rate_limit_window: env_parse("TASKBOARD_RATE_LIMIT_WINDOW_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            upload_dir: std::env::var("TASKBOARD_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            upload_max_bytes: env_parse("TASKBOARD_UPLOAD_MAX_BYTES")
                .unwrap_or(defaults.upload_max_bytes),
            loader_max_batch: env_parse("TASKBOARD_LOADER_MAX_BATCH")
                .unwrap_or(defaults.loader_max_batch),
            loader_delay: env_parse("TASKBOARD_LOADER_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.loader_delay),
            event_capacity: env_parse("TASKBOARD_EVENT_CAPACITY")
                .unwrap_or(defaults.event_capacity),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }

    /// Parse the bind address.
    pub fn socket_addr(&self) -> ApiResult<SocketAddr> {
        self.bind_addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", self.bind_addr, e))
        })
    }

    /// Loader settings applied to every request's loaders.
    pub fn loader_config(&self) -> LoaderConfig {
        let dispatch = if self.loader_delay.is_zero() {
            Dispatch::Yield
        } else {
            Dispatch::Delay(self.loader_delay)
        };
        LoaderConfig::new()
            .with_max_batch_size(self.loader_max_batch)
            .with_dispatch(dispatch)
    }

    /// Production sanity checks.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        if self.cors_origins.is_empty() {
            return Err(ApiError::invalid_input(
                "CORS origins not configured for production. Set TASKBOARD_CORS_ORIGINS.",
            ));
        }
        if !self.rate_limit_enabled {
            tracing::warn!("Rate limiting is disabled in production");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
