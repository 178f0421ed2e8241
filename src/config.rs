//! Middleware and delivery configuration.
//!
//! ## Environment
//!
//! - `LOG_SERVICE_URL` - full URL of the log-collection endpoint (required), e.g.
//!   `http://logs.internal:8080/log`
//! - `LOG_SERVICE_TIMEOUT_MS` - upper bound for a single delivery POST in milliseconds
//!   (default: 5000)
//!
//! The environment is read once by [`DeliveryConfig::from_env`]; the resulting value is handed to
//! [`DeliveryClient::new`](crate::DeliveryClient::new) and used read-only from then on.

use std::env;
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

pub const LOG_SERVICE_URL: &str = "LOG_SERVICE_URL";
pub const LOG_SERVICE_TIMEOUT_MS: &str = "LOG_SERVICE_TIMEOUT_MS";

/// Default bound on a single delivery attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the audit middleware.
///
/// Controls which bodies are captured. A body that is not captured is logged as an empty string
/// and its stream is left untouched.
///
/// # Examples
///
/// ```rust
/// use audit_relay::CaptureConfig;
///
/// // Default configuration
/// let config = CaptureConfig::default();
///
/// // Custom configuration
/// let config = CaptureConfig {
///     capture_request_body: true,
///     capture_response_body: false,
/// };
/// ```
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Whether to capture request bodies
    pub capture_request_body: bool,
    /// Whether to capture response bodies
    pub capture_response_body: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_request_body: true,
            capture_response_body: true,
        }
    }
}

/// Where and how records are posted.
#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    /// Log-collection endpoint
    pub endpoint: Url,
    /// Client-side timeout for one POST, connection included
    pub timeout: Duration,
}

impl DeliveryConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parse an endpoint string.
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(Self::new(endpoint))
    }

    /// Load from `LOG_SERVICE_URL` and `LOG_SERVICE_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var(LOG_SERVICE_URL)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing(LOG_SERVICE_URL))?;
        let config = Self::from_url(url.trim())?;

        match env::var(LOG_SERVICE_TIMEOUT_MS) {
            Ok(raw) => {
                let millis = raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|millis| *millis > 0)
                    .ok_or_else(|| ConfigError::InvalidTimeout(raw.clone()))?;
                Ok(config.with_timeout(Duration::from_millis(millis)))
            }
            Err(_) => Ok(config),
        }
    }
}
