//! Configuration schema definitions.
//!
//! Raw types mirror what a config file or the environment can express and keep
//! every numeric field optional and signed, so that missing and negative
//! values reach validation instead of failing inside serde. `ServiceConfig` is
//! the validated, frozen form handed to the rest of the runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration for the runtime.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upstream service definitions.
    pub services: Vec<RawServiceConfig>,

    /// Admin status endpoint.
    pub admin: AdminConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Unvalidated settings for one logical upstream service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RawServiceConfig {
    /// Unique service name (registry key).
    pub name: String,

    /// Base URL every operation path is joined onto.
    pub base_url: Option<String>,

    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: Option<i64>,

    /// Retries after the first attempt.
    pub max_retries: Option<i64>,

    /// Bearer credential forwarded on calls.
    pub auth_token: Option<String>,

    /// Prober cadence in milliseconds.
    pub health_check_interval_ms: Option<i64>,

    /// Path probed by the health checker.
    pub health_path: Option<String>,

    /// Probe timeout in milliseconds.
    pub health_timeout_ms: Option<i64>,

    /// First backoff delay in milliseconds.
    pub retry_base_delay_ms: Option<i64>,

    /// Backoff ceiling in milliseconds.
    pub retry_max_delay_ms: Option<i64>,

    pub circuit_breaker: RawBreakerConfig,
}

/// Unvalidated circuit breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RawBreakerConfig {
    pub enabled: Option<bool>,
    pub error_threshold_percent: Option<i64>,
    pub reset_timeout_ms: Option<i64>,
    pub window_size: Option<i64>,
    pub minimum_calls: Option<i64>,
}

/// Validated, immutable configuration of one upstream service.
///
/// Only obtainable through [`crate::config::validation::validate_service`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceConfig {
    pub(crate) name: String,
    pub(crate) base_url: Url,
    pub(crate) timeout_ms: u64,
    pub(crate) max_retries: u32,
    #[serde(skip_serializing)]
    pub(crate) auth_token: Option<String>,
    pub(crate) health_check_interval_ms: u64,
    pub(crate) health_path: String,
    pub(crate) health_timeout_ms: u64,
    pub(crate) retry_base_delay_ms: u64,
    pub(crate) retry_max_delay_ms: u64,
    pub(crate) breaker: BreakerConfig,
}

impl ServiceConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound on attempts per logical call.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn health_path(&self) -> &str {
        &self.health_path
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn retry_base_delay_ms(&self) -> u64 {
        self.retry_base_delay_ms
    }

    pub fn retry_max_delay_ms(&self) -> u64 {
        self.retry_max_delay_ms
    }

    pub fn breaker(&self) -> &BreakerConfig {
        &self.breaker
    }
}

/// Validated circuit breaker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerConfig {
    /// When false the breaker always permits calls.
    pub enabled: bool,

    /// Error rate (percent of the window) at which the breaker opens.
    pub error_threshold_percent: u8,

    /// Open → Half-Open delay in milliseconds.
    pub reset_timeout_ms: u64,

    /// Number of most recent outcomes the error rate is computed over.
    pub window_size: usize,

    /// Outcomes the window must hold before the rate can trip the breaker.
    pub minimum_calls: usize,
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

/// Values applied to unset fields before validation.
#[derive(Debug, Clone)]
pub struct ServiceDefaults {
    pub base_url: Option<&'static str>,
    pub timeout_ms: i64,
    pub max_retries: i64,
    pub health_check_interval_ms: i64,
    pub health_path: &'static str,
    pub health_timeout_ms: i64,
    pub retry_base_delay_ms: i64,
    pub retry_max_delay_ms: i64,
    pub breaker_enabled: bool,
    pub error_threshold_percent: i64,
    pub reset_timeout_ms: i64,
    pub window_size: i64,
    pub minimum_calls: i64,
}

impl Default for ServiceDefaults {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 30_000,
            max_retries: 3,
            health_check_interval_ms: 30_000,
            health_path: "/health",
            health_timeout_ms: 5_000,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 10_000,
            breaker_enabled: false,
            error_threshold_percent: 50,
            reset_timeout_ms: 30_000,
            window_size: 10,
            minimum_calls: 3,
        }
    }
}

impl ServiceDefaults {
    /// Defaults for a named service; the document, embedding and search
    /// services carry their deployment defaults.
    pub fn for_service(name: &str) -> Self {
        let base = Self::default();
        match name {
            "document-service" => Self {
                base_url: Some("http://localhost:8000"),
                ..base
            },
            "embedding-service" => Self {
                base_url: Some("http://localhost:8001"),
                timeout_ms: 60_000,
                max_retries: 2,
                health_check_interval_ms: 60_000,
                error_threshold_percent: 30,
                reset_timeout_ms: 60_000,
                ..base
            },
            "search-service" => Self {
                base_url: Some("http://localhost:8002"),
                timeout_ms: 15_000,
                max_retries: 2,
                error_threshold_percent: 40,
                ..base
            },
            _ => base,
        }
    }
}

impl RawServiceConfig {
    /// Create a raw config with only a name and base URL set.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: Some(base_url.into()),
            ..Default::default()
        }
    }

    /// Fill every unset field from the service's defaults.
    pub fn with_defaults(mut self) -> Self {
        let d = ServiceDefaults::for_service(&self.name);
        if self.base_url.is_none() {
            self.base_url = d.base_url.map(str::to_string);
        }
        self.timeout_ms.get_or_insert(d.timeout_ms);
        self.max_retries.get_or_insert(d.max_retries);
        self.health_check_interval_ms
            .get_or_insert(d.health_check_interval_ms);
        self.health_path
            .get_or_insert_with(|| d.health_path.to_string());
        self.health_timeout_ms.get_or_insert(d.health_timeout_ms);
        self.retry_base_delay_ms.get_or_insert(d.retry_base_delay_ms);
        self.retry_max_delay_ms.get_or_insert(d.retry_max_delay_ms);

        let cb = &mut self.circuit_breaker;
        cb.enabled.get_or_insert(d.breaker_enabled);
        cb.error_threshold_percent
            .get_or_insert(d.error_threshold_percent);
        cb.reset_timeout_ms.get_or_insert(d.reset_timeout_ms);
        cb.window_size.get_or_insert(d.window_size);
        cb.minimum_calls.get_or_insert(d.minimum_calls);
        self
    }
}

/// Admin status endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin endpoint.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_service_defaults() {
        let raw = RawServiceConfig {
            name: "embedding-service".into(),
            ..Default::default()
        }
        .with_defaults();
        assert_eq!(raw.base_url.as_deref(), Some("http://localhost:8001"));
        assert_eq!(raw.timeout_ms, Some(60_000));
        assert_eq!(raw.max_retries, Some(2));
        assert_eq!(raw.circuit_breaker.error_threshold_percent, Some(30));
    }

    #[test]
    fn test_unknown_service_has_no_url_default() {
        let raw = RawServiceConfig {
            name: "billing".into(),
            ..Default::default()
        }
        .with_defaults();
        assert!(raw.base_url.is_none());
        assert_eq!(raw.timeout_ms, Some(30_000));
        assert_eq!(raw.health_path.as_deref(), Some("/health"));
    }

    #[test]
    fn test_explicit_values_survive_defaults() {
        let mut raw = RawServiceConfig::new("search-service", "http://search:9000");
        raw.timeout_ms = Some(1234);
        let raw = raw.with_defaults();
        assert_eq!(raw.base_url.as_deref(), Some("http://search:9000"));
        assert_eq!(raw.timeout_ms, Some(1234));
    }

    #[test]
    fn test_parse_toml() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            [[services]]
            name = "document-service"
            base_url = "http://docs:8000"
            timeout_ms = 2000

            [services.circuit_breaker]
            enabled = true
            error_threshold_percent = 25

            [admin]
            enabled = true
            api_key = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].timeout_ms, Some(2000));
        assert_eq!(config.services[0].circuit_breaker.enabled, Some(true));
        assert!(config.admin.enabled);
        assert_eq!(config.observability.log_level, "info");
    }
}
