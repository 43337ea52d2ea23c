//! Configuration from process environment.
//!
//! Each service is read from keys under its prefix, e.g. `SEARCH_SERVICE_URL`,
//! `SEARCH_SERVICE_TIMEOUT`. The prefix `SEARCH_SERVICE` maps to the service
//! name `search-service`.

use crate::config::loader::ConfigError;
use crate::config::schema::{RawBreakerConfig, RawServiceConfig, RuntimeConfig};
use crate::config::validation::validate_config;
use crate::error::ServiceError;

/// Services read when `UPSTREAM_SERVICES` is unset.
pub const DEFAULT_SERVICES: &[&str] = &["DOCUMENT_SERVICE", "EMBEDDING_SERVICE", "SEARCH_SERVICE"];

/// Load and validate configuration from the process environment.
pub fn load_from_env() -> Result<RuntimeConfig, ConfigError> {
    load_with(|key| std::env::var(key).ok())
}

/// Load and validate configuration from an arbitrary key lookup.
pub fn load_with<F>(lookup: F) -> Result<RuntimeConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let prefixes: Vec<String> = match lookup("UPSTREAM_SERVICES") {
        Some(list) => list
            .split(',')
            .map(|p| p.trim().to_ascii_uppercase())
            .filter(|p| !p.is_empty())
            .collect(),
        None => DEFAULT_SERVICES.iter().map(|p| p.to_string()).collect(),
    };

    let mut config = RuntimeConfig::default();
    let mut errors = Vec::new();

    for prefix in &prefixes {
        let mut reader = EnvReader {
            lookup: &lookup,
            prefix,
            service: service_name(prefix),
            errors: &mut errors,
        };
        config.services.push(reader.read_service());
    }

    if let Some(v) = lookup("UPSTREAM_ADMIN_ENABLED") {
        config.admin.enabled = v == "true";
    }
    if let Some(v) = lookup("UPSTREAM_ADMIN_API_KEY") {
        config.admin.api_key = v;
    }
    if let Some(v) = lookup("UPSTREAM_ADMIN_BIND") {
        config.admin.bind_address = v;
    }
    if let Some(v) = lookup("UPSTREAM_METRICS_ENABLED") {
        config.observability.metrics_enabled = v == "true";
    }
    if let Some(v) = lookup("UPSTREAM_METRICS_BIND") {
        config.observability.metrics_address = v;
    }
    if let Some(v) = lookup("UPSTREAM_LOG_LEVEL") {
        config.observability.log_level = v;
    }

    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// `DOCUMENT_SERVICE` → `document-service`.
pub fn service_name(prefix: &str) -> String {
    prefix.to_ascii_lowercase().replace('_', "-")
}

struct EnvReader<'a, F> {
    lookup: &'a F,
    prefix: &'a str,
    service: String,
    errors: &'a mut Vec<ServiceError>,
}

impl<F> EnvReader<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn read_service(&mut self) -> RawServiceConfig {
        RawServiceConfig {
            name: self.service.clone(),
            base_url: self.string("URL"),
            timeout_ms: self.int("TIMEOUT", "timeout_ms"),
            max_retries: self.int("RETRIES", "max_retries"),
            auth_token: self.string("TOKEN"),
            health_check_interval_ms: self
                .int("HEALTH_CHECK_INTERVAL", "health_check_interval_ms"),
            health_path: self.string("HEALTH_PATH"),
            health_timeout_ms: self.int("HEALTH_TIMEOUT", "health_timeout_ms"),
            retry_base_delay_ms: self.int("RETRY_DELAY", "retry_base_delay_ms"),
            retry_max_delay_ms: self.int("RETRY_MAX_DELAY", "retry_max_delay_ms"),
            circuit_breaker: RawBreakerConfig {
                // Only the literal "true" enables the breaker.
                enabled: self.string("CIRCUIT_BREAKER_ENABLED").map(|v| v == "true"),
                error_threshold_percent: self.int("ERROR_THRESHOLD", "error_threshold_percent"),
                reset_timeout_ms: self.int("RESET_TIMEOUT", "reset_timeout_ms"),
                window_size: self.int("WINDOW_SIZE", "window_size"),
                minimum_calls: self.int("MINIMUM_CALLS", "minimum_calls"),
            },
        }
    }

    fn string(&self, suffix: &str) -> Option<String> {
        (self.lookup)(&format!("{}_{}", self.prefix, suffix))
    }

    fn int(&mut self, suffix: &str, field: &'static str) -> Option<i64> {
        let key = format!("{}_{}", self.prefix, suffix);
        let value = (self.lookup)(&key)?;
        match value.trim().parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.errors.push(ServiceError::invalid(
                    &self.service,
                    field,
                    format!("{} is not an integer: {:?}", key, value),
                ));
                None
            }
        }
    }
}
