//! Configuration validation.
//!
//! Pure functions from raw settings to validated ones. Defaults are applied
//! first, then every range invariant is checked eagerly.

use std::collections::HashSet;

use reqwest::header::HeaderValue;
use url::Url;

use crate::config::schema::{BreakerConfig, RawServiceConfig, RuntimeConfig, ServiceConfig};
use crate::error::ServiceError;

/// Apply defaults to `raw` and validate it into a frozen [`ServiceConfig`].
pub fn validate_service(raw: &RawServiceConfig) -> Result<ServiceConfig, ServiceError> {
    let raw = raw.clone().with_defaults();
    let name = raw.name.trim();
    if name.is_empty() {
        return Err(ServiceError::invalid("<unnamed>", "name", "must not be empty"));
    }

    let base_url = parse_base_url(name, raw.base_url.as_deref())?;
    let timeout_ms = positive(name, "timeout_ms", raw.timeout_ms)?;
    let max_retries = non_negative(name, "max_retries", raw.max_retries)?;
    let max_retries = u32::try_from(max_retries)
        .map_err(|_| ServiceError::invalid(name, "max_retries", "is too large"))?;
    let health_check_interval_ms =
        positive(name, "health_check_interval_ms", raw.health_check_interval_ms)?;
    let health_timeout_ms = positive(name, "health_timeout_ms", raw.health_timeout_ms)?;

    let health_path = raw.health_path.clone().unwrap_or_default();
    if !health_path.starts_with('/') {
        return Err(ServiceError::invalid(name, "health_path", "must start with '/'"));
    }

    let retry_base_delay_ms = positive(name, "retry_base_delay_ms", raw.retry_base_delay_ms)?;
    let retry_max_delay_ms = positive(name, "retry_max_delay_ms", raw.retry_max_delay_ms)?;
    if retry_max_delay_ms < retry_base_delay_ms {
        return Err(ServiceError::invalid(
            name,
            "retry_max_delay_ms",
            "must not be below retry_base_delay_ms",
        ));
    }

    let auth_token = raw.auth_token.clone().filter(|t| !t.is_empty());
    if let Some(token) = &auth_token {
        if HeaderValue::from_str(&format!("Bearer {}", token)).is_err() {
            return Err(ServiceError::invalid(
                name,
                "auth_token",
                "is not a valid header value",
            ));
        }
    }

    Ok(ServiceConfig {
        name: name.to_string(),
        base_url,
        timeout_ms,
        max_retries,
        auth_token,
        health_check_interval_ms,
        health_path,
        health_timeout_ms,
        retry_base_delay_ms,
        retry_max_delay_ms,
        breaker: validate_breaker(name, &raw)?,
    })
}

fn validate_breaker(name: &str, raw: &RawServiceConfig) -> Result<BreakerConfig, ServiceError> {
    let cb = &raw.circuit_breaker;

    let threshold = non_negative(name, "error_threshold_percent", cb.error_threshold_percent)?;
    if threshold > 100 {
        return Err(ServiceError::invalid(
            name,
            "error_threshold_percent",
            format!("must be within 0..=100, got {}", threshold),
        ));
    }

    let reset_timeout_ms = positive(name, "reset_timeout_ms", cb.reset_timeout_ms)?;
    let window_size = positive(name, "window_size", cb.window_size)? as usize;
    let minimum_calls = positive(name, "minimum_calls", cb.minimum_calls)? as usize;
    if minimum_calls > window_size {
        return Err(ServiceError::invalid(
            name,
            "minimum_calls",
            format!("must not exceed window_size ({})", window_size),
        ));
    }

    Ok(BreakerConfig {
        enabled: cb.enabled.unwrap_or(false),
        error_threshold_percent: threshold as u8,
        reset_timeout_ms,
        window_size,
        minimum_calls,
    })
}

/// Validate every service in `config`, reporting all errors rather than the first.
pub fn validate_config(config: &RuntimeConfig) -> Result<Vec<ServiceConfig>, Vec<ServiceError>> {
    let mut errors = Vec::new();
    let mut services = Vec::with_capacity(config.services.len());
    let mut seen = HashSet::new();

    for raw in &config.services {
        match validate_service(raw) {
            Ok(service) => {
                if seen.insert(service.name().to_string()) {
                    services.push(service);
                } else {
                    errors.push(ServiceError::DuplicateService(service.name().to_string()));
                }
            }
            Err(e) => errors.push(e),
        }
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ServiceError::invalid(
            "admin",
            "api_key",
            "is required when the admin endpoint is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(services)
    } else {
        Err(errors)
    }
}

fn parse_base_url(service: &str, value: Option<&str>) -> Result<Url, ServiceError> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ServiceError::invalid(service, "base_url", "is required"))?;
    let url = Url::parse(value.trim())
        .map_err(|e| ServiceError::invalid(service, "base_url", e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ServiceError::invalid(
            service,
            "base_url",
            format!("unsupported scheme `{}`", other),
        )),
    }
}

fn positive(service: &str, field: &'static str, value: Option<i64>) -> Result<u64, ServiceError> {
    match value {
        None => Err(ServiceError::invalid(service, field, "is required")),
        Some(v) if v <= 0 => Err(ServiceError::invalid(
            service,
            field,
            format!("must be positive, got {}", v),
        )),
        Some(v) => Ok(v as u64),
    }
}

fn non_negative(
    service: &str,
    field: &'static str,
    value: Option<i64>,
) -> Result<u64, ServiceError> {
    match value {
        None => Err(ServiceError::invalid(service, field, "is required")),
        Some(v) if v < 0 => Err(ServiceError::invalid(
            service,
            field,
            format!("must not be negative, got {}", v),
        )),
        Some(v) => Ok(v as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str) -> RawServiceConfig {
        RawServiceConfig::new(name, "http://127.0.0.1:9000")
    }

    fn field_of(err: ServiceError) -> &'static str {
        match err {
            ServiceError::ConfigInvalid { field, .. } => field,
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_produce_valid_config() {
        let config = validate_service(&raw("billing")).unwrap();
        assert_eq!(config.timeout_ms(), 30_000);
        assert_eq!(config.max_retries(), 3);
        assert_eq!(config.max_attempts(), 4);
        assert_eq!(config.health_path(), "/health");
        assert!(!config.breaker().enabled);
        assert_eq!(config.breaker().window_size, 10);
    }

    #[test]
    fn test_token_with_control_characters_rejected() {
        let mut r = raw("billing");
        r.auth_token = Some("s3cret\n".into());
        assert_eq!(field_of(validate_service(&r).unwrap_err()), "auth_token");

        r.auth_token = Some("s3cret".into());
        assert_eq!(validate_service(&r).unwrap().auth_token(), Some("s3cret"));
    }

    #[test]
    fn test_non_positive_timeout_rejected() {
        let mut r = raw("billing");
        r.timeout_ms = Some(0);
        assert_eq!(field_of(validate_service(&r).unwrap_err()), "timeout_ms");
        r.timeout_ms = Some(-5);
        assert_eq!(field_of(validate_service(&r).unwrap_err()), "timeout_ms");
    }

    #[test]
    fn test_zero_retries_allowed_negative_rejected() {
        let mut r = raw("billing");
        r.max_retries = Some(0);
        assert_eq!(validate_service(&r).unwrap().max_attempts(), 1);
        r.max_retries = Some(-1);
        assert_eq!(field_of(validate_service(&r).unwrap_err()), "max_retries");
    }

    #[test]
    fn test_threshold_range() {
        let mut r = raw("billing");
        r.circuit_breaker.error_threshold_percent = Some(0);
        assert!(validate_service(&r).is_ok());
        r.circuit_breaker.error_threshold_percent = Some(100);
        assert!(validate_service(&r).is_ok());
        r.circuit_breaker.error_threshold_percent = Some(101);
        assert_eq!(
            field_of(validate_service(&r).unwrap_err()),
            "error_threshold_percent"
        );
        r.circuit_breaker.error_threshold_percent = Some(-1);
        assert_eq!(
            field_of(validate_service(&r).unwrap_err()),
            "error_threshold_percent"
        );
    }

    #[test]
    fn test_reset_timeout_must_be_positive() {
        let mut r = raw("billing");
        r.circuit_breaker.reset_timeout_ms = Some(0);
        assert_eq!(field_of(validate_service(&r).unwrap_err()), "reset_timeout_ms");
    }

    #[test]
    fn test_missing_url_rejected() {
        let r = RawServiceConfig {
            name: "billing".into(),
            ..Default::default()
        };
        assert_eq!(field_of(validate_service(&r).unwrap_err()), "base_url");
    }

    #[test]
    fn test_bad_scheme_rejected() {
        let r = RawServiceConfig::new("billing", "ftp://files");
        assert_eq!(field_of(validate_service(&r).unwrap_err()), "base_url");
    }

    #[test]
    fn test_minimum_calls_bounded_by_window() {
        let mut r = raw("billing");
        r.circuit_breaker.window_size = Some(2);
        r.circuit_breaker.minimum_calls = Some(3);
        assert_eq!(field_of(validate_service(&r).unwrap_err()), "minimum_calls");
    }

    #[test]
    fn test_empty_token_treated_as_unset() {
        let mut r = raw("billing");
        r.auth_token = Some(String::new());
        assert_eq!(validate_service(&r).unwrap().auth_token(), None);
    }

    #[test]
    fn test_validate_config_collects_all_errors() {
        let mut bad = raw("a");
        bad.timeout_ms = Some(0);
        let config = RuntimeConfig {
            services: vec![bad, raw("b"), raw("b")],
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[1], ServiceError::DuplicateService(ref n) if n == "b"));
    }

    #[test]
    fn test_admin_requires_key() {
        let mut config = RuntimeConfig::default();
        config.admin.enabled = true;
        assert!(validate_config(&config).is_err());
        config.admin.api_key = "k".into();
        assert!(validate_config(&config).unwrap().is_empty());
    }
}
