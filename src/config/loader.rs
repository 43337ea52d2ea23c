//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RuntimeConfig;
use crate::config::validation::validate_config;
use crate::error::ServiceError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ServiceError>),
}

fn join_errors(errors: &[ServiceError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<RuntimeConfig, ConfigError> {
    let config: RuntimeConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_file() {
        let config = parse_config(
            r#"
            [[services]]
            name = "document-service"

            [[services]]
            name = "billing"
            base_url = "http://billing:7000"
            max_retries = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.services.len(), 2);
    }

    #[test]
    fn test_reports_every_validation_error() {
        let err = parse_config(
            r#"
            [[services]]
            name = "a"
            base_url = "http://a"
            timeout_ms = -1

            [[services]]
            name = "b"
            "#,
        )
        .unwrap_err();
        match &err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
        let msg = err.to_string();
        assert!(msg.contains("timeout_ms"));
        assert!(msg.contains("base_url"));
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        assert!(matches!(
            parse_config("[[services]\nname ="),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/upstream.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
