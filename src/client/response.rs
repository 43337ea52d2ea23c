//! Response classification.
//!
//! # Design Decisions
//! - 2xx is success; everything else becomes `ServiceError::Upstream`
//! - A JSON object with a boolean `success` field is treated as an envelope:
//!   `success: false` is a business failure even on 2xx, `success: true`
//!   unwraps `data`
//! - Non-JSON success bodies are returned as a JSON string

use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};

const MAX_ERROR_BODY: usize = 256;

/// Read and classify an upstream response.
pub async fn decode(response: reqwest::Response) -> ServiceResult<Value> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(transport_error)?;
    classify(status, &bytes)
}

/// Classify a status and raw body.
pub fn classify(status: StatusCode, body: &[u8]) -> ServiceResult<Value> {
    if !status.is_success() {
        return Err(ServiceError::Upstream {
            status: status.as_u16(),
            message: error_message(status, body),
        });
    }
    if body.is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => unwrap_envelope(status, value),
        Err(_) => Ok(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}

/// Unwrap a `{ success, data, error }` envelope if `body` is one.
pub fn unwrap_envelope(status: StatusCode, body: Value) -> ServiceResult<Value> {
    let mut map = match body {
        Value::Object(map) => map,
        other => return Ok(other),
    };
    let success = match map.get("success") {
        Some(Value::Bool(success)) => *success,
        _ => return Ok(Value::Object(map)),
    };
    if success {
        return Ok(map.remove("data").unwrap_or(Value::Null));
    }
    let message = message_field(&map).unwrap_or_else(|| "request failed".to_string());
    Err(ServiceError::Upstream {
        status: status.as_u16(),
        message,
    })
}

/// Map a reqwest failure to a service error. Builder failures happen before
/// any I/O and say nothing about upstream health.
pub fn transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_builder() {
        ServiceError::Request(e.to_string())
    } else {
        ServiceError::Transport(e.to_string())
    }
}

fn message_field(map: &serde_json::Map<String, Value>) -> Option<String> {
    ["error", "message"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        if let Some(message) = message_field(&map) {
            return message;
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string();
    }
    text.chars().take(MAX_ERROR_BODY).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_passes_through() {
        let value = classify(StatusCode::OK, br#"{"taskId":"t1"}"#).unwrap();
        assert_eq!(value, json!({"taskId": "t1"}));
    }

    #[test]
    fn test_envelope_success_unwraps_data() {
        let value = classify(StatusCode::OK, br#"{"success":true,"data":[1,2]}"#).unwrap();
        assert_eq!(value, json!([1, 2]));
        let value = classify(StatusCode::OK, br#"{"success":true}"#).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_envelope_failure_is_non_transient() {
        let err = classify(StatusCode::OK, br#"{"success":false,"error":"quota"}"#).unwrap_err();
        assert!(matches!(err, ServiceError::Upstream { status: 200, ref message } if message == "quota"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_server_error_is_transient() {
        let err = classify(StatusCode::BAD_GATEWAY, b"").unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn test_client_error_uses_body_message() {
        let err = classify(StatusCode::UNPROCESSABLE_ENTITY, br#"{"message":"bad chunk size"}"#)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Upstream { status: 422, ref message } if message == "bad chunk size"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_text_body() {
        assert_eq!(classify(StatusCode::OK, b"pong").unwrap(), json!("pong"));
        assert_eq!(classify(StatusCode::NO_CONTENT, b"").unwrap(), Value::Null);
    }

    #[test]
    fn test_builder_error_is_not_transport() {
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/")
            .header("authorization", "Bearer s3cret\n")
            .build()
            .unwrap_err();
        let err = transport_error(err);
        assert!(matches!(err, ServiceError::Request(_)));
        assert_eq!(err.kind(), None);
    }
}
