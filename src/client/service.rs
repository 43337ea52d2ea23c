//! HTTP client for one logical upstream service.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use url::Url;

use crate::client::request::{
    base_headers, build_url, new_request_id, CLIENT_USER_AGENT, PROBE_USER_AGENT,
};
use crate::client::response::{decode, transport_error};
use crate::config::ServiceConfig;
use crate::error::{ErrorKind, ServiceError, ServiceResult};
use crate::resilience::{CallOutcome, CircuitBreaker, RetryExecutor};

/// Configured client for one upstream service: config, breaker and executor.
#[derive(Debug)]
pub struct ServiceClient {
    config: Arc<ServiceConfig>,
    breaker: Arc<CircuitBreaker>,
    executor: RetryExecutor,
    http: reqwest::Client,
}

impl ServiceClient {
    /// Build a client with a fresh, closed breaker.
    pub fn new(config: ServiceConfig, http: reqwest::Client) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.name(), *config.breaker()));
        let executor = RetryExecutor::new(&config, breaker.clone());
        Self {
            config: Arc::new(config),
            breaker,
            executor,
            http,
        }
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Issue a call through the retry executor.
    ///
    /// `deadline`, when set, bounds the whole call including retries; an
    /// attempt still running at the deadline is aborted and counted as failed.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        deadline: Option<Instant>,
    ) -> ServiceResult<Value> {
        let url = build_url(self.config.base_url(), path)
            .map_err(|e| ServiceError::invalid(self.name(), "path", e.to_string()))?;

        self.executor
            .execute(deadline, move |attempt| {
                self.send_once(method.clone(), url.clone(), body, attempt)
            })
            .await
    }

    /// GET `path` and deserialize the (envelope-unwrapped) response.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ServiceResult<T> {
        let value = self.request(Method::GET, path, None, None).await?;
        self.deserialize(value)
    }

    /// POST `body` as JSON to `path` and deserialize the response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ServiceResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)
            .map_err(|e| ServiceError::invalid(self.name(), "body", e.to_string()))?;
        let value = self.request(Method::POST, path, Some(&body), None).await?;
        self.deserialize(value)
    }

    /// Probe the health endpoint once, bounded by the health timeout.
    ///
    /// Never fails; the outcome is for the breaker only.
    pub async fn probe(&self) -> CallOutcome {
        let start = Instant::now();
        let url = match build_url(self.config.base_url(), self.config.health_path()) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(service = %self.name(), error = %e, "Invalid health check URL");
                return CallOutcome::unhealthy(start.elapsed());
            }
        };

        let request = self
            .http
            .get(url)
            .headers(base_headers(&new_request_id(), PROBE_USER_AGENT))
            .send();

        match tokio::time::timeout(self.config.health_timeout(), request).await {
            Ok(Ok(response)) if response.status().is_success() => {
                CallOutcome::success(start.elapsed())
            }
            Ok(Ok(response)) => {
                tracing::warn!(service = %self.name(), status = %response.status(), "Health check failed: non-success status");
                CallOutcome::unhealthy(start.elapsed())
            }
            Ok(Err(e)) => {
                tracing::warn!(service = %self.name(), error = %e, "Health check failed: connection error");
                CallOutcome::failure(ErrorKind::Transport, start.elapsed())
            }
            Err(_) => {
                tracing::warn!(service = %self.name(), "Health check failed: timeout");
                CallOutcome::failure(ErrorKind::Timeout, start.elapsed())
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        attempt: u32,
    ) -> ServiceResult<Value> {
        let request_id = new_request_id();
        tracing::debug!(
            service = %self.name(),
            request_id = %request_id,
            method = %method,
            url = %url,
            attempt,
            "Sending upstream request"
        );

        let mut request = self
            .http
            .request(method, url)
            .headers(base_headers(&request_id, CLIENT_USER_AGENT));
        if let Some(token) = self.config.auth_token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        decode(response).await
    }

    fn deserialize<T: DeserializeOwned>(&self, value: Value) -> ServiceResult<T> {
        serde_json::from_value(value).map_err(|e| ServiceError::Decode {
            service: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}
