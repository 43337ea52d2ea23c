//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and build the client registry
//! - Start one health prober per service
//! - Bind the admin endpoint when enabled
//! - Apply reloaded configuration to a running system
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (admin only once the registry is populated)
//! - A rejected reload leaves the running configuration untouched

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{self, AdminState};
use crate::config::loader::ConfigError;
use crate::config::schema::RuntimeConfig;
use crate::config::validation::validate_config;
use crate::error::ServiceError;
use crate::health::HealthProber;
use crate::lifecycle::Shutdown;
use crate::registry::{ClientRegistry, ReconcileReport};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] ServiceError),

    #[error("failed to bind admin listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// A running client runtime: registry, probers and the optional admin server.
pub struct Runtime {
    registry: Arc<ClientRegistry>,
    prober: HealthProber,
    shutdown: Shutdown,
    admin: Option<(SocketAddr, JoinHandle<std::io::Result<()>>)>,
}

impl Runtime {
    /// Validate `config` and bring every subsystem up.
    pub async fn start(config: &RuntimeConfig) -> Result<Self, StartupError> {
        let services = validate_config(config).map_err(ConfigError::Validation)?;
        let registry = Arc::new(ClientRegistry::from_configs(services)?);
        tracing::info!(services = registry.len(), "Client registry initialized");

        let shutdown = Shutdown::new();
        let prober = HealthProber::spawn(registry.clone(), &shutdown);

        let admin = if config.admin.enabled {
            let address = config.admin.bind_address.clone();
            let listener = TcpListener::bind(&address)
                .await
                .map_err(|source| StartupError::Bind {
                    address: address.clone(),
                    source,
                })?;
            let local = listener
                .local_addr()
                .map_err(|source| StartupError::Bind { address, source })?;
            let state = AdminState::new(registry.clone(), &config.admin.api_key);
            let handle = tokio::spawn(admin::serve(listener, state, shutdown.subscribe()));
            Some((local, handle))
        } else {
            None
        };

        tracing::info!(
            probers = prober.running().len(),
            admin_enabled = admin.is_some(),
            "Runtime started"
        );

        Ok(Self {
            registry,
            prober,
            shutdown,
            admin,
        })
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn prober(&self) -> &HealthProber {
        &self.prober
    }

    /// Address the admin server is listening on, when enabled.
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin.as_ref().map(|(addr, _)| *addr)
    }

    /// Apply a reloaded configuration. Admin and observability settings
    /// only take effect on restart.
    pub fn apply(&mut self, config: &RuntimeConfig) -> Result<ReconcileReport, StartupError> {
        let services = validate_config(config).map_err(|errors| {
            tracing::error!(
                errors = errors.len(),
                "Rejected configuration reload, keeping current configuration"
            );
            ConfigError::Validation(errors)
        })?;

        let report = self.registry.reconcile(services);
        self.prober.sync(&self.registry, &self.shutdown);
        Ok(report)
    }

    /// Signal every task to stop and wait for them.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down runtime");
        self.shutdown.trigger();
        self.prober.join().await;

        if let Some((_, handle)) = self.admin {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Admin server error"),
                Err(e) => tracing::error!(error = %e, "Admin server task failed"),
            }
        }
        tracing::info!("Runtime stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawServiceConfig;

    fn config(names: &[&str]) -> RuntimeConfig {
        RuntimeConfig {
            services: names
                .iter()
                .map(|n| RawServiceConfig::new(*n, "http://127.0.0.1:9"))
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_spawns_probers() {
        let runtime = Runtime::start(&config(&["a", "b"])).await.unwrap();
        assert_eq!(runtime.registry().names(), ["a", "b"]);
        assert_eq!(runtime.prober().running(), ["a", "b"]);
        assert!(runtime.admin_addr().is_none());
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let mut cfg = config(&["a"]);
        cfg.services[0].timeout_ms = Some(0);
        let err = Runtime::start(&cfg).await.err().unwrap();
        assert!(matches!(err, StartupError::Config(ConfigError::Validation(ref e)) if e.len() == 1));
    }

    #[tokio::test]
    async fn test_apply_reconciles_and_starts_new_probers() {
        let mut runtime = Runtime::start(&config(&["a"])).await.unwrap();
        let report = runtime.apply(&config(&["a", "b"])).unwrap();
        assert_eq!(report.added, ["b"]);
        assert_eq!(runtime.prober().running(), ["a", "b"]);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_reload_keeps_registry() {
        let mut runtime = Runtime::start(&config(&["a"])).await.unwrap();
        let mut bad = config(&["b"]);
        bad.services[0].base_url = Some("ftp://nope".into());
        assert!(runtime.apply(&bad).is_err());
        assert_eq!(runtime.registry().names(), ["a"]);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_admin_binds_when_enabled() {
        let mut cfg = config(&["a"]);
        cfg.admin.enabled = true;
        cfg.admin.api_key = "key".into();
        cfg.admin.bind_address = "127.0.0.1:0".into();
        let runtime = Runtime::start(&cfg).await.unwrap();
        let addr = runtime.admin_addr().unwrap();
        assert_ne!(addr.port(), 0);
        runtime.shutdown().await;
    }
}
