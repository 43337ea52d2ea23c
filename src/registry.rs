//! Client registry.
//!
//! # Responsibilities
//! - Map logical service names to their configured clients
//! - Single construction point for clients (config + breaker + executor)
//! - Atomic entry replacement on reconfiguration
//!
//! # Design Decisions
//! - Readers load an immutable snapshot (`ArcSwap`), no locking on lookup
//! - Writers are serialized and publish a whole new map
//! - Entries are never mutated in place; replacing one gives it a fresh breaker

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

use crate::client::ServiceClient;
use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::resilience::BreakerSnapshot;

type Entries = HashMap<String, Arc<ServiceClient>>;

/// Summary of a [`ClientRegistry::reconcile`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.replaced.is_empty() && self.removed.is_empty()
    }
}

/// Process-wide map from service name to client. Construct once and pass
/// it (usually as `Arc<ClientRegistry>`) to everything that needs it.
pub struct ClientRegistry {
    entries: ArcSwap<Entries>,
    writer: Mutex<()>,
    http: reqwest::Client,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("services", &self.names())
            .finish()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    /// Create an empty registry with its own connection pool.
    pub fn new() -> Self {
        Self::with_http(reqwest::Client::new())
    }

    /// Create an empty registry sharing `http` across all clients.
    pub fn with_http(http: reqwest::Client) -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
            writer: Mutex::new(()),
            http,
        }
    }

    /// Build a registry from the full startup configuration set.
    pub fn from_configs<I>(configs: I) -> ServiceResult<Self>
    where
        I: IntoIterator<Item = ServiceConfig>,
    {
        let registry = Self::new();
        for config in configs {
            registry.register(config)?;
        }
        Ok(registry)
    }

    /// Construct and store the client for `config`.
    pub fn register(&self, config: ServiceConfig) -> ServiceResult<Arc<ServiceClient>> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.entries.load_full();
        if current.contains_key(config.name()) {
            return Err(ServiceError::DuplicateService(config.name().to_string()));
        }

        let client = Arc::new(ServiceClient::new(config, self.http.clone()));
        let mut next = (*current).clone();
        next.insert(client.name().to_string(), client.clone());
        self.entries.store(Arc::new(next));

        tracing::info!(
            service = %client.name(),
            base_url = %client.config().base_url(),
            timeout_ms = client.config().timeout_ms(),
            max_retries = client.config().max_retries(),
            breaker_enabled = client.config().breaker().enabled,
            "Service client registered"
        );
        Ok(client)
    }

    /// Look up a client by service name.
    pub fn get(&self, name: &str) -> ServiceResult<Arc<ServiceClient>> {
        self.entries
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownService(name.to_string()))
    }

    /// Insert or atomically replace the entry for `config.name()`.
    pub fn replace(&self, config: ServiceConfig) -> Arc<ServiceClient> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let client = Arc::new(ServiceClient::new(config, self.http.clone()));
        let mut next = (*self.entries.load_full()).clone();
        next.insert(client.name().to_string(), client.clone());
        self.entries.store(Arc::new(next));
        tracing::info!(service = %client.name(), "Service client replaced");
        client
    }

    /// Remove an entry. Callers holding the old client keep a working handle.
    pub fn remove(&self, name: &str) -> Option<Arc<ServiceClient>> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = (*self.entries.load_full()).clone();
        let removed = next.remove(name);
        if removed.is_some() {
            self.entries.store(Arc::new(next));
            tracing::info!(service = %name, "Service client removed");
        }
        removed
    }

    /// Bring the registry in line with a new configuration set in one swap.
    ///
    /// Entries whose configuration is unchanged keep their client (and breaker
    /// state); changed ones are replaced; absent ones are removed.
    pub fn reconcile(&self, configs: Vec<ServiceConfig>) -> ReconcileReport {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.entries.load_full();
        let mut report = ReconcileReport::default();
        let mut next = Entries::with_capacity(configs.len());

        for config in configs {
            let name = config.name().to_string();
            match current.get(&name) {
                Some(existing) if *existing.config() == config => {
                    next.insert(name, existing.clone());
                }
                Some(_) => {
                    next.insert(name.clone(), Arc::new(ServiceClient::new(config, self.http.clone())));
                    report.replaced.push(name);
                }
                None => {
                    next.insert(name.clone(), Arc::new(ServiceClient::new(config, self.http.clone())));
                    report.added.push(name);
                }
            }
        }
        for name in current.keys() {
            if !next.contains_key(name) {
                report.removed.push(name.clone());
            }
        }

        report.added.sort();
        report.replaced.sort();
        report.removed.sort();
        self.entries.store(Arc::new(next));

        if !report.is_empty() {
            tracing::info!(
                added = ?report.added,
                replaced = ?report.replaced,
                removed = ?report.removed,
                "Service registry reconfigured"
            );
        }
        report
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// All registered clients, sorted by name.
    pub fn clients(&self) -> Vec<Arc<ServiceClient>> {
        let mut clients: Vec<_> = self.entries.load().values().cloned().collect();
        clients.sort_by(|a, b| a.name().cmp(b.name()));
        clients
    }

    /// Breaker snapshots for every service, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        self.clients().iter().map(|c| c.breaker().snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
