//! Active health probing.
//!
//! # Responsibilities
//! - One background task per registered service, on that service's cadence
//! - Feed every probe outcome into the service's circuit breaker
//! - Exit on shutdown, or when the service leaves the registry

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::client::ServiceClient;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::registry::ClientRegistry;

/// Probe `client` once and record the outcome on its breaker.
pub async fn probe_once(client: &ServiceClient) -> bool {
    let outcome = client.probe().await;
    client.breaker().record_outcome(outcome);
    metrics::record_probe(client.name(), outcome.success);
    tracing::debug!(
        service = %client.name(),
        healthy = outcome.success,
        latency_ms = outcome.latency.as_millis() as u64,
        state = ?client.breaker().state(),
        "Health probe completed"
    );
    outcome.success
}

/// Running prober tasks, keyed by service name.
#[derive(Debug, Default)]
pub struct HealthProber {
    tasks: HashMap<String, JoinHandle<()>>,
}

impl HealthProber {
    /// Spawn a prober for every service currently registered.
    pub fn spawn(registry: Arc<ClientRegistry>, shutdown: &Shutdown) -> Self {
        let mut prober = Self::default();
        prober.sync(&registry, shutdown);
        prober
    }

    /// Start probers for services that do not have a running one.
    ///
    /// Called after the registry is reconfigured; probers of removed services
    /// stop on their own at their next tick.
    pub fn sync(&mut self, registry: &Arc<ClientRegistry>, shutdown: &Shutdown) {
        self.tasks.retain(|_, handle| !handle.is_finished());
        if shutdown.is_triggered() {
            return;
        }

        for name in registry.names() {
            if self.tasks.contains_key(&name) {
                continue;
            }
            let probe_loop = match ProbeLoop::new(registry.clone(), name.clone()) {
                Some(l) => l,
                None => continue,
            };
            let rx = shutdown.subscribe();
            tracing::info!(
                service = %name,
                interval_ms = probe_loop.period.as_millis() as u64,
                "Health prober starting"
            );
            self.tasks.insert(name, tokio::spawn(probe_loop.run(rx)));
        }
    }

    /// Names of services with a live prober.
    pub fn running(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tasks
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(n, _)| n.clone())
            .collect();
        names.sort();
        names
    }

    /// Wait for every prober to exit. Trigger shutdown first.
    pub async fn join(self) {
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                tracing::error!(service = %name, error = %e, "Health prober task failed");
            }
        }
    }
}

struct ProbeLoop {
    registry: Arc<ClientRegistry>,
    name: String,
    period: Duration,
    ticker: Interval,
}

impl ProbeLoop {
    fn new(registry: Arc<ClientRegistry>, name: String) -> Option<Self> {
        let period = registry.get(&name).ok()?.config().health_check_interval();
        Some(Self {
            registry,
            name,
            period,
            ticker: Self::ticker(period, Instant::now()),
        })
    }

    fn ticker(period: Duration, start: Instant) -> Interval {
        let mut ticker = time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(service = %self.name, "Health prober received shutdown signal, exiting loop");
                    break;
                }
                keep_going = self.step() => {
                    if !keep_going {
                        break;
                    }
                }
            }
        }
    }

    /// Wait for the next tick and probe. Returns false once the service is gone.
    async fn step(&mut self) -> bool {
        self.ticker.tick().await;

        // Look the entry up every tick so replaced entries are picked up.
        let client = match self.registry.get(&self.name) {
            Ok(client) => client,
            Err(_) => {
                tracing::info!(service = %self.name, "Service no longer registered, health prober exiting");
                return false;
            }
        };

        let period = client.config().health_check_interval();
        if period != self.period {
            tracing::info!(
                service = %self.name,
                interval_ms = period.as_millis() as u64,
                "Health check interval changed"
            );
            self.period = period;
            self.ticker = Self::ticker(period, Instant::now() + period);
        }

        probe_once(&client).await;
        true
    }
}
