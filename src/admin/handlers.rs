use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::client::ServiceClient;
use crate::resilience::{BreakerSnapshot, CircuitState};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub services: usize,
    pub open_circuits: usize,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub has_auth_token: bool,
    pub health_path: String,
    pub health_check_interval_ms: u64,
    pub breaker: BreakerSnapshot,
}

impl ServiceStatus {
    fn from_client(client: &ServiceClient) -> Self {
        let config = client.config();
        Self {
            name: config.name().to_string(),
            base_url: config.base_url().to_string(),
            timeout_ms: config.timeout_ms(),
            max_retries: config.max_retries(),
            has_auth_token: config.auth_token().is_some(),
            health_path: config.health_path().to_string(),
            health_check_interval_ms: config.health_check_interval().as_millis() as u64,
            breaker: client.breaker().snapshot(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshots = state.registry.snapshots();
    let open_circuits = snapshots
        .iter()
        .filter(|s| s.state != CircuitState::Closed)
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if open_circuits == 0 { "operational" } else { "degraded" },
        services: snapshots.len(),
        open_circuits,
    })
}

pub async fn get_services(State(state): State<AdminState>) -> Json<Vec<ServiceStatus>> {
    Json(
        state
            .registry
            .clients()
            .iter()
            .map(|c| ServiceStatus::from_client(c))
            .collect(),
    )
}

pub async fn get_service(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<ServiceStatus>, (StatusCode, Json<ErrorBody>)> {
    match state.registry.get(&name) {
        Ok(client) => Ok(Json(ServiceStatus::from_client(&client))),
        Err(e) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )),
    }
}
