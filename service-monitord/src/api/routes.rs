use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use crate::monitor_manager::MonitorHandle;
use shared::protocol::API_PREFIX;
use shared::types::ServiceStatus;

#[derive(Clone)]
pub struct AppState {
    pub monitor: MonitorHandle,
    pub hash_rx: watch::Receiver<String>,
    pub probe_timeout_ms: u64,
    pub status_ttl_secs: u64,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    pub probe_timeout_ms: u64,
    pub status_ttl_secs: u64,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    /// Probe again instead of serving the cached status
    #[serde(default)]
    pub refresh: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(&format!("{API_PREFIX}/config"), get(get_config))
        .route(&format!("{API_PREFIX}/services"), get(get_services))
        .route(&format!("{API_PREFIX}/services/hash"), get(get_hash))
        .route(&format!("{API_PREFIX}/services/:name"), get(get_service))
        .with_state(state)
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        probe_timeout_ms: state.probe_timeout_ms,
        status_ttl_secs: state.status_ttl_secs,
    })
}

async fn get_services(
    State(state): State<AppState>,
    Query(params): Query<StatusQuery>,
) -> Result<Json<Vec<ServiceStatus>>, StatusCode> {
    state
        .monitor
        .list(params.refresh)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to query services: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn get_hash(State(state): State<AppState>) -> String {
    state.hash_rx.borrow().clone()
}

async fn get_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<StatusQuery>,
) -> Result<Json<ServiceStatus>, StatusCode> {
    state
        .monitor
        .get(name, params.refresh)
        .await
        .map_err(|e| {
            tracing::error!("Failed to query service: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use service_registry::{MemoryCache, ProbeTarget, Prober, ServiceRegistry};

    struct AlwaysUp;

    impl Prober for AlwaysUp {
        fn probe(&self, _target: &ProbeTarget) -> bool {
            true
        }
    }

    fn state() -> AppState {
        let settings = [("PORT_SSH", "22;tcp;SSH;1;127.0.0.1")];
        let registry = ServiceRegistry::new(&settings, MemoryCache::new(), Arc::new(AlwaysUp)).unwrap();
        let (hash_tx, hash_rx) = watch::channel(String::new());
        AppState {
            monitor: MonitorHandle::spawn(registry, hash_tx),
            hash_rx,
            probe_timeout_ms: 500,
            status_ttl_secs: 1200,
        }
    }

    #[tokio::test]
    async fn test_get_service_found() {
        let Json(status) = get_service(
            State(state()),
            Path("ssh".to_string()),
            Query(StatusQuery { refresh: false }),
        )
        .await
        .unwrap();

        assert_eq!(status.key, "PORT_SSH");
        assert!(status.running);
    }

    #[tokio::test]
    async fn test_get_service_not_found() {
        let result = get_service(
            State(state()),
            Path("ftp".to_string()),
            Query(StatusQuery { refresh: true }),
        )
        .await;

        assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_hash_follows_listing() {
        let state = state();
        assert_eq!(get_hash(State(state.clone())).await, "");

        let Json(statuses) = get_services(
            State(state.clone()),
            Query(StatusQuery { refresh: false }),
        )
        .await
        .unwrap();

        assert_eq!(statuses.len(), 1);
        assert_eq!(get_hash(State(state)).await.len(), 64);
    }
}
