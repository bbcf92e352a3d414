//! Dependency registry and the `/sys/health` route

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Path of the health route
pub const HEALTH_PATH: &str = "/sys/health";

/// A dependency whose connectivity can be checked
#[async_trait]
pub trait Monitorable: Send + Sync {
    /// `Ok(true)` when reachable. Errors describe why it is not.
    async fn is_connected(&self) -> Result<bool>;
}

/// A dependency that holds resources to release at shutdown
#[async_trait]
pub trait Closable: Send + Sync {
    /// Release the dependency's resources
    async fn close(&self);
}

/// Named registry of long-lived dependencies
///
/// Registering a second dependency under the same name replaces the first.
#[derive(Default)]
pub struct AppStateManager {
    closables: BTreeMap<String, Arc<dyn Closable>>,
    monitorables: BTreeMap<String, Arc<dyn Monitorable>>,
}

impl AppStateManager {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dependency to close at shutdown
    pub fn add_closable(&mut self, name: impl Into<String>, dependency: Arc<dyn Closable>) {
        self.closables.insert(name.into(), dependency);
    }

    /// Register a dependency to check in health checks
    pub fn add_monitorable(&mut self, name: impl Into<String>, dependency: Arc<dyn Monitorable>) {
        self.monitorables.insert(name.into(), dependency);
    }

    /// Names of the monitored dependencies
    pub fn monitorable_names(&self) -> impl Iterator<Item = &str> {
        self.monitorables.keys().map(String::as_str)
    }

    /// Check every monitored dependency
    ///
    /// Stops at the first error or disconnected dependency.
    pub async fn dependencies_connected(&self) -> Result<bool> {
        for (name, dependency) in &self.monitorables {
            match dependency.is_connected().await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(dependency = %name, "Dependency is not connected");
                    return Ok(false);
                }
                Err(e) => {
                    tracing::error!(dependency = %name, error = %e, "Dependency check failed");
                    return Err(e);
                }
            }
        }
        Ok(true)
    }

    /// Close every registered dependency
    pub async fn shutdown(&self) {
        tracing::info!("Closing dependencies...");
        for (name, dependency) in &self.closables {
            tracing::debug!(dependency = %name, "Closing dependency");
            dependency.close().await;
        }
        tracing::info!("All dependencies closed");
    }
}

impl std::fmt::Debug for AppStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppStateManager")
            .field("closables", &self.closables.keys().collect::<Vec<_>>())
            .field("monitorables", &self.monitorables.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `UP` or `DOWN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    /// All dependencies connected
    Up,
    /// At least one dependency failed its check
    Down,
}

/// Health route response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service name
    pub name: String,
    /// Overall status
    pub status: ServiceStatus,
    /// Why the service is down
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
struct HealthState {
    name: Arc<str>,
    manager: Arc<AppStateManager>,
}

/// Router serving `GET /sys/health`
pub fn router<S>(service_name: impl Into<String>, manager: Arc<AppStateManager>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let state = HealthState {
        name: Arc::from(service_name.into()),
        manager,
    };
    Router::new().route(HEALTH_PATH, get(health)).with_state(state)
}

async fn health(State(state): State<HealthState>) -> Response {
    let down = |error: String| HealthResponse {
        name: state.name.to_string(),
        status: ServiceStatus::Down,
        error: Some(error),
    };

    match state.manager.dependencies_connected().await {
        Ok(true) => (
            StatusCode::OK,
            Json(HealthResponse {
                name: state.name.to_string(),
                status: ServiceStatus::Up,
                error: None,
            }),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(down("One or more dependencies are not connected".to_string())),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(down(e.to_string()))).into_response(),
    }
}
