/// HTTP API Layer
///
/// Administrative REST endpoints. It handles:
/// - Module install / upgrade / removal and package index search
/// - Flow deployment (compile, persist, hot-swap the live flow router)

// Module management endpoints
pub mod modules;

// Flow deployment endpoints
pub mod flows;

use crate::{
    error::{ModuleError, RouteError},
    flow::{compiler::FlowCompiler, storage::FlowStorage, types::Flow},
    module::registry::ModuleRegistry,
    routes::{live::LiveRouter, mount::build_router},
};
use axum::{extract::FromRef, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

// Re-export router builders
pub use flows::create_flow_routes;
pub use modules::create_module_routes;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Installed node module catalog
    pub registry: Arc<ModuleRegistry>,
    /// Persistence for the deployed flow set
    pub storage: FlowStorage,
    /// Flow-to-route compiler
    pub compiler: Arc<FlowCompiler>,
    /// Router currently serving flow routes
    pub live: Arc<LiveRouter>,
    /// Held for the whole compile-save-swap of a deployment
    pub deploy_lock: Arc<Mutex<()>>,
}

impl FromRef<AppState> for Arc<LiveRouter> {
    fn from_ref(state: &AppState) -> Self {
        state.live.clone()
    }
}

impl AppState {
    pub fn new(registry: Arc<ModuleRegistry>, storage: FlowStorage, compiler: Arc<FlowCompiler>) -> Self {
        Self {
            registry,
            storage,
            compiler,
            live: Arc::new(LiveRouter::new()),
            deploy_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Compile flows and publish them on the live router; returns the number of routes
    ///
    /// Nothing is swapped unless compilation and mounting both succeed. Callers
    /// hold `deploy_lock`.
    pub fn mount_flows(&self, flows: &[Flow]) -> Result<usize, RouteError> {
        let builder = self.compiler.compile(flows)?;
        let router = build_router(&builder)?;
        let count = builder.compiled_routes().len();
        self.live.swap(router);
        Ok(count)
    }

    /// Recompile the stored flow set so flow routes bind the current module controllers
    ///
    /// Called after module changes. On failure the live routes stay as they were.
    pub async fn refresh_flows(&self) {
        let _deploy = self.deploy_lock.lock().await;

        let flows = match self.storage.load_all().await {
            Ok(flows) => flows,
            Err(e) => {
                tracing::error!("❌ Failed to reload flows after module change: {}", e);
                return;
            }
        };

        match self.mount_flows(&flows) {
            Ok(count) => tracing::info!("🔄 Rebound {} flow routes to current modules", count),
            Err(e) => tracing::warn!("⚠️ Flow routes kept after module change: {}", e),
        }
    }
}

/// Error body used by every admin endpoint
pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn module_error(e: ModuleError) -> ApiError {
    let status = match &e {
        ModuleError::NotFound(_) | ModuleError::Version { .. } => StatusCode::NOT_FOUND,
        ModuleError::Install { .. } | ModuleError::Remove { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ModuleError::Index(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

pub(crate) fn route_error(e: RouteError) -> ApiError {
    match &e {
        RouteError::Conflict(report) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": e.to_string(), "duplicates": report })),
        ),
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))),
    }
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DuplicateReport;

    #[test]
    fn module_errors_map_to_statuses() {
        assert_eq!(module_error(ModuleError::NotFound("x".into())).0, StatusCode::NOT_FOUND);
        assert_eq!(
            module_error(ModuleError::Version { name: "x".into(), version: "9.9.9".into() }).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(module_error(ModuleError::install("x", "boom")).0, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(module_error(ModuleError::Index("down".into())).0, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn conflicts_carry_the_report() {
        let mut report = DuplicateReport::new();
        report.insert("GET /a".into(), 2);

        let (status, Json(body)) = route_error(RouteError::Conflict(report));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["duplicates"]["GET /a"], json!(2));

        let (status, _) = route_error(RouteError::UnsupportedMethod("BREW".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
