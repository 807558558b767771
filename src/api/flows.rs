/// Flow deployment REST API endpoints
///
/// Deploying replaces the whole flow set. The new set is compiled and mounted
/// first; storage and the live router only change when that succeeds.
/// Deployments run one at a time so storage always matches the live routes.

use crate::{
    api::{internal_error, route_error, ApiError, AppState},
    flow::types::Flow,
};
use axum::{extract::State, response::Json, routing::get, Router};
use serde::Deserialize;
use serde_json::{json, Value};

/// Request body for flow deployment
#[derive(Debug, Deserialize)]
pub struct DeployFlowsRequest {
    pub flows: Vec<Flow>,
}

/// Create flow deployment routes
pub fn create_flow_routes() -> Router<AppState> {
    Router::new().route("/api/flows", get(list_flows).put(deploy_flows))
}

/// GET /api/flows
async fn list_flows(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let flows = state.storage.load_all().await.map_err(|e| {
        tracing::error!("Failed to load flows: {}", e);
        internal_error(e)
    })?;
    Ok(Json(json!({ "flows": flows })))
}

/// Deploy a new flow set
///
/// PUT /api/flows
/// Body: { "flows": [{ "name": "...", "nodes": [...], "connections": [...], "configurations": [...] }] }
/// Returns 409 with the duplicate report when two routes collide.
async fn deploy_flows(
    State(state): State<AppState>,
    Json(payload): Json<DeployFlowsRequest>,
) -> Result<Json<Value>, ApiError> {
    let flows = payload.flows;
    let _deploy = state.deploy_lock.lock().await;

    // Compile and mount before persisting so a rejected set changes nothing
    let builder = state.compiler.compile(&flows).map_err(route_error)?;
    let router = crate::routes::mount::build_router(&builder).map_err(route_error)?;
    let routes = builder.compiled_routes();

    if let Err(e) = state.storage.save_all(&flows).await {
        tracing::error!("Failed to save flows: {}", e);
        return Err(internal_error(e));
    }
    state.live.swap(router);

    tracing::info!("🔥 Deployed {} flows with {} routes", flows.len(), routes.len());

    Ok(Json(json!({
        "flows": flows.len(),
        "routes": routes.iter().map(|route| route.key()).collect::<Vec<_>>(),
    })))
}
