/// Module management REST API endpoints
///
/// Install, upgrade, remove and inspect node modules. Every change goes
/// through the registry, which publishes a new catalog snapshot on success.
/// Successful changes recompile the stored flows against the new catalog.

use crate::{
    api::{module_error, ApiError, AppState},
    module::types::{ModuleSchema, PackageDescription, SearchQuery, SearchResults},
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

/// Request body for installing a module from the package index
#[derive(Debug, Deserialize)]
pub struct InstallModuleRequest {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Request body for installing uploaded package archives
#[derive(Debug, Deserialize)]
pub struct InstallLocalRequest {
    pub paths: Vec<PathBuf>,
}

/// Request body for switching an installed module's version
#[derive(Debug, Deserialize)]
pub struct ChangeVersionRequest {
    pub version: String,
}

/// Create module management routes
pub fn create_module_routes() -> Router<AppState> {
    Router::new()
        .route("/api/modules", get(list_modules).post(install_module))
        .route("/api/modules/local", post(install_local_modules))
        .route("/api/modules/search", get(search_modules))
        .route("/api/modules/count", get(count_modules))
        .route("/api/modules/{name}", put(change_version).delete(remove_module))
        .route("/api/modules/{name}/description", get(describe_module))
}

/// GET /api/modules
async fn list_modules(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "modules": state.registry.installed_modules() }))
}

/// Install a module from the package index
///
/// POST /api/modules
/// Body: { "name": "ecoflow-http", "version": "1.2.0" }
async fn install_module(
    State(state): State<AppState>,
    Json(payload): Json<InstallModuleRequest>,
) -> Result<Json<ModuleSchema>, ApiError> {
    let schema = state
        .registry
        .install_module(&payload.name, payload.version.as_deref())
        .await
        .map_err(module_error)?;
    state.refresh_flows().await;
    Ok(Json(schema))
}

/// Install modules from archives already uploaded to disk
///
/// POST /api/modules/local
/// Body: { "paths": ["/uploads/pkg-1.0.0.tgz"] }
/// Returns only the modules that installed; failures are logged per file.
async fn install_local_modules(
    State(state): State<AppState>,
    Json(payload): Json<InstallLocalRequest>,
) -> Json<Value> {
    let installed = state.registry.install_local_module(&payload.paths).await;
    if !installed.is_empty() {
        state.refresh_flows().await;
    }
    Json(json!({ "modules": installed }))
}

/// PUT /api/modules/{name}
/// Body: { "version": "2.0.0" }
async fn change_version(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<ChangeVersionRequest>,
) -> Result<Json<ModuleSchema>, ApiError> {
    let schema = state
        .registry
        .upgrade_downgrade_module(&name, &payload.version)
        .await
        .map_err(module_error)?;
    state.refresh_flows().await;
    Ok(Json(schema))
}

/// DELETE /api/modules/{name}
///
/// Removing a module that is not installed succeeds.
async fn remove_module(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>, ApiError> {
    state.registry.remove_module(&name).await.map_err(module_error)?;
    state.refresh_flows().await;
    Ok(Json(json!({ "message": format!("Module '{}' removed", name) })))
}

/// GET /api/modules/{name}/description
async fn describe_module(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PackageDescription>, ApiError> {
    state
        .registry
        .get_installed_packages_description(&name)
        .map(Json)
        .map_err(module_error)
}

/// GET /api/modules/search?q=http&size=10&from=0
async fn search_modules(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResults>, ApiError> {
    state.registry.search_module(&query).await.map(Json).map_err(module_error)
}

/// GET /api/modules/count
async fn count_modules(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let count = state.registry.available_packages_count().await.map_err(module_error)?;
    Ok(Json(json!({ "count": count })))
}
