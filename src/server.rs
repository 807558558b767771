/// Server setup and initialization
///
/// Wires together all components: module registry, flow storage, the flow
/// compiler, the live flow router, and the admin HTTP routes.
/// Provides the main application factory function for creating the Axum app.

use crate::{
    api::{create_flow_routes, create_module_routes, AppState},
    config::Config,
    flow::{compiler::FlowCompiler, resolver::ConfigGraphResolver, storage::FlowStorage},
    module::registry::ModuleRegistry,
    routes::live::forward,
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes
///
/// Loads installed modules and deployed flows, mounts the flow routes on the
/// live router, and serves them behind the admin API.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 Ensuring module workspace exists: {}", config.modules.dir.display());
    tokio::fs::create_dir_all(&config.modules.dir)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create module workspace: {}", e))?;

    let registry = Arc::new(ModuleRegistry::from_config(&config.modules));
    let state = build_state(&config, registry).await?;

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = app_router(state);

    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Initialize shared state around an existing registry
///
/// A stored flow set that fails to compile is reported and left unmounted;
/// the admin API stays available to fix it.
pub async fn build_state(config: &Config, registry: Arc<ModuleRegistry>) -> Result<AppState> {
    tracing::info!("📦 Loading installed modules");
    registry
        .init_from_disk()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load installed modules: {}", e))?;

    let storage = FlowStorage::new(&config.flows.dir);
    let compiler = Arc::new(FlowCompiler::new(
        ConfigGraphResolver::new(Arc::clone(&registry)),
        config.flows.base_path.clone(),
    ));

    let state = AppState::new(registry, storage, compiler);

    tracing::info!("📥 Loading deployed flows from {}", state.storage.path().display());
    let flows = state
        .storage
        .load_all()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load flows from storage: {}", e))?;

    {
        let _deploy = state.deploy_lock.lock().await;
        match state.mount_flows(&flows) {
            Ok(count) => tracing::info!("🔗 Serving {} flow routes", count),
            Err(e) => tracing::error!("❌ Deployed flows not mounted: {}", e),
        }
    }

    Ok(state)
}

/// Admin routes with the live flow router as fallback
pub fn app_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Module management API routes
        .merge(create_module_routes())
        // Flow deployment API routes
        .merge(create_flow_routes())
        // Everything else is a flow route
        .fallback(forward)
        .with_state(state)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting ecoflow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
