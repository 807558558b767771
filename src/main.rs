/// Ecoflow: flow-to-route compiler and node module registry
///
/// Main entry point for the ecoflow server. Initializes configuration and starts
/// the HTTP server with module management and flow deployment.

use ecoflow::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Module management API at /api/modules/*
/// - Flow deployment API at /api/flows
/// - Deployed flow routes under the configured base path
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (ECOFLOW_* environment variables, defaults to 0.0.0.0:4000)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
