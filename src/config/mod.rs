/// Configuration management for the ecoflow service
///
/// Handles server binding, the module installation workspace, the package index,
/// and where flows are stored and mounted.

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Node module workspace and package index configuration
    pub modules: ModulesConfig,
    /// Flow storage and routing configuration
    pub flows: FlowsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Module registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Working directory handed to the package manager
    /// Contains: package.json (dependency manifest), node_modules/{package}
    pub dir: PathBuf,
    /// Base URL of the remote package index
    pub index_url: String,
    /// Keyword every searchable module package carries
    pub keyword: String,
    /// Upper bound for a single package-manager or index call, in seconds
    pub timeout_secs: u64,
}

impl ModulesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Flow storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowsConfig {
    /// Directory holding flows.json
    pub dir: PathBuf,
    /// Path prefix every compiled flow route is mounted under
    pub base_path: String,
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("ECOFLOW_HOST", "0.0.0.0"),
                port: env_or("ECOFLOW_PORT", "4000").parse().unwrap_or(4000),
            },
            modules: ModulesConfig {
                dir: PathBuf::from(env_or("ECOFLOW_MODULES_DIR", "data/modules")),
                index_url: env_or("ECOFLOW_PACKAGE_INDEX", "https://registry.npmjs.org"),
                keyword: env_or("ECOFLOW_PACKAGE_KEYWORD", "ecoflow"),
                timeout_secs: env_or("ECOFLOW_INSTALL_TIMEOUT_SECS", "300")
                    .parse()
                    .unwrap_or(300),
            },
            flows: FlowsConfig {
                dir: PathBuf::from(env_or("ECOFLOW_FLOWS_DIR", "data/flows")),
                base_path: env_or("ECOFLOW_FLOW_BASE_PATH", "/"),
            },
        }
    }
}
