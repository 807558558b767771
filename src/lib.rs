/// Ecoflow: flow-to-route compiler and node module registry
///
/// This library turns flows authored in a low-code editor into live HTTP
/// routes, and manages the third-party node modules those flows are built from.

// Core configuration and setup
pub mod config;

// Error taxonomy for module management and route compilation
pub mod error;

// Module management layer - identities, packages, plugin loading and the catalog
pub mod module;

// Flow layer - flow graphs, partitioning, compilation and storage
pub mod flow;

// Route layer - path compilation, conflict detection, accumulation and mounting
pub mod routes;

// HTTP API layer - REST endpoints for modules and flow deployment
pub mod api;

// Server setup and initialization
pub mod server;

// In-memory package manager and index for tests
pub mod testing;

// Re-export commonly used types for external consumers
pub use error::{ModuleError, RouteError};
pub use flow::{Flow, FlowCompiler, Node, NodeType};
pub use module::{ModuleIdentity, ModuleRegistry, ModuleSchema};
pub use routes::{RouteSpec, RouterBuilder};
pub use server::start_server;
