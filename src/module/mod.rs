/// Module Management Layer
///
/// Everything about third-party node packages:
/// - Stable hash identities for modules and their nodes
/// - Catalog types and the node manifest packages ship
/// - Plugin loading (Lua controllers) behind a loader trait
/// - Package manager / package index boundaries
/// - The hot-reload catalog itself

pub mod identity;

pub mod controller;

pub mod types;

pub mod loader;

pub mod package;

pub mod registry;

pub use controller::{is_noop, noop_controller, Controller, ControllerFuture};
pub use identity::ModuleIdentity;
pub use registry::ModuleRegistry;
pub use types::{ModuleSchema, NodeDefinition, PackageDescription, SearchQuery, SearchResults};
