/// Flow Layer
///
/// Flows authored in the editor and everything that turns them into routes:
/// - Flow graph types (nodes, connections, node configurations)
/// - Per-module partitioning of configuration nodes and controller resolution
/// - Compilation of Request nodes into an accumulated route set
/// - JSON file persistence of the deployed flow set

pub mod types;

pub mod resolver;

pub mod compiler;

pub mod storage;

pub use compiler::FlowCompiler;
pub use resolver::{partition_by_module, ConfigGraphResolver, ConfigNodesStack, ConfigStack};
pub use storage::FlowStorage;
pub use types::{Flow, Node, NodeConfiguration, NodeConnection, NodeType};
