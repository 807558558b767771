/// Flow graph partitioning and node controller resolution
///
/// Groups a flow's enabled Configuration nodes by owning module and resolves
/// node controller references against the module registry.

use crate::flow::types::{Node, NodeConfiguration, NodeConnection, NodeType};
use crate::module::{
    controller::{noop_controller, Controller},
    identity::ModuleIdentity,
    registry::ModuleRegistry,
};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Configuration nodes and non-empty configurations attached to one module
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigStack {
    /// The full filtered Configuration node set of the flow (not only this module's);
    /// filter by `module_id` for per-module membership
    pub nodes: Vec<Node>,
    /// This module's non-empty configurations
    pub configurations: Vec<NodeConfiguration>,
}

/// Per-module stacks, in order of each module's first appearance in the flow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigNodesStack {
    entries: Vec<(ModuleIdentity, ConfigStack)>,
}

impl Serialize for ConfigNodesStack {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(id, stack)| (id, stack)))
    }
}

impl ConfigNodesStack {
    pub fn get(&self, module_id: &ModuleIdentity) -> Option<&ConfigStack> {
        self.entries.iter().find(|(id, _)| id == module_id).map(|(_, stack)| stack)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ModuleIdentity> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModuleIdentity, &ConfigStack)> {
        self.entries.iter().map(|(id, stack)| (id, stack))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Partition a flow graph into per-module configuration stacks
///
/// Only enabled `Configuration` nodes take part. Configuration nodes without a
/// `moduleID` stay in the filtered node set but open no stack of their own.
/// `connections` do not influence partitioning.
pub fn partition_by_module(
    nodes: &[Node],
    _connections: &[NodeConnection],
    configurations: &[NodeConfiguration],
) -> ConfigNodesStack {
    let config_nodes: Vec<Node> = nodes
        .iter()
        .filter(|node| node.node_type == NodeType::Configuration && !node.disabled)
        .cloned()
        .collect();

    let mut module_ids: Vec<&ModuleIdentity> = Vec::new();
    for id in config_nodes.iter().filter_map(|node| node.module_id.as_ref()) {
        if !module_ids.contains(&id) {
            module_ids.push(id);
        }
    }

    let entries = module_ids
        .into_iter()
        .map(|module_id| {
            let module_configurations: Vec<NodeConfiguration> = config_nodes
                .iter()
                .filter(|node| node.module_id.as_ref() == Some(module_id))
                .map(|node| {
                    configurations
                        .iter()
                        .find(|config| config.node_id == node.id)
                        .cloned()
                        .unwrap_or_else(|| NodeConfiguration::empty(&node.id))
                })
                .filter(|config| !config.configs.is_empty())
                .collect();

            (
                module_id.clone(),
                ConfigStack {
                    nodes: config_nodes.clone(),
                    configurations: module_configurations,
                },
            )
        })
        .collect();

    ConfigNodesStack { entries }
}

/// Resolves controller references against the module registry
#[derive(Debug, Clone)]
pub struct ConfigGraphResolver {
    registry: Arc<ModuleRegistry>,
}

impl ConfigGraphResolver {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn partition_by_module(
        &self,
        nodes: &[Node],
        connections: &[NodeConnection],
        configurations: &[NodeConfiguration],
    ) -> ConfigNodesStack {
        partition_by_module(nodes, connections, configurations)
    }

    /// Resolve a `"moduleName.nodeName"` reference to the node's controller
    ///
    /// Never fails: an absent or malformed reference, an unknown module or a
    /// node without a controller all yield the no-op controller. The node
    /// name is taken after the last dot so dotted package names resolve.
    pub fn resolve_node_controller(&self, controller_ref: Option<&str>) -> Controller {
        let Some(reference) = controller_ref.filter(|reference| !reference.is_empty()) else {
            return noop_controller();
        };

        let Some((module_name, node_name)) = reference.rsplit_once('.') else {
            tracing::debug!("Controller reference '{}' has no node part", reference);
            return noop_controller();
        };

        match self.registry.get_module_schema(&ModuleIdentity::module(module_name)) {
            Ok(schema) => schema.get_controller(node_name),
            Err(e) => {
                tracing::warn!("⚠️ Controller '{}' unavailable, using no-op: {}", reference, e);
                noop_controller()
            }
        }
    }
}
