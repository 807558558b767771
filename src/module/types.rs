/// Module catalog type definitions
///
/// Describes installed node packages, the node manifest they ship in their
/// package.json, and results coming back from the remote package index.

use crate::flow::types::NodeType;
use crate::module::{
    controller::{or_noop, Controller},
    identity::ModuleIdentity,
    loader::LoadedModule,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, sync::Arc};

/// The subset of a package.json the registry reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<Value>,
    /// Node manifest; packages without it are not ecoflow modules
    #[serde(default)]
    pub ecoflow: Option<NodeManifest>,
}

impl PackageManifest {
    /// Author as display text (package.json allows a string or `{ name, email }`)
    pub fn author_name(&self) -> Option<String> {
        match self.author.as_ref()? {
            Value::String(author) => Some(author.clone()),
            Value::Object(author) => author.get("name").and_then(Value::as_str).map(String::from),
            _ => None,
        }
    }
}

/// Node manifest: the `ecoflow` key of a module's package.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeManifest {
    #[serde(default)]
    pub nodes: Vec<NodeManifestEntry>,
}

/// One node as declared by a module package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeManifestEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Script path relative to the package directory
    #[serde(default)]
    pub controller: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Input field descriptions rendered by the editor
    #[serde(default)]
    pub inputs: Option<Value>,
}

/// A node exported by an installed module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Node-level identity (`module.node`)
    pub id: ModuleIdentity,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub description: Option<String>,
    pub inputs: Option<Value>,
}

/// One installed module, as recorded in the catalog
///
/// Created on install, replaced on upgrade/downgrade, dropped on uninstall.
/// Carries the loaded handle its node controllers are resolved from.
#[derive(Clone, Serialize)]
pub struct ModuleSchema {
    /// Module-level identity
    pub id: ModuleIdentity,
    /// Package name (catalog key)
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub author: Option<String>,
    /// Installed from a local archive rather than the package index
    pub local: bool,
    pub nodes: Vec<NodeDefinition>,
    pub installed_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip)]
    handle: Option<Arc<dyn LoadedModule>>,
}

impl ModuleSchema {
    /// Build a schema from a parsed manifest and its loaded handle
    pub fn new(manifest: &PackageManifest, local: bool, handle: Option<Arc<dyn LoadedModule>>) -> Self {
        let nodes = manifest
            .ecoflow
            .as_ref()
            .map(|nodes| {
                nodes
                    .nodes
                    .iter()
                    .map(|node| NodeDefinition {
                        id: ModuleIdentity::node(&manifest.name, &node.name),
                        name: node.name.clone(),
                        node_type: node.node_type.clone(),
                        description: node.description.clone(),
                        inputs: node.inputs.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: ModuleIdentity::module(&manifest.name),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            description: manifest.description.clone(),
            author: manifest.author_name(),
            local,
            nodes,
            installed_at: chrono::Utc::now(),
            handle,
        }
    }

    /// Resolve one node's controller, falling back to the no-op controller
    /// when the module does not export a callable for it.
    pub fn get_controller(&self, node_name: &str) -> Controller {
        or_noop(self.handle.as_ref().and_then(|handle| handle.controller(node_name)))
    }

    pub fn node(&self, node_name: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|node| node.name == node_name)
    }
}

impl fmt::Debug for ModuleSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSchema")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("local", &self.local)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

/// Installed package description for the admin UI
#[derive(Debug, Clone, Serialize)]
pub struct PackageDescription {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub local: bool,
    pub nodes: Vec<String>,
}

impl From<&ModuleSchema> for PackageDescription {
    fn from(schema: &ModuleSchema) -> Self {
        Self {
            name: schema.name.clone(),
            version: schema.version.clone(),
            description: schema.description.clone(),
            author: schema.author.clone(),
            local: schema.local,
            nodes: schema.nodes.iter().map(|node| node.name.clone()).collect(),
        }
    }
}

/// Package index search request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default, alias = "q")]
    pub text: String,
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub from: Option<usize>,
}

/// One package listed by the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSummary {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the package is currently in the catalog
    #[serde(default)]
    pub installed: bool,
}

/// Package index search results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    /// Total matches known to the index (may exceed `packages.len()`)
    pub total: usize,
    pub packages: Vec<PackageSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn manifest_parses_node_list() {
        let manifest: PackageManifest = serde_json::from_value(json!({
            "name": "ecoflow-http",
            "version": "1.2.0",
            "author": { "name": "Jane", "email": "jane@example.com" },
            "ecoflow": {
                "nodes": [
                    { "name": "fetch", "type": "Middleware", "controller": "nodes/fetch.lua" },
                    { "name": "settings", "type": "Configuration" }
                ]
            }
        }))
        .unwrap();

        let schema = ModuleSchema::new(&manifest, false, None);
        assert_eq!(schema.id, ModuleIdentity::module("ecoflow-http"));
        assert_eq!(schema.author.as_deref(), Some("Jane"));
        assert_eq!(schema.nodes.len(), 2);
        assert_eq!(schema.nodes[1].node_type, NodeType::Configuration);
        assert_eq!(schema.node("fetch").unwrap().id, ModuleIdentity::node("ecoflow-http", "fetch"));
    }

    #[test]
    fn schema_without_handle_degrades_to_noop() {
        let manifest: PackageManifest =
            serde_json::from_value(json!({ "name": "bare", "version": "0.1.0" })).unwrap();
        let schema = ModuleSchema::new(&manifest, true, None);

        assert!(crate::module::controller::is_noop(&schema.get_controller("anything")));
        assert!(schema.nodes.is_empty());
    }
}
