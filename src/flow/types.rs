/// Core flow type definitions
///
/// A flow is the graph authored in the visual editor: nodes, the connections
/// between them, and one optional configuration record per node. These types
/// are deserialized from the editor's JSON and treated as immutable snapshots
/// by the compiler.

use crate::module::identity::ModuleIdentity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A complete flow definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flow {
    /// Flow name, unique among deployed flows (e.g., "orders-api")
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<NodeConnection>,
    #[serde(default)]
    pub configurations: Vec<NodeConfiguration>,
}

/// One vertex of a flow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Node id, unique within its flow
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Module-level identity of the module contributing this node
    #[serde(rename = "moduleID", default)]
    pub module_id: Option<ModuleIdentity>,
    #[serde(default)]
    pub disabled: bool,
    /// Node-specific data; may carry a `controller` reference of the form "module.node"
    #[serde(default)]
    pub data: Value,
}

impl Node {
    /// The `"moduleName.nodeName"` controller reference, if the node carries one
    pub fn controller_ref(&self) -> Option<&str> {
        self.data.get("controller").and_then(Value::as_str)
    }
}

/// Node kinds known to the platform
///
/// Anything else is a module-contributed kind, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    /// Supplies settings to other nodes of its module
    Configuration,
    /// Defines an API route
    Request,
    Middleware,
    Response,
    Debug,
    Other(String),
}

impl From<String> for NodeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Configuration" => Self::Configuration,
            "Request" => Self::Request,
            "Middleware" => Self::Middleware,
            "Response" => Self::Response,
            "Debug" => Self::Debug,
            _ => Self::Other(value),
        }
    }
}

impl From<NodeType> for String {
    fn from(value: NodeType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "Configuration",
            Self::Request => "Request",
            Self::Middleware => "Middleware",
            Self::Response => "Response",
            Self::Debug => "Debug",
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// Directed edge between two node ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConnection {
    pub from: String,
    pub to: String,
}

/// Saved configuration payload for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfiguration {
    #[serde(rename = "nodeID")]
    pub node_id: String,
    #[serde(default)]
    pub configs: Map<String, Value>,
}

impl NodeConfiguration {
    /// Placeholder for a node without a saved configuration
    pub fn empty(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            configs: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_editor_json() {
        let flow: Flow = serde_json::from_value(json!({
            "name": "orders",
            "nodes": [
                { "id": "n1", "type": "Configuration", "moduleID": "abc", "data": {} },
                { "id": "n2", "type": "Request", "disabled": true, "data": { "controller": "ecoflow-http.request" } },
                { "id": "n3", "type": "Webhook" }
            ],
            "connections": [{ "from": "n2", "to": "n3" }],
            "configurations": [{ "nodeID": "n1", "configs": { "token": "x" } }]
        }))
        .unwrap();

        assert_eq!(flow.nodes[0].node_type, NodeType::Configuration);
        assert_eq!(flow.nodes[0].module_id, Some(ModuleIdentity::from("abc".to_string())));
        assert!(flow.nodes[1].disabled);
        assert_eq!(flow.nodes[1].controller_ref(), Some("ecoflow-http.request"));
        assert_eq!(flow.nodes[2].node_type, NodeType::Other("Webhook".to_string()));
        assert!(!flow.nodes[2].disabled);
        assert_eq!(flow.configurations[0].configs["token"], json!("x"));
    }

    #[test]
    fn node_type_serializes_as_bare_name() {
        assert_eq!(serde_json::to_value(NodeType::Response).unwrap(), json!("Response"));
        assert_eq!(serde_json::to_value(NodeType::Other("Cron".into())).unwrap(), json!("Cron"));
    }
}
