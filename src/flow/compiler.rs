/// Flow-to-route compilation
///
/// One pass over the deployed flows: partition each flow's configuration
/// nodes by module, compile every enabled Request node's route spec, resolve
/// and bind its controller, then accumulate everything below the base path
/// and reject the set if any `METHOD /path` appears twice. Any error aborts
/// the pass; a partial route set is never returned.

use crate::error::RouteError;
use crate::flow::resolver::{ConfigGraphResolver, ConfigNodesStack, ConfigStack};
use crate::flow::types::{Flow, Node, NodeType};
use crate::module::controller::{Controller, ControllerFuture};
use crate::routes::{
    builder::{RouteOptions, RouterBuilder},
    conflicts::ensure_unique,
    spec::RouteSpec,
};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FlowCompiler {
    resolver: ConfigGraphResolver,
    base_path: String,
}

impl FlowCompiler {
    pub fn new(resolver: ConfigGraphResolver, base_path: impl Into<String>) -> Self {
        Self {
            resolver,
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Compile every flow into one accumulated, conflict-free route set
    pub fn compile(&self, flows: &[Flow]) -> Result<RouterBuilder, RouteError> {
        let mut root = RouterBuilder::new();
        for flow in flows {
            let flow_router = self.compile_flow(flow)?;
            root.mount(&self.base_path, flow_router);
        }

        let routes = root.compiled_routes();
        ensure_unique(&routes)?;

        tracing::info!("🧩 Compiled {} flows into {} routes", flows.len(), routes.len());
        Ok(root)
    }

    fn compile_flow(&self, flow: &Flow) -> Result<RouterBuilder, RouteError> {
        let stacks = self
            .resolver
            .partition_by_module(&flow.nodes, &flow.connections, &flow.configurations);

        let mut router = RouterBuilder::new();
        for node in flow.nodes.iter().filter(|n| n.node_type == NodeType::Request && !n.disabled) {
            let route = route_spec(flow, node)?.compile()?;
            let controller = self.resolver.resolve_node_controller(node.controller_ref());
            let handler = bind_context(controller, flow, node, &stacks);

            tracing::debug!("🔗 Flow '{}' node '{}' -> {}", flow.name, node.id, route);
            router.on(
                &route.method,
                &route.path,
                handler,
                Some(RouteOptions {
                    flow: Some(flow.name.clone()),
                    node: Some(node.id.clone()),
                }),
            );
        }
        Ok(router)
    }
}

/// Route spec of a Request node: its saved configuration, else its data
///
/// A `route` string is the compact form; otherwise the structured
/// `apiMethod`/`apiEndpoint`/`$url.params` fields apply.
fn route_spec(flow: &Flow, node: &Node) -> Result<RouteSpec, RouteError> {
    let source = flow
        .configurations
        .iter()
        .find(|config| config.node_id == node.id && !config.configs.is_empty())
        .map(|config| Value::Object(config.configs.clone()))
        .unwrap_or_else(|| node.data.clone());

    if source.is_null() {
        return Ok(RouteSpec::structured(None, None, Vec::new()));
    }

    let raw = source.get("route").cloned().unwrap_or_else(|| source.clone());
    serde_json::from_value(raw).map_err(|e| RouteError::Compilation {
        spec: source.to_string(),
        reason: format!("node '{}' in flow '{}': {}", node.id, flow.name, e),
    })
}

/// Wrap a node controller so every call also sees its flow, node and module configuration
fn bind_context(controller: Controller, flow: &Flow, node: &Node, stacks: &ConfigNodesStack) -> Controller {
    let configurations = node
        .module_id
        .as_ref()
        .and_then(|id| stacks.get(id))
        .cloned()
        .unwrap_or_else(ConfigStack::default);

    let context = json!({
        "flow": flow.name,
        "node": node.id,
        "configurations": configurations,
    });

    Arc::new(move |request: Value| -> ControllerFuture {
        let mut inputs = context.clone();
        inputs["request"] = request;
        controller(inputs)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModulesConfig;
    use crate::module::{loader::LuaPluginLoader, registry::ModuleRegistry};
    use crate::routes::spec::CompiledRoute;
    use crate::testing::{MockPackage, MockPackages};

    const GUARD_SCRIPT: &str = r#"
        local stack = inputs.configurations.configurations
        if stack[1] == nil or stack[1].configs.token ~= "secret" then
            error("missing token for " .. inputs.node)
        end
        if inputs.request.params.id ~= "7" then
            error("unexpected id")
        end
    "#;

    async fn compiler(dir: &std::path::Path, base_path: &str) -> FlowCompiler {
        let packages = Arc::new(MockPackages::new());
        packages.publish(
            MockPackage::new("ecoflow-guard", "1.0.0")
                .node("config", "Configuration", None)
                .node("check", "Request", Some(GUARD_SCRIPT)),
        );

        let config = ModulesConfig {
            dir: dir.to_path_buf(),
            index_url: "http://index.invalid".to_string(),
            keyword: "ecoflow".to_string(),
            timeout_secs: 5,
        };
        let registry = Arc::new(ModuleRegistry::new(&config, packages.clone(), packages, Arc::new(LuaPluginLoader)));
        registry.install_module("ecoflow-guard", None).await.unwrap();

        FlowCompiler::new(ConfigGraphResolver::new(registry), base_path)
    }

    fn flow(value: Value) -> Flow {
        serde_json::from_value(value).unwrap()
    }

    fn keys(routes: &[CompiledRoute]) -> Vec<String> {
        routes.iter().map(CompiledRoute::key).collect()
    }

    #[tokio::test]
    async fn compiles_enabled_request_nodes_below_base_path() {
        let tmp = tempfile::tempdir().unwrap();
        let compiler = compiler(tmp.path(), "/api").await;

        let flows = vec![
            flow(json!({
                "name": "orders",
                "nodes": [
                    { "id": "r1", "type": "Request", "data": { "route": "POST /orders/" } },
                    { "id": "r2", "type": "Request", "data": { "apiEndpoint": "orders", "$url.params": ["id"] } },
                    { "id": "r3", "type": "Request", "disabled": true, "data": { "route": "GET /hidden" } },
                    { "id": "x1", "type": "Response", "data": { "route": "GET /not-a-route" } }
                ]
            })),
            flow(json!({
                "name": "health",
                "nodes": [{ "id": "r1", "type": "Request" }]
            })),
        ];

        let builder = compiler.compile(&flows).unwrap();
        assert_eq!(
            keys(&builder.compiled_routes()),
            vec!["POST /api/orders", "GET /api/orders/:id", "GET /api"]
        );
        assert_eq!(builder.route().len(), 2);
    }

    #[tokio::test]
    async fn saved_configuration_overrides_node_data() {
        let tmp = tempfile::tempdir().unwrap();
        let compiler = compiler(tmp.path(), "/").await;

        let flows = vec![flow(json!({
            "name": "users",
            "nodes": [{ "id": "r1", "type": "Request", "data": { "route": "GET /old" } }],
            "configurations": [{ "nodeID": "r1", "configs": { "apiMethod": "PATCH", "apiEndpoint": "/users" } }]
        }))];

        let builder = compiler.compile(&flows).unwrap();
        assert_eq!(keys(&builder.compiled_routes()), vec!["PATCH /users"]);
    }

    #[tokio::test]
    async fn duplicates_across_flows_abort_compilation() {
        let tmp = tempfile::tempdir().unwrap();
        let compiler = compiler(tmp.path(), "/").await;

        let flows = vec![
            flow(json!({ "name": "a", "nodes": [{ "id": "r", "type": "Request", "data": { "route": "GET /same" } }] })),
            flow(json!({ "name": "b", "nodes": [{ "id": "r", "type": "Request", "data": { "apiEndpoint": "same/" } }] })),
        ];

        match compiler.compile(&flows) {
            Err(RouteError::Conflict(report)) => assert_eq!(report["GET /same"], 2),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_route_aborts_compilation() {
        let tmp = tempfile::tempdir().unwrap();
        let compiler = compiler(tmp.path(), "/").await;

        let flows = vec![flow(json!({
            "name": "broken",
            "nodes": [
                { "id": "ok", "type": "Request", "data": { "route": "GET /fine" } },
                { "id": "bad", "type": "Request", "data": { "route": "GET" } }
            ]
        }))];

        assert!(matches!(compiler.compile(&flows), Err(RouteError::Compilation { .. })));
    }

    #[tokio::test]
    async fn handlers_receive_flow_context_and_module_configuration() {
        let tmp = tempfile::tempdir().unwrap();
        let compiler = compiler(tmp.path(), "/").await;

        let flows = vec![flow(json!({
            "name": "guarded",
            "nodes": [
                { "id": "cfg", "type": "Configuration", "moduleID": crate::module::ModuleIdentity::module("ecoflow-guard") },
                {
                    "id": "req",
                    "type": "Request",
                    "moduleID": crate::module::ModuleIdentity::module("ecoflow-guard"),
                    "data": { "route": "GET /items", "controller": "ecoflow-guard.check" }
                },
                {
                    "id": "bare",
                    "type": "Request",
                    "data": { "route": "GET /bare", "controller": "ecoflow-guard.check" }
                }
            ],
            "configurations": [{ "nodeID": "cfg", "configs": { "token": "secret" } }]
        }))];

        let routes = compiler.compile(&flows).unwrap().compiled_routes();
        let request = json!({ "params": { "id": "7" } });

        let guarded = &routes[0];
        assert_eq!(guarded.key(), "GET /items");
        assert!((guarded.handler)(request.clone()).await.is_ok());

        // no moduleID: no configuration stack reaches the controller
        let bare = &routes[1];
        assert!((bare.handler)(request).await.is_err());
    }
}
