/// Hosting adapter: turns an accumulated route set into an axum router
///
/// Routes are registered on their full flattened path so the params can be
/// read back by aligning the route pattern with the request path.

use crate::error::RouteError;
use crate::module::controller::Controller;
use crate::routes::{builder::RouterBuilder, conflicts::ensure_unique, spec::CompiledRoute};
use axum::{
    body::{to_bytes, Bytes},
    extract::{Query, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build an axum router serving every accumulated route
///
/// Fails before touching axum if the set has duplicates, a method axum cannot
/// filter on, or two paths axum would refuse to tell apart.
pub fn build_router(builder: &RouterBuilder) -> Result<Router, RouteError> {
    let routes = builder.compiled_routes();
    ensure_unique(&routes)?;
    check_path_shapes(&routes)?;

    // Key: axum path, Value: (method router, has method fallback)
    let mut paths: Vec<String> = Vec::new();
    let mut method_routers: HashMap<String, (MethodRouter, bool)> = HashMap::new();

    for route in &routes {
        let target = method_target(&route.method)?;
        let axum_path = to_axum_path(&route.path);
        let pattern: Arc<str> = Arc::from(route.path.as_str());
        let controller = route.handler.clone();
        let handler = move |Query(query): Query<HashMap<String, String>>, request: Request| {
            dispatch(pattern.clone(), controller.clone(), query, request)
        };

        let (method_router, has_fallback) = match method_routers.remove(&axum_path) {
            Some(existing) => existing,
            None => {
                paths.push(axum_path.clone());
                (MethodRouter::new(), false)
            }
        };

        let updated = match target {
            MethodTarget::Filter(filter) => (method_router.on(filter, handler), has_fallback),
            MethodTarget::Any if has_fallback => {
                return Err(RouteError::Ambiguous {
                    first: format!("ALL {}", route.path),
                    second: route.key(),
                });
            }
            MethodTarget::Any => (method_router.fallback(handler), true),
        };
        method_routers.insert(axum_path, updated);

        tracing::debug!("🔗 Mounted flow route {}", route.key());
    }

    let mut router = Router::new();
    for path in paths {
        if let Some((method_router, _)) = method_routers.remove(&path) {
            router = router.route(&path, method_router);
        }
    }

    tracing::info!("🔗 Mounted {} flow routes", routes.len());
    Ok(router)
}

enum MethodTarget {
    Filter(MethodFilter),
    Any,
}

fn method_target(method: &str) -> Result<MethodTarget, RouteError> {
    let filter = match method {
        "GET" => MethodFilter::GET,
        "POST" => MethodFilter::POST,
        "PUT" => MethodFilter::PUT,
        "PATCH" => MethodFilter::PATCH,
        "DELETE" => MethodFilter::DELETE,
        "HEAD" => MethodFilter::HEAD,
        "OPTIONS" => MethodFilter::OPTIONS,
        "TRACE" => MethodFilter::TRACE,
        "ALL" | "ANY" => return Ok(MethodTarget::Any),
        other => return Err(RouteError::UnsupportedMethod(other.to_string())),
    };
    Ok(MethodTarget::Filter(filter))
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// `/users/:id` -> `/users/{id}`; literal braces are escaped
fn to_axum_path(path: &str) -> String {
    let converted: Vec<String> = segments(path)
        .into_iter()
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.replace('{', "{{").replace('}', "}}"),
        })
        .collect();
    format!("/{}", converted.join("/"))
}

/// Reject path layouts the router cannot register
///
/// Inner segments must be non-empty (`/a//b` would collapse onto `/a/b`).
/// Within one path every param needs a distinct name free of `{`, `}` and `*`,
/// and two paths that share a prefix must use the same param name at the same
/// position.
fn check_path_shapes(routes: &[CompiledRoute]) -> Result<(), RouteError> {
    // Key: shape of the prefix before a param, Value: (param name, first path using it)
    let mut params_at: HashMap<String, (String, String)> = HashMap::new();

    for route in routes {
        if route.path != "/" && route.path.trim_start_matches('/').split('/').any(str::is_empty) {
            return Err(RouteError::Compilation {
                spec: route.key(),
                reason: "empty path segment".to_string(),
            });
        }

        let parts = segments(&route.path);
        let mut seen = HashSet::new();

        for (position, segment) in parts.iter().enumerate() {
            let Some(name) = segment.strip_prefix(':') else {
                continue;
            };
            let malformed = name.is_empty() || name.contains(['{', '}', '*']);
            if malformed || !seen.insert(name) {
                return Err(RouteError::Compilation {
                    spec: route.key(),
                    reason: format!("invalid or repeated path parameter '{segment}'"),
                });
            }

            let prefix: Vec<&str> = parts[..position]
                .iter()
                .map(|part| if part.starts_with(':') { ":" } else { part })
                .collect();
            let shape = prefix.join("/");

            match params_at.get(&shape) {
                Some((existing, first)) if existing != name => {
                    return Err(RouteError::Ambiguous {
                        first: first.clone(),
                        second: route.path.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    params_at.insert(shape, (name.to_string(), route.path.clone()));
                }
            }
        }
    }
    Ok(())
}

/// Read path params by aligning the `:param` pattern with the request path
fn path_params(pattern: &str, path: &str) -> Map<String, Value> {
    segments(pattern)
        .into_iter()
        .zip(segments(path))
        .filter_map(|(expected, actual)| {
            expected
                .strip_prefix(':')
                .map(|name| (name.to_string(), Value::String(actual.to_string())))
        })
        .collect()
}

fn parse_body(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::Null,
    })
}

async fn dispatch(
    pattern: Arc<str>,
    controller: Controller,
    query: HashMap<String, String>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => parse_body(&bytes),
        Err(e) => {
            tracing::warn!("❌ Unreadable request body for {} {}: {}", parts.method, path, e);
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let inputs = json!({
        "method": parts.method.as_str(),
        "path": path,
        "params": path_params(&pattern, &path),
        "query": query,
        "body": body,
    });

    match controller(inputs).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::warn!("❌ Flow controller failed for {} {}: {}", parts.method, path, e);
            (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}
