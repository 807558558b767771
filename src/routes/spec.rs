/// Declarative route specs and the path compiler
///
/// A route spec comes from the flow editor either as a compact string
/// (`"POST /items"`) or as structured fields (`apiMethod`, `apiEndpoint`,
/// `$url.params`). Defaults are resolved when the spec is built, so compiling
/// is a pure function of an already-normalized value.

use crate::error::RouteError;
use crate::module::controller::Controller;
use serde::Deserialize;
use std::fmt;

pub const DEFAULT_METHOD: &str = "GET";

/// A route spec in one of its two authored shapes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawRouteSpec")]
pub enum RouteSpec {
    /// `"METHOD /path/segment"`
    Compact(String),
    /// Structured spec with defaults already applied
    Structured {
        method: String,
        endpoint: String,
        params: Vec<String>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRouteSpec {
    Compact(String),
    Structured {
        #[serde(rename = "apiMethod", default)]
        api_method: Option<String>,
        #[serde(rename = "apiEndpoint", default)]
        api_endpoint: Option<String>,
        #[serde(rename = "$url.params", default)]
        url_params: Option<Vec<String>>,
    },
}

impl From<RawRouteSpec> for RouteSpec {
    fn from(raw: RawRouteSpec) -> Self {
        match raw {
            RawRouteSpec::Compact(spec) => Self::Compact(spec),
            RawRouteSpec::Structured {
                api_method,
                api_endpoint,
                url_params,
            } => Self::structured(api_method.as_deref(), api_endpoint.as_deref(), url_params.unwrap_or_default()),
        }
    }
}

impl RouteSpec {
    /// Build a structured spec; absent or empty fields take their defaults
    /// (`GET`, empty endpoint, no params)
    pub fn structured(method: Option<&str>, endpoint: Option<&str>, params: Vec<String>) -> Self {
        let method = method.map(str::trim).filter(|m| !m.is_empty()).unwrap_or(DEFAULT_METHOD);
        Self::Structured {
            method: method.to_string(),
            endpoint: endpoint.unwrap_or_default().to_string(),
            params,
        }
    }

    /// Compile into a canonical `(method, path)` pair
    ///
    /// The path always starts with exactly one `/` and only ends with one when
    /// it is the root. Methods are upper-cased.
    pub fn compile(&self) -> Result<RoutePath, RouteError> {
        match self {
            Self::Compact(spec) => {
                let invalid = |reason: &str| RouteError::Compilation {
                    spec: spec.clone(),
                    reason: reason.to_string(),
                };

                let (method, raw_path) = spec
                    .trim()
                    .split_once(' ')
                    .ok_or_else(|| invalid("expected \"METHOD /path\""))?;
                if method.is_empty() {
                    return Err(invalid("missing HTTP method"));
                }

                Ok(RoutePath::new(method, &canonical_path(raw_path.trim(), &[])))
            }
            Self::Structured {
                method,
                endpoint,
                params,
            } => Ok(RoutePath::new(method, &canonical_path(endpoint, params))),
        }
    }
}

/// Strip surrounding slashes, append `:param` segments in order, re-root at `/`
fn canonical_path(endpoint: &str, params: &[String]) -> String {
    let mut segments: Vec<String> = Vec::new();

    let trimmed = endpoint.trim().trim_matches('/');
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
    for param in params {
        let name = param.trim().trim_start_matches(':');
        if !name.is_empty() {
            segments.push(format!(":{name}"));
        }
    }

    format!("/{}", segments.join("/"))
}

/// Join a mount prefix and a compiled path into one canonical path
pub fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let path = path.trim_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => format!("/{prefix}"),
        (false, false) => format!("/{prefix}/{path}"),
    }
}

/// A compiled `(method, path)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutePath {
    pub method: String,
    pub path: String,
}

impl RoutePath {
    fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.trim().to_ascii_uppercase(),
            path: path.to_string(),
        }
    }

    /// Attach the handler that serves this route
    pub fn with_handler(self, handler: Controller) -> CompiledRoute {
        CompiledRoute {
            method: self.method,
            path: self.path,
            handler,
        }
    }

    /// Frequency-table key: `"METHOD /path"`
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A compiled route, ready for the hosting router
#[derive(Clone)]
pub struct CompiledRoute {
    pub method: String,
    pub path: String,
    pub handler: Controller,
}

impl CompiledRoute {
    /// Frequency-table key: `"METHOD /path"`
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(value: serde_json::Value) -> Result<RoutePath, RouteError> {
        serde_json::from_value::<RouteSpec>(value).unwrap().compile()
    }

    #[test]
    fn structured_spec_appends_params_in_order() {
        let route = compile(json!({ "apiEndpoint": "users", "$url.params": ["id"] })).unwrap();
        assert_eq!((route.method.as_str(), route.path.as_str()), ("GET", "/users/:id"));

        let route = compile(json!({
            "apiMethod": "PUT",
            "apiEndpoint": "/orgs/",
            "$url.params": ["org", "member"]
        }))
        .unwrap();
        assert_eq!(route.path, "/orgs/:org/:member");
    }

    #[test]
    fn compact_spec_strips_slashes() {
        let route = compile(json!("POST /items/")).unwrap();
        assert_eq!((route.method.as_str(), route.path.as_str()), ("POST", "/items"));

        let route = compile(json!("delete //a/b//")).unwrap();
        assert_eq!(route.key(), "DELETE /a/b");
    }

    #[test]
    fn empty_structured_spec_is_root() {
        assert_eq!(compile(json!({})).unwrap().key(), "GET /");
        assert_eq!(compile(json!({ "apiMethod": "", "apiEndpoint": "/" })).unwrap().key(), "GET /");
        assert_eq!(compile(json!({ "$url.params": ["id"] })).unwrap().key(), "GET /:id");
    }

    #[test]
    fn compact_spec_without_separator_is_rejected() {
        let err = compile(json!("GET")).unwrap_err();
        assert!(matches!(err, RouteError::Compilation { ref spec, .. } if spec == "GET"));
        assert!(compile(json!(" /path")).is_err());
    }

    #[test]
    fn structured_compile_is_total_and_canonical() {
        let endpoints = ["", "/", "a", "/a", "a/", "//a//b//", " spaced/ "];
        let params: [&[&str]; 4] = [&[], &["id"], &["", "x"], &[":y", "z"]];

        for endpoint in endpoints {
            for param_set in params {
                let spec = RouteSpec::structured(None, Some(endpoint), param_set.iter().map(|p| p.to_string()).collect());
                let route = spec.compile().unwrap();
                assert!(route.path.starts_with('/'), "{route}");
                assert!(!route.path.starts_with("//"), "{route}");
                assert!(route.path == "/" || !route.path.ends_with('/'), "{route}");
            }
        }
    }

    #[test]
    fn join_paths_keeps_single_slashes() {
        assert_eq!(join_paths("/", "/"), "/");
        assert_eq!(join_paths("/", "/users"), "/users");
        assert_eq!(join_paths("/api/", "/"), "/api");
        assert_eq!(join_paths("api", "users/:id"), "/api/users/:id");
    }
}
