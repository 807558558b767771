/// Route accumulator
///
/// Collects compiled routes and nested sub-routers in insertion order for one
/// compilation pass. Entries are only ever appended; the hosting layer reads
/// the finished list through [`RouterBuilder::route`].

use crate::module::controller::Controller;
use crate::routes::spec::{join_paths, CompiledRoute};
use serde::Serialize;
use std::fmt;

/// Extra metadata attached to a method route
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteOptions {
    /// Flow that defined the route
    pub flow: Option<String>,
    /// Node that defined the route
    pub node: Option<String>,
}

/// One accumulated entry
#[derive(Clone)]
pub enum Routes {
    Method {
        path: String,
        method: String,
        controller: Controller,
        opts: Option<RouteOptions>,
    },
    Router {
        path: String,
        router: RouterBuilder,
    },
}

impl fmt::Debug for Routes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method { path, method, opts, .. } => f
                .debug_struct("Method")
                .field("path", path)
                .field("method", method)
                .field("opts", opts)
                .finish_non_exhaustive(),
            Self::Router { path, router } => f
                .debug_struct("Router")
                .field("path", path)
                .field("router", router)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouterBuilder {
    routes: Vec<Routes>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, path: &str, controller: Controller) -> &mut Self {
        self.on("GET", path, controller, None)
    }

    pub fn post(&mut self, path: &str, controller: Controller) -> &mut Self {
        self.on("POST", path, controller, None)
    }

    pub fn put(&mut self, path: &str, controller: Controller) -> &mut Self {
        self.on("PUT", path, controller, None)
    }

    pub fn patch(&mut self, path: &str, controller: Controller) -> &mut Self {
        self.on("PATCH", path, controller, None)
    }

    pub fn delete(&mut self, path: &str, controller: Controller) -> &mut Self {
        self.on("DELETE", path, controller, None)
    }

    pub fn head(&mut self, path: &str, controller: Controller) -> &mut Self {
        self.on("HEAD", path, controller, None)
    }

    pub fn options(&mut self, path: &str, controller: Controller) -> &mut Self {
        self.on("OPTIONS", path, controller, None)
    }

    /// Append a method route for an arbitrary (already compiled) method
    pub fn on(&mut self, method: &str, path: &str, controller: Controller, opts: Option<RouteOptions>) -> &mut Self {
        self.routes.push(Routes::Method {
            path: path.to_string(),
            method: method.to_ascii_uppercase(),
            controller,
            opts,
        });
        self
    }

    /// Append a sub-router; its routes are served below `path`
    pub fn mount(&mut self, path: &str, router: RouterBuilder) -> &mut Self {
        self.routes.push(Routes::Router {
            path: path.to_string(),
            router,
        });
        self
    }

    /// The accumulated entries, in insertion order
    pub fn route(&self) -> &[Routes] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Flatten nested routers into full-path routes, preserving insertion order
    pub fn compiled_routes(&self) -> Vec<CompiledRoute> {
        let mut flat = Vec::new();
        self.flatten_into("/", &mut flat);
        flat
    }

    fn flatten_into(&self, prefix: &str, flat: &mut Vec<CompiledRoute>) {
        for entry in &self.routes {
            match entry {
                Routes::Method {
                    path,
                    method,
                    controller,
                    ..
                } => flat.push(CompiledRoute {
                    method: method.clone(),
                    path: join_paths(prefix, path),
                    handler: controller.clone(),
                }),
                Routes::Router { path, router } => router.flatten_into(&join_paths(prefix, path), flat),
            }
        }
    }
}
