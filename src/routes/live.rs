/// Hot-swappable flow router
///
/// The server's fallback forwards every request that no admin route matched
/// to whichever flow router is currently published. Redeploying flows swaps
/// the pointer; in-flight requests finish on the router they started with.

use arc_swap::ArcSwap;
use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
    Router,
};
use std::convert::Infallible;
use std::sync::Arc;
use tower::ServiceExt;

#[derive(Debug)]
pub struct LiveRouter {
    current: ArcSwap<Router>,
}

impl Default for LiveRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveRouter {
    /// Start with an empty router (every request answers 404)
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Router::new()),
        }
    }

    /// Publish a new flow router
    pub fn swap(&self, router: Router) {
        self.current.store(Arc::new(router));
        tracing::info!("🔥 Flow routes hot-swapped");
    }

    /// Current router snapshot
    pub fn current(&self) -> Router {
        self.current.load().as_ref().clone()
    }

    /// Serve one request with the current snapshot
    pub async fn call(&self, request: Request) -> Response {
        let result: Result<Response, Infallible> = self.current().oneshot(request).await;
        match result {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

/// Fallback handler forwarding to the live flow router
pub async fn forward(State(live): State<Arc<LiveRouter>>, request: Request) -> impl IntoResponse {
    live.call(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get};

    async fn status(live: &LiveRouter, uri: &str) -> StatusCode {
        let request = axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap();
        live.call(request).await.status()
    }

    #[tokio::test]
    async fn swapping_replaces_served_routes() {
        let live = LiveRouter::new();
        assert_eq!(status(&live, "/v1").await, StatusCode::NOT_FOUND);

        live.swap(Router::new().route("/v1", get(|| async { "one" })));
        assert_eq!(status(&live, "/v1").await, StatusCode::OK);

        live.swap(Router::new().route("/v2", get(|| async { "two" })));
        assert_eq!(status(&live, "/v1").await, StatusCode::NOT_FOUND);
        assert_eq!(status(&live, "/v2").await, StatusCode::OK);
    }
}
