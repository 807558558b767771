/// Node controllers: the async handler functions modules contribute
///
/// A missing or broken controller is not an error. Resolution collapses
/// `Option<Controller>` to the shared no-op controller so one bad module only
/// degrades its own nodes.

use serde_json::Value;
use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, OnceLock},
};

/// Future returned by a controller invocation
pub type ControllerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A node handler: takes the call inputs and completes once the node has run
pub type Controller = Arc<dyn Fn(Value) -> ControllerFuture + Send + Sync>;

static NOOP: OnceLock<Controller> = OnceLock::new();

/// The process-wide no-op controller
pub fn noop_controller() -> Controller {
    NOOP.get_or_init(|| {
        let noop: Controller =
            Arc::new(|_inputs: Value| -> ControllerFuture { Box::pin(async { Ok(()) }) });
        noop
    })
    .clone()
}

/// Whether `controller` is the no-op fallback
pub fn is_noop(controller: &Controller) -> bool {
    Arc::ptr_eq(controller, &noop_controller())
}

/// Collapse an optional controller to the no-op fallback
pub fn or_noop(controller: Option<Controller>) -> Controller {
    controller.unwrap_or_else(noop_controller)
}
