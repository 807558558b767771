/// Route Layer
///
/// From declarative route specs to a served axum router:
/// - Path compilation of compact and structured specs
/// - Duplicate detection over a compiled route set
/// - Append-only route accumulation with nested sub-routers
/// - Mounting onto axum and hot-swapping the mounted router

pub mod spec;

pub mod conflicts;

pub mod builder;

pub mod mount;

pub mod live;

pub use builder::{RouteOptions, RouterBuilder, Routes};
pub use conflicts::{ensure_unique, find_duplicates};
pub use live::LiveRouter;
pub use mount::build_router;
pub use spec::{CompiledRoute, RoutePath, RouteSpec};
