/// Duplicate route detection
///
/// The last gate before a compiled route set reaches the hosting router.

use crate::error::{DuplicateReport, RouteError};
use crate::routes::spec::CompiledRoute;
use tracing::error;

/// Count every `"METHOD /path"` key and keep only those seen more than once
pub fn find_duplicates(routes: &[CompiledRoute]) -> DuplicateReport {
    let mut frequency = DuplicateReport::new();
    for route in routes {
        *frequency.entry(route.key()).or_insert(0) += 1;
    }
    frequency.retain(|_, count| *count > 1);
    frequency
}

/// Fail with [`RouteError::Conflict`] when the route set has duplicates
pub fn ensure_unique(routes: &[CompiledRoute]) -> Result<(), RouteError> {
    let duplicates = find_duplicates(routes);
    if duplicates.is_empty() {
        return Ok(());
    }

    for (key, count) in &duplicates {
        error!("❌ Duplicate route {} registered {} times", key, count);
    }
    Err(RouteError::Conflict(duplicates))
}
