/// Error taxonomy for module management and route compilation
///
/// Module errors surface to whatever administrative action triggered them.
/// Route errors abort the compilation pass that produced them.

use std::collections::BTreeMap;
use thiserror::Error;

/// Duplicate route report: `"METHOD /path"` -> number of occurrences (always > 1)
pub type DuplicateReport = BTreeMap<String, usize>;

/// Errors raised by the module registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Failed to install module '{name}': {reason}")]
    Install { name: String, reason: String },

    #[error("Version '{version}' of module '{name}' does not exist")]
    Version { name: String, version: String },

    #[error("Module '{0}' not found")]
    NotFound(String),

    #[error("Failed to remove module '{name}': {reason}")]
    Remove { name: String, reason: String },

    #[error("Package index request failed: {0}")]
    Index(String),
}

impl ModuleError {
    pub(crate) fn install(name: &str, reason: impl ToString) -> Self {
        Self::Install {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn remove(name: &str, reason: impl ToString) -> Self {
        Self::Remove {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while compiling flows into routes or mounting them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Invalid route spec '{spec}': {reason}")]
    Compilation { spec: String, reason: String },

    #[error("Duplicate routes detected: {}", describe_report(.0))]
    Conflict(DuplicateReport),

    #[error("Unsupported HTTP method '{0}'")]
    UnsupportedMethod(String),

    #[error("Routes '{first}' and '{second}' cannot be told apart by the router")]
    Ambiguous { first: String, second: String },
}

fn describe_report(report: &DuplicateReport) -> String {
    report
        .iter()
        .map(|(key, count)| format!("{key} (x{count})"))
        .collect::<Vec<_>>()
        .join(", ")
}
