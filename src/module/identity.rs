/// Stable module and node identities
///
/// Identities are 128-bit digests of the module name (module-level) or of
/// `"{module}.{node}"` (node-level), hex encoded. They never depend on package
/// contents or versions, so they survive reinstalls and process restarts and
/// can be persisted in flow definitions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of digest bytes kept (128 bits)
const IDENTITY_BYTES: usize = 16;

/// Hash-derived key for a module or a module + node pair.
///
/// Used as a mapping key only, never as a display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleIdentity(String);

impl ModuleIdentity {
    /// Derive an identity; an absent or empty `node_name` yields the module-level identity.
    pub fn new(module_name: &str, node_name: Option<&str>) -> Self {
        let input = match node_name {
            Some(node) if !node.is_empty() => format!("{module_name}.{node}"),
            _ => module_name.to_string(),
        };

        let digest = Sha256::digest(input.as_bytes());
        Self(hex::encode(&digest[..IDENTITY_BYTES]))
    }

    /// Module-level identity
    pub fn module(module_name: &str) -> Self {
        Self::new(module_name, None)
    }

    /// Node-level identity
    pub fn node(module_name: &str, node_name: &str) -> Self {
        Self::new(module_name, Some(node_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ModuleIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_deterministic() {
        assert_eq!(ModuleIdentity::module("pkg"), ModuleIdentity::module("pkg"));
        assert_eq!(ModuleIdentity::module("pkg").as_str().len(), IDENTITY_BYTES * 2);
    }

    #[test]
    fn node_identities_differ_per_node() {
        assert_ne!(
            ModuleIdentity::node("pkg", "nodeA"),
            ModuleIdentity::node("pkg", "nodeB")
        );
        assert_ne!(ModuleIdentity::module("pkg"), ModuleIdentity::node("pkg", "nodeA"));
    }

    #[test]
    fn empty_node_name_is_module_level() {
        assert_eq!(ModuleIdentity::new("pkg", Some("")), ModuleIdentity::module("pkg"));
    }

    #[test]
    fn node_identity_hashes_dotted_name() {
        assert_eq!(
            ModuleIdentity::node("pkg", "nodeA"),
            ModuleIdentity::module("pkg.nodeA")
        );
    }
}
