/// Plugin loading for installed node packages
///
/// The registry only ever talks to a [`PluginLoader`]: a function from an
/// installed package directory to a loaded handle exposing the package's node
/// names and their controllers. Nothing else in the crate knows how node code
/// is actually executed.
///
/// The default loader runs node controllers as sandboxed Lua scripts shipped
/// inside the package.

use crate::module::{
    controller::{Controller, ControllerFuture},
    types::PackageManifest,
};
use anyhow::Result;
use mlua::LuaSerdeExt;
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Handle to a loaded module package
pub trait LoadedModule: Send + Sync {
    /// Names of every node the package declares
    fn node_names(&self) -> Vec<String>;

    /// The controller exported for `node_name`, if the package provides a callable one
    fn controller(&self, node_name: &str) -> Option<Controller>;
}

/// A package after loading: its manifest plus the handle controllers come from
pub struct LoadedPackage {
    pub manifest: PackageManifest,
    pub handle: Arc<dyn LoadedModule>,
}

/// Loads an installed package from disk
pub trait PluginLoader: Send + Sync {
    /// Load the package rooted at `package_dir`.
    ///
    /// Fails when the directory does not hold a package.json with a node manifest.
    fn load(&self, package_dir: &Path) -> Result<LoadedPackage>;
}

/// Read and validate `<package_dir>/package.json`
pub fn read_manifest(package_dir: &Path) -> Result<PackageManifest> {
    let manifest_path = package_dir.join("package.json");
    let raw = std::fs::read_to_string(&manifest_path)
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", manifest_path.display(), e))?;
    let manifest: PackageManifest = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid package manifest '{}': {}", manifest_path.display(), e))?;

    match &manifest.ecoflow {
        Some(nodes) if !nodes.nodes.is_empty() => Ok(manifest),
        _ => Err(anyhow::anyhow!(
            "Package '{}' does not expose an ecoflow node manifest",
            manifest.name
        )),
    }
}

/// Loader for packages whose node controllers are Lua scripts
#[derive(Debug, Default, Clone)]
pub struct LuaPluginLoader;

impl PluginLoader for LuaPluginLoader {
    fn load(&self, package_dir: &Path) -> Result<LoadedPackage> {
        let manifest = read_manifest(package_dir)?;
        let mut node_names = Vec::new();
        let mut scripts = HashMap::new();

        for node in manifest.ecoflow.iter().flat_map(|nodes| nodes.nodes.iter()) {
            node_names.push(node.name.clone());

            let Some(relative) = node.controller.as_deref() else {
                continue;
            };
            let script_path = package_dir.join(relative);
            match std::fs::read_to_string(&script_path) {
                Ok(source) => {
                    scripts.insert(node.name.clone(), Arc::<str>::from(source));
                }
                Err(e) => {
                    // Only this node degrades; the rest of the package stays usable
                    tracing::warn!(
                        "⚠️ Controller script for node '{}' in '{}' is unreadable ({}): {}",
                        node.name,
                        manifest.name,
                        script_path.display(),
                        e
                    );
                }
            }
        }

        tracing::debug!(
            "📦 Loaded package '{}' with {} nodes ({} with controllers)",
            manifest.name,
            node_names.len(),
            scripts.len()
        );

        let handle = Arc::new(LuaModule {
            package: manifest.name.clone(),
            root: package_dir.to_path_buf(),
            node_names,
            scripts,
        });

        Ok(LoadedPackage { manifest, handle })
    }
}

/// Lua-backed module handle
pub struct LuaModule {
    package: String,
    root: PathBuf,
    node_names: Vec<String>,
    scripts: HashMap<String, Arc<str>>,
}

impl fmt::Debug for LuaModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuaModule")
            .field("package", &self.package)
            .field("root", &self.root)
            .field("nodes", &self.node_names)
            .finish()
    }
}

impl LoadedModule for LuaModule {
    fn node_names(&self) -> Vec<String> {
        self.node_names.clone()
    }

    fn controller(&self, node_name: &str) -> Option<Controller> {
        let script = self.scripts.get(node_name)?.clone();
        let label = format!("{}.{}", self.package, node_name);

        Some(Arc::new(move |inputs: Value| -> ControllerFuture {
            let script = script.clone();
            let label = label.clone();
            // The Lua state is created and dropped inside the call, never held across an await
            Box::pin(async move { run_lua_controller(&label, &script, inputs) })
        }))
    }
}

/// Execute one controller script in a fresh sandboxed Lua state
fn run_lua_controller(label: &str, script: &str, inputs: Value) -> Result<()> {
    tracing::debug!("🧠 Running controller '{}'", label);

    let lua = mlua::Lua::new();
    let globals = lua.globals();

    // Sandbox: no filesystem, process, or module loading access
    for name in ["os", "io", "debug", "package", "require", "dofile", "loadfile"] {
        globals
            .set(name, mlua::Nil)
            .map_err(|e| anyhow::anyhow!("Failed to sandbox controller '{}': {}", label, e))?;
    }

    let lua_inputs = lua
        .to_value(&inputs)
        .map_err(|e| anyhow::anyhow!("Failed to convert inputs for controller '{}': {}", label, e))?;
    globals
        .set("inputs", lua_inputs)
        .map_err(|e| anyhow::anyhow!("Failed to bind inputs for controller '{}': {}", label, e))?;

    lua.load(script)
        .set_name(label)
        .exec()
        .map_err(|e| anyhow::anyhow!("Controller '{}' failed: {}", label, e))?;

    Ok(())
}
