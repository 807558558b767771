/// Hot-reload module registry using ArcSwap
///
/// The registry is the authoritative catalog of installed node modules and the
/// only place third-party packages get installed, loaded, or removed.
///
/// Reads (list, lookup, controller resolution) load one immutable catalog
/// snapshot and never block. Writes are serialized per package name and only
/// publish a new snapshot once the package is fully installed and loaded, so a
/// failed, timed-out or cancelled install leaves the catalog untouched.

use crate::{
    config::ModulesConfig,
    error::ModuleError,
    module::{
        controller::{noop_controller, Controller},
        identity::ModuleIdentity,
        loader::{LuaPluginLoader, PluginLoader},
        package::{package_dir, read_dependencies, CommandPackageManager, NpmRegistryIndex, PackageIndex, PackageManager},
        types::{ModuleSchema, PackageDescription, SearchQuery, SearchResults},
    },
};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::{
    collections::HashMap,
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Immutable catalog snapshot
#[derive(Debug, Clone, Default)]
struct Catalog {
    /// Key: package name
    modules: HashMap<String, ModuleSchema>,
    /// Key: module-level identity, Value: package name
    by_id: HashMap<ModuleIdentity, String>,
}

impl Catalog {
    fn with(&self, schema: ModuleSchema) -> Self {
        let mut next = self.clone();
        next.by_id.insert(schema.id.clone(), schema.name.clone());
        next.modules.insert(schema.name.clone(), schema);
        next
    }

    fn without(&self, name: &str) -> Self {
        let mut next = self.clone();
        if let Some(schema) = next.modules.remove(name) {
            next.by_id.remove(&schema.id);
        }
        next
    }
}

/// Catalog of installed node modules
pub struct ModuleRegistry {
    /// Thread-safe atomic pointer to the catalog snapshot
    catalog: ArcSwap<Catalog>,
    /// One writer lock per package name, dropped once nobody holds or waits on it
    locks: DashMap<String, Arc<Mutex<()>>>,
    /// Package-manager runs share one package.json and node_modules
    workspace: Mutex<()>,
    /// Package manager working directory
    modules_dir: PathBuf,
    /// Upper bound for every package-manager and index call
    timeout: Duration,
    packages: Arc<dyn PackageManager>,
    index: Arc<dyn PackageIndex>,
    loader: Arc<dyn PluginLoader>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules_dir", &self.modules_dir)
            .field("installed", &self.catalog.load().modules.len())
            .finish()
    }
}

impl ModuleRegistry {
    /// Create a registry with explicit collaborators
    pub fn new(
        config: &ModulesConfig,
        packages: Arc<dyn PackageManager>,
        index: Arc<dyn PackageIndex>,
        loader: Arc<dyn PluginLoader>,
    ) -> Self {
        Self {
            catalog: ArcSwap::from_pointee(Catalog::default()),
            locks: DashMap::new(),
            workspace: Mutex::new(()),
            modules_dir: config.dir.clone(),
            timeout: config.timeout(),
            packages,
            index,
            loader,
        }
    }

    /// Create a registry backed by the npm toolchain, the configured index and Lua packages
    pub fn from_config(config: &ModulesConfig) -> Self {
        Self::new(
            config,
            Arc::new(CommandPackageManager::new()),
            Arc::new(NpmRegistryIndex::new(&config.index_url, &config.keyword)),
            Arc::new(LuaPluginLoader),
        )
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Load every dependency listed in the module manifest into the catalog
    ///
    /// Called during application startup. Packages that fail to load are
    /// logged and skipped so one broken package cannot keep the service down.
    pub async fn init_from_disk(&self) -> anyhow::Result<usize> {
        let dependencies = read_dependencies(&self.modules_dir)?;
        let mut loaded = Vec::new();

        for (name, source) in dependencies {
            let local = source.starts_with("file:");
            match self.load_schema(&name, local) {
                Ok(schema) => loaded.push(schema),
                Err(e) => tracing::warn!("⚠️ Skipping module '{}': {}", name, e),
            }
        }

        let count = loaded.len();
        self.add_modules(loaded);
        tracing::info!("Initialized module registry with {} modules", count);

        Ok(count)
    }

    /// Install a package from the index and record it in the catalog
    pub async fn install_module(&self, name: &str, version: Option<&str>) -> Result<ModuleSchema, ModuleError> {
        let _guard = self.lock_package(name).await;

        let spec = match version {
            Some(version) if !version.is_empty() => format!("{name}@{version}"),
            _ => name.to_string(),
        };

        tracing::info!("📥 Installing module: {}", spec);
        self.in_workspace(&format!("installing '{spec}'"), self.packages.add_dependency(&spec, &self.modules_dir))
            .await
            .map_err(|e| ModuleError::install(name, e))?;

        let schema = self.load_or_rollback(name, false).await?;
        self.add_module(schema.clone());

        tracing::info!("✅ Installed module: {}@{}", schema.name, schema.version);
        Ok(schema)
    }

    /// Install packages from archives already placed on disk
    ///
    /// Each archive succeeds or fails on its own; only the schemas that
    /// installed are returned.
    pub async fn install_local_module(&self, archives: &[PathBuf]) -> Vec<ModuleSchema> {
        let mut installed = Vec::new();

        for archive in archives {
            match self.install_local_archive(archive).await {
                Ok(schema) => {
                    tracing::info!("✅ Installed local module: {}@{}", schema.name, schema.version);
                    installed.push(schema);
                }
                Err(e) => tracing::error!("❌ Failed to install '{}': {}", archive.display(), e),
            }
        }

        installed
    }

    async fn install_local_archive(&self, archive: &Path) -> Result<ModuleSchema, ModuleError> {
        let label = archive.display().to_string();

        let name = {
            let _guard = self.lock_package(&format!("file:{label}")).await;
            self.in_workspace(
                &format!("installing '{label}'"),
                self.packages.add_local_dependency(archive, &self.modules_dir),
            )
            .await
            .map_err(|e| ModuleError::install(&label, e))?
        };

        let _guard = self.lock_package(&name).await;

        let schema = self.load_or_rollback(&name, true).await?;
        self.add_module(schema.clone());
        Ok(schema)
    }

    /// Re-resolve a package at a specific version
    pub async fn upgrade_downgrade_module(&self, name: &str, version: &str) -> Result<ModuleSchema, ModuleError> {
        let _guard = self.lock_package(name).await;

        let versions = self
            .bounded(&format!("listing versions of '{name}'"), self.index.versions(name))
            .await
            .map_err(|e| ModuleError::Index(e.to_string()))?;

        if !versions.iter().any(|known| known == version) {
            return Err(ModuleError::Version {
                name: name.to_string(),
                version: version.to_string(),
            });
        }

        let previous = self.catalog.load().modules.get(name).map(|schema| schema.version.clone());
        let spec = format!("{name}@{version}");
        self.in_workspace(&format!("installing '{spec}'"), self.packages.add_dependency(&spec, &self.modules_dir))
            .await
            .map_err(|e| ModuleError::install(name, e))?;

        let schema = self.load_or_restore(name, previous.as_deref()).await?;
        self.update_module(schema.clone());

        tracing::info!(
            "🔄 Switched module '{}' from {} to {}",
            name,
            previous.as_deref().unwrap_or("<not installed>"),
            schema.version
        );
        Ok(schema)
    }

    /// Remove a package from the catalog and the dependency manifest
    ///
    /// Removing a module that is not installed is not an error.
    pub async fn remove_module(&self, name: &str) -> Result<(), ModuleError> {
        let _guard = self.lock_package(name).await;

        let in_catalog = self.catalog.load().modules.contains_key(name);
        let listed = {
            let _workspace = self.workspace.lock().await;
            read_dependencies(&self.modules_dir)
                .map_err(|e| ModuleError::remove(name, e))?
                .contains_key(name)
        };

        if !in_catalog && !listed {
            tracing::debug!("Module '{}' is not installed, nothing to remove", name);
            return Ok(());
        }

        if listed {
            self.in_workspace(&format!("removing '{name}'"), self.packages.remove_dependency(name, &self.modules_dir))
                .await
                .map_err(|e| ModuleError::remove(name, e))?;
        }

        self.catalog.rcu(|current| current.without(name));
        tracing::info!("🗑️ Removed module: {}", name);

        Ok(())
    }

    /// Register one catalog entry
    pub fn add_module(&self, schema: ModuleSchema) {
        self.add_modules([schema]);
    }

    /// Register several catalog entries in one snapshot swap
    pub fn add_modules(&self, schemas: impl IntoIterator<Item = ModuleSchema>) {
        let schemas: Vec<ModuleSchema> = schemas.into_iter().collect();
        if schemas.is_empty() {
            return;
        }

        self.catalog.rcu(|current| {
            schemas
                .iter()
                .cloned()
                .fold((**current).clone(), |catalog, schema| catalog.with(schema))
        });
    }

    /// Refresh an existing catalog entry (or add it if absent)
    pub fn update_module(&self, schema: ModuleSchema) {
        self.catalog.rcu(|current| current.with(schema.clone()));
    }

    /// Look up a module by its module-level identity
    pub fn get_module_schema(&self, id: &ModuleIdentity) -> Result<ModuleSchema, ModuleError> {
        let catalog = self.catalog.load();
        catalog
            .by_id
            .get(id)
            .and_then(|name| catalog.modules.get(name))
            .cloned()
            .ok_or_else(|| ModuleError::NotFound(id.to_string()))
    }

    /// Resolve a node controller by module and node name, degrading to the no-op controller
    pub fn get_controller(&self, module_name: &str, node_name: &str) -> Controller {
        match self.get_module_schema(&ModuleIdentity::module(module_name)) {
            Ok(schema) => schema.get_controller(node_name),
            Err(_) => noop_controller(),
        }
    }

    /// Query the remote package index; packages already in the catalog are flagged
    pub async fn search_module(&self, query: &SearchQuery) -> Result<SearchResults, ModuleError> {
        let mut results = self
            .bounded("searching the package index", self.index.search(query))
            .await
            .map_err(|e| ModuleError::Index(e.to_string()))?;

        let catalog = self.catalog.load();
        for package in &mut results.packages {
            package.installed = catalog.modules.contains_key(&package.name);
        }

        Ok(results)
    }

    /// Installed modules, sorted by package name
    pub fn installed_modules(&self) -> Vec<ModuleSchema> {
        let mut modules: Vec<ModuleSchema> = self.catalog.load().modules.values().cloned().collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        modules
    }

    /// Number of module packages the index knows about
    pub async fn available_packages_count(&self) -> Result<usize, ModuleError> {
        let query = SearchQuery {
            size: Some(1),
            ..SearchQuery::default()
        };
        Ok(self.search_module(&query).await?.total)
    }

    pub fn get_installed_packages_description(&self, name: &str) -> Result<PackageDescription, ModuleError> {
        self.catalog
            .load()
            .modules
            .get(name)
            .map(PackageDescription::from)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))
    }

    async fn lock_package(&self, key: &str) -> PackageGuard<'_> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        PackageGuard {
            locks: &self.locks,
            key: key.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn load_schema(&self, name: &str, local: bool) -> Result<ModuleSchema, ModuleError> {
        let loaded = self
            .loader
            .load(&package_dir(&self.modules_dir, name))
            .map_err(|e| ModuleError::install(name, e))?;

        Ok(ModuleSchema::new(&loaded.manifest, local, Some(loaded.handle)))
    }

    /// Load a freshly added package; if it is not a usable module, take it out of the manifest again
    async fn load_or_rollback(&self, name: &str, local: bool) -> Result<ModuleSchema, ModuleError> {
        match self.load_schema(name, local) {
            Ok(schema) => Ok(schema),
            Err(e) => {
                tracing::warn!("⚠️ '{}' is not a loadable module, rolling back: {}", name, e);
                let rollback = self.packages.remove_dependency(name, &self.modules_dir);
                if let Err(rollback_err) = self.in_workspace(&format!("removing '{name}'"), rollback).await {
                    tracing::warn!("⚠️ Rollback of '{}' failed: {}", name, rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Load a version switch; if the new version is unusable, put the previous one back
    async fn load_or_restore(&self, name: &str, previous: Option<&str>) -> Result<ModuleSchema, ModuleError> {
        let Some(previous) = previous else {
            return self.load_or_rollback(name, false).await;
        };

        match self.load_schema(name, false) {
            Ok(schema) => Ok(schema),
            Err(e) => {
                tracing::warn!("⚠️ '{}' is not a loadable module, restoring {}: {}", name, previous, e);
                let spec = format!("{name}@{previous}");
                let restore = self.packages.add_dependency(&spec, &self.modules_dir);
                if let Err(restore_err) = self.in_workspace(&format!("restoring '{spec}'"), restore).await {
                    tracing::error!("❌ Restoring '{}' failed: {}", spec, restore_err);
                }
                Err(e)
            }
        }
    }

    /// Run one package-manager call with the workspace to itself
    async fn in_workspace<T>(&self, what: &str, call: impl Future<Output = anyhow::Result<T>>) -> anyhow::Result<T> {
        let _workspace = self.workspace.lock().await;
        self.bounded(what, call).await
    }

    async fn bounded<T>(&self, what: &str, call: impl Future<Output = anyhow::Result<T>>) -> anyhow::Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| anyhow::anyhow!("{} timed out after {:?}", what, self.timeout))?
    }
}

/// Held package-name lock; the table entry goes away with the last holder
struct PackageGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PackageGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::controller::is_noop;
    use crate::testing::{MockPackage, MockPackages};
    use serde_json::json;

    fn registry(dir: &Path, packages: Arc<MockPackages>) -> ModuleRegistry {
        let config = ModulesConfig {
            dir: dir.to_path_buf(),
            index_url: "http://index.invalid".to_string(),
            keyword: "ecoflow".to_string(),
            timeout_secs: 5,
        };
        ModuleRegistry::new(&config, packages.clone(), packages, Arc::new(LuaPluginLoader))
    }

    fn http_package(version: &str) -> MockPackage {
        MockPackage::new("ecoflow-http", version)
            .node("request", "Request", Some("assert(inputs ~= nil)"))
            .node("settings", "Configuration", None)
    }

    #[tokio::test]
    async fn install_then_resolve_then_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new());
        packages.publish(http_package("1.0.0"));
        let registry = registry(tmp.path(), packages);

        let schema = registry.install_module("ecoflow-http", None).await.unwrap();
        assert_eq!(schema.version, "1.0.0");
        assert!(!schema.local);

        let controller = registry.get_controller("ecoflow-http", "request");
        assert!(!is_noop(&controller));
        assert!(controller(json!({})).await.is_ok());
        assert!(is_noop(&registry.get_controller("ecoflow-http", "settings")));

        registry.remove_module("ecoflow-http").await.unwrap();
        assert!(is_noop(&registry.get_controller("ecoflow-http", "request")));
        assert!(registry.installed_modules().is_empty());
        assert!(!read_dependencies(tmp.path()).unwrap().contains_key("ecoflow-http"));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(tmp.path(), Arc::new(MockPackages::new()));

        assert!(registry.remove_module("never-installed").await.is_ok());
        assert!(registry.remove_module("never-installed").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_package_fails_install() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(tmp.path(), Arc::new(MockPackages::new()));

        let err = registry.install_module("does-not-exist", None).await.unwrap_err();
        assert!(matches!(err, ModuleError::Install { ref name, .. } if name == "does-not-exist"));
        assert!(registry.installed_modules().is_empty());
    }

    #[tokio::test]
    async fn package_without_node_manifest_is_rolled_back() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new());
        packages.publish(MockPackage::new("left-pad", "1.3.0"));
        let registry = registry(tmp.path(), packages);

        let err = registry.install_module("left-pad", None).await.unwrap_err();
        assert!(matches!(err, ModuleError::Install { .. }));
        assert!(registry.installed_modules().is_empty());
        assert!(!read_dependencies(tmp.path()).unwrap().contains_key("left-pad"));
    }

    #[tokio::test]
    async fn timed_out_install_leaves_catalog_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new().with_delay(Duration::from_secs(30)));
        packages.publish(http_package("1.0.0"));
        let mut registry = registry(tmp.path(), packages);
        registry.timeout = Duration::from_millis(50);

        let err = registry.install_module("ecoflow-http", None).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(registry.installed_modules().is_empty());
    }

    #[tokio::test]
    async fn upgrade_downgrade_checks_versions() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new());
        packages.publish(http_package("1.0.0"));
        packages.publish(http_package("2.0.0"));
        let registry = registry(tmp.path(), packages);

        let installed = registry.install_module("ecoflow-http", None).await.unwrap();
        assert_eq!(installed.version, "2.0.0");

        let downgraded = registry.upgrade_downgrade_module("ecoflow-http", "1.0.0").await.unwrap();
        assert_eq!(downgraded.version, "1.0.0");
        assert_eq!(registry.installed_modules().len(), 1);
        assert_eq!(
            registry.get_installed_packages_description("ecoflow-http").unwrap().version,
            "1.0.0"
        );

        let err = registry.upgrade_downgrade_module("ecoflow-http", "9.9.9").await.unwrap_err();
        assert_eq!(
            err,
            ModuleError::Version {
                name: "ecoflow-http".to_string(),
                version: "9.9.9".to_string()
            }
        );
    }

    #[tokio::test]
    async fn local_batch_collects_only_successes() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new());
        packages.archive("/uploads/good.tgz", MockPackage::new("local-nodes", "0.1.0").node("debug", "Debug", None));
        packages.archive("/uploads/bad.tgz", MockPackage::new("not-a-module", "0.1.0"));
        let registry = registry(tmp.path(), packages);

        let installed = registry
            .install_local_module(&[
                PathBuf::from("/uploads/good.tgz"),
                PathBuf::from("/uploads/bad.tgz"),
                PathBuf::from("/uploads/missing.tgz"),
            ])
            .await;

        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].name, "local-nodes");
        assert!(installed[0].local);
    }

    #[tokio::test]
    async fn lookup_by_identity() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new());
        packages.publish(http_package("1.0.0"));
        let registry = registry(tmp.path(), packages);
        registry.install_module("ecoflow-http", Some("1.0.0")).await.unwrap();

        let schema = registry.get_module_schema(&ModuleIdentity::module("ecoflow-http")).unwrap();
        assert_eq!(schema.name, "ecoflow-http");

        let missing = registry.get_module_schema(&ModuleIdentity::module("other"));
        assert!(matches!(missing, Err(ModuleError::NotFound(_))));
    }

    #[tokio::test]
    async fn search_flags_installed_packages() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new());
        packages.publish(http_package("1.0.0"));
        packages.publish(MockPackage::new("ecoflow-mail", "0.3.0").node("send", "Middleware", None));
        let registry = registry(tmp.path(), packages);
        registry.install_module("ecoflow-http", None).await.unwrap();

        let results = registry
            .search_module(&SearchQuery {
                text: "ecoflow".to_string(),
                ..SearchQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(results.total, 2);
        let installed: Vec<_> = results.packages.iter().filter(|p| p.installed).map(|p| p.name.as_str()).collect();
        assert_eq!(installed, vec!["ecoflow-http"]);
        assert_eq!(registry.available_packages_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn init_from_disk_restores_catalog() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new());
        packages.publish(http_package("1.0.0"));

        let first = registry(tmp.path(), packages.clone());
        first.install_module("ecoflow-http", None).await.unwrap();

        let restarted = registry(tmp.path(), packages);
        assert_eq!(restarted.init_from_disk().await.unwrap(), 1);
        assert!(!is_noop(&restarted.get_controller("ecoflow-http", "request")));
    }

    #[tokio::test]
    async fn failed_upgrade_restores_previous_version() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new());
        packages.publish(http_package("1.0.0"));
        packages.publish(MockPackage::new("ecoflow-http", "2.0.0"));
        let current = registry(tmp.path(), packages.clone());
        current.install_module("ecoflow-http", Some("1.0.0")).await.unwrap();

        let err = current.upgrade_downgrade_module("ecoflow-http", "2.0.0").await.unwrap_err();
        assert!(matches!(err, ModuleError::Install { .. }));
        assert_eq!(current.installed_modules()[0].version, "1.0.0");
        assert_eq!(read_dependencies(tmp.path()).unwrap()["ecoflow-http"], "^1.0.0");

        let restarted = registry(tmp.path(), packages);
        assert_eq!(restarted.init_from_disk().await.unwrap(), 1);
        assert_eq!(restarted.installed_modules()[0].version, "1.0.0");
    }

    #[tokio::test]
    async fn racing_install_and_remove_of_one_package_stay_consistent() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new().with_delay(Duration::from_millis(20)));
        packages.publish(http_package("1.0.0"));
        let registry = registry(tmp.path(), packages);

        let mid_install = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            registry.installed_modules().len()
        };
        let (installed, removed, seen_mid_install) = tokio::join!(
            registry.install_module("ecoflow-http", None),
            registry.remove_module("ecoflow-http"),
            mid_install,
        );
        installed.unwrap();
        removed.unwrap();

        // the half-installed package is never visible
        assert_eq!(seen_mid_install, 0);
        let in_catalog = !registry.installed_modules().is_empty();
        let in_manifest = read_dependencies(tmp.path()).unwrap().contains_key("ecoflow-http");
        assert_eq!(in_catalog, in_manifest);
        assert!(registry.locks.is_empty());
    }

    #[tokio::test]
    async fn concurrent_installs_of_distinct_packages_keep_every_dependency() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new().with_delay(Duration::from_millis(20)));
        packages.publish(http_package("1.0.0"));
        packages.publish(MockPackage::new("ecoflow-mail", "0.3.0").node("send", "Middleware", None));
        let current = registry(tmp.path(), packages.clone());

        let (http, mail) = tokio::join!(
            current.install_module("ecoflow-http", None),
            current.install_module("ecoflow-mail", None),
        );
        http.unwrap();
        mail.unwrap();

        let dependencies = read_dependencies(tmp.path()).unwrap();
        assert!(dependencies.contains_key("ecoflow-http"));
        assert!(dependencies.contains_key("ecoflow-mail"));

        let restarted = registry(tmp.path(), packages);
        assert_eq!(restarted.init_from_disk().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn lock_table_drains_after_operations() {
        let tmp = tempfile::tempdir().unwrap();
        let packages = Arc::new(MockPackages::new());
        packages.publish(http_package("1.0.0"));
        packages.archive("/uploads/local.tgz", MockPackage::new("local-nodes", "0.1.0").node("debug", "Debug", None));
        let registry = registry(tmp.path(), packages);

        registry.install_module("ecoflow-http", None).await.unwrap();
        registry.install_local_module(&[PathBuf::from("/uploads/local.tgz")]).await;
        registry.remove_module("ecoflow-http").await.unwrap();
        let _ = registry.install_module("missing", None).await;

        assert!(registry.locks.is_empty());
    }
}
