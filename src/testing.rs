/// Testing utilities: an in-memory package manager and package index
///
/// `MockPackages` plays both external collaborators of the module registry.
/// Packages are "published" in memory and written into the module workspace
/// (node_modules + package.json) when installed, exactly where the real
/// package manager would put them, so the real loader runs against them.
///
/// ```ignore
/// let packages = Arc::new(MockPackages::new());
/// packages.publish(MockPackage::new("ecoflow-http", "1.0.0").node("request", "Request", Some("-- lua")));
/// let registry = ModuleRegistry::new(&config, packages.clone(), packages, Arc::new(LuaPluginLoader));
/// ```

use crate::module::{
    package::{ensure_manifest, package_dir, PackageIndex, PackageManager},
    types::{PackageSummary, SearchQuery, SearchResults},
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

/// A package fixture: its package.json plus the files it ships
#[derive(Debug, Clone)]
pub struct MockPackage {
    pub name: String,
    pub version: String,
    manifest: Value,
    files: Vec<(String, String)>,
}

impl MockPackage {
    /// A package with no node manifest (not a loadable module until a node is added)
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            manifest: json!({ "name": name, "version": version, "description": format!("{name} fixture") }),
            files: Vec::new(),
        }
    }

    /// Declare a node; a script makes it export a Lua controller at `nodes/{name}.lua`
    pub fn node(mut self, name: &str, node_type: &str, script: Option<&str>) -> Self {
        let mut entry = json!({ "name": name, "type": node_type });
        if let Some(source) = script {
            let path = format!("nodes/{name}.lua");
            entry["controller"] = json!(path);
            self.files.push((path, source.to_string()));
        }

        if self.manifest.get("ecoflow").is_none() {
            self.manifest["ecoflow"] = json!({ "nodes": [] });
        }
        if let Some(nodes) = self.manifest["ecoflow"]["nodes"].as_array_mut() {
            nodes.push(entry);
        }
        self
    }

    fn write_to(&self, modules_dir: &Path) -> Result<()> {
        let root = package_dir(modules_dir, &self.name);
        if root.exists() {
            std::fs::remove_dir_all(&root)?;
        }
        std::fs::create_dir_all(&root)?;
        std::fs::write(root.join("package.json"), serde_json::to_string_pretty(&self.manifest)?)?;

        for (path, source) in &self.files {
            let target = root.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, source)?;
        }
        Ok(())
    }
}

/// In-memory package manager and index
#[derive(Debug, Default)]
pub struct MockPackages {
    /// Key: package name, Value: published versions in publish order
    published: Mutex<BTreeMap<String, Vec<MockPackage>>>,
    /// Key: archive path
    archives: Mutex<HashMap<PathBuf, MockPackage>>,
    /// Artificial latency for every package-manager call
    delay: Option<Duration>,
}

impl MockPackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make a package version installable by name; the last published version is "latest"
    pub fn publish(&self, package: MockPackage) {
        if let Ok(mut published) = self.published.lock() {
            published.entry(package.name.clone()).or_default().push(package);
        }
    }

    /// Make a package installable from a local archive path
    pub fn archive(&self, path: impl Into<PathBuf>, package: MockPackage) {
        if let Ok(mut archives) = self.archives.lock() {
            archives.insert(path.into(), package);
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn resolve(&self, spec: &str) -> Result<MockPackage> {
        // "@scope/name@1.0.0" splits on the last '@' that is not the scope marker
        let (name, version) = match spec.rfind('@') {
            Some(at) if at > 0 => (&spec[..at], Some(&spec[at + 1..])),
            _ => (spec, None),
        };

        let published = self.published.lock().map_err(|_| anyhow::anyhow!("mock poisoned"))?;
        let versions = published
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("404 Not Found - '{}' is not in the registry", name))?;

        match version {
            Some(version) => versions.iter().find(|p| p.version == version).cloned(),
            None => versions.last().cloned(),
        }
        .ok_or_else(|| anyhow::anyhow!("No matching version found for {}", spec))
    }

    /// Read-modify-write of package.json with the artificial latency in between,
    /// like a real package manager that is not safe to run twice on one project
    async fn set_dependency(&self, cwd: &Path, name: &str, source: Option<&str>) -> Result<()> {
        ensure_manifest(cwd)?;
        let manifest_path = cwd.join("package.json");
        let mut manifest: Value = serde_json::from_str(&std::fs::read_to_string(&manifest_path)?)?;
        self.pause().await;

        if manifest.get("dependencies").and_then(Value::as_object).is_none() {
            manifest["dependencies"] = json!({});
        }
        if let Some(deps) = manifest["dependencies"].as_object_mut() {
            match source {
                Some(source) => {
                    deps.insert(name.to_string(), json!(source));
                }
                None => {
                    deps.remove(name);
                }
            }
        }

        std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
        Ok(())
    }
}

#[async_trait]
impl PackageManager for MockPackages {
    async fn add_dependency(&self, spec: &str, cwd: &Path) -> Result<()> {
        self.pause().await;
        let package = self.resolve(spec)?;
        package.write_to(cwd)?;
        self.set_dependency(cwd, &package.name, Some(&format!("^{}", package.version)))
            .await
    }

    async fn add_local_dependency(&self, archive: &Path, cwd: &Path) -> Result<String> {
        self.pause().await;
        let package = self
            .archives
            .lock()
            .map_err(|_| anyhow::anyhow!("mock poisoned"))?
            .get(archive)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("ENOENT: no such file '{}'", archive.display()))?;

        package.write_to(cwd)?;
        self.set_dependency(cwd, &package.name, Some(&format!("file:{}", archive.display())))
            .await?;
        Ok(package.name)
    }

    async fn remove_dependency(&self, name: &str, cwd: &Path) -> Result<()> {
        self.pause().await;
        let root = package_dir(cwd, name);
        if root.exists() {
            std::fs::remove_dir_all(root)?;
        }
        self.set_dependency(cwd, name, None).await
    }

    async fn install_dependencies(&self, _cwd: &Path) -> Result<()> {
        self.pause().await;
        Ok(())
    }
}

#[async_trait]
impl PackageIndex for MockPackages {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        let published = self.published.lock().map_err(|_| anyhow::anyhow!("mock poisoned"))?;
        let matches: Vec<PackageSummary> = published
            .iter()
            .filter(|(name, _)| name.contains(query.text.trim()))
            .filter_map(|(_, versions)| versions.last())
            .map(|package| PackageSummary {
                name: package.name.clone(),
                version: package.version.clone(),
                description: package.manifest.get("description").and_then(Value::as_str).map(String::from),
                installed: false,
            })
            .collect();

        let total = matches.len();
        let from = query.from.unwrap_or(0);
        let size = query.size.unwrap_or(20);

        Ok(SearchResults {
            total,
            packages: matches.into_iter().skip(from).take(size).collect(),
        })
    }

    async fn versions(&self, name: &str) -> Result<Vec<String>> {
        let published = self.published.lock().map_err(|_| anyhow::anyhow!("mock poisoned"))?;
        Ok(published
            .get(name)
            .map(|versions| versions.iter().map(|p| p.version.clone()).collect())
            .unwrap_or_default())
    }
}
