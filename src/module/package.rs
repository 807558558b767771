/// Package manager and package index boundaries
///
/// The registry installs and removes module packages through a
/// [`PackageManager`] and discovers them through a [`PackageIndex`]. The
/// default implementations shell out to npm/yarn/pnpm and query an
/// npm-compatible registry over HTTP.

use crate::module::types::{PackageSummary, SearchQuery, SearchResults};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tokio::process::Command;

/// Installs and removes packages inside a working directory
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Add a registry dependency; `spec` is `name` or `name@version`
    async fn add_dependency(&self, spec: &str, cwd: &Path) -> Result<()>;

    /// Add a dependency from a local archive and return the installed package name
    async fn add_local_dependency(&self, archive: &Path, cwd: &Path) -> Result<String>;

    async fn remove_dependency(&self, name: &str, cwd: &Path) -> Result<()>;

    /// Install everything listed in the dependency manifest
    async fn install_dependencies(&self, cwd: &Path) -> Result<()>;
}

/// Queries the remote package index
#[async_trait]
pub trait PackageIndex: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults>;

    /// Every published version of `name` (empty when the package is unknown)
    async fn versions(&self, name: &str) -> Result<Vec<String>>;
}

/// Supported package manager binaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManagerKind {
    Npm,
    Yarn,
    Pnpm,
}

impl PackageManagerKind {
    /// Pick the package manager from the lockfile in `dir` (npm when none is present)
    pub fn detect(dir: &Path) -> Self {
        if dir.join("pnpm-lock.yaml").exists() {
            Self::Pnpm
        } else if dir.join("yarn.lock").exists() {
            Self::Yarn
        } else {
            Self::Npm
        }
    }

    fn program(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }

    fn add_args(&self) -> &'static [&'static str] {
        match self {
            Self::Npm => &["install", "--save"],
            Self::Yarn | Self::Pnpm => &["add"],
        }
    }

    fn remove_args(&self) -> &'static [&'static str] {
        match self {
            Self::Npm => &["uninstall", "--save"],
            Self::Yarn | Self::Pnpm => &["remove"],
        }
    }
}

/// Dependency names listed in `<dir>/package.json`
pub fn read_dependencies(dir: &Path) -> Result<BTreeMap<String, String>> {
    let manifest_path = dir.join("package.json");
    if !manifest_path.exists() {
        return Ok(BTreeMap::new());
    }

    let raw = std::fs::read_to_string(&manifest_path)?;
    let manifest: Value = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid dependency manifest '{}': {}", manifest_path.display(), e))?;

    Ok(manifest
        .get("dependencies")
        .and_then(Value::as_object)
        .map(|deps| {
            deps.iter()
                .map(|(name, version)| (name.clone(), version.as_str().unwrap_or_default().to_string()))
                .collect()
        })
        .unwrap_or_default())
}

/// Create `<dir>/package.json` if it does not exist yet
pub fn ensure_manifest(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow::anyhow!("Failed to create module directory '{}': {}", dir.display(), e))?;

    let manifest_path = dir.join("package.json");
    if !manifest_path.exists() {
        let manifest = json!({
            "name": "ecoflow-modules",
            "private": true,
            "dependencies": {}
        });
        std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
        tracing::info!("📝 Created dependency manifest: {}", manifest_path.display());
    }

    Ok(())
}

/// Package manager that runs the npm/yarn/pnpm binary detected for the directory
#[derive(Debug, Clone, Default)]
pub struct CommandPackageManager {
    /// Force a specific binary instead of detecting from lockfiles
    pub kind: Option<PackageManagerKind>,
}

impl CommandPackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    async fn run(&self, cwd: &Path, args: &[&str]) -> Result<()> {
        ensure_manifest(cwd)?;
        let kind = self.kind_for(cwd);

        tracing::debug!("⚙️ Running {} {} in {}", kind.program(), args.join(" "), cwd.display());
        let output = Command::new(kind.program())
            .args(args)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start {}: {}", kind.program(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "{} {} exited with {}: {}",
                kind.program(),
                args.join(" "),
                output.status,
                stderr.trim()
            ));
        }

        Ok(())
    }

    fn kind_for(&self, cwd: &Path) -> PackageManagerKind {
        self.kind.unwrap_or_else(|| PackageManagerKind::detect(cwd))
    }
}

#[async_trait]
impl PackageManager for CommandPackageManager {
    async fn add_dependency(&self, spec: &str, cwd: &Path) -> Result<()> {
        let kind = self.kind_for(cwd);
        let mut args: Vec<&str> = kind.add_args().to_vec();
        args.push(spec);
        self.run(cwd, &args).await
    }

    async fn add_local_dependency(&self, archive: &Path, cwd: &Path) -> Result<String> {
        let before = read_dependencies(cwd)?;

        let archive = archive.to_string_lossy().into_owned();
        let kind = self.kind_for(cwd);
        let mut args: Vec<&str> = kind.add_args().to_vec();
        args.push(archive.as_str());
        self.run(cwd, &args).await?;

        let after = read_dependencies(cwd)?;
        let file_name = Path::new(&archive)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        // A new key, or a reinstall of an already-listed package from the same archive
        after
            .iter()
            .find(|(name, _)| !before.contains_key(*name))
            .or_else(|| after.iter().find(|(_, source)| !file_name.is_empty() && source.ends_with(&file_name)))
            .map(|(name, _)| name.clone())
            .ok_or_else(|| anyhow::anyhow!("Could not determine the package installed from '{}'", archive))
    }

    async fn remove_dependency(&self, name: &str, cwd: &Path) -> Result<()> {
        let kind = self.kind_for(cwd);
        let mut args: Vec<&str> = kind.remove_args().to_vec();
        args.push(name);
        self.run(cwd, &args).await
    }

    async fn install_dependencies(&self, cwd: &Path) -> Result<()> {
        self.run(cwd, &["install"]).await
    }
}

/// npm-compatible registry client
#[derive(Debug, Clone)]
pub struct NpmRegistryIndex {
    client: reqwest::Client,
    base_url: String,
    /// Keyword every module package carries
    keyword: String,
}

#[derive(Debug, Deserialize)]
struct NpmSearchResponse {
    #[serde(default)]
    objects: Vec<NpmSearchObject>,
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct NpmSearchObject {
    package: NpmSearchPackage,
}

#[derive(Debug, Deserialize)]
struct NpmSearchPackage {
    name: String,
    version: String,
    #[serde(default)]
    description: Option<String>,
}

impl NpmRegistryIndex {
    pub fn new(base_url: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            keyword: keyword.into(),
        }
    }

    fn search_text(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            format!("keywords:{}", self.keyword)
        } else {
            format!("{} keywords:{}", text, self.keyword)
        }
    }
}

#[async_trait]
impl PackageIndex for NpmRegistryIndex {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        let url = format!("{}/-/v1/search", self.base_url);
        let size = query.size.unwrap_or(20).to_string();
        let from = query.from.unwrap_or(0).to_string();
        let text = self.search_text(&query.text);

        tracing::debug!("🔍 Searching package index: {}", text);
        let response: NpmSearchResponse = self
            .client
            .get(&url)
            .query(&[("text", text.as_str()), ("size", size.as_str()), ("from", from.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(SearchResults {
            total: response.total,
            packages: response
                .objects
                .into_iter()
                .map(|object| PackageSummary {
                    name: object.package.name,
                    version: object.package.version,
                    description: object.package.description,
                    installed: false,
                })
                .collect(),
        })
    }

    async fn versions(&self, name: &str) -> Result<Vec<String>> {
        let url = format!("{}/{}", self.base_url, name.replace('/', "%2F"));
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let document: Value = response.error_for_status()?.json().await?;
        Ok(document
            .get("versions")
            .and_then(Value::as_object)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default())
    }
}

/// Installed package directory for `name` inside the module workspace
pub fn package_dir(modules_dir: &Path, name: &str) -> PathBuf {
    modules_dir.join("node_modules").join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_package_manager_from_lockfile() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(PackageManagerKind::detect(tmp.path()), PackageManagerKind::Npm);

        std::fs::write(tmp.path().join("yarn.lock"), "").unwrap();
        assert_eq!(PackageManagerKind::detect(tmp.path()), PackageManagerKind::Yarn);

        std::fs::write(tmp.path().join("pnpm-lock.yaml"), "").unwrap();
        assert_eq!(PackageManagerKind::detect(tmp.path()), PackageManagerKind::Pnpm);
    }

    #[test]
    fn ensure_manifest_creates_empty_dependency_list() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("modules");

        ensure_manifest(&dir).unwrap();
        assert!(read_dependencies(&dir).unwrap().is_empty());

        std::fs::write(
            dir.join("package.json"),
            r#"{ "dependencies": { "ecoflow-http": "^1.0.0" } }"#,
        )
        .unwrap();
        ensure_manifest(&dir).unwrap();
        assert_eq!(
            read_dependencies(&dir).unwrap().get("ecoflow-http").map(String::as_str),
            Some("^1.0.0")
        );
    }

    #[test]
    fn search_text_always_carries_keyword() {
        let index = NpmRegistryIndex::new("https://registry.example.com/", "ecoflow");
        assert_eq!(index.search_text(""), "keywords:ecoflow");
        assert_eq!(index.search_text(" http "), "http keywords:ecoflow");
        assert_eq!(index.base_url, "https://registry.example.com");
    }

    #[test]
    fn scoped_packages_nest_under_node_modules() {
        let dir = package_dir(Path::new("/srv/modules"), "@acme/nodes");
        assert_eq!(dir, PathBuf::from("/srv/modules/node_modules/@acme/nodes"));
    }
}
