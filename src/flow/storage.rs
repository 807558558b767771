/// File persistence for deployed flows
///
/// All deployed flows live in one JSON document, `<flows dir>/flows.json`.
/// A deploy replaces the whole document; the write goes to a temp file first
/// and is renamed into place.

use crate::flow::types::Flow;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const FLOWS_FILE: &str = "flows.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct FlowsDocument {
    #[serde(default)]
    flows: Vec<Flow>,
}

/// JSON-file flow storage
#[derive(Debug, Clone)]
pub struct FlowStorage {
    dir: PathBuf,
}

impl FlowStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(FLOWS_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every deployed flow; a missing file means nothing is deployed yet
    pub async fn load_all(&self) -> Result<Vec<Flow>> {
        let path = self.path();
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }

        let raw = tokio::fs::read_to_string(&path).await?;
        let document: FlowsDocument = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Corrupted flows file {}: {}", path.display(), e))?;
        Ok(document.flows)
    }

    /// Replace the deployed flow set
    pub async fn save_all(&self, flows: &[Flow]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let document = FlowsDocument { flows: flows.to_vec() };
        let staging = self.dir.join(format!("{FLOWS_FILE}.tmp"));
        tokio::fs::write(&staging, serde_json::to_vec_pretty(&document)?).await?;
        tokio::fs::rename(&staging, self.path()).await?;

        tracing::debug!("💾 Saved {} flows to {}", flows.len(), self.path().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_loads_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FlowStorage::new(tmp.path().join("never-created"));
        assert!(storage.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_replaces_the_whole_set() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FlowStorage::new(tmp.path().join("flows"));

        let first: Flow = serde_json::from_value(json!({ "name": "a", "nodes": [{ "id": "n1", "type": "Request" }] })).unwrap();
        let second: Flow = serde_json::from_value(json!({ "name": "b" })).unwrap();

        storage.save_all(&[first, second.clone()]).await.unwrap();
        let loaded = storage.load_all().await.unwrap();
        assert_eq!(loaded.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(loaded[0].nodes[0].id, "n1");

        storage.save_all(&[second]).await.unwrap();
        assert_eq!(storage.load_all().await.unwrap().len(), 1);
        assert!(!storage.dir().join("flows.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupted_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FlowStorage::new(tmp.path());
        std::fs::write(storage.path(), "{ not json").unwrap();
        assert!(storage.load_all().await.is_err());
    }
}
