use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::info;

use crate::agent::CreatedResources;

pub const DEFAULT_MANIFEST_FILE: &str = "session_tracking.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to access manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Resources recorded by a previous run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub agents: Vec<ManifestAgent>,
    #[serde(default)]
    pub threads: Vec<ManifestThread>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestAgent {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestThread {
    pub id: String,
    /// RFC 3339 when written by this tool; older files may carry unix seconds
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<String>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(text)) => Some(text),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

impl SessionManifest {
    pub fn from_resources(resources: &CreatedResources) -> Self {
        Self {
            timestamp: Some(Utc::now().to_rfc3339()),
            agents: resources
                .agents
                .iter()
                .map(|a| ManifestAgent {
                    id: a.id.clone(),
                    name: Some(a.name.clone()),
                })
                .collect(),
            threads: resources
                .threads
                .iter()
                .map(|t| ManifestThread {
                    id: t.id.clone(),
                    created_at: t.created_at.map(|c| c.to_rfc3339()),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.threads.is_empty()
    }

    /// Add entries not already recorded
    pub fn merge(&mut self, other: SessionManifest) {
        for agent in other.agents {
            if !self.agents.iter().any(|a| a.id == agent.id) {
                self.agents.push(agent);
            }
        }
        for thread in other.threads {
            if !self.threads.iter().any(|t| t.id == thread.id) {
                self.threads.push(thread);
            }
        }
        if other.timestamp.is_some() {
            self.timestamp = other.timestamp;
        }
    }
}

/// JSON file holding the session manifest
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no manifest has been written yet
    pub fn load(&self) -> Result<Option<SessionManifest>, ManifestError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| ManifestError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        let manifest = serde_json::from_str(&content).map_err(|e| ManifestError::Parse {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(Some(manifest))
    }

    pub fn save(&self, manifest: &SessionManifest) -> Result<(), ManifestError> {
        let content = serde_json::to_string_pretty(manifest)?;
        fs::write(&self.path, content).map_err(|e| ManifestError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Merge newly created resources into the stored manifest
    pub fn record(&self, resources: &CreatedResources) -> Result<SessionManifest, ManifestError> {
        let mut manifest = self.load()?.unwrap_or_default();
        manifest.merge(SessionManifest::from_resources(resources));
        self.save(&manifest)?;
        info!(
            path = %self.path.display(),
            agents = manifest.agents.len(),
            threads = manifest.threads.len(),
            "recorded session manifest"
        );
        Ok(manifest)
    }

    pub fn remove(&self) -> Result<(), ManifestError> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path).map_err(|e| ManifestError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{RemoteAgent, Thread};
    use tempfile::tempdir;

    fn resources() -> CreatedResources {
        CreatedResources {
            agents: vec![
                RemoteAgent {
                    id: "asst_1".into(),
                    name: "writer".into(),
                },
                RemoteAgent {
                    id: "asst_2".into(),
                    name: "lead".into(),
                },
            ],
            threads: vec![Thread {
                id: "thread_1".into(),
                created_at: None,
            }],
        }
    }

    #[test]
    fn test_store_record_and_load() {
        let dir = tempdir().unwrap();
        let store = ManifestStore::new(dir.path().join(DEFAULT_MANIFEST_FILE));

        assert!(store.load().unwrap().is_none());

        store.record(&resources()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.agents.len(), 2);
        assert_eq!(loaded.agents[0].name.as_deref(), Some("writer"));
        assert_eq!(loaded.threads[0].id, "thread_1");
        assert!(loaded.timestamp.is_some());

        // Recording the same resources again does not duplicate them
        let merged = store.record(&resources()).unwrap();
        assert_eq!(merged.agents.len(), 2);
        assert_eq!(merged.threads.len(), 1);

        store.remove().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_reads_loosely_shaped_manifest() {
        let manifest: SessionManifest = serde_json::from_str(
            r#"{
                "timestamp": "2025-05-01T10:00:00",
                "agents": [{"id": "asst_1"}, {"id": "asst_2", "name": "lead"}],
                "threads": [{"id": "thread_1", "created_at": 1746093600}, {"id": "thread_2"}]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.agents[0].name, None);
        assert_eq!(manifest.threads[0].created_at.as_deref(), Some("1746093600"));
        assert_eq!(manifest.threads[1].created_at, None);
    }

    #[test]
    fn test_empty_object_is_empty_manifest() {
        let manifest: SessionManifest = serde_json::from_str("{}").unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_corrupt_manifest_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"agents\": [").unwrap();

        let result = ManifestStore::new(&path).load();
        assert!(matches!(result, Err(ManifestError::Parse { .. })));
    }
}
