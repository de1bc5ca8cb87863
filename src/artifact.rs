//! Persisted model artifacts and their fixed-slot file store.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PortError, PortResult};
use crate::task::TaskType;

/// Result of a training run, tagged with the task it was trained for.
///
/// `payload` belongs to the engine that produced it; the orchestrator only
/// reads the tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    pub task_type: TaskType,
    pub target_column: Option<String>,
    /// Identifier of the engine that can interpret `payload`.
    pub engine: String,
    pub payload: serde_json::Value,
}

/// JSON files under one directory, one file per artifact name.
///
/// Saving under an existing name overwrites it: a name is a slot, not a history.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    pub fn save(&self, artifact: &ModelArtifact) -> PortResult<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(&artifact.name);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(artifact)
            .map_err(|e| PortError::Io(format!("serializing artifact '{}': {e}", artifact.name)))?;
        fs::write(&tmp, bytes)?;
        // Rename so a reader never observes a half-written slot.
        fs::rename(&tmp, &path)?;
        log::debug!("saved artifact '{}' to {}", artifact.name, path.display());
        Ok(path)
    }

    pub fn load(&self, name: &str) -> PortResult<ModelArtifact> {
        let path = self.path_for(name);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PortError::ArtifactNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| PortError::Io(format!("corrupt artifact {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(tag: &str) -> ArtifactStore {
        let dir = std::env::temp_dir()
            .join(format!("tabflow-artifacts-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        ArtifactStore::new(dir)
    }

    fn artifact(name: &str, task: TaskType) -> ModelArtifact {
        ModelArtifact {
            name: name.into(),
            task_type: task,
            target_column: Some("y".into()),
            engine: "test".into(),
            payload: serde_json::json!({ "k": 1 }),
        }
    }

    #[test]
    fn missing_artifact_is_classified() {
        let store = store("missing");
        assert_eq!(
            store.load("nothing").unwrap_err(),
            PortError::ArtifactNotFound("nothing".into())
        );
    }

    #[test]
    fn save_overwrites_the_slot() {
        let store = store("overwrite");
        store.save(&artifact("slot", TaskType::Classification)).unwrap();
        store.save(&artifact("slot", TaskType::Regression)).unwrap();

        let loaded = store.load("slot").unwrap();
        assert_eq!(loaded.task_type, TaskType::Regression);
        assert_eq!(loaded.target_column.as_deref(), Some("y"));
    }

    #[test]
    fn corrupt_file_is_an_io_error() {
        let store = store("corrupt");
        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.path_for("bad"), b"{not json").unwrap();
        assert!(matches!(store.load("bad"), Err(PortError::Io(_))));
    }
}
