use std::fs;
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;

use super::error::StorageError;
use super::{RegistrySnapshot, Storage};

/// File-based storage implementation.
///
/// ```text
/// .kbtrain/
///   current                      # Current agent ID
///   agents/{agent-id}/
///     registry.json              # RegistrySnapshot
/// ```
pub struct FileStorage {
    base_path: PathBuf,
    config: StorageConfig,
}

impl FileStorage {
    /// Creates a new FileStorage with default config.
    pub fn new() -> Self {
        Self::with_config(StorageConfig::default())
    }

    /// Creates a new FileStorage with custom configuration.
    pub fn with_config(config: StorageConfig) -> Self {
        let base_path = PathBuf::from(&config.data_dir);
        Self { base_path, config }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn agents_dir(&self) -> PathBuf {
        self.base_path.join(&self.config.agents_dir)
    }

    fn agent_dir(&self, agent_id: &str) -> Result<PathBuf, StorageError> {
        check_agent_id(agent_id)?;
        Ok(self.agents_dir().join(agent_id))
    }

    fn snapshot_file(&self, agent_id: &str) -> Result<PathBuf, StorageError> {
        Ok(self.agent_dir(agent_id)?.join(&self.config.snapshot_file))
    }

    fn current_file(&self) -> PathBuf {
        self.base_path.join(&self.config.current_file)
    }
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Agent ids become directory names, so anything that could escape the
/// agents directory is refused.
fn check_agent_id(agent_id: &str) -> Result<(), StorageError> {
    let invalid = agent_id.trim().is_empty()
        || agent_id == "."
        || agent_id == ".."
        || agent_id.contains(['/', '\\']);
    if invalid {
        return Err(StorageError::InvalidAgentId(agent_id.to_string()));
    }
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<(), StorageError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
    }
    Ok(())
}

impl Storage for FileStorage {
    fn save_snapshot(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError> {
        ensure_dir(&self.agent_dir(&snapshot.agent_id)?)?;

        let path = self.snapshot_file(&snapshot.agent_id)?;
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, json).map_err(|e| StorageError::io(&path, e))?;

        tracing::debug!(
            agent_id = %snapshot.agent_id,
            path = %path.display(),
            "Saved registry snapshot"
        );
        Ok(())
    }

    fn load_snapshot(&self, agent_id: &str) -> Result<RegistrySnapshot, StorageError> {
        let path = self.snapshot_file(agent_id)?;
        if !path.exists() {
            return Err(StorageError::SnapshotNotFound(agent_id.to_string()));
        }

        let json = fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))?;
        let snapshot: RegistrySnapshot = serde_json::from_str(&json)?;

        Ok(snapshot)
    }

    fn delete_snapshot(&self, agent_id: &str) -> Result<(), StorageError> {
        let dir = self.agent_dir(agent_id)?;
        if !dir.exists() {
            return Err(StorageError::SnapshotNotFound(agent_id.to_string()));
        }

        fs::remove_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        // Clear current if this was the current agent
        if let Ok(Some(current_id)) = self.get_current_agent_id() {
            if current_id == agent_id {
                self.set_current_agent_id(None)?;
            }
        }

        Ok(())
    }

    fn list_agents(&self) -> Result<Vec<String>, StorageError> {
        let agents_dir = self.agents_dir();
        if !agents_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&agents_dir).map_err(|e| StorageError::io(&agents_dir, e))?;

        let mut agents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&agents_dir, e))?;
            let path = entry.path();
            if !path.join(&self.config.snapshot_file).is_file() {
                continue;
            }
            if let Some(id) = path.file_name().and_then(|n| n.to_str()) {
                agents.push(id.to_string());
            }
        }
        agents.sort();

        Ok(agents)
    }

    fn get_current_agent_id(&self) -> Result<Option<String>, StorageError> {
        let path = self.current_file();
        if !path.exists() {
            return Ok(None);
        }

        let id = fs::read_to_string(&path)
            .map_err(|e| StorageError::io(&path, e))?
            .trim()
            .to_string();

        if id.is_empty() {
            Ok(None)
        } else {
            Ok(Some(id))
        }
    }

    fn set_current_agent_id(&self, id: Option<&str>) -> Result<(), StorageError> {
        let path = self.current_file();
        ensure_dir(&self.base_path)?;

        match id {
            Some(id) => {
                check_agent_id(id)?;
                fs::write(&path, id).map_err(|e| StorageError::io(&path, e))?;
            }
            None => {
                if path.exists() {
                    fs::remove_file(&path).map_err(|e| StorageError::io(&path, e))?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_rejects_traversal() {
        assert!(check_agent_id("support-bot").is_ok());
        assert!(check_agent_id("..").is_err());
        assert!(check_agent_id("a/b").is_err());
        assert!(check_agent_id("  ").is_err());
    }
}
