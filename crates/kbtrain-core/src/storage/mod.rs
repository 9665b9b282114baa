mod error;
mod file;

pub use error::StorageError;
pub use file::FileStorage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::SourceRegistry;

/// A saved copy of one agent's registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub agent_id: String,
    pub registry: SourceRegistry,
    pub saved_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    pub fn new(agent_id: impl Into<String>, registry: SourceRegistry) -> Self {
        Self {
            agent_id: agent_id.into(),
            registry,
            saved_at: Utc::now(),
        }
    }
}

/// Trait for registry snapshot backends.
///
/// Implementations persist one snapshot per agent plus a pointer to the
/// agent the user last worked with.
pub trait Storage {
    /// Saves (or overwrites) an agent's snapshot.
    fn save_snapshot(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError>;

    /// Loads an agent's snapshot.
    fn load_snapshot(&self, agent_id: &str) -> Result<RegistrySnapshot, StorageError>;

    /// Deletes an agent's snapshot and its directory.
    fn delete_snapshot(&self, agent_id: &str) -> Result<(), StorageError>;

    /// Lists agents with a stored snapshot, sorted by id.
    fn list_agents(&self) -> Result<Vec<String>, StorageError>;

    /// Gets the current agent ID (if set).
    fn get_current_agent_id(&self) -> Result<Option<String>, StorageError>;

    /// Sets the current agent ID.
    fn set_current_agent_id(&self, id: Option<&str>) -> Result<(), StorageError>;
}
