use std::collections::HashSet;
use thiserror::Error;

use crate::knowledge::selection::{set_subtree_in_source, toggle_in_source};
use crate::knowledge::{KnowledgeSource, NodeId, SelectionError, SourceId};
use crate::registry::{RegistryError, SourceRegistry};
use crate::storage::{RegistrySnapshot, Storage, StorageError};

/// A selection edit on one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionCommand {
    /// Flip a node; a branch flips its whole subtree.
    Toggle(NodeId),
    /// Set a node's subtree, or the whole source when `node` is `None`.
    Set { node: Option<NodeId>, selected: bool },
}

impl SelectionCommand {
    pub fn apply(&self, source: &KnowledgeSource) -> Result<KnowledgeSource, SelectionError> {
        match *self {
            SelectionCommand::Toggle(id) => toggle_in_source(source, id),
            SelectionCommand::Set { node, selected } => {
                set_subtree_in_source(source, node, selected)
            }
        }
    }
}

/// Loads, edits and saves agents' registries.
///
/// The manager works on persisted snapshots, so selection edits made from
/// the command line survive between runs. Nothing here talks to the
/// knowledge-base service.
pub struct KnowledgeManager<S: Storage> {
    storage: S,
}

impl<S: Storage> KnowledgeManager<S> {
    /// Creates a new KnowledgeManager with the given storage backend.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Picks the agent to work on: an explicit id first, then the stored
    /// current agent.
    pub fn resolve_agent(&self, explicit: Option<&str>) -> Result<String, ManagerError> {
        if let Some(id) = explicit {
            return Ok(id.to_string());
        }
        self.storage
            .get_current_agent_id()?
            .ok_or(ManagerError::NoAgent)
    }

    /// Gets the current agent ID (if any).
    pub fn current_agent(&self) -> Result<Option<String>, ManagerError> {
        Ok(self.storage.get_current_agent_id()?)
    }

    pub fn set_current_agent(&mut self, id: &str) -> Result<(), ManagerError> {
        self.storage.set_current_agent_id(Some(id))?;
        Ok(())
    }

    pub fn list_agents(&self) -> Result<Vec<String>, ManagerError> {
        Ok(self.storage.list_agents()?)
    }

    /// Loads an agent's registry. An agent never saved has an empty one.
    pub fn load_registry(&self, agent_id: &str) -> Result<SourceRegistry, ManagerError> {
        match self.storage.load_snapshot(agent_id) {
            Ok(snapshot) => Ok(snapshot.registry),
            Err(StorageError::SnapshotNotFound(_)) => {
                tracing::debug!(agent_id, "No saved registry, starting empty");
                Ok(SourceRegistry::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Saves an agent's registry and makes it the current agent.
    pub fn save_registry(
        &mut self,
        agent_id: &str,
        registry: &SourceRegistry,
    ) -> Result<(), ManagerError> {
        let snapshot = RegistrySnapshot::new(agent_id, registry.clone());
        self.storage.save_snapshot(&snapshot)?;
        self.storage.set_current_agent_id(Some(agent_id))?;
        Ok(())
    }

    /// Applies a selection edit to a saved source and persists the result.
    pub fn apply_selection(
        &mut self,
        agent_id: &str,
        source_id: SourceId,
        command: SelectionCommand,
    ) -> Result<KnowledgeSource, ManagerError> {
        self.edit_source(agent_id, source_id, |source| Ok(command.apply(source)?))
    }

    /// Drops leaves from a saved source and persists the result.
    pub fn remove_leaves(
        &mut self,
        agent_id: &str,
        source_id: SourceId,
        leaf_ids: &HashSet<NodeId>,
    ) -> Result<KnowledgeSource, ManagerError> {
        self.edit_source(agent_id, source_id, |source| Ok(source.remove_leaves(leaf_ids)))
    }

    /// Adds or removes a source from the saved training working set.
    pub fn mark_for_training(
        &mut self,
        agent_id: &str,
        source_id: SourceId,
        marked: bool,
    ) -> Result<Vec<SourceId>, ManagerError> {
        let mut registry = self.load_registry(agent_id)?;
        if marked {
            registry.select_for_training(source_id)?;
        } else {
            registry.deselect_for_training(source_id);
        }
        self.save_registry(agent_id, &registry)?;
        Ok(registry.training_set())
    }

    fn edit_source<F>(
        &mut self,
        agent_id: &str,
        source_id: SourceId,
        edit: F,
    ) -> Result<KnowledgeSource, ManagerError>
    where
        F: FnOnce(&KnowledgeSource) -> Result<KnowledgeSource, ManagerError>,
    {
        let mut registry = self.load_registry(agent_id)?;
        let current = registry
            .get(source_id)
            .ok_or(RegistryError::SourceNotFound(source_id))?;
        let next = edit(current)?;
        let updated = registry.update(source_id, |_| next)?.clone();
        self.save_registry(agent_id, &registry)?;
        Ok(updated)
    }
}

/// Errors that can occur in KnowledgeManager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("No agent selected. Pass --agent or set service.agent_id")]
    NoAgent,
}
