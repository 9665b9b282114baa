//! The in-memory collection of an agent's knowledge sources.
//!
//! The registry is the single source of truth for source and tree state.
//! The training orchestrator and sync coordinator hold a [`SharedRegistry`]
//! and change sources only through its methods.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::knowledge::selection::narrow_to;
use crate::knowledge::{KnowledgeSource, SourceId};
use crate::training::{BatchProgress, TrainingStatus};

/// Registry shared between the orchestrator, the sync coordinator and the UI.
pub type SharedRegistry = Arc<Mutex<SourceRegistry>>;

/// Per-source set of accepted URLs/locations used to narrow an import.
pub type AcceptedUrls = HashMap<SourceId, HashSet<String>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Knowledge source not found: {0}")]
    SourceNotFound(SourceId),
}

/// Result of [`SourceRegistry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// A source with the same id already exists; the new one was dropped.
    Duplicate,
}

/// Ordered collection of knowledge sources with unique ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRegistry {
    sources: Vec<KnowledgeSource>,
    /// Sources currently picked for the next train-all run.
    #[serde(default)]
    training_set: BTreeSet<SourceId>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list, dropping duplicate ids (first wins).
    pub fn from_sources(sources: Vec<KnowledgeSource>) -> Self {
        let mut registry = Self::new();
        for source in sources {
            registry.add(source);
        }
        registry
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    /// Appends a source. Duplicates are dropped, never rejected.
    pub fn add(&mut self, source: KnowledgeSource) -> AddOutcome {
        if self.contains(source.id) {
            tracing::debug!(source_id = source.id, "Dropping duplicate knowledge source");
            return AddOutcome::Duplicate;
        }
        self.sources.push(source);
        AddOutcome::Added
    }

    /// Removes a source and forgets it in the training working set.
    pub fn remove(&mut self, id: SourceId) -> Option<KnowledgeSource> {
        self.training_set.remove(&id);
        let index = self.sources.iter().position(|s| s.id == id)?;
        Some(self.sources.remove(index))
    }

    pub fn get(&self, id: SourceId) -> Option<&KnowledgeSource> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.get(id).is_some()
    }

    pub fn sources(&self) -> &[KnowledgeSource] {
        &self.sources
    }

    pub fn ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Replaces source `id` with `f(source)`.
    ///
    /// The id of the returned value is forced back to `id` so an update can
    /// never alias another source.
    pub fn update<F>(&mut self, id: SourceId, f: F) -> Result<&KnowledgeSource, RegistryError>
    where
        F: FnOnce(&KnowledgeSource) -> KnowledgeSource,
    {
        let slot = self
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RegistryError::SourceNotFound(id))?;
        let mut next = f(&*slot);
        next.id = id;
        *slot = next;
        Ok(&*slot)
    }

    /// Runs `f` against the training status of source `id`.
    pub fn update_status<T, F>(&mut self, id: SourceId, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&mut TrainingStatus) -> T,
    {
        let source = self
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RegistryError::SourceNotFound(id))?;
        Ok(f(&mut source.training))
    }

    /// Replaces the whole collection with a server snapshot.
    ///
    /// A source that is training locally keeps its local status, since the
    /// server has not seen the job finish yet. Ids that vanished are dropped
    /// from the training working set.
    pub fn replace_all(&mut self, snapshot: Vec<KnowledgeSource>) {
        let in_flight: HashMap<SourceId, TrainingStatus> = self
            .sources
            .iter()
            .filter(|s| s.training.is_training())
            .map(|s| (s.id, s.training.clone()))
            .collect();

        let mut next = SourceRegistry::from_sources(snapshot);
        for source in &mut next.sources {
            if let Some(status) = in_flight.get(&source.id) {
                source.training = status.clone();
            }
        }
        next.training_set = self
            .training_set
            .iter()
            .copied()
            .filter(|id| next.contains(*id))
            .collect();
        *self = next;
    }

    /// Applies updated snapshots for a subset of sources.
    ///
    /// Unknown ids are ignored; an in-flight local training status wins over
    /// the server's copy.
    pub fn reconcile(&mut self, updated: Vec<KnowledgeSource>) -> usize {
        let mut applied = 0;
        for mut incoming in updated {
            if let Some(slot) = self.sources.iter_mut().find(|s| s.id == incoming.id) {
                if slot.training.is_training() {
                    incoming.training = slot.training.clone();
                }
                *slot = incoming;
                applied += 1;
            }
        }
        applied
    }

    /// Marks a source for the next train-all run.
    pub fn select_for_training(&mut self, id: SourceId) -> Result<(), RegistryError> {
        if !self.contains(id) {
            return Err(RegistryError::SourceNotFound(id));
        }
        self.training_set.insert(id);
        Ok(())
    }

    pub fn deselect_for_training(&mut self, id: SourceId) -> bool {
        self.training_set.remove(&id)
    }

    /// Ids in the training working set, in ascending order.
    pub fn training_set(&self) -> Vec<SourceId> {
        self.training_set.iter().copied().collect()
    }

    /// Aggregate progress of the given members (missing ids are skipped).
    pub fn batch_progress(&self, ids: &[SourceId]) -> BatchProgress {
        BatchProgress::from_statuses(ids.iter().filter_map(|id| self.get(*id)).map(|s| &s.training))
    }
}

/// Filters `external` down to sources not already in `current`.
///
/// Duplicate ids inside `external` are dropped as well (first wins). When
/// `accepted` has an entry for a source, the returned copy has exactly
/// those locations selected. Inputs are never mutated.
pub fn import_merge(
    external: &[KnowledgeSource],
    current: &[KnowledgeSource],
    accepted: Option<&AcceptedUrls>,
) -> Vec<KnowledgeSource> {
    let mut seen: HashSet<SourceId> = current.iter().map(|s| s.id).collect();
    external
        .iter()
        .filter(|s| seen.insert(s.id))
        .map(|s| match accepted.and_then(|a| a.get(&s.id)) {
            Some(urls) => narrow_to(s, urls),
            None => s.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{SourceKind, TreeNode};
    use crate::training::JobId;

    fn source(id: SourceId) -> KnowledgeSource {
        KnowledgeSource::new(id, format!("Source {id}"), SourceKind::Document)
    }

    #[test]
    fn test_add_drops_duplicates() {
        let mut registry = SourceRegistry::new();
        assert_eq!(registry.add(source(1)), AddOutcome::Added);
        assert_eq!(registry.add(source(1)), AddOutcome::Duplicate);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_clears_training_set() {
        let mut registry = SourceRegistry::from_sources(vec![source(1), source(2)]);
        registry.select_for_training(1).unwrap();
        registry.select_for_training(2).unwrap();

        assert!(registry.remove(1).is_some());
        assert_eq!(registry.training_set(), vec![2]);
        assert!(registry.remove(1).is_none());
    }

    #[test]
    fn test_update_keeps_id() {
        let mut registry = SourceRegistry::from_sources(vec![source(1), source(2)]);
        registry
            .update(1, |s| KnowledgeSource {
                id: 2,
                name: "Renamed".to_string(),
                ..s.clone()
            })
            .unwrap();

        assert_eq!(registry.get(1).unwrap().name, "Renamed");
        assert_eq!(registry.get(2).unwrap().name, "Source 2");
    }

    #[test]
    fn test_update_missing_source() {
        let mut registry = SourceRegistry::new();
        let result = registry.update(7, |s| s.clone());
        assert_eq!(result.unwrap_err(), RegistryError::SourceNotFound(7));
    }

    #[test]
    fn test_replace_all_keeps_in_flight_status() {
        let mut registry = SourceRegistry::from_sources(vec![source(1), source(2)]);
        registry.select_for_training(2).unwrap();
        let job = JobId::new();
        registry.update_status(1, |s| s.start(job)).unwrap();

        registry.replace_all(vec![source(1), source(3)]);

        assert!(registry.get(1).unwrap().training.is_training());
        assert_eq!(registry.ids(), vec![1, 3]);
        assert!(registry.training_set().is_empty());
    }

    #[test]
    fn test_import_merge_skips_existing() {
        let current = vec![source(1), source(2)];
        let external = vec![source(1), source(3)];

        let merged = import_merge(&external, &current, None);
        let ids: Vec<_> = merged.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_import_merge_narrows_selection() {
        let external = vec![source(5).with_inside_links(vec![
            TreeNode::url(1, "https://a.io/1", "1").selected(true),
            TreeNode::url(2, "https://a.io/2", "2"),
        ])];
        let mut accepted = AcceptedUrls::new();
        accepted.insert(5, ["https://a.io/2".to_string()].into_iter().collect());

        let merged = import_merge(&external, &[], Some(&accepted));
        let selected: Vec<_> = merged[0].leaves().filter(|n| n.is_selected).map(|n| n.id).collect();
        assert_eq!(selected, vec![2]);
        assert!(external[0].leaves().next().unwrap().is_selected);
    }
}
