//! Keeps the local registry in step with the knowledge-base service.
//!
//! Mutations are applied to the registry first and then sent to the
//! service. A failed request is never rolled back by hand: the registry is
//! re-fetched from the server instead. Successful mutations schedule a
//! debounced refresh so bursts of edits cost one list call.

mod error;

pub use error::SyncError;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::client::{ImportSelection, KnowledgeService};
use crate::config::SyncConfig;
use crate::events::{EventBus, KnowledgeEvent, Notice};
use crate::knowledge::SourceId;
use crate::registry::{import_merge, AddOutcome, SharedRegistry};
use crate::scheduler::Debouncer;

/// Result of [`SyncCoordinator::remove_sources`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The request was accepted; `ids` were present locally and are gone.
    Removed { ids: Vec<SourceId> },
    /// Another removal is still running; nothing was done.
    AlreadyInFlight,
}

pub struct SyncCoordinator<S: KnowledgeService> {
    refresher: Refresher<S>,
    debouncer: Debouncer,
    removing: AtomicBool,
}

impl<S: KnowledgeService + 'static> SyncCoordinator<S> {
    pub fn new(
        service: Arc<S>,
        registry: SharedRegistry,
        events: EventBus,
        agent_id: impl Into<String>,
        config: &SyncConfig,
    ) -> Self {
        let lifetime = CancellationToken::new();
        let debouncer = Debouncer::new(Duration::from_millis(config.debounce_ms), lifetime.clone());
        Self {
            refresher: Refresher {
                service,
                registry,
                events,
                agent_id: Arc::from(agent_id.into()),
                lifetime,
            },
            debouncer,
            removing: AtomicBool::new(false),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.refresher.agent_id
    }

    /// Records that server-side data changed and schedules a refresh.
    ///
    /// Calls within the debounce window collapse into one re-fetch; each
    /// call restarts the timer.
    pub fn notify_mutation(&self) {
        let refresher = self.refresher.clone();
        self.debouncer.trigger(move || async move {
            if let Err(err) = refresher.run().await {
                tracing::warn!(error = %err, "Debounced refresh failed");
            }
        });
    }

    pub fn refresh_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Replaces the registry with the server's list right away.
    pub async fn refresh(&self) -> Result<usize, SyncError> {
        self.refresher.run().await
    }

    /// Removes sources optimistically.
    ///
    /// The sources leave the registry before the request is sent. If the
    /// service rejects it, the registry is re-fetched and the error is
    /// returned.
    pub async fn remove_sources(&self, ids: &[SourceId]) -> Result<RemovalOutcome, SyncError> {
        if ids.is_empty() {
            let err = SyncError::NothingToRemove;
            tracing::warn!(%err, "Removal rejected");
            self.refresher.events.notify(Notice::warning(err.to_string()));
            return Err(err);
        }
        if self
            .removing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Removal already in flight");
            return Ok(RemovalOutcome::AlreadyInFlight);
        }
        let _in_flight = InFlight(&self.removing);

        let removed: Vec<SourceId> = {
            let mut registry = self.refresher.registry.lock().await;
            ids.iter()
                .filter_map(|id| registry.remove(*id).map(|s| s.id))
                .collect()
        };
        self.refresher.events.emit(KnowledgeEvent::SourcesRemoved {
            ids: removed.clone(),
        });

        let agent_id = Arc::clone(&self.refresher.agent_id);
        let result = self
            .refresher
            .service
            .remove_knowledge_sources(&agent_id, ids)
            .await;

        if self.is_torn_down() {
            tracing::debug!("Ignoring removal result after teardown");
            return result
                .map(|_| RemovalOutcome::Removed { ids: removed })
                .map_err(Into::into);
        }

        match result {
            Ok(()) => {
                tracing::info!(count = removed.len(), "Knowledge sources removed");
                self.refresher.events.notify(Notice::success(format!(
                    "Removed {} knowledge source(s)",
                    removed.len()
                )));
                self.notify_mutation();
                Ok(RemovalOutcome::Removed { ids: removed })
            }
            Err(err) => {
                tracing::warn!(error = %err, "Removal failed, re-fetching sources");
                self.refresher
                    .events
                    .notify(Notice::error(format!("Failed to remove sources: {err}")));
                if let Err(refresh_err) = self.refresher.run().await {
                    tracing::warn!(error = %refresh_err, "Re-fetch after failed removal failed");
                }
                Err(err.into())
            }
        }
    }

    /// Imports the sources in `selection` that are not already present.
    ///
    /// Returns the ids that were added to the registry.
    pub async fn import(&self, selection: ImportSelection) -> Result<Vec<SourceId>, SyncError> {
        let merged = {
            let registry = self.refresher.registry.lock().await;
            import_merge(
                &selection.sources,
                registry.sources(),
                Some(&selection.accepted_urls),
            )
        };
        if merged.is_empty() {
            let err = SyncError::NothingToImport;
            tracing::warn!(%err, "Import rejected");
            self.refresher.events.notify(Notice::warning(err.to_string()));
            return Err(err);
        }

        let request = ImportSelection {
            sources: merged,
            accepted_urls: selection.accepted_urls,
        };
        let result = self
            .refresher
            .service
            .import_sources(&self.refresher.agent_id, &request)
            .await;
        if self.is_torn_down() {
            tracing::debug!("Ignoring import result after teardown");
            return result.map(|_| Vec::new()).map_err(Into::into);
        }
        let stored = match result {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(error = %err, "Import failed");
                self.refresher
                    .events
                    .notify(Notice::error(format!("Failed to import sources: {err}")));
                return Err(err.into());
            }
        };

        let added: Vec<SourceId> = {
            let mut registry = self.refresher.registry.lock().await;
            stored
                .into_iter()
                .filter_map(|source| {
                    let id = source.id;
                    (registry.add(source) == AddOutcome::Added).then_some(id)
                })
                .collect()
        };
        tracing::info!(count = added.len(), "Knowledge sources imported");
        self.refresher
            .events
            .emit(KnowledgeEvent::SourcesImported { ids: added.clone() });
        self.refresher.events.notify(Notice::success(format!(
            "Imported {} knowledge source(s)",
            added.len()
        )));
        self.notify_mutation();
        Ok(added)
    }

    /// Cancels the pending refresh. Results that arrive later are ignored.
    pub fn teardown(&self) {
        self.refresher.lifetime.cancel();
        self.debouncer.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.refresher.lifetime.is_cancelled()
    }
}

impl<S: KnowledgeService> Drop for SyncCoordinator<S> {
    fn drop(&mut self) {
        self.refresher.lifetime.cancel();
    }
}

/// Everything a refresh needs, cloneable into a scheduled task.
struct Refresher<S> {
    service: Arc<S>,
    registry: SharedRegistry,
    events: EventBus,
    agent_id: Arc<str>,
    lifetime: CancellationToken,
}

impl<S> Clone for Refresher<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            registry: Arc::clone(&self.registry),
            events: self.events.clone(),
            agent_id: Arc::clone(&self.agent_id),
            lifetime: self.lifetime.clone(),
        }
    }
}

impl<S: KnowledgeService> Refresher<S> {
    async fn run(&self) -> Result<usize, SyncError> {
        let result = self.service.list_knowledge_sources(&self.agent_id).await;
        if self.lifetime.is_cancelled() {
            tracing::debug!("Ignoring refresh result after teardown");
            return Ok(self.registry.lock().await.len());
        }
        let sources = match result {
            Ok(sources) => sources,
            Err(err) => {
                self.events
                    .notify(Notice::error(format!("Failed to load knowledge sources: {err}")));
                return Err(err.into());
            }
        };

        let mut registry = self.registry.lock().await;
        if self.lifetime.is_cancelled() {
            tracing::debug!("Ignoring refresh result after teardown");
            return Ok(registry.len());
        }
        registry.replace_all(sources);
        let count = registry.len();
        drop(registry);

        tracing::info!(count, "Registry refreshed");
        self.events.emit(KnowledgeEvent::RegistryRefreshed { count });
        Ok(count)
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
