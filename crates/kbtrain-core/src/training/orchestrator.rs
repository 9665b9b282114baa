use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{
    BatchProgress, BatchReport, JobId, MemberOutcome, TickOutcome, TrainingError,
    TrainingStatus, ValidationError,
};
use crate::client::{KnowledgeService, ServiceError, TrainReceipt};
use crate::config::TrainingConfig;
use crate::events::{EventBus, KnowledgeEvent, Notice};
use crate::knowledge::selection::selected_leaf_ids;
use crate::knowledge::{NodeId, SourceId};
use crate::registry::SharedRegistry;
use crate::scheduler::ScheduledTask;

/// How a training request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingOutcome {
    Succeeded,
    Failed { link_broken: bool, message: String },
    /// A job for this source was already running; nothing was started.
    AlreadyTraining,
    /// The orchestrator shut down, or the job was superseded, before it
    /// finished. The result was discarded; after a shutdown the source is
    /// back to `Idle`.
    Abandoned,
}

/// Drives the per-source training state machine.
///
/// All state lives in the shared registry. While a job is pending, a
/// progress ticker advances the source's progress up to the configured
/// ceiling; the job's completion pins it to 100.
pub struct TrainingOrchestrator<S: KnowledgeService> {
    service: Arc<S>,
    registry: SharedRegistry,
    events: EventBus,
    agent_id: String,
    config: TrainingConfig,
    lifetime: CancellationToken,
}

impl<S: KnowledgeService + 'static> TrainingOrchestrator<S> {
    pub fn new(
        service: Arc<S>,
        registry: SharedRegistry,
        events: EventBus,
        agent_id: impl Into<String>,
        config: TrainingConfig,
    ) -> Self {
        Self {
            service,
            registry,
            events,
            agent_id: agent_id.into(),
            config,
            lifetime: CancellationToken::new(),
        }
    }

    /// Trains every leaf of a source.
    pub async fn train_source(&self, id: SourceId) -> Result<TrainingOutcome, TrainingError> {
        let leaf_ids = {
            let registry = self.registry.lock().await;
            let source = registry
                .get(id)
                .ok_or(crate::registry::RegistryError::SourceNotFound(id))?;
            source.leaf_ids()
        };
        if leaf_ids.is_empty() {
            return Err(self.reject(ValidationError::NothingToTrain { source_id: id }));
        }
        Ok(self.run_job(id, leaf_ids).await)
    }

    /// Retrains a source using only its selected leaves.
    ///
    /// Zero selected leaves is a validation failure and starts no job.
    pub async fn retrain_with_selection(
        &self,
        id: SourceId,
    ) -> Result<TrainingOutcome, TrainingError> {
        let leaf_ids = {
            let registry = self.registry.lock().await;
            let source = registry
                .get(id)
                .ok_or(crate::registry::RegistryError::SourceNotFound(id))?;
            selected_leaf_ids(source)
        };
        if leaf_ids.is_empty() {
            return Err(self.reject(ValidationError::NothingSelected { source_id: id }));
        }
        Ok(self.run_job(id, leaf_ids).await)
    }

    /// Trains several sources concurrently.
    ///
    /// An empty request is a validation failure. Repeated ids count once.
    /// Unknown sources are dropped; sources without leaves or already
    /// training are skipped and listed in the report. Each member
    /// reaches its own terminal state; failures do not roll back the others.
    pub async fn train_all_sources(
        &self,
        ids: &[SourceId],
    ) -> Result<BatchReport, TrainingError> {
        if ids.is_empty() {
            return Err(self.reject(ValidationError::EmptyBatch));
        }

        let mut seen = HashSet::new();
        let mut members: Vec<(SourceId, Vec<NodeId>)> = Vec::new();
        let mut skipped = Vec::new();
        {
            let registry = self.registry.lock().await;
            for &id in ids.iter().filter(|id| seen.insert(**id)) {
                match registry.get(id) {
                    Some(source) if source.training.is_training() => {
                        skipped.push((id, ValidationError::AlreadyTraining { source_id: id }))
                    }
                    Some(source) if source.has_leaves() => members.push((id, source.leaf_ids())),
                    Some(_) => {
                        skipped.push((id, ValidationError::NothingToTrain { source_id: id }))
                    }
                    None => tracing::warn!(source_id = id, "Skipping unknown source in batch"),
                }
            }
        }
        if members.is_empty() {
            return Err(self.reject(ValidationError::EmptyBatch));
        }
        for (id, reason) in &skipped {
            tracing::warn!(source_id = id, %reason, "Skipping source in batch");
            self.events.notify(Notice::warning(reason.to_string()));
        }

        let member_ids: Vec<SourceId> = members.iter().map(|(id, _)| *id).collect();
        tracing::info!(members = member_ids.len(), "Starting batch training");

        let batch_ticker = self.spawn_batch_ticker(member_ids.clone());
        let member_ids = &member_ids;
        let outcomes = join_all(members.into_iter().map(|(id, leaves)| async move {
            let outcome = self.run_job(id, leaves).await;
            let progress = self.batch_progress(member_ids).await;
            self.events.emit(KnowledgeEvent::BatchProgress(progress));
            MemberOutcome {
                source_id: id,
                outcome,
            }
        }))
        .await;
        batch_ticker.cancel();

        // A member started elsewhere between collection and its job is not
        // ours to wait for.
        let (busy, outcomes): (Vec<_>, Vec<_>) = outcomes
            .into_iter()
            .partition(|m| m.outcome == TrainingOutcome::AlreadyTraining);
        for member in busy {
            let reason = ValidationError::AlreadyTraining {
                source_id: member.source_id,
            };
            tracing::warn!(source_id = member.source_id, %reason, "Dropping busy batch member");
            self.events.notify(Notice::warning(reason.to_string()));
            skipped.push((member.source_id, reason));
        }
        let trained_ids: Vec<SourceId> = outcomes.iter().map(|m| m.source_id).collect();

        let progress = self.batch_progress(&trained_ids).await;
        self.events.emit(KnowledgeEvent::BatchProgress(progress));
        if self.is_shut_down() {
            tracing::debug!("Batch abandoned by shutdown");
        } else if progress.failed > 0 {
            self.events.notify(Notice::warning(format!(
                "Trained {} of {} sources, {} failed",
                progress.succeeded(),
                progress.total,
                progress.failed
            )));
        } else {
            self.events.notify(Notice::success(format!(
                "Trained {} sources",
                progress.total
            )));
        }

        Ok(BatchReport {
            members: outcomes,
            skipped,
            progress,
        })
    }

    /// Current aggregate progress of the given sources.
    pub async fn batch_progress(&self, ids: &[SourceId]) -> BatchProgress {
        self.registry.lock().await.batch_progress(ids)
    }

    /// Stops tickers and discards results of jobs still in flight.
    pub fn shutdown(&self) {
        self.lifetime.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    fn reject(&self, reason: ValidationError) -> TrainingError {
        tracing::warn!(%reason, "Training request rejected");
        self.events.notify(Notice::warning(reason.to_string()));
        TrainingError::Validation(reason)
    }

    async fn run_job(&self, id: SourceId, leaf_ids: Vec<NodeId>) -> TrainingOutcome {
        if self.is_shut_down() {
            return TrainingOutcome::Abandoned;
        }

        let job = JobId::new();
        let started = {
            let mut registry = self.registry.lock().await;
            registry
                .update_status(id, |status| status.start(job).then(|| status.clone()))
                .ok()
                .flatten()
        };
        let Some(status) = started else {
            tracing::debug!(source_id = id, "Training already in progress");
            return TrainingOutcome::AlreadyTraining;
        };
        tracing::info!(source_id = id, %job, leaves = leaf_ids.len(), "Training started");
        self.emit_status(id, status);

        let ticker = self.spawn_ticker(id, job);
        let result = tokio::select! {
            _ = self.lifetime.cancelled() => None,
            result = self.service.train_agent(&self.agent_id, &leaf_ids) => Some(result),
        };
        ticker.cancel();

        match result {
            Some(result) if !self.is_shut_down() => self.finish_job(id, job, result).await,
            _ => {
                tracing::debug!(source_id = id, %job, "Discarding result after shutdown");
                self.abandon_job(id, job).await;
                TrainingOutcome::Abandoned
            }
        }
    }

    /// Returns the source to `Idle` if `job` still owns it, so a later
    /// request can start a new job.
    async fn abandon_job(&self, id: SourceId, job: JobId) {
        let aborted = {
            let mut registry = self.registry.lock().await;
            registry
                .update_status(id, |status| status.abort(job).then(|| status.clone()))
                .ok()
                .flatten()
        };
        if let Some(status) = aborted {
            self.emit_status(id, status);
        }
    }

    async fn finish_job(
        &self,
        id: SourceId,
        job: JobId,
        result: Result<TrainReceipt, ServiceError>,
    ) -> TrainingOutcome {
        let mut registry = self.registry.lock().await;
        let name = registry.get(id).map(|s| s.name.clone()).unwrap_or_default();

        let (finished, outcome, notice) = match result {
            Ok(receipt) => {
                registry.reconcile(receipt.updated);
                let finished = registry
                    .update_status(id, |status| status.succeed(job).then(|| status.clone()))
                    .ok()
                    .flatten();
                tracing::info!(source_id = id, %job, "Training succeeded");
                (
                    finished,
                    TrainingOutcome::Succeeded,
                    Notice::success(format!("Training completed for {name}")),
                )
            }
            Err(err) => {
                let link_broken = err.is_connectivity();
                let message = err.to_string();
                let finished = registry
                    .update_status(id, |status| {
                        status
                            .fail(job, link_broken, message.clone())
                            .then(|| status.clone())
                    })
                    .ok()
                    .flatten();
                tracing::warn!(source_id = id, %job, error = %err, link_broken, "Training failed");
                (
                    finished,
                    TrainingOutcome::Failed {
                        link_broken,
                        message: message.clone(),
                    },
                    Notice::error(format!("Training failed for {name}: {message}")),
                )
            }
        };
        drop(registry);

        match finished {
            Some(status) => {
                self.emit_status(id, status);
                self.events.notify(notice);
                outcome
            }
            None => {
                tracing::debug!(source_id = id, %job, "Job superseded or source removed");
                TrainingOutcome::Abandoned
            }
        }
    }

    fn emit_status(&self, source_id: SourceId, status: TrainingStatus) {
        self.events.emit(KnowledgeEvent::TrainingStatusChanged { source_id, status });
    }

    fn spawn_ticker(&self, id: SourceId, job: JobId) -> ScheduledTask {
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();
        let step = self.config.progress_step;
        let ceiling = self.config.progress_ceiling;

        ScheduledTask::every(self.tick_interval(), &self.lifetime, move || {
            let registry = Arc::clone(&registry);
            let events = events.clone();
            async move {
                let mut registry = registry.lock().await;
                let ticked = registry.update_status(id, |status| {
                    let before = status.progress;
                    let next = before.saturating_add(step).min(ceiling);
                    let outcome = status.tick(job, next);
                    (outcome, status.progress != before, status.clone())
                });
                match ticked {
                    Ok((TickOutcome::Applied, true, status)) => {
                        events.emit(KnowledgeEvent::TrainingStatusChanged {
                            source_id: id,
                            status,
                        });
                        true
                    }
                    // Holding at the ceiling until the job completes.
                    Ok((TickOutcome::Applied, false, _))
                    | Ok((TickOutcome::Regressed, _, _)) => true,
                    Ok((TickOutcome::Stale, _, _)) | Err(_) => {
                        tracing::debug!(source_id = id, %job, "Stopping stale progress ticker");
                        false
                    }
                }
            }
        })
    }

    fn spawn_batch_ticker(&self, ids: Vec<SourceId>) -> ScheduledTask {
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();
        let ids = Arc::new(ids);

        ScheduledTask::every(self.tick_interval(), &self.lifetime, move || {
            let registry = Arc::clone(&registry);
            let events = events.clone();
            let ids = Arc::clone(&ids);
            async move {
                let progress = registry.lock().await.batch_progress(&ids);
                events.emit(KnowledgeEvent::BatchProgress(progress));
                !progress.is_complete()
            }
        })
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.tick_interval_ms)
    }
}
