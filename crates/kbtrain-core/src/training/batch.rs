use serde::{Deserialize, Serialize};

use super::{TrainingOutcome, TrainingPhase, TrainingStatus, ValidationError};
use crate::knowledge::SourceId;

/// Aggregate progress of a train-all batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub total: usize,
    /// Members in a terminal phase.
    pub completed: usize,
    /// Members in the `Error` phase.
    pub failed: usize,
    /// Mean of member progresses, 0-100.
    pub progress: u8,
}

impl BatchProgress {
    pub fn from_statuses<'a>(statuses: impl IntoIterator<Item = &'a TrainingStatus>) -> Self {
        let mut batch = BatchProgress::default();
        let mut sum: usize = 0;
        for status in statuses {
            batch.total += 1;
            sum += usize::from(status.progress);
            if status.phase.is_terminal() {
                batch.completed += 1;
            }
            if status.phase == TrainingPhase::Error {
                batch.failed += 1;
            }
        }
        if batch.total > 0 {
            batch.progress = u8::try_from(sum / batch.total).unwrap_or(100);
        }
        batch
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }

    pub fn succeeded(&self) -> usize {
        self.completed - self.failed
    }
}

/// Result of one batch member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberOutcome {
    pub source_id: SourceId,
    pub outcome: TrainingOutcome,
}

/// Final report of [`super::TrainingOrchestrator::train_all_sources`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub members: Vec<MemberOutcome>,
    /// Requested sources left out of the batch, with the reason.
    pub skipped: Vec<(SourceId, ValidationError)>,
    pub progress: BatchProgress,
}

impl BatchReport {
    pub fn failed_ids(&self) -> Vec<SourceId> {
        self.members
            .iter()
            .filter(|m| matches!(m.outcome, TrainingOutcome::Failed { .. }))
            .map(|m| m.source_id)
            .collect()
    }
}
