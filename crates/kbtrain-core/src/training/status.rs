use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one training job. Ticks and completions carry the id of the
/// job that produced them so results from superseded jobs can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase of the per-source training state machine.
///
/// ```text
/// Idle ──start──▶ Training ──succeed──▶ Success
///                  │   ▲                  │
///                  │   └──────start───────┤
///                  └──fail──▶ Error ──────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingPhase {
    #[default]
    Idle,
    Training,
    Success,
    Error,
}

impl TrainingPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainingPhase::Success | TrainingPhase::Error)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TrainingPhase::Idle => "Idle",
            TrainingPhase::Training => "Training",
            TrainingPhase::Success => "Trained",
            TrainingPhase::Error => "Failed",
        }
    }
}

/// What happened to a progress tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Applied,
    /// The tick belongs to a job that is no longer current, or arrived after
    /// the job reached a terminal state.
    Stale,
    /// The tick would have lowered progress.
    Regressed,
}

/// Training state of one knowledge source.
///
/// `progress` is 0 while idle, non-decreasing while training, and pinned to
/// 100 once the job succeeds or fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStatus {
    pub phase: TrainingPhase,
    pub progress: u8,
    #[serde(default)]
    pub link_broken: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrainingStatus {
    pub fn is_training(&self) -> bool {
        self.phase == TrainingPhase::Training
    }

    /// Enters `Training` for a new job.
    ///
    /// Returns false when a job is already running; the caller treats that as
    /// a duplicate request.
    pub fn start(&mut self, job: JobId) -> bool {
        if self.is_training() {
            return false;
        }
        *self = TrainingStatus {
            phase: TrainingPhase::Training,
            progress: 0,
            link_broken: false,
            job: Some(job),
            error: None,
        };
        true
    }

    /// Records a progress tick from `job`.
    pub fn tick(&mut self, job: JobId, progress: u8) -> TickOutcome {
        if !self.is_training() || self.job != Some(job) {
            return TickOutcome::Stale;
        }
        let progress = progress.min(100);
        if progress < self.progress {
            return TickOutcome::Regressed;
        }
        self.progress = progress;
        TickOutcome::Applied
    }

    /// Completes `job` successfully. Returns false for a stale job.
    pub fn succeed(&mut self, job: JobId) -> bool {
        if !self.is_training() || self.job != Some(job) {
            return false;
        }
        self.phase = TrainingPhase::Success;
        self.progress = 100;
        true
    }

    /// Fails `job`. Returns false for a stale job.
    pub fn fail(&mut self, job: JobId, link_broken: bool, message: impl Into<String>) -> bool {
        if !self.is_training() || self.job != Some(job) {
            return false;
        }
        self.phase = TrainingPhase::Error;
        self.progress = 100;
        self.link_broken = link_broken;
        self.error = Some(message.into());
        true
    }

    /// Abandons `job`, returning the source to `Idle`. Returns false for a
    /// stale job.
    pub fn abort(&mut self, job: JobId) -> bool {
        if !self.is_training() || self.job != Some(job) {
            return false;
        }
        *self = TrainingStatus::default();
        true
    }
}
