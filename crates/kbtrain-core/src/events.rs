//! Event bus for core notifications.
//!
//! The core never waits on delivery: every emit is a lossy broadcast, and a
//! slow or missing subscriber only loses events, it never stalls a mutation.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::knowledge::SourceId;
use crate::training::{BatchProgress, TrainingStatus};

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A message intended for the toast/notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Events emitted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnowledgeEvent {
    /// Something the user should be told about.
    Notice(Notice),
    /// A source's training status changed (start, tick, or terminal state).
    TrainingStatusChanged {
        source_id: SourceId,
        status: TrainingStatus,
    },
    /// Aggregate progress of a train-all batch.
    BatchProgress(BatchProgress),
    /// Sources were removed from the registry.
    SourcesRemoved { ids: Vec<SourceId> },
    /// Sources were imported into the registry.
    SourcesImported { ids: Vec<SourceId> },
    /// The registry was replaced by a server snapshot.
    RegistryRefreshed { count: usize },
}

/// Broadcast channel for [`KnowledgeEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<KnowledgeEvent>,
}

impl EventBus {
    /// Creates a bus that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribes to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<KnowledgeEvent> {
        self.tx.subscribe()
    }

    /// Emits an event, ignoring the case where nobody is listening.
    pub fn emit(&self, event: KnowledgeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn notify(&self, notice: Notice) {
        self.emit(KnowledgeEvent::Notice(notice));
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EVENT_CAPACITY)
    }
}
