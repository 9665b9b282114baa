//! Knowledge-source trees and training orchestration.
//!
//! A [`SourceRegistry`] holds an agent's knowledge sources, each owning
//! trees of crawled URLs or files. Selection edits go through
//! [`knowledge::selection`]; training jobs run through the
//! [`TrainingOrchestrator`]; the [`SyncCoordinator`] keeps the registry in
//! step with the knowledge-base service behind [`KnowledgeService`].

pub mod client;
pub mod config;
pub mod events;
pub mod knowledge;
pub mod manager;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod sync;
pub mod training;

pub use client::{
    HttpKnowledgeService, ImportSelection, KnowledgeService, ServiceError, TrainReceipt,
};
pub use config::{Config, ConfigError};
pub use events::{EventBus, KnowledgeEvent, Notice, NoticeLevel};
pub use knowledge::{
    KnowledgeSource, NodeId, NodeKind, SelectionError, SelectionSnapshot, SelectionState,
    SourceId, SourceKind, TreeNode,
};
pub use manager::{KnowledgeManager, ManagerError, SelectionCommand};
pub use registry::{import_merge, AcceptedUrls, RegistryError, SharedRegistry, SourceRegistry};
pub use storage::{FileStorage, RegistrySnapshot, Storage, StorageError};
pub use sync::{RemovalOutcome, SyncCoordinator, SyncError};
pub use training::{
    BatchProgress, BatchReport, TrainingError, TrainingOrchestrator, TrainingOutcome,
    TrainingPhase, TrainingStatus, ValidationError,
};
