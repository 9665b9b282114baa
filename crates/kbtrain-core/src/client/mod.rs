//! Client seam for the knowledge-base service.
//!
//! The core only talks to the service through [`KnowledgeService`], so the
//! orchestrator and sync coordinator can run against the HTTP client or an
//! in-memory fake.

mod error;
mod http;

pub use error::ServiceError;
pub use http::HttpKnowledgeService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::knowledge::{KnowledgeSource, NodeId, SourceId};
use crate::registry::AcceptedUrls;

/// Sources the user picked in the import dialog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSelection {
    pub sources: Vec<KnowledgeSource>,
    /// Per-source accepted URLs; sources without an entry import as-is.
    #[serde(default, skip_serializing_if = "AcceptedUrls::is_empty")]
    pub accepted_urls: AcceptedUrls,
}

/// Result of a completed training job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainReceipt {
    /// Sources whose content changed as a result of the job.
    #[serde(default)]
    pub updated: Vec<KnowledgeSource>,
}

/// The knowledge-base service used by the core.
#[async_trait]
pub trait KnowledgeService: Send + Sync {
    /// Lists every knowledge source of an agent.
    async fn list_knowledge_sources(
        &self,
        agent_id: &str,
    ) -> Result<Vec<KnowledgeSource>, ServiceError>;

    /// Deletes sources on the server.
    async fn remove_knowledge_sources(
        &self,
        agent_id: &str,
        ids: &[SourceId],
    ) -> Result<(), ServiceError>;

    /// Imports sources, returning them as stored by the server.
    async fn import_sources(
        &self,
        agent_id: &str,
        selection: &ImportSelection,
    ) -> Result<Vec<KnowledgeSource>, ServiceError>;

    /// Runs a training job over the given leaves and waits for it to finish.
    async fn train_agent(
        &self,
        agent_id: &str,
        leaf_ids: &[NodeId],
    ) -> Result<TrainReceipt, ServiceError>;
}

#[async_trait]
impl<T: KnowledgeService + ?Sized> KnowledgeService for Arc<T> {
    async fn list_knowledge_sources(
        &self,
        agent_id: &str,
    ) -> Result<Vec<KnowledgeSource>, ServiceError> {
        (**self).list_knowledge_sources(agent_id).await
    }

    async fn remove_knowledge_sources(
        &self,
        agent_id: &str,
        ids: &[SourceId],
    ) -> Result<(), ServiceError> {
        (**self).remove_knowledge_sources(agent_id, ids).await
    }

    async fn import_sources(
        &self,
        agent_id: &str,
        selection: &ImportSelection,
    ) -> Result<Vec<KnowledgeSource>, ServiceError> {
        (**self).import_sources(agent_id, selection).await
    }

    async fn train_agent(
        &self,
        agent_id: &str,
        leaf_ids: &[NodeId],
    ) -> Result<TrainReceipt, ServiceError> {
        (**self).train_agent(agent_id, leaf_ids).await
    }
}
