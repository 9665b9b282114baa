//! Top-level knowledge sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::node::{forest_leaves, prune_forest, NodeId, TreeNode};
use crate::training::TrainingStatus;

/// Stable identifier of a knowledge source.
pub type SourceId = u64;

/// Closed set of source types offered by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[default]
    Document,
    #[serde(alias = "url")]
    Website,
    Database,
    Csv,
    PlainText,
    ThirdParty,
}

impl SourceKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::Document => "Document",
            SourceKind::Website => "Website",
            SourceKind::Database => "Database",
            SourceKind::Csv => "CSV",
            SourceKind::PlainText => "Plain text",
            SourceKind::ThirdParty => "Third party",
        }
    }

    /// Plural noun used in "N of M ... selected" summaries.
    pub fn leaf_noun(&self) -> &'static str {
        match self {
            SourceKind::Website => "URLs",
            _ => "files",
        }
    }
}

/// A named, typed unit of trainable content owned by an agent.
///
/// A source owns its trees exclusively. Leaves can live in any of the three
/// optional collections; selection and training treat them uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSource {
    pub id: SourceId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Display size, e.g. "2.4 MB".
    #[serde(default)]
    pub size: String,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub training: TrainingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<TreeNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inside_links: Option<Vec<TreeNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

impl KnowledgeSource {
    /// Creates an empty, idle source.
    pub fn new(id: SourceId, name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            size: String::new(),
            last_updated: Utc::now(),
            training: TrainingStatus::default(),
            documents: None,
            inside_links: None,
            children: None,
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_documents(mut self, documents: Vec<TreeNode>) -> Self {
        self.documents = Some(documents.into_iter().map(TreeNode::with_derived_flags).collect());
        self
    }

    pub fn with_inside_links(mut self, links: Vec<TreeNode>) -> Self {
        self.inside_links = Some(links.into_iter().map(TreeNode::with_derived_flags).collect());
        self
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = Some(children.into_iter().map(TreeNode::with_derived_flags).collect());
        self
    }

    /// The owned forests in display order: documents, inside links, crawl tree.
    pub fn forests(&self) -> impl Iterator<Item = &[TreeNode]> {
        [&self.documents, &self.inside_links, &self.children]
            .into_iter()
            .filter_map(|f| f.as_deref())
    }

    /// Returns a copy with `f` applied to every forest present.
    pub fn map_forests<F>(&self, mut f: F) -> KnowledgeSource
    where
        F: FnMut(&[TreeNode]) -> Vec<TreeNode>,
    {
        KnowledgeSource {
            documents: self.documents.as_deref().map(&mut f),
            inside_links: self.inside_links.as_deref().map(&mut f),
            children: self.children.as_deref().map(&mut f),
            ..self.clone_meta()
        }
    }

    /// Every leaf across all forests, depth-first and in order.
    pub fn leaves(&self) -> impl Iterator<Item = &TreeNode> {
        self.forests().flat_map(forest_leaves)
    }

    pub fn leaf_ids(&self) -> Vec<NodeId> {
        self.leaves().map(|n| n.id).collect()
    }

    pub fn has_leaves(&self) -> bool {
        self.leaves().next().is_some()
    }

    /// Returns a copy without the given nodes in any forest.
    pub fn remove_leaves(&self, ids: &HashSet<NodeId>) -> KnowledgeSource {
        let mut next = self.map_forests(|forest| prune_forest(forest, ids));
        next.last_updated = Utc::now();
        next
    }

    pub fn selected_chars(&self) -> u64 {
        self.forests()
            .flat_map(|f| f.iter())
            .map(TreeNode::selected_chars)
            .sum()
    }

    /// Copy of the source metadata with all forests left out.
    fn clone_meta(&self) -> KnowledgeSource {
        KnowledgeSource {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            size: self.size.clone(),
            last_updated: self.last_updated,
            training: self.training.clone(),
            documents: None,
            inside_links: None,
            children: None,
        }
    }
}
