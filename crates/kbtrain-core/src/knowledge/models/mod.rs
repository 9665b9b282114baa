//! Data model for knowledge sources and their trees.

mod node;
mod source;

pub use node::{
    find_in_forest, forest_leaves, prune_forest, update_forest, walk_forest, NodeId, NodeKind,
    TreeNode, Walk,
};
pub use source::{KnowledgeSource, SourceId, SourceKind};
