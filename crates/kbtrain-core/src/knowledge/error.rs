//! Selection error types.

use thiserror::Error;

use super::models::NodeId;

/// Errors raised by selection commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// The addressed node is not part of the tree.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
}
