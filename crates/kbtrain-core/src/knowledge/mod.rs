//! Knowledge sources and their selection trees.
//!
//! - [`models`] - [`KnowledgeSource`] and the recursive [`TreeNode`]
//! - [`selection`] - tri-state aggregation, toggles, and display counts
//! - [`filter`] - text filtering of trees
//!
//! # Example
//!
//! ```
//! use kbtrain_core::knowledge::{selection, KnowledgeSource, SourceKind, TreeNode};
//!
//! let source = KnowledgeSource::new(1, "Help center", SourceKind::Website).with_children(vec![
//!     TreeNode::url(1, "https://help.example.com", "Home").with_children(vec![
//!         TreeNode::url(2, "https://help.example.com/a", "A"),
//!         TreeNode::url(3, "https://help.example.com/b", "B"),
//!     ]),
//! ]);
//!
//! let source = selection::toggle_in_source(&source, 2).unwrap();
//! assert_eq!(selection::selection_label(&source), "1 of 2 URLs selected");
//! ```

mod error;
pub mod filter;
pub mod models;
pub mod selection;

pub use error::SelectionError;
pub use models::{KnowledgeSource, NodeId, NodeKind, SourceId, SourceKind, TreeNode};
pub use selection::{SelectionSnapshot, SelectionState};
