//! Tree node type for crawled sites and document lists.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Stable identifier of a node within its source.
pub type NodeId = u64;

/// What a node points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A crawlable URL.
    #[default]
    Url,
    /// An uploaded file.
    File,
}

/// A crawlable URL or file, possibly with ordered children.
///
/// Nodes are owned by their parent's `children` vector and are only changed
/// through methods that return a new value. A node with children has no
/// content of its own: its `is_selected` flag mirrors its leaves and is
/// re-derived by [`TreeNode::with_derived_flags`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Stable key, unique within the owning source.
    pub id: NodeId,
    #[serde(default)]
    pub kind: NodeKind,
    /// URL for crawled pages, file name for documents.
    pub location: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_selected: bool,
    #[serde(default)]
    pub children: Vec<TreeNode>,
    /// Extracted character count, when the crawler reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_count: Option<u64>,
}

impl TreeNode {
    /// Creates an unselected URL leaf.
    pub fn url(id: NodeId, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            kind: NodeKind::Url,
            location: url.into(),
            title: title.into(),
            is_selected: false,
            children: Vec::new(),
            char_count: None,
        }
    }

    /// Creates an unselected file leaf. The title defaults to the file name.
    pub fn file(id: NodeId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            kind: NodeKind::File,
            title: name.clone(),
            location: name,
            is_selected: false,
            children: Vec::new(),
            char_count: None,
        }
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = children;
        self.with_derived_flags()
    }

    pub fn with_char_count(mut self, chars: u64) -> Self {
        self.char_count = Some(chars);
        self
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.is_selected = selected;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth-first, order-preserving iterator over every node (pre-order).
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Depth-first, order-preserving iterator over leaves only.
    pub fn leaves(&self) -> impl Iterator<Item = &TreeNode> {
        self.walk().filter(|n| n.is_leaf())
    }

    pub fn find(&self, id: NodeId) -> Option<&TreeNode> {
        self.walk().find(|n| n.id == id)
    }

    /// Returns a copy with the node `id` replaced by `f(node)`.
    ///
    /// Only the path from this node down to `id` is rebuilt; branch flags
    /// along that path are re-derived. Returns `None` when `id` is absent.
    pub fn update<F>(&self, id: NodeId, f: F) -> Option<TreeNode>
    where
        F: FnOnce(&TreeNode) -> TreeNode,
    {
        if self.id == id {
            return Some(f(self).with_derived_flags());
        }
        let (index, replaced) = update_forest_inner(&self.children, id, f)?;
        let mut children = self.children.clone();
        children[index] = replaced;
        Some(
            TreeNode {
                children,
                ..self.clone_shallow()
            }
            .with_derived_flags(),
        )
    }

    /// Returns a copy without the nodes in `ids`.
    ///
    /// A branch whose children are all removed is removed with them, so a
    /// pruned subtree never turns into a pseudo-leaf. Returns `None` if this
    /// node itself is removed.
    pub fn without(&self, ids: &HashSet<NodeId>) -> Option<TreeNode> {
        if ids.contains(&self.id) {
            return None;
        }
        if self.is_leaf() {
            return Some(self.clone());
        }
        let children = prune_forest(&self.children, ids);
        if children.is_empty() {
            return None;
        }
        Some(
            TreeNode {
                children,
                ..self.clone_shallow()
            }
            .with_derived_flags(),
        )
    }

    /// Sum of leaf character counts.
    pub fn total_chars(&self) -> u64 {
        self.leaves().filter_map(|n| n.char_count).sum()
    }

    /// Sum of character counts of selected leaves.
    pub fn selected_chars(&self) -> u64 {
        self.leaves()
            .filter(|n| n.is_selected)
            .filter_map(|n| n.char_count)
            .sum()
    }

    /// Re-derives `is_selected` on every branch from its leaves.
    pub fn with_derived_flags(mut self) -> Self {
        if self.is_leaf() {
            return self;
        }
        self.children = self
            .children
            .into_iter()
            .map(TreeNode::with_derived_flags)
            .collect();
        self.is_selected = self.children.iter().all(|c| c.is_selected);
        self
    }

    /// Copy of this node's own fields with no children.
    pub(crate) fn clone_shallow(&self) -> TreeNode {
        TreeNode {
            id: self.id,
            kind: self.kind,
            location: self.location.clone(),
            title: self.title.clone(),
            is_selected: self.is_selected,
            children: Vec::new(),
            char_count: self.char_count,
        }
    }
}

/// Pre-order iterator returned by [`TreeNode::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Pre-order walk over every node of a forest.
pub fn walk_forest(forest: &[TreeNode]) -> impl Iterator<Item = &TreeNode> {
    forest.iter().flat_map(TreeNode::walk)
}

/// Leaves of a forest, in order.
pub fn forest_leaves(forest: &[TreeNode]) -> impl Iterator<Item = &TreeNode> {
    walk_forest(forest).filter(|n| n.is_leaf())
}

pub fn find_in_forest(forest: &[TreeNode], id: NodeId) -> Option<&TreeNode> {
    walk_forest(forest).find(|n| n.id == id)
}

/// Copy-on-write update of one node somewhere in a forest.
pub fn update_forest<F>(forest: &[TreeNode], id: NodeId, f: F) -> Option<Vec<TreeNode>>
where
    F: FnOnce(&TreeNode) -> TreeNode,
{
    let (index, replaced) = update_forest_inner(forest, id, f)?;
    let mut next = forest.to_vec();
    next[index] = replaced;
    Some(next)
}

/// Forest counterpart of [`TreeNode::without`].
pub fn prune_forest(forest: &[TreeNode], ids: &HashSet<NodeId>) -> Vec<TreeNode> {
    forest.iter().filter_map(|n| n.without(ids)).collect()
}

fn update_forest_inner<F>(forest: &[TreeNode], id: NodeId, f: F) -> Option<(usize, TreeNode)>
where
    F: FnOnce(&TreeNode) -> TreeNode,
{
    let index = forest.iter().position(|n| n.find(id).is_some())?;
    let replaced = forest[index].update(id, f)?;
    Some((index, replaced))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> TreeNode {
        TreeNode::url(1, "https://example.com", "Home").with_children(vec![
            TreeNode::url(2, "https://example.com/docs", "Docs").with_children(vec![
                TreeNode::url(3, "https://example.com/docs/a", "A").with_char_count(100),
                TreeNode::url(4, "https://example.com/docs/b", "B").with_char_count(50),
            ]),
            TreeNode::url(5, "https://example.com/blog", "Blog").with_char_count(10),
        ])
    }

    #[test]
    fn test_walk_is_preorder() {
        let ids: Vec<_> = site().walk().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_leaves_preserve_order() {
        let ids: Vec<_> = site().leaves().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn test_update_rebuilds_path_only() {
        let tree = site();
        let updated = tree.update(4, |n| n.clone().selected(true)).unwrap();

        assert!(updated.find(4).unwrap().is_selected);
        assert!(!tree.find(4).unwrap().is_selected);
        assert_eq!(updated.find(5), tree.find(5));
    }

    #[test]
    fn test_update_missing_id() {
        assert!(site().update(99, |n| n.clone()).is_none());
    }

    #[test]
    fn test_branch_flag_is_derived() {
        let tree = site()
            .update(3, |n| n.clone().selected(true))
            .and_then(|t| t.update(4, |n| n.clone().selected(true)))
            .unwrap();
        assert!(tree.find(2).unwrap().is_selected);
        assert!(!tree.is_selected);
    }

    #[test]
    fn test_without_drops_emptied_branch() {
        let ids: HashSet<_> = [3, 4].into_iter().collect();
        let pruned = site().without(&ids).unwrap();
        let remaining: Vec<_> = pruned.walk().map(|n| n.id).collect();
        assert_eq!(remaining, vec![1, 5]);
    }

    #[test]
    fn test_char_metrics() {
        let tree = site().update(3, |n| n.clone().selected(true)).unwrap();
        assert_eq!(tree.total_chars(), 160);
        assert_eq!(tree.selected_chars(), 100);
    }

    #[test]
    fn test_serde_roundtrip_keeps_order() {
        let tree = site();
        let json = serde_json::to_string(&tree).unwrap();
        assert!(json.contains("\"isSelected\""));
        let back: TreeNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
