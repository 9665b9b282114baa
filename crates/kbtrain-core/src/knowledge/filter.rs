//! Text filtering of source trees for search boxes.

use super::models::TreeNode;

/// Returns a pruned copy of `forest` keeping leaves whose title or location
/// contains `query` (case-insensitive) together with their ancestors.
///
/// A branch that matches on its own keeps its whole subtree. An empty or
/// whitespace-only query returns the forest unchanged.
pub fn filter(forest: &[TreeNode], query: &str) -> Vec<TreeNode> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return forest.to_vec();
    }
    forest.iter().filter_map(|n| filter_node(n, &needle)).collect()
}

fn filter_node(node: &TreeNode, needle: &str) -> Option<TreeNode> {
    if matches(node, needle) {
        return Some(node.clone());
    }
    if node.is_leaf() {
        return None;
    }
    let children: Vec<TreeNode> = node
        .children
        .iter()
        .filter_map(|c| filter_node(c, needle))
        .collect();
    if children.is_empty() {
        return None;
    }
    Some(
        TreeNode {
            children,
            ..node.clone_shallow()
        }
        .with_derived_flags(),
    )
}

fn matches(node: &TreeNode, needle: &str) -> bool {
    node.title.to_lowercase().contains(needle) || node.location.to_lowercase().contains(needle)
}
