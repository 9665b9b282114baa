//! Selection aggregation over source trees.
//!
//! Every function here is pure: it reads a tree and returns a new one (or a
//! derived [`SelectionSnapshot`]). Branch flags are never authoritative; a
//! branch is selected exactly when all of its leaves are.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::SelectionError;
use super::models::{find_in_forest, update_forest, KnowledgeSource, NodeId, TreeNode};

/// Tri-state value of a subtree's selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionState {
    Selected,
    #[default]
    Unselected,
    Indeterminate,
}

impl SelectionState {
    /// Checkbox marker used by text renderings.
    pub fn marker(&self) -> &'static str {
        match self {
            SelectionState::Selected => "[x]",
            SelectionState::Unselected => "[ ]",
            SelectionState::Indeterminate => "[-]",
        }
    }
}

/// Derived selection counts for a subtree or source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSnapshot {
    pub selected_count: usize,
    pub total_count: usize,
    pub state: SelectionState,
}

impl SelectionSnapshot {
    pub const EMPTY: SelectionSnapshot = SelectionSnapshot {
        selected_count: 0,
        total_count: 0,
        state: SelectionState::Unselected,
    };

    pub fn from_counts(selected_count: usize, total_count: usize) -> Self {
        let state = if selected_count == 0 {
            SelectionState::Unselected
        } else if selected_count == total_count {
            SelectionState::Selected
        } else {
            SelectionState::Indeterminate
        };
        Self {
            selected_count,
            total_count,
            state,
        }
    }

    pub fn merge(self, other: SelectionSnapshot) -> Self {
        Self::from_counts(
            self.selected_count + other.selected_count,
            self.total_count + other.total_count,
        )
    }

    /// True when there are no leaves at all ("no items", not "0 of 0").
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

/// Bottom-up fold of a subtree's leaves.
pub fn compute_state(node: &TreeNode) -> SelectionSnapshot {
    if node.is_leaf() {
        return SelectionSnapshot::from_counts(usize::from(node.is_selected), 1);
    }
    compute_forest_state(&node.children)
}

pub fn compute_forest_state(forest: &[TreeNode]) -> SelectionSnapshot {
    forest
        .iter()
        .map(compute_state)
        .fold(SelectionSnapshot::EMPTY, SelectionSnapshot::merge)
}

/// Sets every leaf under `node` (and `node` itself) to `selected`.
pub fn set_subtree(node: &TreeNode, selected: bool) -> TreeNode {
    TreeNode {
        is_selected: selected,
        children: set_all(&node.children, selected),
        ..node.clone_shallow()
    }
    .with_derived_flags()
}

/// [`set_subtree`] over every root of a forest.
pub fn set_all(forest: &[TreeNode], selected: bool) -> Vec<TreeNode> {
    forest.iter().map(|n| set_subtree(n, selected)).collect()
}

/// [`set_subtree`] on the node `id` inside a forest.
pub fn set_subtree_in(
    forest: &[TreeNode],
    id: NodeId,
    selected: bool,
) -> Result<Vec<TreeNode>, SelectionError> {
    update_forest(forest, id, |n| set_subtree(n, selected)).ok_or(SelectionError::NodeNotFound(id))
}

/// Flips the node `id`.
///
/// A leaf is flipped on its own; siblings are untouched. A branch behaves
/// like a tri-state checkbox: fully selected becomes fully deselected, any
/// other state becomes fully selected.
pub fn toggle(forest: &[TreeNode], id: NodeId) -> Result<Vec<TreeNode>, SelectionError> {
    let node = find_in_forest(forest, id).ok_or(SelectionError::NodeNotFound(id))?;
    let select = compute_state(node).state != SelectionState::Selected;
    set_subtree_in(forest, id, select)
}

/// Counts selected leaves across every forest a source owns.
pub fn count_selected(source: &KnowledgeSource) -> SelectionSnapshot {
    source
        .forests()
        .map(compute_forest_state)
        .fold(SelectionSnapshot::EMPTY, SelectionSnapshot::merge)
}

/// Ids of selected leaves, depth-first in display order.
pub fn selected_leaf_ids(source: &KnowledgeSource) -> Vec<NodeId> {
    source
        .leaves()
        .filter(|n| n.is_selected)
        .map(|n| n.id)
        .collect()
}

/// Summary line such as "3 of 6 URLs selected", or "no items".
pub fn selection_label(source: &KnowledgeSource) -> String {
    let snapshot = count_selected(source);
    if snapshot.is_empty() {
        return "no items".to_string();
    }
    format!(
        "{} of {} {} selected",
        snapshot.selected_count,
        snapshot.total_count,
        source.kind.leaf_noun()
    )
}

/// Toggles `id` in whichever forest of `source` owns it.
pub fn toggle_in_source(
    source: &KnowledgeSource,
    id: NodeId,
) -> Result<KnowledgeSource, SelectionError> {
    apply_in_source(source, id, |forest| toggle(forest, id))
}

/// Sets the subtree at `id` in `source`, or every leaf when `id` is `None`.
pub fn set_subtree_in_source(
    source: &KnowledgeSource,
    id: Option<NodeId>,
    selected: bool,
) -> Result<KnowledgeSource, SelectionError> {
    match id {
        Some(id) => apply_in_source(source, id, |forest| set_subtree_in(forest, id, selected)),
        None => Ok(source.map_forests(|forest| set_all(forest, selected))),
    }
}

/// Copy of `source` whose selected leaves are exactly those whose location
/// is in `accepted`. Tree shape and order are kept.
pub fn narrow_to(source: &KnowledgeSource, accepted: &HashSet<String>) -> KnowledgeSource {
    source.map_forests(|forest| forest.iter().map(|n| narrow_node(n, accepted)).collect())
}

fn narrow_node(node: &TreeNode, accepted: &HashSet<String>) -> TreeNode {
    if node.is_leaf() {
        return node.clone().selected(accepted.contains(&node.location));
    }
    TreeNode {
        children: node.children.iter().map(|c| narrow_node(c, accepted)).collect(),
        ..node.clone_shallow()
    }
    .with_derived_flags()
}

fn apply_in_source<F>(
    source: &KnowledgeSource,
    id: NodeId,
    apply: F,
) -> Result<KnowledgeSource, SelectionError>
where
    F: Fn(&[TreeNode]) -> Result<Vec<TreeNode>, SelectionError>,
{
    if !source.forests().any(|f| find_in_forest(f, id).is_some()) {
        return Err(SelectionError::NodeNotFound(id));
    }
    let owns = |forest: &[TreeNode]| find_in_forest(forest, id).is_some();
    let mut next = source.clone();
    for forest in [
        &mut next.documents,
        &mut next.inside_links,
        &mut next.children,
    ]
    .into_iter()
    .flatten()
    {
        if owns(forest.as_slice()) {
            *forest = apply(forest.as_slice())?;
        }
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::SourceKind;

    fn leaf(id: NodeId) -> TreeNode {
        TreeNode::url(id, format!("https://example.com/{id}"), format!("Page {id}"))
    }

    fn branch(id: NodeId, children: Vec<TreeNode>) -> TreeNode {
        TreeNode::url(id, format!("https://example.com/{id}"), "Section").with_children(children)
    }

    #[test]
    fn test_leaf_state() {
        assert_eq!(compute_state(&leaf(1)), SelectionSnapshot::from_counts(0, 1));
        let on = leaf(1).selected(true);
        assert_eq!(compute_state(&on).state, SelectionState::Selected);
    }

    #[test]
    fn test_empty_forest_is_unselected() {
        let snapshot = compute_forest_state(&[]);
        assert_eq!(snapshot, SelectionSnapshot::EMPTY);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_toggle_does_not_touch_siblings() {
        let forest = vec![branch(1, vec![leaf(2), leaf(3)])];
        let next = toggle(&forest, 2).unwrap();

        assert!(find_in_forest(&next, 2).unwrap().is_selected);
        assert!(!find_in_forest(&next, 3).unwrap().is_selected);
        assert_eq!(compute_forest_state(&next).state, SelectionState::Indeterminate);
    }

    #[test]
    fn test_toggle_branch_acts_as_checkbox() {
        let forest = vec![branch(1, vec![leaf(2).selected(true), leaf(3)])];

        let all = toggle(&forest, 1).unwrap();
        assert_eq!(compute_forest_state(&all).state, SelectionState::Selected);

        let none = toggle(&all, 1).unwrap();
        assert_eq!(compute_forest_state(&none).selected_count, 0);
    }

    #[test]
    fn test_toggle_unknown_node() {
        assert_eq!(toggle(&[leaf(1)], 9), Err(SelectionError::NodeNotFound(9)));
    }

    #[test]
    fn test_set_subtree_only_affects_subtree() {
        let forest = vec![branch(1, vec![leaf(2), leaf(3)]), leaf(4)];
        let next = set_subtree_in(&forest, 1, true).unwrap();

        assert!(find_in_forest(&next, 1).unwrap().is_selected);
        assert!(!find_in_forest(&next, 4).unwrap().is_selected);
    }

    #[test]
    fn test_label_for_empty_source() {
        let source = KnowledgeSource::new(1, "Site", SourceKind::Website).with_children(vec![]);
        assert_eq!(selection_label(&source), "no items");
    }

    #[test]
    fn test_label_uses_kind_noun() {
        let site = KnowledgeSource::new(1, "Site", SourceKind::Website)
            .with_children(vec![leaf(1).selected(true), leaf(2)]);
        assert_eq!(selection_label(&site), "1 of 2 URLs selected");

        let docs = KnowledgeSource::new(2, "Docs", SourceKind::Document)
            .with_documents(vec![TreeNode::file(1, "a.pdf").selected(true)]);
        assert_eq!(selection_label(&docs), "1 of 1 files selected");
    }

    #[test]
    fn test_toggle_in_source_finds_owning_forest() {
        let source = KnowledgeSource::new(1, "Mixed", SourceKind::Website)
            .with_documents(vec![TreeNode::file(10, "a.pdf")])
            .with_children(vec![branch(20, vec![leaf(21), leaf(22)])]);

        let next = toggle_in_source(&source, 21).unwrap();
        assert_eq!(selected_leaf_ids(&next), vec![21]);
        assert!(toggle_in_source(&source, 99).is_err());
    }

    #[test]
    fn test_narrow_to_accepted_urls() {
        let source = KnowledgeSource::new(1, "Site", SourceKind::Website).with_children(vec![
            branch(1, vec![leaf(2).selected(true), leaf(3)]),
        ]);
        let accepted: HashSet<String> = ["https://example.com/3".to_string()].into_iter().collect();

        let narrowed = narrow_to(&source, &accepted);
        assert_eq!(selected_leaf_ids(&narrowed), vec![3]);
        assert_eq!(selected_leaf_ids(&source), vec![2]);
    }
}
