//! Plain-text rendering of sources and trees.

use kbtrain_core::knowledge::selection::{compute_state, count_selected, selection_label};
use chrono::Local;
use kbtrain_core::{KnowledgeSource, TrainingPhase, TreeNode};

/// One summary line per source.
pub fn source_line(source: &KnowledgeSource) -> String {
    let training = &source.training;
    let phase = match training.phase {
        TrainingPhase::Training => {
            format!("{} {}%", training.phase.display_name(), training.progress)
        }
        TrainingPhase::Error if training.link_broken => "Failed (link broken)".to_string(),
        phase => phase.display_name().to_string(),
    };
    format!(
        "{:>6}  {:<32} {:<12} {:<26} {}",
        source.id,
        source.name,
        source.kind.display_name(),
        selection_label(source),
        phase
    )
}

pub fn source_header(source: &KnowledgeSource) -> String {
    let counts = count_selected(source);
    let mut header = format!(
        "{} {} ({}, {})",
        counts.state.marker(),
        source.name,
        source.kind.display_name(),
        selection_label(source)
    );
    let chars = source.selected_chars();
    if chars > 0 {
        header.push_str(&format!(", {chars} characters selected"));
    }
    let updated = source.last_updated.with_timezone(&Local);
    header.push_str(&format!(", updated {}", updated.format("%Y-%m-%d %H:%M")));
    header
}

/// Indented tree with `[x]`, `[ ]` and `[-]` markers.
pub fn tree_lines(forest: &[TreeNode]) -> Vec<String> {
    let mut lines = Vec::new();
    for node in forest {
        push_node(node, 1, &mut lines);
    }
    lines
}

fn push_node(node: &TreeNode, depth: usize, lines: &mut Vec<String>) {
    let marker = compute_state(node).state.marker();
    let label = if node.title.is_empty() || node.title == node.location {
        node.location.clone()
    } else {
        format!("{} <{}>", node.title, node.location)
    };
    lines.push(format!("{}{} #{} {}", "  ".repeat(depth), marker, node.id, label));
    for child in &node.children {
        push_node(child, depth + 1, lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbtrain_core::SourceKind;

    fn site() -> Vec<TreeNode> {
        vec![TreeNode::url(1, "https://a.io", "Home").with_children(vec![
            TreeNode::url(2, "https://a.io/docs", "https://a.io/docs").selected(true),
            TreeNode::url(3, "https://a.io/blog", "Blog"),
        ])]
    }

    #[test]
    fn test_tree_lines_markers_and_indent() {
        let lines = tree_lines(&site());
        assert_eq!(
            lines,
            vec![
                "  [-] #1 Home <https://a.io>",
                "    [x] #2 https://a.io/docs",
                "    [ ] #3 Blog <https://a.io/blog>",
            ]
        );
    }

    #[test]
    fn test_source_header_starts_with_marker() {
        let source = KnowledgeSource::new(9, "Docs", SourceKind::Website).with_inside_links(site());
        let header = source_header(&source);
        assert!(header.starts_with("[-] Docs (Website, "));
        assert!(header.contains(", updated "));
    }
}
