//! Which nodes of a tree snapshot are expanded for display.

use std::collections::HashSet;

use crate::app::tree::TreeModel;
use crate::domain::errors::DomainError;
use crate::domain::model::{DomNode, NodeId};

/// Expansion flags keyed by node id, kept apart from the immutable tree.
///
/// A fresh snapshot may reuse ids for different elements, so [`ExpansionState::sync`] must be
/// called whenever a new tree is attached.
#[derive(Debug, Clone, Default)]
pub struct ExpansionState {
    expanded: HashSet<NodeId>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a newly attached snapshot; only the root starts expanded.
    pub fn sync(&mut self, tree: &TreeModel) {
        self.expanded.clear();
        self.expanded.insert(tree.root().id);
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn expand(&mut self, id: NodeId) {
        self.expanded.insert(id);
    }

    pub fn collapse(&mut self, id: NodeId) {
        self.expanded.remove(&id);
    }

    /// Flip a node's flag, returning whether it is now expanded.
    pub fn toggle(&mut self, id: NodeId) -> bool {
        if !self.expanded.remove(&id) {
            self.expanded.insert(id);
            return true;
        }
        false
    }

    /// Expand every ancestor of `id` so the node itself becomes visible.
    pub fn reveal(&mut self, tree: &TreeModel, id: NodeId) -> Result<(), DomainError> {
        self.expanded.extend(tree.ancestors(id)?);
        Ok(())
    }

    /// Expand exactly the nodes shallower than `depth`, making rows down to `depth` visible.
    pub fn expand_to_depth(&mut self, tree: &TreeModel, depth: usize) {
        self.expanded = tree
            .walk()
            .filter(|(node, level)| *level < depth && !node.is_leaf())
            .map(|(node, _)| node.id)
            .collect();
    }

    pub fn expand_all(&mut self, tree: &TreeModel) {
        self.expanded = tree
            .walk()
            .filter(|(node, _)| !node.is_leaf())
            .map(|(node, _)| node.id)
            .collect();
    }

    /// Rows to draw, in document order: children show only under expanded parents.
    pub fn visible<'a>(&self, tree: &'a TreeModel) -> Vec<(&'a DomNode, usize)> {
        let mut rows = Vec::new();
        let mut stack = vec![(tree.root(), 0usize)];
        while let Some((node, depth)) = stack.pop() {
            if self.is_expanded(node.id) {
                stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
            }
            rows.push((node, depth));
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> TreeModel {
        TreeModel::new(DomNode::element(1, "html").with_children([
            DomNode::element(2, "head").with_children([DomNode::element(3, "title")]),
            DomNode::element(4, "body").with_children([
                DomNode::element(5, "div").with_children([DomNode::element(6, "span")]),
                DomNode::element(7, "p"),
            ]),
        ]))
        .unwrap()
    }

    fn ids(rows: &[(&DomNode, usize)]) -> Vec<NodeId> {
        rows.iter().map(|(node, _)| node.id).collect()
    }

    #[test]
    fn sync_shows_root_and_its_children() {
        let tree = tree();
        let mut state = ExpansionState::new();
        state.sync(&tree);
        assert_eq!(ids(&state.visible(&tree)), vec![1, 2, 4]);
    }

    #[test]
    fn toggle_flips_and_collapse_hides_subtree() {
        let tree = tree();
        let mut state = ExpansionState::new();
        state.sync(&tree);

        assert!(state.toggle(4));
        assert_eq!(ids(&state.visible(&tree)), vec![1, 2, 4, 5, 7]);

        state.expand(5);
        assert_eq!(ids(&state.visible(&tree)), vec![1, 2, 4, 5, 6, 7]);

        assert!(!state.toggle(4));
        assert_eq!(ids(&state.visible(&tree)), vec![1, 2, 4]);
        // Nested flags survive a collapse of the parent.
        assert!(state.is_expanded(5));

        state.collapse(1);
        assert_eq!(ids(&state.visible(&tree)), vec![1]);
    }

    #[test]
    fn expand_to_depth_limits_visible_rows() {
        let tree = tree();
        let mut state = ExpansionState::new();

        state.expand_to_depth(&tree, 0);
        assert_eq!(ids(&state.visible(&tree)), vec![1]);

        state.expand_to_depth(&tree, 2);
        let rows = state.visible(&tree);
        assert_eq!(ids(&rows), vec![1, 2, 3, 4, 5, 7]);
        assert!(rows.iter().all(|(_, depth)| *depth <= 2));

        state.expand_all(&tree);
        assert_eq!(state.visible(&tree).len(), tree.len());
    }

    #[test]
    fn reveal_expands_ancestors_only() {
        let tree = tree();
        let mut state = ExpansionState::new();
        state.reveal(&tree, 6).unwrap();
        assert_eq!(ids(&state.visible(&tree)), vec![1, 2, 4, 5, 6, 7]);
        assert!(!state.is_expanded(6));
        assert_eq!(state.reveal(&tree, 99), Err(DomainError::NotFound(99)));
    }

    #[test]
    fn sync_discards_flags_from_previous_snapshot() {
        let tree = tree();
        let mut state = ExpansionState::new();
        state.expand_all(&tree);

        let next = TreeModel::new(
            DomNode::element(10, "html").with_children([DomNode::element(4, "section")
                .with_children([DomNode::element(11, "p")])]),
        )
        .unwrap();
        state.sync(&next);

        assert!(!state.is_expanded(4));
        assert_eq!(ids(&state.visible(&next)), vec![10, 4]);
    }
}
