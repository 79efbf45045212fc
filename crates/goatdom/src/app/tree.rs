//! Immutable document tree snapshots.

use std::collections::HashMap;

use crate::domain::errors::DomainError;
use crate::domain::model::{DomNode, NodeId};

/// Child indices leading from the root to a node.
#[derive(Debug, Clone)]
struct NodeSlot {
    path: Vec<usize>,
}

/// One snapshot of a document's element hierarchy.
///
/// The tree is never patched; a rebuild produces a new snapshot that replaces the old one
/// wholesale.
#[derive(Debug, Clone)]
pub struct TreeModel {
    root: DomNode,
    index: HashMap<NodeId, NodeSlot>,
}

impl TreeModel {
    /// Index a tree, rejecting snapshots whose node ids are not unique.
    pub fn new(root: DomNode) -> Result<Self, DomainError> {
        let index = index_nodes(&root)?;
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &DomNode {
        &self.root
    }

    /// Number of nodes in the snapshot.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Result<&DomNode, DomainError> {
        let slot = self.index.get(&id).ok_or(DomainError::NotFound(id))?;
        let mut current = &self.root;
        for &position in &slot.path {
            current = current
                .children
                .get(position)
                .ok_or(DomainError::NotFound(id))?;
        }
        Ok(current)
    }

    /// Depth of a node, the root being at depth 0.
    pub fn depth_of(&self, id: NodeId) -> Result<usize, DomainError> {
        self.index
            .get(&id)
            .map(|slot| slot.path.len())
            .ok_or(DomainError::NotFound(id))
    }

    /// Ids from the root down to, but excluding, the given node.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>, DomainError> {
        let slot = self.index.get(&id).ok_or(DomainError::NotFound(id))?;
        let mut ids = Vec::with_capacity(slot.path.len());
        let mut current = &self.root;
        for &position in &slot.path {
            ids.push(current.id);
            current = current
                .children
                .get(position)
                .ok_or(DomainError::NotFound(id))?;
        }
        Ok(ids)
    }

    /// Depth-annotated nodes in document order.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![(&self.root, 0)],
        }
    }

    /// Descendants of the root whose tag equals `tag` exactly, in document order.
    pub fn find_by_tag<'a>(
        &'a self,
        tag: &'a str,
    ) -> impl Iterator<Item = (&'a DomNode, usize)> + 'a {
        self.walk()
            .skip(1)
            .filter(move |(node, _)| node.tag_type == tag)
    }
}

fn index_nodes(root: &DomNode) -> Result<HashMap<NodeId, NodeSlot>, DomainError> {
    let mut index = HashMap::new();
    let mut stack: Vec<(&DomNode, Vec<usize>)> = vec![(root, Vec::new())];

    while let Some((node, path)) = stack.pop() {
        for (position, child) in node.children.iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(position);
            stack.push((child, child_path));
        }
        if index.insert(node.id, NodeSlot { path }).is_some() {
            return Err(DomainError::DuplicateNodeId(node.id));
        }
    }

    Ok(index)
}

/// Pre-order traversal yielding `(node, depth)` pairs.
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    stack: Vec<(&'a DomNode, usize)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (&'a DomNode, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (child, depth + 1)));
        Some((node, depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DomNode {
        DomNode::element(1, "html").with_children([
            DomNode::element(2, "head").with_children([DomNode::element(3, "title")]),
            DomNode::element(4, "body").with_children([
                DomNode::element(5, "h1").with_body("Hello"),
                DomNode::element(6, "p").with_body("World"),
            ]),
        ])
    }

    #[test]
    fn walk_is_document_order_with_depths() {
        let tree = TreeModel::new(sample()).unwrap();
        let visited: Vec<_> = tree.walk().map(|(node, depth)| (node.id, depth)).collect();
        assert_eq!(
            visited,
            vec![(1, 0), (2, 1), (3, 2), (4, 1), (5, 2), (6, 2)]
        );
    }

    #[test]
    fn walk_is_restartable() {
        let tree = TreeModel::new(sample()).unwrap();
        let first: Vec<_> = tree.walk().map(|(node, _)| node.id).collect();
        let second: Vec<_> = tree.walk().map(|(node, _)| node.id).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), tree.len());
    }

    #[test]
    fn lookup_by_id_and_depth() {
        let tree = TreeModel::new(sample()).unwrap();
        assert_eq!(tree.node(5).unwrap().tag_type, "h1");
        assert_eq!(tree.depth_of(5).unwrap(), 2);
        assert_eq!(tree.depth_of(1).unwrap(), 0);
    }

    #[test]
    fn ancestors_run_from_root_to_parent() {
        let tree = TreeModel::new(sample()).unwrap();
        assert_eq!(tree.ancestors(6).unwrap(), vec![1, 4]);
        assert!(tree.ancestors(1).unwrap().is_empty());
    }

    #[test]
    fn missing_node_is_not_found() {
        let tree = TreeModel::new(sample()).unwrap();
        assert_eq!(tree.node(42).unwrap_err(), DomainError::NotFound(42));
        assert_eq!(tree.depth_of(42).unwrap_err(), DomainError::NotFound(42));
        assert_eq!(tree.ancestors(42).unwrap_err(), DomainError::NotFound(42));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let root = DomNode::element(1, "html")
            .with_children([DomNode::element(2, "p"), DomNode::element(2, "p")]);
        assert_eq!(
            TreeModel::new(root).unwrap_err(),
            DomainError::DuplicateNodeId(2)
        );
    }

    #[test]
    fn find_by_tag_matches_exact_tag_among_descendants() {
        let tree = TreeModel::new(sample()).unwrap();
        let ids: Vec<_> = tree.find_by_tag("h1").map(|(node, _)| node.id).collect();
        assert_eq!(ids, vec![5]);
        assert_eq!(tree.find_by_tag("H1").count(), 0);
        assert_eq!(tree.find_by_tag("html").count(), 0);
    }
}
