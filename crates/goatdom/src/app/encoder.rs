//! Turning a selected node into a retrieval instruction.

use crate::app::tree::TreeModel;
use crate::domain::errors::DomainError;
use crate::domain::model::{
    DomNode, Flags, InstructionPreview, NodeId, NodeOutput, RetrievalInstruction,
};

/// Stable query string for a node within its snapshot.
pub fn node_query(id: NodeId) -> String {
    format!("nq_{id}")
}

/// Level tag for a depth. Siblings share a location.
pub fn location(depth: usize) -> String {
    format!("l{depth}")
}

/// Default output key: the tag name verbatim, or an id-based fallback when there is no tag.
pub fn default_key(node: &DomNode) -> String {
    if node.tag_type.is_empty() {
        format!("k_{}", node.id)
    } else {
        node.tag_type.clone()
    }
}

/// Encode `node`, found at `depth` in its snapshot, as a new instruction.
///
/// The preview is copied out of the node so the instruction keeps its context after the tree
/// is rebuilt.
pub fn encode(node: &DomNode, depth: usize) -> RetrievalInstruction {
    RetrievalInstruction {
        node_query: node_query(node.id),
        output: NodeOutput {
            location: location(depth),
            key: default_key(node),
        },
        flags: Flags::new(),
        preview: Some(InstructionPreview {
            id: node.id,
            tag_type: node.tag_type.clone(),
            raw_preview: node.raw_preview.clone(),
            level: depth,
        }),
    }
}

/// Resolve `id` in `tree` and encode it.
pub fn encode_id(tree: &TreeModel, id: NodeId) -> Result<RetrievalInstruction, DomainError> {
    let node = tree.node(id)?;
    let depth = tree.depth_of(id)?;
    Ok(encode(node, depth))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> TreeModel {
        TreeModel::new(
            DomNode::element(1, "html")
                .with_children([DomNode::element(2, "h1").with_body("X").with_preview("<h1>X</h1>")]),
        )
        .unwrap()
    }

    #[test]
    fn heading_selection_uses_tag_as_key() {
        let instruction = encode_id(&tree(), 2).unwrap();
        let preview = instruction.preview.as_ref().unwrap();
        assert_eq!(preview.tag_type, "h1");
        assert_eq!(preview.level, 1);
        assert_eq!(preview.raw_preview, "<h1>X</h1>");
        assert_eq!(instruction.output.key, "h1");
        assert_eq!(instruction.output.location, "l1");
        assert_eq!(instruction.node_query, "nq_2");
        assert!(instruction.flags.is_empty());
    }

    #[test]
    fn encoding_is_deterministic_within_a_snapshot() {
        let tree = tree();
        assert_eq!(encode_id(&tree, 2).unwrap(), encode_id(&tree, 2).unwrap());
    }

    #[test]
    fn missing_tag_falls_back_to_id_key() {
        let node = DomNode::element(9, "");
        assert_eq!(encode(&node, 0).output.key, "k_9");
    }

    #[test]
    fn tag_is_used_verbatim_as_key() {
        let node = DomNode::element(3, "h1 ");
        assert_eq!(encode(&node, 0).output.key, "h1 ");
    }

    #[test]
    fn unknown_node_is_not_found() {
        assert_eq!(encode_id(&tree(), 7).unwrap_err(), DomainError::NotFound(7));
    }
}
