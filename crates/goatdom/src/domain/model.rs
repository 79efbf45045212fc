//! Domain models for document trees, retrieval instructions, and scrape requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier of a node inside one tree snapshot.
pub type NodeId = u64;

/// Instruction-specific extraction options.
pub type Flags = BTreeMap<String, serde_json::Value>;

/// One element of a parsed document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomNode {
    pub id: NodeId,
    pub tag_type: String,
    /// Short textual or HTML preview of the element.
    #[serde(rename = "raw", default)]
    pub raw_preview: String,
    /// Text content, present only for text-carrying elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<DomNode>,
}

impl DomNode {
    /// Create a childless element without preview or body.
    pub fn element(id: NodeId, tag_type: impl Into<String>) -> Self {
        Self {
            id,
            tag_type: tag_type.into(),
            raw_preview: String::new(),
            body: None,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_preview(mut self, raw: impl Into<String>) -> Self {
        self.raw_preview = raw.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = DomNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Whether the element carries text content.
    pub fn has_data(&self) -> bool {
        self.body.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Where extracted data is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub location: String,
    pub key: String,
}

/// Context captured from the source node when an instruction is authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionPreview {
    pub id: NodeId,
    pub tag_type: String,
    #[serde(rename = "raw", default)]
    pub raw_preview: String,
    /// Depth of the node in the tree it was selected from.
    pub level: usize,
}

/// One authored extraction rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalInstruction {
    pub node_query: String,
    pub output: NodeOutput,
    #[serde(default)]
    pub flags: Flags,
    #[serde(rename = "_preview", default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<InstructionPreview>,
}

impl RetrievalInstruction {
    pub fn key(&self) -> &str {
        &self.output.key
    }
}

/// Payload handed to the remote scrape operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub url: String,
    pub retrieval_instructions: Vec<RetrievalInstruction>,
}
