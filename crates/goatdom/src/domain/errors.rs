//! Domain-specific errors.

use thiserror::Error;

use crate::domain::model::NodeId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("node {0} not found in the current tree")]
    NotFound(NodeId),
    #[error("node id {0} appears more than once in the tree")]
    DuplicateNodeId(NodeId),
    #[error("index {index} out of range for {len} instructions")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("malformed config: {0}")]
    MalformedConfig(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("no tree has been built yet")]
    NoTree,
    #[error("tree builder is no longer running")]
    SessionClosed,
}

impl DomainError {
    /// Whether a user-triggered retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_error_reports_bounds() {
        let err = DomainError::IndexOutOfRange { index: 3, len: 2 };
        assert_eq!(err.to_string(), "index 3 out of range for 2 instructions");
    }

    #[test]
    fn only_network_errors_are_transient() {
        assert!(DomainError::Network("timeout".into()).is_transient());
        assert!(!DomainError::MalformedConfig("missing url".into()).is_transient());
    }
}
