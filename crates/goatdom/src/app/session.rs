//! Authoring session state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::app::artifact::{self, ArtifactOptions};
use crate::app::encoder;
use crate::app::expansion::ExpansionState;
use crate::app::instructions::{InstructionStore, KeyWarning};
use crate::app::tree::TreeModel;
use crate::domain::errors::DomainError;
use crate::domain::model::{NodeId, RetrievalInstruction, ScrapeRequest};

/// Everything one user is editing: the page URL, the tree currently shown for it, and the
/// instructions authored so far.
///
/// Instructions are independent of the tree they were marked on; attaching a new snapshot
/// never touches them.
#[derive(Debug, Default, Clone)]
pub struct AuthoringSession {
    url: String,
    tree: Option<Arc<TreeModel>>,
    store: InstructionStore,
    expansion: ExpansionState,
}

impl AuthoringSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn tree(&self) -> Option<&Arc<TreeModel>> {
        self.tree.as_ref()
    }

    /// Show a freshly built snapshot. Expansion resets unless it is the snapshot already shown.
    pub fn attach_tree(&mut self, tree: Arc<TreeModel>) {
        if self
            .tree
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &tree))
        {
            return;
        }
        self.expansion.sync(&tree);
        tracing::debug!(nodes = tree.len(), "tree attached");
        self.tree = Some(tree);
    }

    /// Drop the shown tree, e.g. after a failed build.
    pub fn detach_tree(&mut self) {
        self.tree = None;
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    pub fn expansion_mut(&mut self) -> &mut ExpansionState {
        &mut self.expansion
    }

    /// Encode the node with `id` from the attached tree and append it. Returns its index.
    pub fn mark(&mut self, id: NodeId) -> Result<usize, DomainError> {
        let tree = self.tree.as_ref().ok_or(DomainError::NoTree)?;
        let instruction = encoder::encode_id(tree, id)?;
        Ok(self.store.append(instruction))
    }

    /// Mark every descendant of the root with exactly this tag, in document order. Returns the
    /// new indices.
    pub fn mark_tag(&mut self, tag: &str) -> Result<Vec<usize>, DomainError> {
        let tree = self.tree.as_ref().ok_or(DomainError::NoTree)?;
        let encoded: Vec<_> = tree
            .find_by_tag(tag)
            .map(|(node, depth)| encoder::encode(node, depth))
            .collect();
        Ok(encoded
            .into_iter()
            .map(|instruction| self.store.append(instruction))
            .collect())
    }

    pub fn set_key(&mut self, index: usize, key: impl Into<String>) -> Result<(), DomainError> {
        self.store.set_key(index, key)
    }

    pub fn delete(&mut self, index: usize) -> Result<RetrievalInstruction, DomainError> {
        self.store.delete(index)
    }

    pub fn instructions(&self) -> Vec<RetrievalInstruction> {
        self.store.to_list()
    }

    pub fn store(&self) -> &InstructionStore {
        &self.store
    }

    /// Key problems worth surfacing to the user.
    pub fn key_warnings(&self) -> Vec<KeyWarning> {
        let warnings = self.store.key_warnings();
        if !warnings.is_empty() {
            tracing::debug!(count = warnings.len(), "output key warnings");
        }
        warnings
    }

    pub fn export_artifact(&self, options: ArtifactOptions) -> Result<String> {
        artifact::export(&self.url, &self.store.to_list(), options)
    }

    /// Replace URL and instructions from artifact text. On failure nothing changes.
    ///
    /// The attached tree is kept; the caller decides when to rebuild for the new URL.
    pub fn import_artifact(&mut self, text: &str) -> Result<(), DomainError> {
        let (url, instructions) = artifact::import(text)?;
        self.apply_import(url, instructions);
        Ok(())
    }

    /// Write the session as an artifact file, returning the path written.
    pub fn save(&self, path: impl Into<PathBuf>, options: ArtifactOptions) -> Result<PathBuf> {
        artifact::write_artifact(path, &self.url, &self.store.to_list(), options)
    }

    /// Load an artifact file. On failure nothing changes.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let (url, instructions) = artifact::read_artifact(path)?;
        self.apply_import(url, instructions);
        Ok(())
    }

    pub fn scrape_request(&self) -> ScrapeRequest {
        ScrapeRequest {
            url: self.url.clone(),
            retrieval_instructions: self.store.to_list(),
        }
    }

    fn apply_import(&mut self, url: String, instructions: Vec<RetrievalInstruction>) {
        tracing::info!(url = %url, count = instructions.len(), "artifact imported");
        self.url = url;
        self.store.replace_all(instructions);
    }
}
