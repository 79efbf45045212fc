//! Import and export of `.goat` configuration artifacts.
//!
//! An artifact is the JSON form of `{ url, retrieval_instructions }`. Import is all-or-nothing:
//! the caller receives either a complete pair or [`DomainError::MalformedConfig`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::model::RetrievalInstruction;
use crate::infra::config::Config;
use crate::infra::fs::write_atomic;

/// File extension used for artifacts.
pub const ARTIFACT_EXTENSION: &str = "goat";

/// Controls how artifacts are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactOptions {
    pub pretty: bool,
    pub include_preview: bool,
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            include_preview: true,
        }
    }
}

impl ArtifactOptions {
    /// Build options from configuration defaults.
    pub fn from_config(config: &Config) -> Self {
        Self {
            pretty: config.artifact.pretty(),
            include_preview: config.artifact.include_preview(),
        }
    }
}

/// Decoded artifact contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub url: String,
    pub retrieval_instructions: Vec<RetrievalInstruction>,
}

/// Serialize a URL and its instructions into artifact text.
pub fn export(
    url: &str,
    instructions: &[RetrievalInstruction],
    options: ArtifactOptions,
) -> Result<String> {
    let retrieval_instructions = instructions
        .iter()
        .cloned()
        .map(|mut instruction| {
            if !options.include_preview {
                instruction.preview = None;
            }
            instruction
        })
        .collect();
    let artifact = Artifact {
        url: url.to_owned(),
        retrieval_instructions,
    };

    let text = if options.pretty {
        serde_json::to_string_pretty(&artifact)
    } else {
        serde_json::to_string(&artifact)
    }
    .context("failed to serialize artifact")?;
    Ok(text)
}

/// Decode artifact text into its URL and instructions.
pub fn import(text: &str) -> Result<(String, Vec<RetrievalInstruction>), DomainError> {
    let artifact: Artifact = serde_json::from_str(text).map_err(|err| {
        tracing::warn!(error = %err, "artifact rejected");
        DomainError::MalformedConfig(err.to_string())
    })?;
    Ok((artifact.url, artifact.retrieval_instructions))
}

/// Append the artifact extension when `path` has none.
pub fn artifact_path(path: impl Into<PathBuf>) -> PathBuf {
    let mut path = path.into();
    if path.extension().is_none() {
        path.set_extension(ARTIFACT_EXTENSION);
    }
    path
}

/// Export to a file, returning the path actually written.
pub fn write_artifact(
    path: impl Into<PathBuf>,
    url: &str,
    instructions: &[RetrievalInstruction],
    options: ArtifactOptions,
) -> Result<PathBuf> {
    let path = artifact_path(path);
    let text = export(url, instructions, options)?;
    write_atomic(&path, text.as_bytes())?;
    tracing::info!(path = %path.display(), count = instructions.len(), "artifact written");
    Ok(path)
}

/// Import from a file. Decoding failures surface as [`DomainError::MalformedConfig`] inside
/// the returned error.
pub fn read_artifact(path: &Path) -> Result<(String, Vec<RetrievalInstruction>)> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read artifact {}", path.display()))?;
    import(&text).with_context(|| format!("invalid artifact {}", path.display()))
}
