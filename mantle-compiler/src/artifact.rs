//! Batch compilation artifacts.
//!
//! A [`BatchArtifact`] records every unit produced by
//! [`ViewEngine::batch_compilation`](crate::engine::ViewEngine::batch_compilation):
//! ids, loaded files, fingerprints, the IR listing and the chunk IR itself.
//! Loading an artifact recompiles from the stored chunks, so the content
//! provider is never consulted.
//!
//! Writes use the atomic `.tmp` + rename pattern.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mantle_core::types::{TemplateId, ViewDescriptor};
use mantle_syntax::Chunk;

use crate::compiler::CompiledView;
use crate::error::{io_err, EngineError};

/// One compiled unit inside a batch artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub descriptor: ViewDescriptor,
    pub view_id: String,
    pub class_name: String,
    pub loaded_files: BTreeSet<TemplateId>,
    #[serde(default)]
    pub fingerprints: BTreeMap<TemplateId, String>,
    pub source: String,
    /// Chunk IR per layer, page first.
    pub chunks: Vec<(TemplateId, Vec<Chunk>)>,
}

impl ArtifactEntry {
    pub fn from_view(view: &CompiledView, fingerprints: BTreeMap<TemplateId, String>) -> Self {
        Self {
            descriptor: view.descriptor.clone(),
            view_id: view.view_id.clone(),
            class_name: view.class_name.clone(),
            loaded_files: view.loaded_files.clone(),
            fingerprints,
            source: view.source.clone(),
            chunks: view.chunks.clone(),
        }
    }
}

/// Output of a batch compilation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchArtifact {
    pub compiled_at: DateTime<Utc>,
    pub entries: Vec<ArtifactEntry>,
}

impl BatchArtifact {
    pub fn new(entries: Vec<ArtifactEntry>) -> Self {
        Self {
            compiled_at: Utc::now(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, descriptor: &ViewDescriptor) -> Option<&ArtifactEntry> {
        self.entries.iter().find(|e| &e.descriptor == descriptor)
    }
}

/// Load an artifact previously written by [`save_at`].
pub fn load_at(path: &Path) -> Result<BatchArtifact, EngineError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|source| EngineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Save `artifact` atomically: write `<path>.tmp`, then rename over `path`.
pub fn save_at(path: &Path, artifact: &BatchArtifact) -> Result<(), EngineError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }

    let json = serde_json::to_string_pretty(artifact).map_err(|source| EngineError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    tracing::debug!(path = %path.display(), entries = artifact.len(), "saved batch artifact");
    Ok(())
}
