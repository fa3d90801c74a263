//! Error types for mantle-compiler.

use std::path::PathBuf;

use thiserror::Error;

use mantle_core::types::{TemplateId, ViewDescriptor};
use mantle_syntax::{LoadError, Location};

/// Errors raised while turning chunks into a compiled view.
#[derive(Debug, Error)]
pub enum CompileError {
    /// An embedded expression does not parse.
    #[error("template syntax error at {location}: {message}")]
    TemplateSyntax { location: Location, message: String },

    /// The descriptor names no templates.
    #[error("view descriptor has no templates")]
    EmptyDescriptor,

    /// A descriptor template has no chunk list.
    #[error("no chunks supplied for template {id}")]
    MissingLayer { id: TemplateId },
}

/// Errors raised by the [`ViewEngine`](crate::engine::ViewEngine) facade.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Batch artifact I/O, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Batch artifact JSON error.
    #[error("artifact JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A loaded artifact entry does not match the view it claims to be.
    #[error("artifact entry for {descriptor} has view id {found}, expected {expected}")]
    ArtifactMismatch {
        descriptor: ViewDescriptor,
        expected: String,
        found: String,
    },
}

/// Convenience constructor for [`EngineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}
