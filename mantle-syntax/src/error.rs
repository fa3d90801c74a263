//! Error types for mantle-syntax.

use std::path::PathBuf;

use thiserror::Error;

use mantle_core::types::TemplateId;

use crate::chunk::Location;

/// All errors that can arise while loading templates into chunks.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Malformed template construct.
    #[error("template syntax error at {location}: {message}")]
    TemplateSyntax { location: Location, message: String },

    /// An extends/include chain refers back to a template already being loaded.
    #[error("composition cycle: {}", format_chain(.chain))]
    CompositionCycle { chain: Vec<TemplateId> },

    /// The content provider has no template with this id.
    #[error("template not found: {id}")]
    NotFound { id: TemplateId },

    /// Filesystem error while reading a template.
    #[error("template io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub(crate) fn syntax(location: Location, message: impl Into<String>) -> Self {
        LoadError::TemplateSyntax {
            location,
            message: message.into(),
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> LoadError {
    LoadError::Io {
        path: path.into(),
        source,
    }
}

fn format_chain(chain: &[TemplateId]) -> String {
    chain
        .iter()
        .map(TemplateId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
