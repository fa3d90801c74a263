//! Error types for mantle-renderer.

use thiserror::Error;

/// All errors that can abort a render.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The output-scope stack was used out of order.
    #[error("render protocol violation: {message}")]
    ProtocolViolation { message: String },

    /// The external writer failed.
    #[error("render sink error: {0}")]
    Io(#[from] std::io::Error),

    /// A model value could not be serialized for output.
    #[error("value serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rendered bytes were not valid UTF-8.
    #[error("rendered output is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub(crate) fn protocol(message: impl Into<String>) -> RenderError {
    RenderError::ProtocolViolation {
        message: message.into(),
    }
}
