//! Mantle core library — descriptors, template ids, settings, errors.
//!
//! - [`types`] — [`TemplateId`], [`ViewDescriptor`], [`CompileParams`]
//! - [`settings`] — [`EngineSettings`] load / save
//! - [`error`] — [`SettingsError`]

pub mod error;
pub mod settings;
pub mod types;

pub use error::SettingsError;
pub use settings::{BindingSpec, EngineSettings};
pub use types::{CompileParams, TemplateId, ViewDescriptor, SHARED_FOLDER, VIEW_SECTION};
