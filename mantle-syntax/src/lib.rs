//! Mantle syntax — everything between template text and the chunk IR.
//!
//! - [`binding`] — binding phrase grammar
//! - [`markup`] — chunk builder for template markup
//! - [`loader`] — include / extends resolution
//! - [`provider`] — template sources

pub mod binding;
pub mod chunk;
pub mod error;
pub mod loader;
pub mod markup;
pub mod provider;

pub use binding::{parse_bindings, BindingNode, BindingPhrase, SpannedNode};
pub use chunk::{Chunk, ConditionalBranch, Location};
pub use error::LoadError;
pub use loader::ViewLoader;
pub use markup::{parse_template, SyntaxOptions};
pub use provider::{ContentProvider, FileSystemProvider, InMemoryProvider};
