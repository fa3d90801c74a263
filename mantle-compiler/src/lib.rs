//! # mantle-compiler
//!
//! Compiles loaded chunk trees into render units and caches them.
//!
//! Most callers only need [`ViewEngine`]: build one over a
//! [`ContentProvider`](mantle_syntax::ContentProvider), then call
//! [`ViewEngine::create_instance`] per render.

pub mod artifact;
pub mod cache;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod eval;
pub mod expr;
pub mod fingerprint;

pub use artifact::{ArtifactEntry, BatchArtifact};
pub use cache::{CompiledEntry, CompiledViewCache};
pub use compiler::{CompiledLayer, CompiledView, Op, ViewCompiler};
pub use engine::{DefaultViewActivator, ViewActivator, ViewEngine};
pub use error::{CompileError, EngineError};
pub use expr::{parse_expression, Expr, ExprError};
