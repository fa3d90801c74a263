//! # mantle-renderer
//!
//! The decorator render protocol: a stack of output scopes, a per-render
//! `Content` map of named sections, and layer chains rendered inner-first.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use mantle_renderer::{Decorator, FnBody, RenderContext, RenderError, ScopeTarget, ViewBody};
//!
//! let page: Arc<dyn ViewBody> = Arc::new(FnBody(|ctx: &mut RenderContext<'_>| {
//!     ctx.write("<p>hi</p>")?;
//!     ctx.scoped(ScopeTarget::named("title"), |ctx| ctx.write("Home"))
//! }));
//! let layout: Arc<dyn ViewBody> = Arc::new(FnBody(|ctx: &mut RenderContext<'_>| {
//!     let title = ctx.content("title").to_string();
//!     let view = ctx.content("view").to_string();
//!     ctx.write(&format!("<title>{title}</title>{view}"))
//! }));
//!
//! let chain = Decorator::wrap(layout, Decorator::leaf(page));
//! let html = chain.render_to_string(&serde_json::Value::Null)?;
//! assert_eq!(html, "<title>Home</title><p>hi</p>");
//! # Ok::<(), RenderError>(())
//! ```

pub mod context;
pub mod decorator;
pub mod error;

pub use context::{RenderContext, ScopeGuard, ScopeTarget, Sink};
pub use decorator::{Decorator, FnBody, ViewBody};
pub use error::RenderError;
