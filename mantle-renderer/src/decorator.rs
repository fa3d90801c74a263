//! Decorator chain — a page body wrapped by zero or more layouts.
//!
//! Rendering runs inner-first: a layer with an inner layer renders it inside
//! the `view` section, then renders its own body through a pass-through
//! scope bound to the sink it was handed. Sections written by inner layers
//! are therefore always in `Content` before an outer layer reads them.

use std::io::Write;
use std::sync::Arc;

use serde_json::Value;

use mantle_core::types::VIEW_SECTION;

use crate::context::{RenderContext, ScopeTarget, Sink};
use crate::error::RenderError;

/// One renderable layer.
pub trait ViewBody: Send + Sync {
    /// Write this layer's output into the current scope.
    fn render_body(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError>;

    /// Called once per render, innermost layer first, before any body runs.
    fn initialize(&self, _ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Adapter turning a closure into a [`ViewBody`].
pub struct FnBody<F>(pub F);

impl<F> ViewBody for FnBody<F>
where
    F: Fn(&mut RenderContext<'_>) -> Result<(), RenderError> + Send + Sync,
{
    fn render_body(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        (self.0)(ctx)
    }
}

pub struct Decorator {
    body: Arc<dyn ViewBody>,
    inner: Option<Box<Decorator>>,
}

impl Decorator {
    /// A layer with nothing inside it.
    pub fn leaf(body: Arc<dyn ViewBody>) -> Self {
        Self { body, inner: None }
    }

    /// `body` wrapped around `inner`.
    pub fn wrap(body: Arc<dyn ViewBody>, inner: Decorator) -> Self {
        Self {
            body,
            inner: Some(Box::new(inner)),
        }
    }

    /// Build a chain from layers ordered innermost first. `None` when empty.
    pub fn from_layers<I>(layers: I) -> Option<Self>
    where
        I: IntoIterator<Item = Arc<dyn ViewBody>>,
    {
        layers.into_iter().fold(None, |inner, body| {
            Some(match inner {
                None => Decorator::leaf(body),
                Some(inner) => Decorator::wrap(body, inner),
            })
        })
    }

    /// Number of layers in the chain.
    pub fn depth(&self) -> usize {
        1 + self.inner.as_ref().map_or(0, |inner| inner.depth())
    }

    pub fn inner(&self) -> Option<&Decorator> {
        self.inner.as_deref()
    }

    /// Render the whole chain against `model` into `writer`.
    ///
    /// Every call gets a fresh [`RenderContext`]; nothing carries over
    /// between renders.
    pub fn render(&self, model: &Value, writer: &mut dyn Write) -> Result<(), RenderError> {
        tracing::debug!(layers = self.depth(), "rendering decorator chain");
        let mut ctx = RenderContext::new(model, writer);
        self.initialize(&mut ctx)?;
        self.render_view(&mut ctx, Sink::External)?;
        ctx.flush()
    }

    pub fn render_to_string(&self, model: &Value) -> Result<String, RenderError> {
        let mut buf = Vec::new();
        self.render(model, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    fn initialize(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        if let Some(inner) = &self.inner {
            inner.initialize(ctx)?;
        }
        self.body.initialize(ctx)
    }

    /// Render this layer (and its inner layers) into `sink`.
    pub fn render_view(&self, ctx: &mut RenderContext<'_>, sink: Sink) -> Result<(), RenderError> {
        if let Some(inner) = &self.inner {
            let mut view = ctx.enter_scope(ScopeTarget::named(VIEW_SECTION))?;
            let inner_sink = view.current_sink();
            inner.render_view(&mut view, inner_sink)?;
            // `view` holds only the directly wrapped layer, not deeper ones.
            view.take_content(VIEW_SECTION);
            view.exit()?;
        }

        let mut scope = ctx.enter_scope(ScopeTarget::PassThrough(sink))?;
        self.body.render_body(&mut scope)?;
        scope.exit()
    }
}
