//! Render context — the output-scope stack and the `Content` map.
//!
//! Every write lands in the top scope. A pass-through scope forwards to a
//! sink (the external writer or an enclosing frame); a named scope collects
//! into a private buffer that is appended to `Content[name]` when its guard
//! exits. A guard dropped without [`ScopeGuard::exit`] discards its buffer.

use std::collections::HashMap;
use std::io::Write;
use std::ops::{Deref, DerefMut};

use serde_json::Value;

use crate::error::{protocol, RenderError};

// ---------------------------------------------------------------------------
// Scope targets
// ---------------------------------------------------------------------------

/// Where a pass-through scope sends its writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    /// The writer handed to the render call.
    External,
    /// The frame at this depth of the scope stack.
    Frame(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeTarget {
    PassThrough(Sink),
    Named(String),
}

impl ScopeTarget {
    pub fn named(name: impl Into<String>) -> Self {
        ScopeTarget::Named(name.into())
    }
}

#[derive(Debug)]
enum Frame {
    PassThrough(Sink),
    Buffer { name: String, buf: String },
}

// ---------------------------------------------------------------------------
// RenderContext
// ---------------------------------------------------------------------------

/// Per-render state. Created by each top-level render and threaded by
/// `&mut` through every layer of the decorator chain.
pub struct RenderContext<'r> {
    frames: Vec<Frame>,
    content: HashMap<String, String>,
    globals: HashMap<String, Value>,
    model: &'r Value,
    writer: &'r mut dyn Write,
}

impl<'r> RenderContext<'r> {
    pub fn new(model: &'r Value, writer: &'r mut dyn Write) -> Self {
        Self {
            frames: Vec::new(),
            content: HashMap::new(),
            globals: HashMap::new(),
            model,
            writer,
        }
    }

    pub fn model(&self) -> &'r Value {
        self.model
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Sink that forwards into the current top scope.
    pub fn current_sink(&self) -> Sink {
        match self.frames.len() {
            0 => Sink::External,
            n => Sink::Frame(n - 1),
        }
    }

    /// Accumulated text of section `name`; empty when nothing was written.
    pub fn content(&self, name: &str) -> &str {
        self.content.get(name).map(String::as_str).unwrap_or("")
    }

    /// Remove section `name`, returning what it held.
    pub fn take_content(&mut self, name: &str) -> Option<String> {
        self.content.remove(name)
    }

    pub fn has_content(&self, name: &str) -> bool {
        self.content.get(name).is_some_and(|s| !s.is_empty())
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// Push a scope. The returned guard pops it again.
    pub fn enter_scope(&mut self, target: ScopeTarget) -> Result<ScopeGuard<'_, 'r>, RenderError> {
        let frame = match target {
            ScopeTarget::PassThrough(Sink::Frame(idx)) if idx >= self.frames.len() => {
                return Err(protocol(format!(
                    "pass-through to frame {idx} but only {} frames are open",
                    self.frames.len()
                )))
            }
            ScopeTarget::PassThrough(sink) => Frame::PassThrough(sink),
            ScopeTarget::Named(name) => Frame::Buffer {
                name,
                buf: String::new(),
            },
        };
        let depth = self.frames.len();
        self.frames.push(frame);
        Ok(ScopeGuard {
            ctx: self,
            depth,
            exited: false,
        })
    }

    /// Run `f` inside a scope that is exited on success and discarded on error.
    pub fn scoped<T, F>(&mut self, target: ScopeTarget, f: F) -> Result<T, RenderError>
    where
        F: FnOnce(&mut RenderContext<'r>) -> Result<T, RenderError>,
    {
        let mut guard = self.enter_scope(target)?;
        let value = f(&mut *guard)?;
        guard.exit()?;
        Ok(value)
    }

    /// Write `text` to the top scope.
    pub fn write(&mut self, text: &str) -> Result<(), RenderError> {
        if text.is_empty() && !self.frames.is_empty() {
            return Ok(());
        }
        let Some(mut idx) = self.frames.len().checked_sub(1) else {
            return Err(protocol("write with no active output scope"));
        };
        loop {
            match &mut self.frames[idx] {
                Frame::Buffer { buf, .. } => {
                    buf.push_str(text);
                    return Ok(());
                }
                Frame::PassThrough(Sink::External) => {
                    self.writer.write_all(text.as_bytes())?;
                    return Ok(());
                }
                Frame::PassThrough(Sink::Frame(target)) => {
                    if *target >= idx {
                        return Err(protocol("pass-through scope forwards to itself"));
                    }
                    idx = *target;
                }
            }
        }
    }

    pub(crate) fn flush(&mut self) -> Result<(), RenderError> {
        self.writer.flush()?;
        Ok(())
    }

    fn close_frame(&mut self, depth: usize) -> Result<(), RenderError> {
        if self.frames.len() != depth + 1 {
            let open = self.frames.len();
            self.frames.truncate(depth);
            return Err(protocol(format!(
                "scope at depth {depth} exited while {open} scopes are open"
            )));
        }
        if let Some(Frame::Buffer { name, buf }) = self.frames.pop() {
            self.content.entry(name).or_default().push_str(&buf);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScopeGuard
// ---------------------------------------------------------------------------

/// An open scope. Derefs to the context so nested scopes are entered
/// through the guard.
pub struct ScopeGuard<'c, 'r> {
    ctx: &'c mut RenderContext<'r>,
    depth: usize,
    exited: bool,
}

impl<'c, 'r> ScopeGuard<'c, 'r> {
    /// Close the scope normally. A named scope's buffer is appended to its
    /// section.
    pub fn exit(mut self) -> Result<(), RenderError> {
        self.exited = true;
        self.ctx.close_frame(self.depth)
    }
}

impl<'c, 'r> Deref for ScopeGuard<'c, 'r> {
    type Target = RenderContext<'r>;

    fn deref(&self) -> &Self::Target {
        &*self.ctx
    }
}

impl<'c, 'r> DerefMut for ScopeGuard<'c, 'r> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.ctx
    }
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        if !self.exited {
            tracing::trace!(depth = self.depth, "discarding unexited output scope");
            self.ctx.frames.truncate(self.depth);
        }
    }
}
