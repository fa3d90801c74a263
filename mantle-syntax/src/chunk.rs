//! Template intermediate representation.
//!
//! A template becomes an ordered `Vec<Chunk>`; nested constructs own their
//! child sequences, so the result is always a tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use mantle_core::types::TemplateId;

/// Source position of a chunk (1-based line and column).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub template: TemplateId,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(template: TemplateId, line: usize, column: usize) -> Self {
        Self {
            template,
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.template, self.line, self.column)
    }
}

/// One `<if>` / `<elseif>` arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalBranch {
    pub condition: String,
    pub body: Vec<Chunk>,
    pub location: Location,
}

/// A single node of a template's IR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chunk {
    /// Text written as-is.
    Literal { text: String },

    /// `${code}` / `!{code}`.
    Output {
        code: String,
        escape: bool,
        location: Location,
    },

    /// `<if>` with optional `<elseif>` arms and `<else/>`.
    Conditional {
        branches: Vec<ConditionalBranch>,
        otherwise: Option<Vec<Chunk>>,
    },

    /// `<for each="variable in iterable">`.
    Loop {
        variable: String,
        iterable: String,
        body: Vec<Chunk>,
        location: Location,
    },

    /// `<var name="value"/>`.
    LocalVariable {
        name: String,
        value: String,
        location: Location,
    },

    /// `<global name="value"/>`.
    GlobalVariable {
        name: String,
        value: String,
        location: Location,
    },

    /// `<content name="…">` — body is written into a named scope.
    Content { name: String, body: Vec<Chunk> },

    /// `<use content="…"/>` — re-emits accumulated section text, or
    /// `default` when nothing was accumulated.
    UseContent { name: String, default: Vec<Chunk> },

    /// `<include file="…"/>`. `template` and `body` are filled in by the loader.
    Include {
        file: String,
        template: Option<TemplateId>,
        locals: Vec<(String, String)>,
        body: Vec<Chunk>,
        location: Location,
    },

    /// `<extends template="…"/>`. Removed by the loader.
    Extends { file: String, location: Location },
}

impl Chunk {
    pub fn literal(text: impl Into<String>) -> Self {
        Chunk::Literal { text: text.into() }
    }

    /// Child sequences owned by this chunk.
    pub fn children(&self) -> Vec<&[Chunk]> {
        match self {
            Chunk::Conditional {
                branches,
                otherwise,
            } => {
                let mut out: Vec<&[Chunk]> = branches.iter().map(|b| b.body.as_slice()).collect();
                if let Some(other) = otherwise {
                    out.push(other.as_slice());
                }
                out
            }
            Chunk::Loop { body, .. }
            | Chunk::Content { body, .. }
            | Chunk::Include { body, .. } => vec![body.as_slice()],
            Chunk::UseContent { default, .. } => vec![default.as_slice()],
            Chunk::Literal { .. }
            | Chunk::Output { .. }
            | Chunk::LocalVariable { .. }
            | Chunk::GlobalVariable { .. }
            | Chunk::Extends { .. } => Vec::new(),
        }
    }

    /// Mutable child sequences owned by this chunk.
    pub fn children_mut(&mut self) -> Vec<&mut Vec<Chunk>> {
        match self {
            Chunk::Conditional {
                branches,
                otherwise,
            } => {
                let mut out: Vec<&mut Vec<Chunk>> =
                    branches.iter_mut().map(|b| &mut b.body).collect();
                if let Some(other) = otherwise {
                    out.push(other);
                }
                out
            }
            Chunk::Loop { body, .. }
            | Chunk::Content { body, .. }
            | Chunk::Include { body, .. } => vec![body],
            Chunk::UseContent { default, .. } => vec![default],
            Chunk::Literal { .. }
            | Chunk::Output { .. }
            | Chunk::LocalVariable { .. }
            | Chunk::GlobalVariable { .. }
            | Chunk::Extends { .. } => Vec::new(),
        }
    }
}

/// Append `chunk`, merging adjacent literals.
pub fn push_chunk(chunks: &mut Vec<Chunk>, chunk: Chunk) {
    if let Chunk::Literal { text } = &chunk {
        if text.is_empty() {
            return;
        }
        if let Some(Chunk::Literal { text: last }) = chunks.last_mut() {
            last.push_str(text);
            return;
        }
    }
    chunks.push(chunk);
}

/// Append every chunk of `more`, merging literals at the seam.
pub fn extend_chunks(chunks: &mut Vec<Chunk>, more: impl IntoIterator<Item = Chunk>) {
    for chunk in more {
        push_chunk(chunks, chunk);
    }
}

/// Total number of chunks in the tree, nested ones included.
pub fn count_chunks(chunks: &[Chunk]) -> usize {
    chunks
        .iter()
        .map(|c| 1 + c.children().into_iter().map(count_chunks).sum::<usize>())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_merges_literals() {
        let mut chunks = Vec::new();
        push_chunk(&mut chunks, Chunk::literal("a"));
        push_chunk(&mut chunks, Chunk::literal(""));
        push_chunk(&mut chunks, Chunk::literal("b"));
        assert_eq!(chunks, vec![Chunk::literal("ab")]);
    }

    #[test]
    fn count_includes_nested() {
        let chunks = vec![
            Chunk::literal("x"),
            Chunk::Content {
                name: "head".into(),
                body: vec![Chunk::literal("y")],
            },
        ];
        assert_eq!(count_chunks(&chunks), 3);
    }

    #[test]
    fn location_display() {
        let loc = Location::new(TemplateId::from("home/index.html"), 3, 7);
        assert_eq!(loc.to_string(), "home/index.html:3:7");
    }
}
