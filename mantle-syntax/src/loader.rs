//! View loader — reads templates through a [`ContentProvider`] and resolves
//! `<include>` and `<extends>` into a self-contained chunk tree.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use mantle_core::types::{TemplateId, VIEW_SECTION};

use crate::chunk::{count_chunks, extend_chunks, push_chunk, Chunk};
use crate::error::LoadError;
use crate::markup::{parse_template, SyntaxOptions};
use crate::provider::ContentProvider;

pub struct ViewLoader {
    provider: Arc<dyn ContentProvider>,
    options: SyntaxOptions,
    loaded: BTreeSet<TemplateId>,
    sources: BTreeMap<TemplateId, String>,
}

impl ViewLoader {
    pub fn new(provider: Arc<dyn ContentProvider>, options: SyntaxOptions) -> Self {
        Self {
            provider,
            options,
            loaded: BTreeSet::new(),
            sources: BTreeMap::new(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn ContentProvider> {
        &self.provider
    }

    pub fn options(&self) -> &SyntaxOptions {
        &self.options
    }

    /// Load `id` with every include and extends resolved.
    pub fn load(&mut self, id: &TemplateId) -> Result<Vec<Chunk>, LoadError> {
        let mut chain = Vec::new();
        self.load_template(id, &mut chain)
    }

    /// Every template consulted by any `load` call so far.
    pub fn everything_loaded(&self) -> &BTreeSet<TemplateId> {
        &self.loaded
    }

    /// Text of each loaded template as it was first read.
    pub fn loaded_sources(&self) -> &BTreeMap<TemplateId, String> {
        &self.sources
    }

    fn load_template(
        &mut self,
        id: &TemplateId,
        chain: &mut Vec<TemplateId>,
    ) -> Result<Vec<Chunk>, LoadError> {
        if let Some(start) = chain.iter().position(|t| t == id) {
            let mut cycle = chain[start..].to_vec();
            cycle.push(id.clone());
            return Err(LoadError::CompositionCycle { chain: cycle });
        }

        let source = self.provider.source(id)?;
        self.loaded.insert(id.clone());
        let mut chunks = parse_template(&source, id, &self.options)?;
        self.sources.entry(id.clone()).or_insert(source);

        chain.push(id.clone());
        let composed = self
            .resolve_includes(id, &mut chunks, chain)
            .and_then(|()| self.apply_extends(id, chunks, chain));
        chain.pop();

        let chunks = composed?;
        tracing::debug!(template = %id, chunks = count_chunks(&chunks), "loaded template");
        Ok(chunks)
    }

    fn resolve_includes(
        &mut self,
        from: &TemplateId,
        chunks: &mut [Chunk],
        chain: &mut Vec<TemplateId>,
    ) -> Result<(), LoadError> {
        for chunk in chunks.iter_mut() {
            if let Chunk::Include {
                file,
                template,
                body,
                ..
            } = chunk
            {
                let target = self.provider.resolve(from, file);
                *body = self.load_template(&target, chain)?;
                *template = Some(target);
                continue;
            }
            for children in chunk.children_mut() {
                self.resolve_includes(from, children, chain)?;
            }
        }
        Ok(())
    }

    /// Wrap `chunks` in the layout named by a top-level `<extends>`, if any.
    fn apply_extends(
        &mut self,
        from: &TemplateId,
        chunks: Vec<Chunk>,
        chain: &mut Vec<TemplateId>,
    ) -> Result<Vec<Chunk>, LoadError> {
        let Some(pos) = chunks.iter().position(|c| matches!(c, Chunk::Extends { .. })) else {
            return Ok(chunks);
        };
        let mut chunks = chunks;
        let Chunk::Extends { file, .. } = chunks.remove(pos) else {
            return Ok(chunks);
        };

        let layout_id = self.provider.resolve(from, &file);
        let layout = self.load_template(&layout_id, chain)?;
        tracing::debug!(template = %from, layout = %layout_id, "extending layout");

        // Sections move ahead of the layout; page locals declared before a
        // section move with them and also stay in the body.
        let last_section = chunks.iter().rposition(|c| matches!(c, Chunk::Content { .. }));
        let mut sections = Vec::new();
        let mut body = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.into_iter().enumerate() {
            match chunk {
                Chunk::Content { .. } => sections.push(chunk),
                Chunk::LocalVariable { .. } if last_section.is_some_and(|last| i < last) => {
                    sections.push(chunk.clone());
                    body.push(chunk);
                }
                _ => body.push(chunk),
            }
        }

        let mut found = false;
        let mut composed = substitute_view(layout, &body, &mut found);
        if !found {
            extend_chunks(&mut composed, body);
        }

        let mut out = Vec::with_capacity(sections.len() + composed.len());
        extend_chunks(&mut out, sections);
        extend_chunks(&mut out, composed);
        Ok(out)
    }
}

/// Replace every `<use content="view"/>` in `chunks` with a copy of `body`.
fn substitute_view(chunks: Vec<Chunk>, body: &[Chunk], found: &mut bool) -> Vec<Chunk> {
    let mut out = Vec::with_capacity(chunks.len());
    for mut chunk in chunks {
        if matches!(&chunk, Chunk::UseContent { name, .. } if name == VIEW_SECTION) {
            *found = true;
            extend_chunks(&mut out, body.iter().cloned());
            continue;
        }
        for children in chunk.children_mut() {
            let taken = std::mem::take(children);
            *children = substitute_view(taken, body, found);
        }
        push_chunk(&mut out, chunk);
    }
    out
}
