//! View engine — the load → compile → cache → activate pipeline.
//!
//! ```text
//!   ViewDescriptor
//!        │  create_entry (cache miss)
//!        ▼
//!   ViewLoader ──► chunks per template ──► ViewCompiler ──► CompiledView
//!        │                                                     │
//!        └── loaded files ──► fingerprints ──► CompiledEntry ◄─┘
//!                                                  │ store
//!                                                  ▼
//!                                          CompiledViewCache
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use mantle_core::types::{TemplateId, ViewDescriptor};
use mantle_core::EngineSettings;
use mantle_renderer::{Decorator, ViewBody};
use mantle_syntax::{ContentProvider, SyntaxOptions, ViewLoader};

use crate::artifact::{ArtifactEntry, BatchArtifact};
use crate::cache::{CompiledEntry, CompiledViewCache};
use crate::compiler::{CompiledView, ViewCompiler};
use crate::error::{CompileError, EngineError};
use crate::fingerprint;

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

/// Turns a compiled view into a renderable decorator chain.
pub trait ViewActivator: Send + Sync {
    fn activate(&self, view: &Arc<CompiledView>) -> Result<Decorator, EngineError>;
}

/// Chains the layers page-innermost, last template outermost.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultViewActivator;

impl ViewActivator for DefaultViewActivator {
    fn activate(&self, view: &Arc<CompiledView>) -> Result<Decorator, EngineError> {
        let layers = view
            .layers
            .iter()
            .map(|layer| Arc::clone(layer) as Arc<dyn ViewBody>);
        Decorator::from_layers(layers).ok_or(EngineError::Compile(CompileError::EmptyDescriptor))
    }
}

// ---------------------------------------------------------------------------
// ViewEngine
// ---------------------------------------------------------------------------

pub struct ViewEngine {
    provider: Arc<dyn ContentProvider>,
    settings: EngineSettings,
    options: SyntaxOptions,
    cache: Arc<CompiledViewCache>,
    activator: Arc<dyn ViewActivator>,
}

impl ViewEngine {
    pub fn new(
        provider: Arc<dyn ContentProvider>,
        settings: EngineSettings,
        cache: Arc<CompiledViewCache>,
    ) -> Self {
        let options = SyntaxOptions::from_settings(&settings);
        Self {
            provider,
            settings,
            options,
            cache,
            activator: Arc::new(DefaultViewActivator),
        }
    }

    pub fn with_activator(mut self, activator: Arc<dyn ViewActivator>) -> Self {
        self.activator = activator;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<CompiledViewCache> {
        &self.cache
    }

    pub fn provider(&self) -> &Arc<dyn ContentProvider> {
        &self.provider
    }

    /// Descriptor for `templates` carrying the configured compile parameters.
    pub fn descriptor<I, T>(&self, templates: I) -> ViewDescriptor
    where
        I: IntoIterator<Item = T>,
        T: Into<TemplateId>,
    {
        ViewDescriptor::new(templates).with_params(self.settings.compile_params(None))
    }

    /// Cached entry for `descriptor`, without compiling.
    pub fn get_entry(&self, descriptor: &ViewDescriptor) -> Option<Arc<CompiledEntry>> {
        self.cache.lookup(descriptor)
    }

    /// Cached entry for `descriptor`, compiling and storing it on a miss.
    ///
    /// Repeated calls without invalidation return the same entry. An entry
    /// whose sources changed while it was being built is returned but not
    /// cached; an edit landing after that check is left to [`Self::evict_stale`].
    pub fn create_entry(&self, descriptor: &ViewDescriptor) -> Result<Arc<CompiledEntry>, EngineError> {
        if let Some(entry) = self.cache.lookup(descriptor) {
            return Ok(entry);
        }
        let entry = Arc::new(self.build_entry(descriptor)?);
        self.publish(&entry);
        Ok(entry)
    }

    /// A fresh decorator chain for `descriptor`.
    pub fn create_instance(&self, descriptor: &ViewDescriptor) -> Result<Decorator, EngineError> {
        self.create_entry(descriptor)?.create_instance()
    }

    /// Drop every cached view that loaded `file`.
    pub fn invalidate(&self, file: &TemplateId) -> Vec<ViewDescriptor> {
        self.cache.invalidate(file)
    }

    /// Drop every cached view whose sources changed or disappeared.
    ///
    /// Entries replaced since the staleness check are kept.
    pub fn evict_stale(&self) -> Vec<ViewDescriptor> {
        let stale: Vec<Arc<CompiledEntry>> = self
            .cache
            .entries()
            .into_iter()
            .filter(|entry| !entry.is_current(self.provider.as_ref()))
            .collect();
        if stale.is_empty() {
            return Vec::new();
        }
        let removed = self.cache.remove_entries(&stale);
        tracing::info!(views = removed.len(), "evicted stale compiled views");
        removed
    }

    /// Compile every descriptor, register each in the cache once, and
    /// return the combined artifact.
    ///
    /// Fails on the first descriptor that does not compile; units compiled
    /// before the failure stay registered.
    pub fn batch_compilation(&self, descriptors: &[ViewDescriptor]) -> Result<BatchArtifact, EngineError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if !seen.insert(descriptor) {
                continue;
            }
            let entry = Arc::new(self.build_entry(descriptor)?);
            entries.push(ArtifactEntry::from_view(&entry.view, entry.fingerprints.clone()));
            self.publish(&entry);
        }
        tracing::info!(views = entries.len(), "batch compilation finished");
        Ok(BatchArtifact::new(entries))
    }

    /// Register every unit in `artifact` without touching the provider.
    pub fn load_batch_compilation(&self, artifact: &BatchArtifact) -> Result<Vec<ViewDescriptor>, EngineError> {
        let mut registered = Vec::with_capacity(artifact.entries.len());
        for item in &artifact.entries {
            let view = ViewCompiler::new(item.descriptor.clone())
                .compile(item.chunks.clone(), item.loaded_files.clone())?;
            if view.view_id != item.view_id {
                return Err(EngineError::ArtifactMismatch {
                    descriptor: item.descriptor.clone(),
                    expected: view.view_id,
                    found: item.view_id.clone(),
                });
            }
            self.cache.store(Arc::new(CompiledEntry {
                descriptor: item.descriptor.clone(),
                loaded: item.loaded_files.clone(),
                fingerprints: item.fingerprints.clone(),
                view: Arc::new(view),
                activator: Arc::clone(&self.activator),
            }));
            registered.push(item.descriptor.clone());
        }
        tracing::info!(views = registered.len(), "loaded batch artifact");
        Ok(registered)
    }

    /// Store `entry` unless its sources already moved on.
    fn publish(&self, entry: &Arc<CompiledEntry>) -> bool {
        if !entry.is_current(self.provider.as_ref()) {
            tracing::warn!(descriptor = %entry.descriptor, "sources changed during compilation; not caching");
            return false;
        }
        self.cache.store(Arc::clone(entry));
        true
    }

    fn build_entry(&self, descriptor: &ViewDescriptor) -> Result<CompiledEntry, EngineError> {
        let (view, fingerprints) = self.load_view(descriptor)?;
        Ok(CompiledEntry {
            descriptor: descriptor.clone(),
            loaded: view.loaded_files.clone(),
            fingerprints,
            view: Arc::new(view),
            activator: Arc::clone(&self.activator),
        })
    }

    /// Load and compile `descriptor` without consulting the cache.
    pub fn compile_view(&self, descriptor: &ViewDescriptor) -> Result<CompiledView, EngineError> {
        self.load_view(descriptor).map(|(view, _)| view)
    }

    /// Compiled view plus fingerprints of the exact text it was built from.
    fn load_view(
        &self,
        descriptor: &ViewDescriptor,
    ) -> Result<(CompiledView, BTreeMap<TemplateId, String>), EngineError> {
        if descriptor.templates.is_empty() {
            return Err(CompileError::EmptyDescriptor.into());
        }
        let mut loader = ViewLoader::new(Arc::clone(&self.provider), self.options.clone());
        let mut chunks = Vec::with_capacity(descriptor.templates.len());
        for id in &descriptor.templates {
            chunks.push((id.clone(), loader.load(id)?));
        }
        let loaded: BTreeSet<TemplateId> = loader.everything_loaded().clone();
        let fingerprints = fingerprint::fingerprint_sources(loader.loaded_sources());
        tracing::info!(descriptor = %descriptor, files = loaded.len(), "compiling view");
        let view = ViewCompiler::new(descriptor.clone()).compile(chunks, loaded)?;
        Ok((view, fingerprints))
    }
}
