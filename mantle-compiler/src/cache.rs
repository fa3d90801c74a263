//! Compiled view cache.
//!
//! Readers take a lock-free snapshot of the descriptor map; writers publish
//! a modified copy with [`ArcSwap::rcu`]. Entries are immutable once
//! published and are replaced, never mutated, on invalidation.
//!
//! ```text
//!   lookup() ──► load() ──► snapshot Arc<HashMap>  (wait-free)
//!   store()  ──► rcu(clone + insert)               (retried on contention)
//!   invalidate(file) ──► rcu(clone + retain)
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use mantle_core::types::{TemplateId, ViewDescriptor};
use mantle_renderer::Decorator;
use mantle_syntax::ContentProvider;

use crate::compiler::CompiledView;
use crate::engine::ViewActivator;
use crate::error::EngineError;
use crate::fingerprint;

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// A compiled view together with everything needed to judge its freshness
/// and to instantiate it.
pub struct CompiledEntry {
    pub descriptor: ViewDescriptor,
    pub loaded: BTreeSet<TemplateId>,
    pub fingerprints: BTreeMap<TemplateId, String>,
    pub view: Arc<CompiledView>,
    pub activator: Arc<dyn ViewActivator>,
}

impl CompiledEntry {
    /// True when every loaded file still has the recorded fingerprint.
    pub fn is_current(&self, provider: &dyn ContentProvider) -> bool {
        fingerprint::changed_files(provider, &self.fingerprints).is_empty()
    }

    pub fn depends_on(&self, file: &TemplateId) -> bool {
        self.loaded.contains(file)
    }

    /// A fresh decorator chain for one render.
    pub fn create_instance(&self) -> Result<Decorator, EngineError> {
        self.activator.activate(&self.view)
    }
}

impl fmt::Debug for CompiledEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledEntry")
            .field("descriptor", &self.descriptor)
            .field("class_name", &self.view.class_name)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

type EntryMap = HashMap<ViewDescriptor, Arc<CompiledEntry>>;

pub struct CompiledViewCache {
    entries: ArcSwap<EntryMap>,
}

impl Default for CompiledViewCache {
    fn default() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
        }
    }
}

impl CompiledViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, descriptor: &ViewDescriptor) -> Option<Arc<CompiledEntry>> {
        self.entries.load().get(descriptor).cloned()
    }

    /// Publish `entry`, replacing any entry for the same descriptor.
    pub fn store(&self, entry: Arc<CompiledEntry>) {
        tracing::debug!(
            descriptor = %entry.descriptor,
            class = %entry.view.class_name,
            "storing compiled view"
        );
        self.entries.rcu(|current| {
            let mut next = EntryMap::clone(current);
            next.insert(entry.descriptor.clone(), Arc::clone(&entry));
            next
        });
    }

    /// Remove every entry that loaded `file`; returns their descriptors.
    pub fn invalidate(&self, file: &TemplateId) -> Vec<ViewDescriptor> {
        let mut removed = Vec::new();
        self.entries.rcu(|current| {
            removed.clear();
            let mut next = EntryMap::with_capacity(current.len());
            for (descriptor, entry) in current.iter() {
                if entry.depends_on(file) {
                    removed.push(descriptor.clone());
                } else {
                    next.insert(descriptor.clone(), Arc::clone(entry));
                }
            }
            next
        });
        if !removed.is_empty() {
            tracing::info!(file = %file, views = removed.len(), "invalidated compiled views");
        }
        removed
    }

    /// Remove specific descriptors; returns how many were present.
    pub fn remove(&self, descriptors: &[ViewDescriptor]) -> usize {
        let mut count = 0;
        self.entries.rcu(|current| {
            let mut next = EntryMap::clone(current);
            count = descriptors.iter().filter(|d| next.remove(*d).is_some()).count();
            next
        });
        count
    }

    /// Remove each of `stale` only while it is still the published entry
    /// for its descriptor; returns the descriptors actually removed.
    pub fn remove_entries(&self, stale: &[Arc<CompiledEntry>]) -> Vec<ViewDescriptor> {
        let mut removed = Vec::new();
        self.entries.rcu(|current| {
            removed.clear();
            let mut next = EntryMap::clone(current);
            for entry in stale {
                if next.get(&entry.descriptor).is_some_and(|e| Arc::ptr_eq(e, entry)) {
                    next.remove(&entry.descriptor);
                    removed.push(entry.descriptor.clone());
                }
            }
            next
        });
        removed
    }

    pub fn clear(&self) {
        self.entries.store(Arc::new(HashMap::new()));
    }

    /// Snapshot of every published entry.
    pub fn entries(&self) -> Vec<Arc<CompiledEntry>> {
        self.entries.load().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}

impl fmt::Debug for CompiledViewCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledViewCache")
            .field("len", &self.len())
            .finish()
    }
}
