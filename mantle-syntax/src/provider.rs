//! Template sources.
//!
//! A [`ContentProvider`] hands out template text by [`TemplateId`] and
//! resolves the references written in `<include file>` / `<extends template>`.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use mantle_core::types::{TemplateId, SHARED_FOLDER};

use crate::error::{io_err, LoadError};

/// Source of template text.
pub trait ContentProvider: Send + Sync {
    /// Full text of `id`.
    fn source(&self, id: &TemplateId) -> Result<String, LoadError>;

    fn has_template(&self, id: &TemplateId) -> bool;

    /// Resolve `reference`, as written inside `from`, to a template id.
    fn resolve(&self, from: &TemplateId, reference: &str) -> TemplateId {
        resolve_reference(self, from, reference)
    }
}

/// Default resolution rules:
///
/// 1. a reference without an extension inherits the one of `from`;
/// 2. a leading `/` makes the reference root-relative;
/// 3. otherwise `from`'s directory is tried first, then the shared folder.
///
/// When neither candidate exists the sibling id is returned so the
/// subsequent load reports it as not found.
pub fn resolve_reference<P>(provider: &P, from: &TemplateId, reference: &str) -> TemplateId
where
    P: ContentProvider + ?Sized,
{
    let reference = inherit_extension(from, reference);
    if let Some(rooted) = reference.strip_prefix('/') {
        return TemplateId::normalized(rooted);
    }
    let sibling = from.sibling(&reference);
    if provider.has_template(&sibling) {
        return sibling;
    }
    let shared = TemplateId::normalized(&format!("{SHARED_FOLDER}/{reference}"));
    if provider.has_template(&shared) {
        return shared;
    }
    sibling
}

fn inherit_extension(from: &TemplateId, reference: &str) -> String {
    let file_name = reference.rsplit('/').next().unwrap_or(reference);
    if file_name.contains('.') {
        return reference.to_string();
    }
    match from.extension() {
        Some(ext) => format!("{reference}.{ext}"),
        None => reference.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Templates stored under a root folder; ids are paths relative to it.
#[derive(Debug, Clone)]
pub struct FileSystemProvider {
    root: PathBuf,
}

impl FileSystemProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, id: &TemplateId) -> PathBuf {
        id.as_str()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

impl ContentProvider for FileSystemProvider {
    fn source(&self, id: &TemplateId) -> Result<String, LoadError> {
        let path = self.path_of(id);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(LoadError::NotFound { id: id.clone() }),
            Err(e) => Err(io_err(path, e)),
        }
    }

    fn has_template(&self, id: &TemplateId) -> bool {
        self.path_of(id).is_file()
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Templates held in a map. Sources can be replaced while the provider is
/// shared, which is how tests simulate edits.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    templates: RwLock<HashMap<TemplateId, String>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates<I, K, V>(templates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<TemplateId>,
        V: Into<String>,
    {
        let provider = Self::new();
        for (id, text) in templates {
            provider.add(id, text);
        }
        provider
    }

    /// Insert or replace a template.
    pub fn add(&self, id: impl Into<TemplateId>, text: impl Into<String>) {
        self.templates.write().insert(id.into(), text.into());
    }

    pub fn remove(&self, id: &TemplateId) -> Option<String> {
        self.templates.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }
}

impl ContentProvider for InMemoryProvider {
    fn source(&self, id: &TemplateId) -> Result<String, LoadError> {
        self.templates
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound { id: id.clone() })
    }

    fn has_template(&self, id: &TemplateId) -> bool {
        self.templates.read().contains_key(id)
    }
}
