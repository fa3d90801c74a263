//! Domain types shared by every Mantle crate.
//!
//! Template identifiers are always `/`-separated and relative to the
//! template root, regardless of platform.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Section that carries an inner layer's output to the layout around it.
pub const VIEW_SECTION: &str = "view";

/// Folder searched after the referencing template's own directory.
pub const SHARED_FOLDER: &str = "shared";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed identifier for a template, e.g. `home/index.html`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub String);

impl TemplateId {
    /// Build an id from a path-like string, normalising separators and
    /// collapsing `.` / `..` segments.
    pub fn normalized(raw: &str) -> Self {
        let unified = raw.replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        Self(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory part of the id (`""` for root-level templates).
    pub fn directory(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// File name part of the id.
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Extension of the file name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    /// Join `reference` onto this id's directory.
    pub fn sibling(&self, reference: &str) -> Self {
        let dir = self.directory();
        if dir.is_empty() {
            Self::normalized(reference)
        } else {
            Self::normalized(&format!("{dir}/{reference}"))
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TemplateId {
    fn from(s: String) -> Self {
        Self::normalized(&s)
    }
}

impl From<&str> for TemplateId {
    fn from(s: &str) -> Self {
        Self::normalized(s)
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Parameters that influence compilation but not template resolution.
///
/// Namespaces and references are only carried into the generated listing;
/// the interpreter does not consult them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileParams {
    pub base_type: Option<String>,
    pub namespaces: Vec<String>,
    pub references: Vec<String>,
    pub debug: bool,
}

/// Identity key of a compiled view: ordered templates plus parameters.
///
/// `templates[0]` is the page; every following entry is a layout wrapping
/// the previous one, so the last template is the outermost.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewDescriptor {
    pub templates: Vec<TemplateId>,
    #[serde(default)]
    pub params: CompileParams,
}

impl ViewDescriptor {
    pub fn new<I, T>(templates: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TemplateId>,
    {
        Self {
            templates: templates.into_iter().map(Into::into).collect(),
            params: CompileParams::default(),
        }
    }

    pub fn with_params(mut self, params: CompileParams) -> Self {
        self.params = params;
        self
    }

    /// Append an outer layout.
    pub fn add_template(mut self, template: impl Into<TemplateId>) -> Self {
        self.templates.push(template.into());
        self
    }

    /// Stable textual form used for hashing into view ids.
    pub fn canonical_key(&self) -> String {
        let mut key = String::new();
        for template in &self.templates {
            key.push_str("template:");
            key.push_str(template.as_str());
            key.push('\n');
        }
        if let Some(base) = &self.params.base_type {
            key.push_str("base:");
            key.push_str(base);
            key.push('\n');
        }
        for ns in &self.params.namespaces {
            key.push_str("namespace:");
            key.push_str(ns);
            key.push('\n');
        }
        for reference in &self.params.references {
            key.push_str("reference:");
            key.push_str(reference);
            key.push('\n');
        }
        key.push_str(if self.params.debug { "debug:1" } else { "debug:0" });
        key
    }
}

impl fmt::Display for ViewDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.templates.iter().map(TemplateId::as_str).collect();
        write!(f, "[{}]", names.join(" > "))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
