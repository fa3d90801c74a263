//! Engine settings persisted as YAML.
//!
//! # Storage layout
//!
//! ```text
//! <template root>/
//!   mantle.yaml        (optional — defaults apply when absent)
//! ```
//!
//! # API pattern
//!
//! - `load_at(path)` — strict; missing file is [`SettingsError::NotFound`]
//! - `find_in(root)` — lenient; missing `mantle.yaml` yields defaults
//! - `save_at(path, settings)` — atomic `.tmp` + rename

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, SettingsError};
use crate::types::CompileParams;

/// File name looked up by [`find_in`].
pub const SETTINGS_FILE_NAME: &str = "mantle.yaml";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One binding element: `<element …>` is replaced by `phrase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSpec {
    pub element: String,
    pub phrase: String,
}

/// Settings shared by the loader and the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Emit debug listings and keep source locations in compiled views.
    pub debug: bool,
    /// Namespace prefix required on special elements (`s` → `<s:if>`).
    pub prefix: Option<String>,
    /// Base type name recorded on compiled views.
    pub page_base_type: Option<String>,
    pub namespaces: Vec<String>,
    pub references: Vec<String>,
    /// HTML-encode `${}` output.
    pub automatic_encoding: bool,
    pub bindings: Vec<BindingSpec>,
}

impl EngineSettings {
    pub fn set_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn set_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn set_page_base_type(mut self, type_name: impl Into<String>) -> Self {
        self.page_base_type = Some(type_name.into());
        self
    }

    pub fn set_automatic_encoding(mut self, enabled: bool) -> Self {
        self.automatic_encoding = enabled;
        self
    }

    pub fn add_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespaces.push(ns.into());
        self
    }

    pub fn add_reference(mut self, reference: impl Into<String>) -> Self {
        self.references.push(reference.into());
        self
    }

    pub fn add_binding(mut self, element: impl Into<String>, phrase: impl Into<String>) -> Self {
        self.bindings.push(BindingSpec {
            element: element.into(),
            phrase: phrase.into(),
        });
        self
    }

    /// Compile parameters derived from these settings.
    ///
    /// `default_base_type` applies when no page base type is configured.
    pub fn compile_params(&self, default_base_type: Option<&str>) -> CompileParams {
        let base_type = self
            .page_base_type
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| default_base_type.map(str::to_owned));
        CompileParams {
            base_type,
            namespaces: self.namespaces.clone(),
            references: self.references.clone(),
            debug: self.debug,
        }
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// `<root>/mantle.yaml` — pure, no I/O.
pub fn settings_path_in(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE_NAME)
}

/// Load settings from `path`.
///
/// Returns `SettingsError::NotFound` if absent,
/// `SettingsError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<EngineSettings, SettingsError> {
    if !path.exists() {
        return Err(SettingsError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| SettingsError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load `<root>/mantle.yaml`, falling back to defaults when the file is absent.
pub fn find_in(root: &Path) -> Result<EngineSettings, SettingsError> {
    let path = settings_path_in(root);
    match load_at(&path) {
        Err(SettingsError::NotFound { .. }) => {
            tracing::debug!(root = %root.display(), "no settings file, using defaults");
            Ok(EngineSettings::default())
        }
        other => other,
    }
}

/// Atomically save settings to `path`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `rename`.
pub fn save_at(path: &Path, settings: &EngineSettings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
    }
    let tmp_path = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
