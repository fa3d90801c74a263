pub mod bindings;
pub mod check;
pub mod compile;
pub mod ir;
pub mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use mantle_compiler::{CompiledViewCache, ViewEngine};
use mantle_core::{settings, EngineSettings};
use mantle_syntax::FileSystemProvider;

/// Options shared by every command that reads templates.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Template root folder.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Settings file; defaults to `<root>/mantle.yaml` when present.
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

impl EngineArgs {
    pub fn load_settings(&self) -> Result<EngineSettings> {
        match &self.settings {
            Some(path) => settings::load_at(path)
                .with_context(|| format!("failed to load settings from {}", path.display())),
            None => settings::find_in(&self.root)
                .with_context(|| format!("failed to load settings in {}", self.root.display())),
        }
    }

    pub fn engine(&self) -> Result<ViewEngine> {
        let settings = self.load_settings()?;
        self.engine_with(settings)
    }

    pub fn engine_with(&self, settings: EngineSettings) -> Result<ViewEngine> {
        if !self.root.is_dir() {
            anyhow::bail!("template root {} is not a directory", self.root.display());
        }
        Ok(ViewEngine::new(
            Arc::new(FileSystemProvider::new(self.root.clone())),
            settings,
            Arc::new(CompiledViewCache::new()),
        ))
    }
}
