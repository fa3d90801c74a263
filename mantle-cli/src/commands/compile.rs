//! `mantle compile <descriptors.yaml>` — batch compilation into one artifact.
//!
//! The descriptor file lists one view per entry, page first:
//!
//! ```yaml
//! views:
//!   - [home/index.html]
//!   - [home/about.html, shared/site.html]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;

use mantle_compiler::artifact;

use super::EngineArgs;

/// Arguments for `mantle compile`.
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// YAML file listing the views to compile.
    pub descriptors: PathBuf,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Artifact output path.
    #[arg(long, default_value = "mantle-views.json")]
    pub out: PathBuf,
}

#[derive(Debug, Deserialize)]
struct DescriptorFile {
    views: Vec<Vec<String>>,
}

fn load_descriptor_file(path: &Path) -> Result<DescriptorFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor file {}", path.display()))?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("descriptor file {} is malformed", path.display()))
}

impl CompileArgs {
    pub fn run(self) -> Result<()> {
        let file = load_descriptor_file(&self.descriptors)?;
        if file.views.iter().any(Vec::is_empty) {
            anyhow::bail!("{}: every view needs at least one template", self.descriptors.display());
        }

        let engine = self.engine.engine()?;
        let descriptors: Vec<_> = file
            .views
            .iter()
            .map(|templates| engine.descriptor(templates.iter().map(String::as_str)))
            .collect();

        let batch = engine
            .batch_compilation(&descriptors)
            .context("batch compilation failed")?;
        artifact::save_at(&self.out, &batch)
            .with_context(|| format!("failed to write artifact {}", self.out.display()))?;

        for entry in &batch.entries {
            println!(
                "{} {} {}",
                "compiled".green().bold(),
                entry.class_name,
                entry.descriptor.to_string().bright_black()
            );
        }
        println!("Wrote {} view(s) to {}", batch.len(), self.out.display());
        Ok(())
    }
}
