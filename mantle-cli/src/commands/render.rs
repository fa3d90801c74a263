//! `mantle render` — render a page through its layouts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use super::EngineArgs;

/// Arguments for `mantle render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Page template followed by its layouts, inner to outer.
    #[arg(required = true)]
    pub templates: Vec<String>,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// JSON file with the model; an empty object when omitted.
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Write output here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let engine = self.engine.engine()?;
        let model = load_model(self.model.as_deref())?;
        let descriptor = engine.descriptor(self.templates.iter().map(String::as_str));

        let view = engine
            .create_instance(&descriptor)
            .with_context(|| format!("failed to compile {descriptor}"))?;
        let output = view
            .render_to_string(&model)
            .with_context(|| format!("failed to render {descriptor}"))?;

        match self.out {
            Some(path) => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("failed to create {}", dir.display()))?;
                }
                std::fs::write(&path, &output)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::debug!(path = %path.display(), bytes = output.len(), "wrote rendered output");
            }
            None => print!("{output}"),
        }
        Ok(())
    }
}

fn load_model(path: Option<&std::path::Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Object(Default::default()));
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read model {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("model {} is not valid JSON", path.display()))
}
