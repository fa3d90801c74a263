//! `mantle ir` — print the IR listing of a compiled view.

use anyhow::{Context, Result};
use clap::Args;

use super::EngineArgs;

/// Arguments for `mantle ir`.
#[derive(Args, Debug)]
pub struct IrArgs {
    /// Page template followed by its layouts, inner to outer.
    #[arg(required = true)]
    pub templates: Vec<String>,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Annotate every instruction with its source location.
    #[arg(long)]
    pub debug: bool,
}

impl IrArgs {
    pub fn run(self) -> Result<()> {
        let mut settings = self.engine.load_settings()?;
        if self.debug {
            settings = settings.set_debug(true);
        }
        let engine = self.engine.engine_with(settings)?;
        let descriptor = engine.descriptor(self.templates.iter().map(String::as_str));
        let view = engine
            .compile_view(&descriptor)
            .with_context(|| format!("failed to compile {descriptor}"))?;
        print!("{}", view.source);
        Ok(())
    }
}
