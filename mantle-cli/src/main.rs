//! Mantle — template compiler and renderer CLI.
//!
//! # Usage
//!
//! ```text
//! mantle render <templates…> [--root <dir>] [--model file.json] [--out file]
//! mantle compile <descriptors.yaml> [--root <dir>] [--out artifact.json]
//! mantle check <templates…> [--root <dir>] [--json]
//! mantle bindings <phrase> [--json]
//! mantle ir <templates…> [--root <dir>] [--debug]
//! ```
//!
//! Templates are listed page first, then layouts from inner to outer.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    bindings::BindingsArgs, check::CheckArgs, compile::CompileArgs, ir::IrArgs,
    render::RenderArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "mantle",
    version,
    about = "Compile and render layout-composed markup templates",
    long_about = None,
)]
struct Cli {
    /// Log compilation and cache activity to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a page wrapped in its layouts.
    Render(RenderArgs),

    /// Batch-compile every view listed in a descriptor file.
    Compile(CompileArgs),

    /// Load and compile a view, listing the files it depends on.
    Check(CheckArgs),

    /// Show how a binding phrase is split into nodes.
    Bindings(BindingsArgs),

    /// Print the compiled IR listing of a view.
    Ir(IrArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Render(args) => args.run(),
        Commands::Compile(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::Bindings(args) => args.run(),
        Commands::Ir(args) => args.run(),
    }
}
