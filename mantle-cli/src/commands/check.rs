//! `mantle check` — syntax-check a view and list the files it loads.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use mantle_compiler::fingerprint::fingerprint_files;
use mantle_core::{TemplateId, ViewDescriptor};

use super::EngineArgs;

/// Arguments for `mantle check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Page template followed by its layouts, inner to outer.
    #[arg(required = true)]
    pub templates: Vec<String>,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct CheckReportJson {
    class_name: String,
    view_id: String,
    files: Vec<LoadedFileJson>,
}

#[derive(Serialize)]
struct LoadedFileJson {
    file: String,
    role: &'static str,
    fingerprint: String,
}

#[derive(Tabled)]
struct LoadedFileRow {
    #[tabled(rename = "file")]
    file: String,
    #[tabled(rename = "role")]
    role: &'static str,
    #[tabled(rename = "sha256")]
    fingerprint: String,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let engine = self.engine.engine()?;
        let descriptor = engine.descriptor(self.templates.iter().map(String::as_str));
        let view = engine
            .compile_view(&descriptor)
            .with_context(|| format!("check failed for {descriptor}"))?;
        let fingerprints = fingerprint_files(engine.provider().as_ref(), &view.loaded_files)
            .context("failed to fingerprint loaded files")?;

        let files: Vec<LoadedFileJson> = view
            .loaded_files
            .iter()
            .map(|id| LoadedFileJson {
                file: id.to_string(),
                role: role_of(&descriptor, id),
                fingerprint: fingerprints.get(id).cloned().unwrap_or_default(),
            })
            .collect();

        if self.json {
            let payload = CheckReportJson {
                class_name: view.class_name.clone(),
                view_id: view.view_id.clone(),
                files,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize check JSON")?
            );
            return Ok(());
        }

        println!(
            "{} {} {}",
            "ok".green().bold(),
            view.class_name,
            descriptor.to_string().bright_black()
        );
        let rows: Vec<LoadedFileRow> = files
            .into_iter()
            .map(|f| LoadedFileRow {
                file: f.file,
                role: f.role,
                fingerprint: f.fingerprint.chars().take(12).collect(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn role_of(descriptor: &ViewDescriptor, id: &TemplateId) -> &'static str {
    match descriptor.templates.iter().position(|t| t == id) {
        Some(0) => "page",
        Some(_) => "layout",
        None => "dependency",
    }
}
