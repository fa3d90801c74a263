//! `mantle bindings <phrase>` — dump the nodes of a binding phrase.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use mantle_syntax::{parse_bindings, BindingNode};

/// Arguments for `mantle bindings`.
#[derive(Args, Debug)]
pub struct BindingsArgs {
    /// Binding phrase, e.g. `<a href="@href" @*>@child</a>`.
    pub phrase: String,

    /// Emit the nodes as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "span")]
    span: String,
    #[tabled(rename = "kind")]
    kind: &'static str,
    #[tabled(rename = "value")]
    value: String,
    #[tabled(rename = "string")]
    string: String,
}

impl BindingsArgs {
    pub fn run(self) -> Result<()> {
        let nodes = parse_bindings(&self.phrase);

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&nodes).context("failed to serialize binding nodes")?
            );
            return Ok(());
        }

        if nodes.is_empty() {
            println!("{}", "empty phrase".bright_black());
            return Ok(());
        }

        let rows: Vec<NodeRow> = nodes
            .iter()
            .map(|n| {
                let (kind, value, string) = describe(&n.node);
                NodeRow {
                    span: format!("{}..{}", n.span.start, n.span.end),
                    kind,
                    value,
                    string: string.map(|s| s.to_string()).unwrap_or_default(),
                }
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn describe(node: &BindingNode) -> (&'static str, String, Option<bool>) {
    match node {
        BindingNode::Literal { text } => ("literal", format!("{text:?}"), None),
        BindingNode::NameReference {
            name,
            assume_string_value,
        } => ("name", name.clone(), Some(*assume_string_value)),
        BindingNode::PrefixReference {
            prefix,
            assume_string_value,
        } => (
            "prefix",
            prefix.clone().unwrap_or_else(|| "*".to_string()),
            Some(*assume_string_value),
        ),
    }
}
