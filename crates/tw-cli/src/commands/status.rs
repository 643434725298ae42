//! Status command implementation

use anyhow::Result;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tw_migrate::MigrationStatus;

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common::format_record;
use crate::context::RuntimeContext;

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
    let ctx = RuntimeContext::new(global, cancel)?;
    let status = ctx.migrator.status().await?;
    match args.output {
        OutputFormat::Text => print!("{}", render_text(&status)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&render_json(&status))?),
    }
    Ok(())
}

fn render_text(status: &MigrationStatus) -> String {
    let mut out = format!("Current version: {}\n\n", format_record(&status.record));
    if status.steps.is_empty() {
        out.push_str("No migrations found\n");
        return out;
    }
    let width = status
        .steps
        .iter()
        .map(|s| s.version.to_string().len())
        .max()
        .unwrap_or(1);
    for step in &status.steps {
        let mark = if step.applied { "x" } else { " " };
        let note = if step.reversible { "" } else { "  (no down)" };
        out.push_str(&format!(
            "  [{mark}] {:>width$}  {}{note}\n",
            step.version, step.identifier
        ));
    }
    out.push_str(&format!(
        "\n{} applied, {} pending\n",
        status.steps.len() - status.pending(),
        status.pending()
    ));
    out
}

fn render_json(status: &MigrationStatus) -> serde_json::Value {
    let steps: Vec<_> = status
        .steps
        .iter()
        .map(|s| {
            json!({
                "version": s.version,
                "identifier": s.identifier,
                "applied": s.applied,
                "reversible": s.reversible,
            })
        })
        .collect();
    json!({
        "version": status.record.version,
        "dirty": status.record.dirty,
        "pending": status.pending(),
        "steps": steps,
    })
}
