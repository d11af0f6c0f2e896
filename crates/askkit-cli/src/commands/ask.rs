use anyhow::Result;
use comfy_table::Table as ComfyTable;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

use askkit_core::PromptResolver;

use crate::args::{AskArgs, AskFormat};

pub async fn run(args: &AskArgs) -> Result<()> {
    let mut config = super::load_config()?;
    super::apply_env_keys(&mut config.llm);

    let db_url = super::resolve_db_url(args.db.as_deref(), &config)?;
    let pool = super::connect(&db_url, false).await?;

    let resolver = PromptResolver::new(pool, &config);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message("Resolving prompt...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let resolution = resolver.resolve(&args.prompt).await;
    pb.finish_and_clear();
    let resolution = resolution?;

    match args.format {
        AskFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
        AskFormat::Table => {
            println!(
                "━━━ {} ({} rows) ━━━",
                resolution.table_name,
                resolution.rows.len()
            );
            println!(
                "Business: {}  Dataset: {}",
                resolution.business, resolution.dataset_name
            );
            println!();

            if !resolution.columns.is_empty() {
                let mut t = ComfyTable::new();
                t.set_header(
                    resolution
                        .columns
                        .iter()
                        .map(|c| c.as_str())
                        .collect::<Vec<_>>(),
                );
                for row in &resolution.rows {
                    let cells: Vec<String> = resolution
                        .columns
                        .iter()
                        .map(|col| {
                            row.get(col)
                                .map(value_cell)
                                .unwrap_or_else(|| "NULL".to_string())
                        })
                        .collect();
                    t.add_row(cells);
                }
                println!("{}", t);
                println!();
            }

            println!("SQL: {}", resolution.sql);
            match (&resolution.provider, &resolution.model) {
                (Some(provider), Some(model)) => println!(
                    "Generated by: {} ({} {})",
                    resolution.generated_by, provider, model
                ),
                _ => println!("Generated by: {}", resolution.generated_by),
            }
        }
    }

    Ok(())
}

/// Render a JSON value as a table cell, truncating long strings.
fn value_cell(value: &Value) -> String {
    let s = match value {
        Value::Null => return "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if s.chars().count() > 40 {
        let head: String = s.chars().take(37).collect();
        format!("{}...", head)
    } else {
        s
    }
}
