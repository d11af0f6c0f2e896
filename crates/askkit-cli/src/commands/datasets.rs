use anyhow::Result;
use comfy_table::Table as ComfyTable;

use askkit_core::registry::load_registry;

use crate::args::{DatasetsArgs, DatasetsFormat};

pub async fn run(args: &DatasetsArgs) -> Result<()> {
    let config = super::load_config()?;
    let db_url = super::resolve_db_url(args.db.as_deref(), &config)?;
    let pool = super::connect(&db_url, false).await?;

    let snapshot = load_registry(&pool).await?;

    match args.format {
        DatasetsFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        DatasetsFormat::Table => {
            if snapshot.is_empty() {
                println!(
                    "No datasets ingested yet. Run `askkit ingest --data-root <dir>` first."
                );
            } else {
                let mut t = ComfyTable::new();
                t.set_header(vec![
                    "Table", "Business", "Category", "Dataset", "Rows", "Columns", "Ingested",
                ]);
                for record in &snapshot.datasets {
                    t.add_row(vec![
                        record.table_name.clone(),
                        record.business.clone(),
                        record.category.clone(),
                        record.dataset_name.clone(),
                        record.row_count.to_string(),
                        columns_cell(&record.columns),
                        record.ingested_at.clone(),
                    ]);
                }
                println!("{}", t);
            }

            for skipped in &snapshot.skipped {
                eprintln!(
                    "Warning: skipped registry row {}: {}",
                    skipped.table_name, skipped.reason
                );
            }
        }
    }

    Ok(())
}

/// Join column names, truncating long lists.
fn columns_cell(columns: &[String]) -> String {
    let joined = columns.join(", ");
    if joined.chars().count() <= 48 {
        return joined;
    }
    let shown = columns.len().min(3);
    format!(
        "{} ... ({} total)",
        columns[..shown].join(", "),
        columns.len()
    )
}
