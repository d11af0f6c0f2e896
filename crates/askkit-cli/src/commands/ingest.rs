use std::path::PathBuf;

use anyhow::{bail, Result};
use comfy_table::Table as ComfyTable;
use indicatif::{ProgressBar, ProgressStyle};

use askkit_core::ingest::ingest_directory;

use crate::args::IngestArgs;

pub async fn run(args: &IngestArgs) -> Result<()> {
    let config = super::load_config()?;
    let db_url = super::resolve_db_url(args.db.as_deref(), &config)?;
    let pool = super::connect(&db_url, true).await?;

    let data_root: PathBuf = match &args.data_root {
        Some(root) => PathBuf::from(root),
        None => match config.data_root_path() {
            Some(root) => root,
            None => bail!(
                "No data root given. Pass --data-root <dir> or set data_root in the [ingest] section of askkit.toml."
            ),
        },
    };
    tracing::debug!("Ingesting from {}", data_root.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Scanning {}...", data_root.display()));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let report = ingest_directory(
        &pool,
        &data_root,
        args.business.as_deref(),
        Some(&|file: &str| pb.set_message(format!("Loading {}...", file))),
    )
    .await?;

    pb.finish_with_message(format!(
        "Ingesting CSV files... ✓ {} datasets",
        report.ingested.len()
    ));

    if !report.ingested.is_empty() {
        let mut t = ComfyTable::new();
        t.set_header(vec!["Table", "Business", "Category", "Rows", "Columns"]);
        for record in &report.ingested {
            t.add_row(vec![
                record.table_name.clone(),
                record.business.clone(),
                record.category.clone(),
                record.row_count.to_string(),
                record.columns.len().to_string(),
            ]);
        }
        println!("{}", t);
    }

    for skipped in &report.skipped {
        eprintln!("Warning: skipped {}: {}", skipped.path, skipped.reason);
    }

    eprintln!(
        "\n✓ Ingested {} datasets into {}",
        report.ingested.len(),
        db_url
    );

    Ok(())
}
