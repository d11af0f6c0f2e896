use std::collections::BTreeSet;

use anyhow::{bail, Result};
use comfy_table::Table as ComfyTable;

use askkit_core::metrics::{compute_metrics, MetricKind};
use askkit_core::registry::load_registry;

use crate::args::KpiArgs;

pub async fn run(args: &KpiArgs) -> Result<()> {
    let config = super::load_config()?;
    let db_url = super::resolve_db_url(args.db.as_deref(), &config)?;
    let pool = super::connect(&db_url, false).await?;

    let snapshot = load_registry(&pool).await?;
    if snapshot.is_empty() {
        return Err(askkit_core::error::AskKitError::NoDataIngested.into());
    }

    let selected = parse_metrics(&args.metrics)?;
    let report = compute_metrics(&pool, &snapshot.datasets, &selected).await;

    let mut t = ComfyTable::new();
    t.set_header(vec!["Metric", "Value"]);
    for metric in &selected {
        let value = report
            .values
            .get(metric)
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "n/a".to_string());
        t.add_row(vec![metric.name().to_string(), value]);
    }
    println!("{}", t);

    for skipped in &report.skipped {
        eprintln!(
            "Warning: skipped {} on {}: {}",
            skipped.metric, skipped.table_name, skipped.reason
        );
    }

    Ok(())
}

/// Parse --metrics names into metric kinds; an empty list means all of them.
fn parse_metrics(names: &[String]) -> Result<BTreeSet<MetricKind>> {
    if names.is_empty() {
        return Ok(MetricKind::ALL.iter().copied().collect());
    }

    let mut selected = BTreeSet::new();
    for name in names {
        match MetricKind::ALL.iter().find(|m| m.name() == name.trim()) {
            Some(metric) => {
                selected.insert(*metric);
            }
            None => bail!(
                "Unknown metric '{}'. Valid metrics: revenue, aov, roas, conversion_rate, sessions",
                name
            ),
        }
    }
    Ok(selected)
}
