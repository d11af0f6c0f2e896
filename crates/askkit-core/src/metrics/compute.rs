//! # Metric Aggregation
//!
//! Computes KPI values by summing matching columns across every ingested
//! table. Column matching is substring-based against a per-metric pattern
//! list ("revenue" matches `revenue`, `total_revenue_usd`, ...), and values
//! are cast to REAL so TEXT columns still aggregate.
//!
//! A table that matches a pattern but fails to query (dropped table, stale
//! registry row) is recorded in [`KpiReport::skipped`] rather than silently
//! contributing zero.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sqlx::SqlitePool;

use super::MetricKind;
use crate::registry::DatasetRecord;

/// Columns summed for the revenue metric.
const REVENUE_PATTERNS: [&str; 3] = ["sales", "revenue", "total_sales"];

/// Broader revenue matching used inside ratio metrics (AOV, ROAS).
const REVENUE_EXTENDED_PATTERNS: [&str; 5] =
    ["sales", "revenue", "total_sales", "net_sales", "gross_sales"];

const ORDER_PATTERNS: [&str; 3] = ["orders", "order_count", "total_orders"];

const SPEND_PATTERNS: [&str; 5] = [
    "spend",
    "ad_spend",
    "marketing_spend",
    "total_spend",
    "media_cost",
];

const CONVERSION_PATTERNS: [&str; 7] = [
    "conversion",
    "conversions",
    "total_conversion",
    "converted_sessions",
    "sessions_converted",
    "orders",
    "total_orders_placed",
];

const SESSION_PATTERNS: [&str; 2] = ["sessions", "session_count"];

/// Broader session matching used as the conversion-rate denominator.
const SESSION_EXTENDED_PATTERNS: [&str; 5] = [
    "sessions",
    "session_count",
    "total_sessions",
    "visits",
    "total_visitors",
];

/// A table that matched a metric's column patterns but failed to aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedAggregate {
    pub metric: MetricKind,
    pub table_name: String,
    pub reason: String,
}

/// Computed KPI values plus any tables that were skipped along the way.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KpiReport {
    pub values: BTreeMap<MetricKind, f64>,
    pub skipped: Vec<SkippedAggregate>,
}

/// Compute the requested metrics across all registered datasets.
///
/// A metric with no matching columns anywhere comes back as 0.0, as do
/// ratio metrics with a zero denominator.
pub async fn compute_metrics(
    pool: &SqlitePool,
    datasets: &[DatasetRecord],
    metrics: &BTreeSet<MetricKind>,
) -> KpiReport {
    let mut report = KpiReport::default();
    for metric in metrics {
        let value = compute_metric(pool, datasets, *metric, &mut report.skipped).await;
        report.values.insert(*metric, value);
    }
    report
}

async fn compute_metric(
    pool: &SqlitePool,
    datasets: &[DatasetRecord],
    metric: MetricKind,
    skipped: &mut Vec<SkippedAggregate>,
) -> f64 {
    match metric {
        MetricKind::Revenue => {
            sum_from_tables(pool, datasets, &REVENUE_PATTERNS, metric, skipped).await
        }
        MetricKind::Sessions => {
            sum_from_tables(pool, datasets, &SESSION_PATTERNS, metric, skipped).await
        }
        MetricKind::Aov => {
            let revenue =
                sum_from_tables(pool, datasets, &REVENUE_EXTENDED_PATTERNS, metric, skipped).await;
            let orders = sum_from_tables(pool, datasets, &ORDER_PATTERNS, metric, skipped).await;
            if orders > 0.0 {
                revenue / orders
            } else {
                0.0
            }
        }
        MetricKind::Roas => {
            let revenue =
                sum_from_tables(pool, datasets, &REVENUE_EXTENDED_PATTERNS, metric, skipped).await;
            let spend = sum_from_tables(pool, datasets, &SPEND_PATTERNS, metric, skipped).await;
            if spend > 0.0 {
                revenue / spend
            } else {
                0.0
            }
        }
        MetricKind::ConversionRate => {
            let conversions =
                sum_from_tables(pool, datasets, &CONVERSION_PATTERNS, metric, skipped).await;
            let sessions =
                sum_from_tables(pool, datasets, &SESSION_EXTENDED_PATTERNS, metric, skipped).await;
            if sessions > 0.0 {
                (conversions / sessions) * 100.0
            } else {
                0.0
            }
        }
    }
}

/// Sum the first pattern-matching column of every dataset that has one.
async fn sum_from_tables(
    pool: &SqlitePool,
    datasets: &[DatasetRecord],
    patterns: &[&str],
    metric: MetricKind,
    skipped: &mut Vec<SkippedAggregate>,
) -> f64 {
    let mut total = 0.0;
    for dataset in datasets {
        let column = dataset
            .columns
            .iter()
            .find(|col| patterns.iter().any(|p| col.to_lowercase().contains(p)));
        let Some(column) = column else { continue };

        let sql = format!(
            "SELECT SUM(CAST({} AS REAL)) FROM {}",
            quote_ident(column),
            quote_ident(&dataset.table_name)
        );
        match sqlx::query_scalar::<_, Option<f64>>(&sql).fetch_one(pool).await {
            Ok(Some(value)) => total += value,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "Skipping '{}' while aggregating {}: {}",
                    dataset.table_name,
                    metric,
                    e
                );
                skipped.push(SkippedAggregate {
                    metric,
                    table_name: dataset.table_name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    total
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}
