//! # KPI Metrics
//!
//! The five aggregate metrics AskKit can answer without generating SQL:
//! revenue, AOV, ROAS, conversion rate, and sessions. [`detect`] decides
//! whether a prompt is asking for one of them; [`compute`] aggregates the
//! answer across every ingested table that carries a matching column.

pub mod compute;
pub mod detect;

use serde::Serialize;

pub use compute::{compute_metrics, KpiReport, SkippedAggregate};
pub use detect::detect_metrics;

/// One of the aggregate KPI metrics.
///
/// Variant order is the canonical reporting order; `BTreeSet<MetricKind>`
/// iterates in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Revenue,
    Aov,
    Roas,
    ConversionRate,
    Sessions,
}

impl MetricKind {
    /// All metrics, in reporting order.
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Revenue,
        MetricKind::Aov,
        MetricKind::Roas,
        MetricKind::ConversionRate,
        MetricKind::Sessions,
    ];

    /// Stable snake_case name, as it appears in result rows.
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Revenue => "revenue",
            MetricKind::Aov => "aov",
            MetricKind::Roas => "roas",
            MetricKind::ConversionRate => "conversion_rate",
            MetricKind::Sessions => "sessions",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
