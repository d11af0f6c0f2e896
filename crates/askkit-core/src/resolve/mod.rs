//! # Prompt Resolution
//!
//! The orchestrator that every entry point goes through. Resolution is a
//! three-way fork:
//!
//! 1. KPI shortcut — summary questions ("total revenue") are answered from
//!    aggregates; no SQL touches the database.
//! 2. LLM path — a bound provider generates SQL, which runs through the
//!    safety guard.
//! 3. Heuristic path — without a provider (or with fallback enabled after
//!    a generation failure), the closest dataset is previewed directly.
//!
//! The provider is bound once at construction; per-request provider
//! switching is deliberately not a thing.

pub mod select;

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::config::AskKitConfig;
use crate::error::{AskKitError, Result};
use crate::exec;
use crate::llm::LlmProvider;
use crate::metrics::{compute_metrics, detect_metrics, MetricKind};
use crate::registry::{self, DatasetRecord};

/// Placeholder shown in place of SQL when aggregates answered the prompt.
const KPI_SQL_PLACEHOLDER: &str = "/* Aggregated KPI metrics: no direct SQL executed */";

/// Which path produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedBy {
    Kpi,
    Llm,
    Heuristic,
}

impl GeneratedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratedBy::Kpi => "kpi",
            GeneratedBy::Llm => "llm",
            GeneratedBy::Heuristic => "heuristic",
        }
    }
}

impl std::fmt::Display for GeneratedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved prompt: the answer rows plus how they were produced.
#[derive(Debug, Clone, Serialize)]
pub struct PromptResolution {
    pub table_name: String,
    pub business: String,
    pub dataset_name: String,
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<IndexMap<String, Value>>,
    pub generated_by: GeneratedBy,
    /// Provider that generated the SQL; `None` off the LLM path.
    pub provider: Option<String>,
    /// Model that generated the SQL; `None` off the LLM path.
    pub model: Option<String>,
}

/// Resolves natural-language prompts against the ingested datasets.
pub struct PromptResolver {
    pool: SqlitePool,
    provider: Option<LlmProvider>,
    fallback_to_heuristic: bool,
}

impl PromptResolver {
    /// Build a resolver, binding the LLM provider from config once.
    pub fn new(pool: SqlitePool, config: &AskKitConfig) -> Self {
        let provider = LlmProvider::bind(&config.llm);
        match &provider {
            Some(p) => tracing::debug!("Bound LLM provider {} ({})", p.name(), p.model()),
            None => tracing::debug!("No LLM provider bound, heuristic path only"),
        }
        Self {
            pool,
            provider,
            fallback_to_heuristic: config.resolve.fallback_to_heuristic,
        }
    }

    /// The bound provider, if any.
    pub fn provider(&self) -> Option<&LlmProvider> {
        self.provider.as_ref()
    }

    /// Resolve one prompt to rows.
    ///
    /// Errors with [`AskKitError::NoDataIngested`] when the registry is
    /// empty. A generation failure surfaces as
    /// [`AskKitError::SqlGeneration`] unless `resolve.fallback_to_heuristic`
    /// is set, in which case the heuristic path answers instead.
    pub async fn resolve(&self, prompt: &str) -> Result<PromptResolution> {
        let snapshot = registry::load_registry(&self.pool).await?;
        if snapshot.datasets.is_empty() {
            return Err(AskKitError::NoDataIngested);
        }
        let datasets = snapshot.datasets;

        let metrics = detect_metrics(prompt);
        if !metrics.is_empty() {
            tracing::debug!("KPI shortcut for: {:?}", metrics);
            return self.resolve_kpi(&datasets, &metrics).await;
        }

        match &self.provider {
            Some(provider) => {
                match self.resolve_llm(provider, prompt, &datasets).await {
                    Ok(resolution) => Ok(resolution),
                    Err(e @ AskKitError::SqlGeneration { .. }) if self.fallback_to_heuristic => {
                        tracing::warn!("SQL generation failed, using heuristic instead: {}", e);
                        self.resolve_heuristic(prompt, &datasets).await
                    }
                    Err(e) => Err(e),
                }
            }
            None => self.resolve_heuristic(prompt, &datasets).await,
        }
    }

    async fn resolve_kpi(
        &self,
        datasets: &[DatasetRecord],
        metrics: &BTreeSet<MetricKind>,
    ) -> Result<PromptResolution> {
        let report = compute_metrics(&self.pool, datasets, metrics).await;

        let rows: Vec<IndexMap<String, Value>> = metrics
            .iter()
            .map(|metric| {
                let value = report.values.get(metric).copied().unwrap_or(0.0);
                let mut row = IndexMap::new();
                row.insert("metric".to_string(), Value::from(metric.name()));
                row.insert("value".to_string(), Value::from(round4(value)));
                row
            })
            .collect();

        Ok(PromptResolution {
            table_name: "kpi_metrics".to_string(),
            business: "All Businesses".to_string(),
            dataset_name: "Aggregated KPIs".to_string(),
            sql: KPI_SQL_PLACEHOLDER.to_string(),
            columns: vec!["metric".to_string(), "value".to_string()],
            rows,
            generated_by: GeneratedBy::Kpi,
            provider: None,
            model: None,
        })
    }

    async fn resolve_llm(
        &self,
        provider: &LlmProvider,
        prompt: &str,
        datasets: &[DatasetRecord],
    ) -> Result<PromptResolution> {
        // Sample rows from the first table ground the model in real values.
        // Fetch failures only cost context, never the request.
        let sample_rows = match datasets.first() {
            Some(first) => {
                let sample_sql = format!("SELECT * FROM \"{}\" LIMIT 3", first.table_name);
                match exec::run_query(&self.pool, &sample_sql).await {
                    Ok(output) => output.rows,
                    Err(e) => {
                        tracing::debug!("Sample row fetch failed: {}", e);
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let generated = provider.generate_sql(prompt, datasets, &sample_rows).await?;
        let result = exec::execute_safe(&self.pool, &generated.sql, datasets).await?;

        let (table_name, business, dataset_name) = match result.table {
            Some(table) => (table.table_name, table.business, table.dataset_name),
            None => (String::new(), String::new(), String::new()),
        };

        Ok(PromptResolution {
            table_name,
            business,
            dataset_name,
            sql: generated.sql,
            columns: result.columns,
            rows: result.rows,
            generated_by: GeneratedBy::Llm,
            provider: Some(generated.provider),
            model: Some(generated.model),
        })
    }

    async fn resolve_heuristic(
        &self,
        prompt: &str,
        datasets: &[DatasetRecord],
    ) -> Result<PromptResolution> {
        let dataset =
            select::select_dataset(prompt, datasets).ok_or(AskKitError::NoDataIngested)?;
        let sql = select::fallback_query(dataset);
        let output = exec::run_query(&self.pool, &sql).await?;

        Ok(PromptResolution {
            table_name: dataset.table_name.clone(),
            business: dataset.business.clone(),
            dataset_name: dataset.dataset_name.clone(),
            sql,
            // The registry's column list, not the result's: a preview of an
            // empty table still shows its schema.
            columns: dataset.columns.clone(),
            rows: output.rows,
            generated_by: GeneratedBy::Heuristic,
            provider: None,
            model: None,
        })
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(2.0), 2.0);
        assert_eq!(round4(1234.00004), 1234.0);
        assert_eq!(round4(-0.123456), -0.1235);
    }

    #[test]
    fn test_generated_by_as_str() {
        assert_eq!(GeneratedBy::Kpi.as_str(), "kpi");
        assert_eq!(GeneratedBy::Llm.as_str(), "llm");
        assert_eq!(GeneratedBy::Heuristic.as_str(), "heuristic");
    }

    #[test]
    fn test_generated_by_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&GeneratedBy::Heuristic).unwrap(),
            "\"heuristic\""
        );
        assert_eq!(serde_json::to_string(&GeneratedBy::Kpi).unwrap(), "\"kpi\"");
    }
}
