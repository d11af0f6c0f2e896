//! # Dataset Registry
//!
//! Every ingested CSV becomes a SQLite table plus one row in the
//! `dataset_registry` table, which records where the data came from and what
//! columns it carries. The registry is the single source of truth for
//! "what data do we have": metric computation, table selection, and LLM
//! context building all start from a [`RegistrySnapshot`].
//!
//! Rows with malformed metadata (e.g. a `columns` cell that isn't a JSON
//! string array) are not silently dropped: they surface in
//! [`RegistrySnapshot::skipped`] so callers can report them.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::error::{AskKitError, Result};

/// Name of the registry table created in the analytics database.
pub const DATASET_REGISTRY_TABLE: &str = "dataset_registry";

/// One ingested dataset: a physical table plus its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Physical SQLite table name, e.g. "acme_campaigns_2024".
    pub table_name: String,
    /// Business the data belongs to (directory name, as found on disk).
    pub business: String,
    /// Category slug, e.g. "campaigns".
    pub category: String,
    /// Human-readable dataset name (CSV file stem, as found on disk).
    pub dataset_name: String,
    /// Path of the source CSV file.
    pub source_file: String,
    /// Number of data rows loaded.
    pub row_count: i64,
    /// Column names in table order, provenance columns included.
    pub columns: Vec<String>,
    /// RFC 3339 timestamp of the last ingestion.
    pub ingested_at: String,
}

/// A registry row that could not be loaded, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDataset {
    pub table_name: String,
    pub reason: String,
}

/// The loaded registry: usable datasets plus any rows that were skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrySnapshot {
    pub datasets: Vec<DatasetRecord>,
    pub skipped: Vec<SkippedDataset>,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

/// Create the registry table if it doesn't exist yet.
pub async fn ensure_registry(pool: &SqlitePool) -> Result<()> {
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {DATASET_REGISTRY_TABLE} (
            table_name TEXT PRIMARY KEY,
            business TEXT NOT NULL,
            category TEXT NOT NULL,
            dataset_name TEXT NOT NULL,
            source_file TEXT NOT NULL,
            row_count INTEGER NOT NULL,
            columns TEXT NOT NULL,
            ingested_at TEXT NOT NULL
        )"
    );
    sqlx::query(&ddl)
        .execute(pool)
        .await
        .map_err(|e| AskKitError::RegistryUnavailable {
            message: format!("failed to create table '{DATASET_REGISTRY_TABLE}': {e}"),
        })?;
    Ok(())
}

/// Insert or update one dataset's registry row.
///
/// Re-ingesting a file with the same table name replaces the previous entry,
/// so the registry always reflects the latest load.
pub async fn record_dataset(pool: &SqlitePool, record: &DatasetRecord) -> Result<()> {
    let columns_json =
        serde_json::to_string(&record.columns).map_err(|e| AskKitError::RegistryUnavailable {
            message: format!(
                "failed to encode columns for '{}': {}",
                record.table_name, e
            ),
        })?;

    let sql = format!(
        "INSERT INTO {DATASET_REGISTRY_TABLE}
            (table_name, business, category, dataset_name, source_file, row_count, columns, ingested_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(table_name) DO UPDATE SET
            business = excluded.business,
            category = excluded.category,
            dataset_name = excluded.dataset_name,
            source_file = excluded.source_file,
            row_count = excluded.row_count,
            columns = excluded.columns,
            ingested_at = excluded.ingested_at"
    );

    sqlx::query(&sql)
        .bind(&record.table_name)
        .bind(&record.business)
        .bind(&record.category)
        .bind(&record.dataset_name)
        .bind(&record.source_file)
        .bind(record.row_count)
        .bind(&columns_json)
        .bind(&record.ingested_at)
        .execute(pool)
        .await
        .map_err(|e| AskKitError::RegistryUnavailable {
            message: format!("failed to record dataset '{}': {}", record.table_name, e),
        })?;

    Ok(())
}

/// Load the full registry, ordered by table name.
///
/// Errors with [`AskKitError::RegistryUnavailable`] when the registry table
/// doesn't exist. An existing but empty registry returns an empty snapshot;
/// callers decide whether that means [`AskKitError::NoDataIngested`].
pub async fn load_registry(pool: &SqlitePool) -> Result<RegistrySnapshot> {
    if !registry_table_exists(pool).await? {
        return Err(AskKitError::RegistryUnavailable {
            message: format!(
                "table '{DATASET_REGISTRY_TABLE}' does not exist; run `askkit ingest --data-root <dir>` to create it"
            ),
        });
    }

    let sql = format!(
        "SELECT table_name, business, category, dataset_name, source_file, row_count, columns, ingested_at
         FROM {DATASET_REGISTRY_TABLE}
         ORDER BY table_name"
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| AskKitError::RegistryUnavailable {
            message: format!("failed to read '{DATASET_REGISTRY_TABLE}': {e}"),
        })?;

    let mut snapshot = RegistrySnapshot::default();
    for row in rows {
        let table_name: String = row.get("table_name");
        let columns_json: String = row.get("columns");

        let columns: Vec<String> = match serde_json::from_str(&columns_json) {
            Ok(cols) => cols,
            Err(e) => {
                tracing::warn!(
                    "Skipping registry row '{}': columns is not a JSON string array: {}",
                    table_name,
                    e
                );
                snapshot.skipped.push(SkippedDataset {
                    table_name,
                    reason: format!("columns is not a JSON string array: {e}"),
                });
                continue;
            }
        };

        snapshot.datasets.push(DatasetRecord {
            table_name,
            business: row.get("business"),
            category: row.get("category"),
            dataset_name: row.get("dataset_name"),
            source_file: row.get("source_file"),
            row_count: row.get("row_count"),
            columns,
            ingested_at: row.get("ingested_at"),
        });
    }

    Ok(snapshot)
}

async fn registry_table_exists(pool: &SqlitePool) -> Result<bool> {
    let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
        .bind(DATASET_REGISTRY_TABLE)
        .fetch_optional(pool)
        .await
        .map_err(|e| AskKitError::RegistryUnavailable {
            message: format!("failed to query sqlite_master: {e}"),
        })?;
    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory SQLite pool")
    }

    fn sample_record(table_name: &str) -> DatasetRecord {
        DatasetRecord {
            table_name: table_name.to_string(),
            business: "Acme".to_string(),
            category: "campaigns".to_string(),
            dataset_name: "2024".to_string(),
            source_file: "/data/Acme/campaigns/2024.csv".to_string(),
            row_count: 3,
            columns: vec![
                "date".to_string(),
                "revenue".to_string(),
                "orders".to_string(),
            ],
            ingested_at: "2024-06-01T00:00:00+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_load_without_registry_table_fails() {
        let pool = test_pool().await;
        let err = load_registry(&pool).await.unwrap_err();
        assert!(matches!(err, AskKitError::RegistryUnavailable { .. }));
        let msg = format!("{}", err);
        assert!(msg.contains("dataset_registry"), "got: {}", msg);
    }

    #[tokio::test]
    async fn test_empty_registry_loads_empty_snapshot() {
        let pool = test_pool().await;
        ensure_registry(&pool).await.unwrap();

        let snapshot = load_registry(&pool).await.unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_record_and_load_round_trip_preserves_column_order() {
        let pool = test_pool().await;
        ensure_registry(&pool).await.unwrap();

        let record = sample_record("acme_campaigns_2024");
        record_dataset(&pool, &record).await.unwrap();

        let snapshot = load_registry(&pool).await.unwrap();
        assert_eq!(snapshot.datasets.len(), 1);
        assert_eq!(snapshot.datasets[0], record);
        assert_eq!(
            snapshot.datasets[0].columns,
            vec!["date", "revenue", "orders"]
        );
    }

    #[tokio::test]
    async fn test_record_twice_replaces_entry() {
        let pool = test_pool().await;
        ensure_registry(&pool).await.unwrap();

        let mut record = sample_record("acme_campaigns_2024");
        record_dataset(&pool, &record).await.unwrap();

        record.row_count = 10;
        record.ingested_at = "2024-07-01T00:00:00+00:00".to_string();
        record_dataset(&pool, &record).await.unwrap();

        let snapshot = load_registry(&pool).await.unwrap();
        assert_eq!(snapshot.datasets.len(), 1);
        assert_eq!(snapshot.datasets[0].row_count, 10);
        assert_eq!(snapshot.datasets[0].ingested_at, "2024-07-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_datasets_ordered_by_table_name() {
        let pool = test_pool().await;
        ensure_registry(&pool).await.unwrap();

        record_dataset(&pool, &sample_record("zeta_ads_spend")).await.unwrap();
        record_dataset(&pool, &sample_record("acme_campaigns_2024"))
            .await
            .unwrap();

        let snapshot = load_registry(&pool).await.unwrap();
        let names: Vec<&str> = snapshot
            .datasets
            .iter()
            .map(|d| d.table_name.as_str())
            .collect();
        assert_eq!(names, vec!["acme_campaigns_2024", "zeta_ads_spend"]);
    }

    #[tokio::test]
    async fn test_malformed_columns_row_is_skipped_not_fatal() {
        let pool = test_pool().await;
        ensure_registry(&pool).await.unwrap();
        record_dataset(&pool, &sample_record("acme_campaigns_2024"))
            .await
            .unwrap();

        // Corrupt one row's columns cell directly.
        sqlx::query(
            "INSERT INTO dataset_registry
                (table_name, business, category, dataset_name, source_file, row_count, columns, ingested_at)
             VALUES ('broken', 'B', 'c', 'd', 'f.csv', 0, 'not json', 't')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let snapshot = load_registry(&pool).await.unwrap();
        assert_eq!(snapshot.datasets.len(), 1);
        assert_eq!(snapshot.datasets[0].table_name, "acme_campaigns_2024");
        assert_eq!(snapshot.skipped.len(), 1);
        assert_eq!(snapshot.skipped[0].table_name, "broken");
        assert!(snapshot.skipped[0].reason.contains("JSON"));
    }
}
