//! # SQL Safety and Execution
//!
//! The only path by which generated SQL reaches the database. A statement
//! must pass the keyword guard first; it is then executed read-only in
//! intent, with rows decoded into ordered JSON maps. Execution failures on
//! missing columns or tables are enriched with the attributed table's real
//! column list, which turns a hallucinated-column error into something a
//! user can act on.
//!
//! Table attribution is a best-effort text scan of the SQL, used for
//! diagnostics and result labeling only. It never affects which statement
//! runs.

use indexmap::IndexMap;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use crate::error::{AskKitError, Result};
use crate::registry::DatasetRecord;

/// Keywords that mark a statement as mutating or otherwise off-limits.
///
/// Matched as plain substrings of the uppercased SQL, so identifiers that
/// contain a keyword ("update_date", "created_at") are rejected too.
const FORBIDDEN_KEYWORDS: [&str; 8] = [
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "TRUNCATE", "CREATE", "EXEC",
];

/// Rows and column names produced by one query.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    /// Column names in select order; empty when the query returned no rows.
    pub columns: Vec<String>,
    pub rows: Vec<IndexMap<String, Value>>,
}

/// A guarded query's output plus the dataset it was attributed to.
#[derive(Debug, Clone)]
pub struct SafeQueryResult {
    /// Best-effort guess of the dataset the SQL reads from.
    pub table: Option<DatasetRecord>,
    pub columns: Vec<String>,
    pub rows: Vec<IndexMap<String, Value>>,
}

/// Return the first forbidden keyword found in the SQL, if any.
pub fn forbidden_keyword(sql: &str) -> Option<&'static str> {
    let sql_upper = sql.to_uppercase();
    FORBIDDEN_KEYWORDS
        .iter()
        .find(|kw| sql_upper.contains(*kw))
        .copied()
}

/// Guess which dataset a statement reads from.
///
/// Scans the uppercased SQL for each registered table name and falls back
/// to the first dataset, so diagnostics always have something to point at
/// when any data exists.
pub fn attribute_table<'a>(sql: &str, datasets: &'a [DatasetRecord]) -> Option<&'a DatasetRecord> {
    let sql_upper = sql.to_uppercase();
    datasets
        .iter()
        .find(|d| sql_upper.contains(&d.table_name.to_uppercase()))
        .or_else(|| datasets.first())
}

/// Execute trusted SQL and decode all rows.
///
/// No safety guard and no error enrichment; for SQL AskKit built itself.
pub async fn run_query(pool: &SqlitePool, sql: &str) -> Result<QueryOutput> {
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .map_err(|e| AskKitError::SqlExecution {
            message: e.to_string(),
        })?;

    let decoded: Vec<IndexMap<String, Value>> = rows.iter().map(decode_row).collect();
    let columns = decoded
        .first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default();

    Ok(QueryOutput {
        columns,
        rows: decoded,
    })
}

/// Guard, attribute, and execute generated SQL.
///
/// Rejects the statement outright when it contains a forbidden keyword.
/// On a "no such column" / "no such table" failure, the error message is
/// extended with the attributed table's columns.
pub async fn execute_safe(
    pool: &SqlitePool,
    sql: &str,
    datasets: &[DatasetRecord],
) -> Result<SafeQueryResult> {
    if let Some(keyword) = forbidden_keyword(sql) {
        return Err(AskKitError::UnsafeSql {
            keyword: keyword.to_string(),
            sql_preview: truncate(sql, 200).to_string(),
        });
    }

    let attributed = attribute_table(sql, datasets);

    match run_query(pool, sql).await {
        Ok(output) => Ok(SafeQueryResult {
            table: attributed.cloned(),
            columns: output.columns,
            rows: output.rows,
        }),
        Err(AskKitError::SqlExecution { mut message }) => {
            let lowered = message.to_lowercase();
            if lowered.contains("no such column") || lowered.contains("no such table") {
                if let Some(table) = attributed {
                    if !table.columns.is_empty() {
                        message.push_str(&format!(
                            "\n  Available columns for table '{}': {}",
                            table.table_name,
                            table.columns.join(", ")
                        ));
                    }
                }
            }
            Err(AskKitError::SqlExecution { message })
        }
        Err(other) => Err(other),
    }
}

/// Decode one SQLite row into an ordered name → JSON value map.
///
/// SQLite's runtime types map directly: INTEGER → number, REAL → number
/// (NaN becomes null), everything else is read as text.
fn decode_row(row: &SqliteRow) -> IndexMap<String, Value> {
    let mut out = IndexMap::with_capacity(row.columns().len());
    for column in row.columns() {
        let ordinal = column.ordinal();
        let value = match row.try_get_raw(ordinal) {
            Ok(raw) => {
                if raw.is_null() {
                    Value::Null
                } else {
                    let type_info = raw.type_info();
                    match type_info.name() {
                        "INTEGER" => row
                            .try_get::<i64, _>(ordinal)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        "REAL" => row
                            .try_get::<f64, _>(ordinal)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        "BOOLEAN" => row
                            .try_get::<bool, _>(ordinal)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        _ => row
                            .try_get::<String, _>(ordinal)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                    }
                }
            }
            Err(_) => Value::Null,
        };
        out.insert(column.name().to_string(), value);
    }
    out
}

/// Truncate to at most `max` bytes, backing off to a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
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

    fn dataset(table_name: &str, columns: &[&str]) -> DatasetRecord {
        DatasetRecord {
            table_name: table_name.to_string(),
            business: "Acme".to_string(),
            category: "campaigns".to_string(),
            dataset_name: table_name.to_string(),
            source_file: format!("/data/{table_name}.csv"),
            row_count: 0,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ingested_at: "2024-06-01T00:00:00+00:00".to_string(),
        }
    }

    async fn seed_campaigns(pool: &SqlitePool) {
        sqlx::query("CREATE TABLE acme_campaigns_2024 (date TEXT, revenue REAL, orders INTEGER)")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO acme_campaigns_2024 VALUES ('2024-01-01', 1200.50, 10), ('2024-01-02', NULL, NULL)",
        )
        .execute(pool)
        .await
        .unwrap();
    }

    // --- forbidden_keyword ---

    #[test]
    fn test_select_is_allowed() {
        assert_eq!(forbidden_keyword("SELECT * FROM campaigns LIMIT 50"), None);
    }

    #[test]
    fn test_every_mutating_keyword_rejected_case_insensitively() {
        for sql in [
            "drop table campaigns",
            "Delete from campaigns",
            "INSERT INTO campaigns VALUES (1)",
            "update campaigns set x = 1",
            "alter table campaigns add column x",
            "truncate table campaigns",
            "create table evil (x)",
            "exec sp_who",
        ] {
            assert!(forbidden_keyword(sql).is_some(), "{} should be rejected", sql);
        }
    }

    #[test]
    fn test_trailing_mutation_after_select_rejected() {
        let sql = "SELECT 1; DROP TABLE acme_campaigns_2024";
        assert_eq!(forbidden_keyword(sql), Some("DROP"));
    }

    #[test]
    fn test_keyword_inside_identifier_also_rejected() {
        // Known bluntness of substring matching, pinned here.
        assert_eq!(
            forbidden_keyword("SELECT last_update FROM campaigns"),
            Some("UPDATE")
        );
        assert_eq!(
            forbidden_keyword("SELECT created_at FROM campaigns"),
            Some("CREATE")
        );
    }

    // --- attribute_table ---

    #[test]
    fn test_attributes_mentioned_table() {
        let datasets = vec![dataset("alpha", &["a"]), dataset("beta", &["b"])];
        let hit = attribute_table("SELECT * FROM beta LIMIT 5", &datasets).unwrap();
        assert_eq!(hit.table_name, "beta");
    }

    #[test]
    fn test_attribution_is_case_insensitive() {
        let datasets = vec![dataset("acme_campaigns_2024", &["date"])];
        let hit = attribute_table("select * from ACME_CAMPAIGNS_2024", &datasets).unwrap();
        assert_eq!(hit.table_name, "acme_campaigns_2024");
    }

    #[test]
    fn test_attribution_falls_back_to_first_dataset() {
        let datasets = vec![dataset("alpha", &["a"]), dataset("beta", &["b"])];
        let hit = attribute_table("SELECT 1", &datasets).unwrap();
        assert_eq!(hit.table_name, "alpha");
    }

    #[test]
    fn test_attribution_empty_registry_is_none() {
        assert!(attribute_table("SELECT 1", &[]).is_none());
    }

    // --- run_query ---

    #[tokio::test]
    async fn test_run_query_decodes_types() {
        let pool = test_pool().await;
        seed_campaigns(&pool).await;

        let output = run_query(&pool, "SELECT * FROM acme_campaigns_2024 ORDER BY date")
            .await
            .unwrap();

        assert_eq!(output.columns, vec!["date", "revenue", "orders"]);
        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.rows[0]["date"], Value::from("2024-01-01"));
        assert_eq!(output.rows[0]["revenue"], Value::from(1200.50));
        assert_eq!(output.rows[0]["orders"], Value::from(10));
        assert_eq!(output.rows[1]["revenue"], Value::Null);
    }

    #[tokio::test]
    async fn test_run_query_preserves_select_order() {
        let pool = test_pool().await;
        seed_campaigns(&pool).await;

        let output = run_query(
            &pool,
            "SELECT orders, date FROM acme_campaigns_2024 LIMIT 1",
        )
        .await
        .unwrap();
        assert_eq!(output.columns, vec!["orders", "date"]);
        let keys: Vec<&String> = output.rows[0].keys().collect();
        assert_eq!(keys, vec!["orders", "date"]);
    }

    #[tokio::test]
    async fn test_run_query_empty_result_has_no_columns() {
        let pool = test_pool().await;
        seed_campaigns(&pool).await;

        let output = run_query(&pool, "SELECT * FROM acme_campaigns_2024 WHERE 1 = 0")
            .await
            .unwrap();
        assert!(output.columns.is_empty());
        assert!(output.rows.is_empty());
    }

    #[tokio::test]
    async fn test_run_query_error_is_sql_execution() {
        let pool = test_pool().await;
        let err = run_query(&pool, "SELECT * FROM missing_table").await.unwrap_err();
        assert!(matches!(err, AskKitError::SqlExecution { .. }));
    }

    // --- execute_safe ---

    #[tokio::test]
    async fn test_execute_safe_rejects_unsafe_sql_before_touching_db() {
        let pool = test_pool().await;
        seed_campaigns(&pool).await;
        let datasets = vec![dataset("acme_campaigns_2024", &["date", "revenue", "orders"])];

        let err = execute_safe(&pool, "DROP TABLE acme_campaigns_2024", &datasets)
            .await
            .unwrap_err();
        match err {
            AskKitError::UnsafeSql { keyword, .. } => assert_eq!(keyword, "DROP"),
            other => panic!("Expected UnsafeSql, got {:?}", other),
        }

        // Table untouched.
        let output = run_query(&pool, "SELECT COUNT(*) AS n FROM acme_campaigns_2024")
            .await
            .unwrap();
        assert_eq!(output.rows[0]["n"], Value::from(2));
    }

    #[tokio::test]
    async fn test_execute_safe_returns_rows_and_attribution() {
        let pool = test_pool().await;
        seed_campaigns(&pool).await;
        let datasets = vec![dataset("acme_campaigns_2024", &["date", "revenue", "orders"])];

        let result = execute_safe(
            &pool,
            "SELECT date, revenue FROM acme_campaigns_2024 ORDER BY date LIMIT 50",
            &datasets,
        )
        .await
        .unwrap();

        assert_eq!(result.table.unwrap().table_name, "acme_campaigns_2024");
        assert_eq!(result.columns, vec!["date", "revenue"]);
        assert_eq!(result.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_column_error_lists_available_columns() {
        let pool = test_pool().await;
        seed_campaigns(&pool).await;
        let datasets = vec![dataset("acme_campaigns_2024", &["date", "revenue", "orders"])];

        let err = execute_safe(
            &pool,
            "SELECT nonexistent_col FROM acme_campaigns_2024 LIMIT 50",
            &datasets,
        )
        .await
        .unwrap_err();

        let msg = format!("{}", err);
        assert!(msg.contains("no such column"), "got: {}", msg);
        assert!(
            msg.contains("Available columns for table 'acme_campaigns_2024'"),
            "got: {}",
            msg
        );
        assert!(msg.contains("date, revenue, orders"), "got: {}", msg);
    }

    #[tokio::test]
    async fn test_missing_table_error_hints_with_first_dataset() {
        let pool = test_pool().await;
        seed_campaigns(&pool).await;
        let datasets = vec![dataset("acme_campaigns_2024", &["date", "revenue", "orders"])];

        let err = execute_safe(&pool, "SELECT x FROM ghost_table", &datasets)
            .await
            .unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("no such table"), "got: {}", msg);
        assert!(msg.contains("date, revenue, orders"), "got: {}", msg);
    }

    #[tokio::test]
    async fn test_other_execution_errors_not_enriched() {
        let pool = test_pool().await;
        seed_campaigns(&pool).await;
        let datasets = vec![dataset("acme_campaigns_2024", &["date", "revenue", "orders"])];

        let err = execute_safe(&pool, "SELECT FROM WHERE", &datasets).await.unwrap_err();
        let msg = format!("{}", err);
        assert!(!msg.contains("Available columns"), "got: {}", msg);
    }
}
