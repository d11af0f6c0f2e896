//! Integration tests for the prompt resolution pipeline against in-memory
//! SQLite databases.
//!
//! These tests exercise the real pipeline end to end (registry, metric
//! detection, table selection, execution guard) with the LLM provider
//! disabled, so they need no network or local model:
//!
//! ```bash
//! cargo test --test resolver_sqlite
//! ```

use askkit_core::config::AskKitConfig;
use askkit_core::error::AskKitError;
use askkit_core::exec::execute_safe;
use askkit_core::ingest::ingest_directory;
use askkit_core::registry::{ensure_registry, load_registry};
use askkit_core::{GeneratedBy, PromptResolver};
use askkit_testutil::{memory_pool, seed_marketing_db};
use serde_json::json;

/// Config with the LLM path switched off, forcing KPI or heuristic answers.
fn no_llm_config() -> AskKitConfig {
    let mut config = AskKitConfig::default();
    config.llm.enabled = false;
    config
}

/// Helper: seeded database plus a resolver over it.
async fn seeded_resolver() -> (sqlx::SqlitePool, PromptResolver) {
    let pool = memory_pool().await;
    seed_marketing_db(&pool).await;
    let resolver = PromptResolver::new(pool.clone(), &no_llm_config());
    (pool, resolver)
}

// ---------------------------------------------------------------------------
// KPI path

#[tokio::test]
async fn test_total_revenue_prompt_answers_from_kpis() {
    let (_pool, resolver) = seeded_resolver().await;

    let resolution = resolver
        .resolve("what is our total revenue")
        .await
        .expect("resolve failed");

    assert_eq!(resolution.generated_by, GeneratedBy::Kpi);
    assert_eq!(resolution.table_name, "kpi_metrics");
    assert_eq!(resolution.business, "All Businesses");
    assert_eq!(resolution.dataset_name, "Aggregated KPIs");
    assert_eq!(
        resolution.sql,
        "/* Aggregated KPI metrics: no direct SQL executed */"
    );
    assert_eq!(resolution.provider, None);
    assert_eq!(resolution.model, None);

    assert_eq!(resolution.columns, vec!["metric", "value"]);
    assert_eq!(resolution.rows.len(), 1);
    assert_eq!(resolution.rows[0].get("metric"), Some(&json!("revenue")));
    assert_eq!(resolution.rows[0].get("value"), Some(&json!(2500.0)));
}

#[tokio::test]
async fn test_kpi_prompt_reports_every_metric() {
    let (_pool, resolver) = seeded_resolver().await;

    let resolution = resolver
        .resolve("show me the kpi dashboard")
        .await
        .expect("resolve failed");

    assert_eq!(resolution.generated_by, GeneratedBy::Kpi);

    let metrics: Vec<Option<&serde_json::Value>> = resolution
        .rows
        .iter()
        .map(|row| row.get("metric"))
        .collect();
    assert_eq!(
        metrics,
        vec![
            Some(&json!("revenue")),
            Some(&json!("aov")),
            Some(&json!("roas")),
            Some(&json!("conversion_rate")),
            Some(&json!("sessions")),
        ]
    );

    let values: Vec<f64> = resolution
        .rows
        .iter()
        .map(|row| row.get("value").and_then(|v| v.as_f64()).expect("value"))
        .collect();
    assert_eq!(values, vec![2500.0, 125.0, 5.0, 2.0, 1000.0]);
}

// ---------------------------------------------------------------------------
// Heuristic path

#[tokio::test]
async fn test_breakdown_prompt_takes_heuristic_path() {
    let (_pool, resolver) = seeded_resolver().await;

    let resolution = resolver
        .resolve("revenue by channel")
        .await
        .expect("resolve failed");

    assert_eq!(resolution.generated_by, GeneratedBy::Heuristic);
    assert_eq!(resolution.table_name, "acme_campaigns_2024");
    assert_eq!(
        resolution.sql,
        "SELECT * FROM \"acme_campaigns_2024\" ORDER BY \"date\" DESC LIMIT 50;"
    );
    assert_eq!(resolution.columns, vec!["date", "revenue", "orders"]);
    assert_eq!(resolution.rows.len(), 3);
    assert_eq!(resolution.rows[0].get("date"), Some(&json!("2024-03-01")));
    assert_eq!(resolution.provider, None);
    assert_eq!(resolution.model, None);
}

#[tokio::test]
async fn test_dataset_mention_steers_selection() {
    let (_pool, resolver) = seeded_resolver().await;

    let resolution = resolver
        .resolve("look at the zeta ads table")
        .await
        .expect("resolve failed");

    assert_eq!(resolution.generated_by, GeneratedBy::Heuristic);
    assert_eq!(resolution.table_name, "zeta_ads_spend");
    assert_eq!(resolution.business, "zeta");
    assert_eq!(
        resolution.sql,
        "SELECT * FROM \"zeta_ads_spend\" ORDER BY \"week\" DESC LIMIT 50;"
    );
}

#[tokio::test]
async fn test_selection_is_deterministic_for_unrelated_prompts() {
    let (_pool, resolver) = seeded_resolver().await;

    for _ in 0..5 {
        let resolution = resolver
            .resolve("show me something interesting")
            .await
            .expect("resolve failed");
        assert_eq!(resolution.table_name, "acme_campaigns_2024");
    }
}

// ---------------------------------------------------------------------------
// Execution guard

#[tokio::test]
async fn test_destructive_sql_is_rejected() {
    let pool = memory_pool().await;
    seed_marketing_db(&pool).await;
    let snapshot = load_registry(&pool).await.expect("load registry");

    for sql in [
        "DROP TABLE acme_campaigns_2024",
        "delete from acme_campaigns_2024",
        "SELECT 1; DROP TABLE acme_campaigns_2024",
    ] {
        let err = execute_safe(&pool, sql, &snapshot.datasets)
            .await
            .expect_err("unsafe SQL must be rejected");
        assert!(matches!(err, AskKitError::UnsafeSql { .. }), "{sql}");
    }

    // The guard fires before anything reaches the database.
    let result = execute_safe(
        &pool,
        "SELECT COUNT(*) AS n FROM acme_campaigns_2024",
        &snapshot.datasets,
    )
    .await
    .expect("count query failed");
    assert_eq!(result.rows[0].get("n"), Some(&json!(3)));
}

#[tokio::test]
async fn test_hallucinated_column_error_names_real_columns() {
    let pool = memory_pool().await;
    seed_marketing_db(&pool).await;
    let snapshot = load_registry(&pool).await.expect("load registry");

    let err = execute_safe(
        &pool,
        "SELECT nonexistent_col FROM acme_campaigns_2024 LIMIT 50",
        &snapshot.datasets,
    )
    .await
    .expect_err("query against a missing column must fail");

    let message = err.to_string();
    assert!(message.contains("no such column"), "{message}");
    assert!(
        message.contains("Available columns for table 'acme_campaigns_2024'"),
        "{message}"
    );
    assert!(message.contains("date, revenue, orders"), "{message}");
}

// ---------------------------------------------------------------------------
// CSV to answer, end to end

#[tokio::test]
async fn test_csv_ingest_to_kpi_answer() {
    let pool = memory_pool().await;

    let dir = tempfile::tempdir().expect("tempdir");
    let csv_dir = dir.path().join("acme").join("campaigns");
    std::fs::create_dir_all(&csv_dir).expect("create data tree");
    std::fs::write(
        csv_dir.join("2024.csv"),
        "date,revenue,orders\n2024-01-01,100.50,2\n2024-01-02,49.50,1\n",
    )
    .expect("write csv");

    let report = ingest_directory(&pool, dir.path(), None, None)
        .await
        .expect("ingest failed");
    assert_eq!(report.ingested.len(), 1);
    assert_eq!(report.ingested[0].table_name, "acme_campaigns_2024");

    // Column order survives the registry round trip, provenance columns last.
    let snapshot = load_registry(&pool).await.expect("load registry");
    assert_eq!(
        snapshot.datasets[0].columns,
        vec![
            "date",
            "revenue",
            "orders",
            "business_name",
            "category",
            "source_file"
        ]
    );

    let resolver = PromptResolver::new(pool.clone(), &no_llm_config());
    let resolution = resolver
        .resolve("what is our total revenue")
        .await
        .expect("resolve failed");

    assert_eq!(resolution.generated_by, GeneratedBy::Kpi);
    assert_eq!(resolution.rows[0].get("metric"), Some(&json!("revenue")));
    assert_eq!(resolution.rows[0].get("value"), Some(&json!(150.0)));
}

// ---------------------------------------------------------------------------
// Empty databases

#[tokio::test]
async fn test_missing_registry_reports_how_to_create_it() {
    let pool = memory_pool().await;
    let resolver = PromptResolver::new(pool.clone(), &no_llm_config());

    let err = resolver
        .resolve("what is our total revenue")
        .await
        .expect_err("resolve must fail without a registry");

    assert!(matches!(err, AskKitError::RegistryUnavailable { .. }));
    assert!(err.to_string().contains("askkit ingest"), "{err}");
}

#[tokio::test]
async fn test_empty_registry_reports_no_data() {
    let pool = memory_pool().await;
    ensure_registry(&pool).await.expect("create registry");
    let resolver = PromptResolver::new(pool.clone(), &no_llm_config());

    let err = resolver
        .resolve("what is our total revenue")
        .await
        .expect_err("resolve must fail with an empty registry");

    assert!(matches!(err, AskKitError::NoDataIngested));
}
