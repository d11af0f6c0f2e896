use askkit_core::registry::{ensure_registry, record_dataset, DatasetRecord};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Open a single-connection in-memory SQLite pool.
///
/// One connection keeps every query on the same in-memory database.
pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory SQLite pool")
}

/// Build a registry record with the given identity and columns.
pub fn record(
    table_name: &str,
    business: &str,
    category: &str,
    dataset_name: &str,
    columns: &[&str],
) -> DatasetRecord {
    DatasetRecord {
        table_name: table_name.to_string(),
        business: business.to_string(),
        category: category.to_string(),
        dataset_name: dataset_name.to_string(),
        source_file: format!("{business}/{category}/{dataset_name}.csv"),
        row_count: 0,
        columns: columns.iter().map(|c| c.to_string()).collect(),
        ingested_at: "2024-06-01T00:00:00+00:00".to_string(),
    }
}

/// Registry record for the seeded campaign performance table.
pub fn campaigns_record() -> DatasetRecord {
    DatasetRecord {
        row_count: 3,
        ..record(
            "acme_campaigns_2024",
            "acme",
            "campaigns",
            "campaigns 2024",
            &["date", "revenue", "orders"],
        )
    }
}

/// Registry record for the seeded ad spend table.
pub fn ads_record() -> DatasetRecord {
    DatasetRecord {
        row_count: 2,
        ..record(
            "zeta_ads_spend",
            "zeta",
            "ads",
            "ads spend",
            &["week", "channel", "spend", "sessions"],
        )
    }
}

/// Seed a small two-business marketing database and register both datasets.
///
/// Totals are kept easy to assert against: revenue 2500.00, orders 20,
/// spend 500.00, sessions 1000, so AOV is 125.0, ROAS 5.0 and the
/// conversion rate 2.0%.
pub async fn seed_marketing_db(pool: &SqlitePool) {
    // campaign performance table
    sqlx::query(
        r#"CREATE TABLE "acme_campaigns_2024" ("date" TEXT, "revenue" REAL, "orders" INTEGER)"#,
    )
    .execute(pool)
    .await
    .expect("create campaigns table");
    sqlx::query(
        r#"INSERT INTO "acme_campaigns_2024" VALUES
            ('2024-01-01', 1200.50, 10),
            ('2024-02-01', 830.25, 7),
            ('2024-03-01', 469.25, 3)"#,
    )
    .execute(pool)
    .await
    .expect("seed campaigns table");

    // ad spend table
    sqlx::query(
        r#"CREATE TABLE "zeta_ads_spend"
            ("week" TEXT, "channel" TEXT, "spend" REAL, "sessions" INTEGER)"#,
    )
    .execute(pool)
    .await
    .expect("create ad spend table");
    sqlx::query(
        r#"INSERT INTO "zeta_ads_spend" VALUES
            ('2024-W01', 'search', 300.0, 500),
            ('2024-W02', 'social', 200.0, 500)"#,
    )
    .execute(pool)
    .await
    .expect("seed ad spend table");

    ensure_registry(pool).await.expect("create registry");
    record_dataset(pool, &campaigns_record())
        .await
        .expect("register campaigns");
    record_dataset(pool, &ads_record())
        .await
        .expect("register ad spend");
}
