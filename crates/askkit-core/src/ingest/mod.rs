//! # CSV Ingestion
//!
//! Loads local CSV files into SQLite tables and registers each one in the
//! dataset registry. The expected layout is a directory tree of
//! `<root>/<business>/<category>/<dataset>.csv`; every file becomes a table
//! named `<business>_<category>_<dataset>` (all slugs), with three provenance
//! columns appended to the data: `business_name`, `category`, `source_file`.
//!
//! Column types are inferred from the data: a column whose non-empty values
//! all parse as integers becomes INTEGER, all-numeric becomes REAL, anything
//! else TEXT. Empty cells are stored as NULL.
//!
//! A directory walk never aborts on one bad file: per-file failures are
//! collected in [`IngestReport::skipped`] and the walk continues.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::{AskKitError, Result};
use crate::registry::{self, DatasetRecord};

/// Provenance columns appended to every ingested table.
const PROVENANCE_COLUMNS: [&str; 3] = ["business_name", "category", "source_file"];

/// Outcome of a directory ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Datasets loaded and registered, in walk order.
    pub ingested: Vec<DatasetRecord>,
    /// Files that failed to load, with the reason.
    pub skipped: Vec<SkippedFile>,
}

/// A CSV file that could not be ingested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Normalize an arbitrary name into a SQL-safe identifier slug.
///
/// Punctuation becomes whitespace, runs of whitespace and hyphens collapse
/// into single underscores, and the result is lowercased. Empty input
/// falls back to "dataset".
///
/// "Marketing Spend (USD)" becomes "marketing_spend_usd".
pub fn normalize_identifier(raw: &str) -> String {
    static NON_WORD: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"[^\w\s-]").unwrap());
    static SEPARATORS: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"[\s-]+").unwrap());

    let cleaned = NON_WORD.replace_all(raw, " ").to_lowercase();
    let slug = SEPARATORS.replace_all(&cleaned, "_");
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "dataset".to_string()
    } else {
        slug.to_string()
    }
}

/// Quote an identifier for SQLite.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Storage class inferred for a CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// A single cell ready to bind into an INSERT.
enum Cell {
    Int(i64),
    Real(f64),
    Text(String),
    Null,
}

/// Infer one column's storage class by scanning its values.
///
/// Empty cells don't disqualify a numeric class; a column with no values at
/// all stays TEXT.
fn infer_column_type(rows: &[csv::StringRecord], index: usize) -> ColumnType {
    let mut saw_value = false;
    let mut all_int = true;
    let mut all_real = true;

    for row in rows {
        let value = row.get(index).unwrap_or("").trim();
        if value.is_empty() {
            continue;
        }
        saw_value = true;
        if all_int && value.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_real && value.parse::<f64>().is_err() {
            all_real = false;
            break;
        }
    }

    if !saw_value {
        ColumnType::Text
    } else if all_int {
        ColumnType::Integer
    } else if all_real {
        ColumnType::Real
    } else {
        ColumnType::Text
    }
}

fn cell_for(value: &str, column_type: ColumnType) -> Cell {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Cell::Null;
    }
    match column_type {
        ColumnType::Integer => match trimmed.parse::<i64>() {
            Ok(n) => Cell::Int(n),
            Err(_) => Cell::Text(value.to_string()),
        },
        ColumnType::Real => match trimmed.parse::<f64>() {
            Ok(f) => Cell::Real(f),
            Err(_) => Cell::Text(value.to_string()),
        },
        ColumnType::Text => Cell::Text(value.to_string()),
    }
}

fn ingest_error(path: &Path, message: impl Into<String>) -> AskKitError {
    AskKitError::Ingest {
        path: path.display().to_string(),
        message: message.into(),
    }
}

/// Ingest a single CSV file into its own table and register it.
///
/// `business` defaults to "custom_business", `category` to "custom", and
/// `dataset_name` to the file stem. Re-ingesting the same file replaces the
/// table and its registry row.
pub async fn ingest_csv_file(
    pool: &SqlitePool,
    csv_path: &Path,
    business: Option<&str>,
    category: Option<&str>,
    dataset_name: Option<&str>,
) -> Result<DatasetRecord> {
    let stem = csv_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string();
    let business = business.unwrap_or("custom_business");
    let category = category.unwrap_or("custom");
    let dataset_name = dataset_name.unwrap_or(&stem);

    let table_name = format!(
        "{}_{}_{}",
        normalize_identifier(business),
        normalize_identifier(category),
        normalize_identifier(dataset_name)
    );
    let category_slug = normalize_identifier(category);
    let source_file = csv_path.display().to_string();

    // Parse the whole file up front so a malformed row fails before any
    // table is dropped or replaced.
    let mut reader = csv::Reader::from_path(csv_path)
        .map_err(|e| ingest_error(csv_path, format!("failed to open CSV: {e}")))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ingest_error(csv_path, format!("failed to read CSV header: {e}")))?
        .iter()
        .map(normalize_identifier)
        .collect();
    if headers.is_empty() {
        return Err(ingest_error(csv_path, "CSV has no header row"));
    }
    let rows: Vec<csv::StringRecord> = reader
        .records()
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| ingest_error(csv_path, format!("failed to parse CSV: {e}")))?;

    let mut column_types: Vec<ColumnType> = (0..headers.len())
        .map(|i| infer_column_type(&rows, i))
        .collect();

    // Provenance columns carry constant values per file. A CSV that already
    // has a column with the same name gets its values overwritten rather
    // than duplicated.
    let provenance_values = [business.to_string(), category_slug.clone(), source_file.clone()];
    let mut columns = headers.clone();
    let mut provenance_slots: Vec<(usize, String)> = Vec::new();
    for (name, value) in PROVENANCE_COLUMNS.iter().zip(provenance_values.iter()) {
        let index = match columns.iter().position(|c| c == name) {
            Some(existing) => {
                column_types[existing] = ColumnType::Text;
                existing
            }
            None => {
                columns.push((*name).to_string());
                column_types.push(ColumnType::Text);
                columns.len() - 1
            }
        };
        provenance_slots.push((index, value.clone()));
    }

    registry::ensure_registry(pool).await?;
    replace_table(pool, csv_path, &table_name, &columns, &column_types, &rows, &headers, &provenance_slots)
        .await?;

    let record = DatasetRecord {
        table_name,
        business: business.to_string(),
        category: category_slug,
        dataset_name: dataset_name.to_string(),
        source_file,
        row_count: rows.len() as i64,
        columns,
        ingested_at: Utc::now().to_rfc3339(),
    };
    registry::record_dataset(pool, &record).await?;

    tracing::debug!(
        "Ingested {} rows from {} into '{}'",
        record.row_count,
        record.source_file,
        record.table_name
    );
    Ok(record)
}

#[allow(clippy::too_many_arguments)]
async fn replace_table(
    pool: &SqlitePool,
    csv_path: &Path,
    table_name: &str,
    columns: &[String],
    column_types: &[ColumnType],
    rows: &[csv::StringRecord],
    headers: &[String],
    provenance_slots: &[(usize, String)],
) -> Result<()> {
    let column_defs: Vec<String> = columns
        .iter()
        .zip(column_types.iter())
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql_name()))
        .collect();
    let create_sql = format!(
        "CREATE TABLE {} ({})",
        quote_ident(table_name),
        column_defs.join(", ")
    );
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let insert_sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table_name),
        columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
        placeholders.join(", ")
    );

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| ingest_error(csv_path, format!("failed to begin transaction: {e}")))?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table_name)))
        .execute(&mut *tx)
        .await
        .map_err(|e| ingest_error(csv_path, format!("failed to replace table '{table_name}': {e}")))?;
    sqlx::query(&create_sql)
        .execute(&mut *tx)
        .await
        .map_err(|e| ingest_error(csv_path, format!("failed to create table '{table_name}': {e}")))?;

    for row in rows {
        let mut query = sqlx::query(&insert_sql);
        for index in 0..columns.len() {
            let cell = match provenance_slots.iter().find(|(slot, _)| *slot == index) {
                Some((_, value)) => Cell::Text(value.clone()),
                None if index < headers.len() => {
                    cell_for(row.get(index).unwrap_or(""), column_types[index])
                }
                None => Cell::Null,
            };
            query = match cell {
                Cell::Int(n) => query.bind(n),
                Cell::Real(f) => query.bind(f),
                Cell::Text(s) => query.bind(s),
                Cell::Null => query.bind(None::<String>),
            };
        }
        query
            .execute(&mut *tx)
            .await
            .map_err(|e| ingest_error(csv_path, format!("failed to insert into '{table_name}': {e}")))?;
    }

    tx.commit()
        .await
        .map_err(|e| ingest_error(csv_path, format!("failed to commit '{table_name}': {e}")))?;
    Ok(())
}

/// Walk a `<root>/<business>/<category>/*.csv` tree and ingest every file.
///
/// `business_filter` restricts the walk to one business directory (compared
/// by slug). When `root` is a single CSV file, it is ingested directly with
/// `business_filter` as the business and the parent directory as category.
///
/// `progress` is invoked with each file path before it loads. Per-file
/// failures are reported, not fatal.
pub async fn ingest_directory(
    pool: &SqlitePool,
    root: &Path,
    business_filter: Option<&str>,
    progress: Option<&(dyn Fn(&str) + Send + Sync)>,
) -> Result<IngestReport> {
    if !root.exists() {
        return Err(ingest_error(root, "data root does not exist"));
    }

    let mut report = IngestReport::default();

    if root.is_file() {
        let category = root
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str());
        if let Some(callback) = progress {
            callback(&root.display().to_string());
        }
        let record = ingest_csv_file(pool, root, business_filter, category, None).await?;
        report.ingested.push(record);
        return Ok(report);
    }

    for business_dir in sorted_dirs(root)? {
        let business_name = match business_dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        if let Some(filter) = business_filter {
            if normalize_identifier(&business_name) != normalize_identifier(filter) {
                continue;
            }
        }

        for category_dir in sorted_dirs(&business_dir)? {
            let category_name = match category_dir.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            for csv_path in sorted_csv_files(&category_dir)? {
                let display_path = csv_path.display().to_string();
                if let Some(callback) = progress {
                    callback(&display_path);
                }
                match ingest_csv_file(
                    pool,
                    &csv_path,
                    Some(&business_name),
                    Some(&category_name),
                    None,
                )
                .await
                {
                    Ok(record) => report.ingested.push(record),
                    Err(e) => {
                        tracing::warn!("Skipping {}: {}", display_path, e);
                        report.skipped.push(SkippedFile {
                            path: display_path,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    Ok(report)
}

fn sorted_dirs(parent: &Path) -> Result<Vec<std::path::PathBuf>> {
    let entries = std::fs::read_dir(parent)
        .map_err(|e| ingest_error(parent, format!("failed to list directory: {e}")))?;
    let mut dirs: Vec<std::path::PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn sorted_csv_files(parent: &Path) -> Result<Vec<std::path::PathBuf>> {
    let entries = std::fs::read_dir(parent)
        .map_err(|e| ingest_error(parent, format!("failed to list directory: {e}")))?;
    let mut files: Vec<std::path::PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("csv"))
        .collect();
    files.sort();
    Ok(files)
}
