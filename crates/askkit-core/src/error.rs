//! # Error Types
//!
//! Defines `AskKitError`, the unified error enum for every failure mode in
//! the AskKit pipeline. Every variant includes enough context (provider name,
//! table name, offending keyword, SQL snippet) to debug immediately without
//! digging through logs.

use thiserror::Error;

/// All errors that can occur in AskKit operations.
#[derive(Error, Debug)]
pub enum AskKitError {
    #[error("Database connection failed: {message}\n  Connection string: {connection_hint}\n  Cause: {source}")]
    Connection {
        message: String,
        connection_hint: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("No database URL provided. AskKit looks for a connection in this order:\n  1. --db flag\n  2. DATABASE_URL environment variable\n  3. .env file with DATABASE_URL\n  4. askkit.toml [database] section\n\nExample: askkit ask --db sqlite://analytics.db \"total revenue this month\"")]
    NoDatabaseUrl,

    #[error("Dataset registry unavailable: {message}")]
    RegistryUnavailable { message: String },

    #[error("No datasets have been ingested yet.\n  Run `askkit ingest --data-root <dir>` to load CSV files first")]
    NoDataIngested,

    #[error("Ingestion failed for {path}: {message}")]
    Ingest { path: String, message: String },

    #[error("SQL generation failed via {provider}: {message}")]
    SqlGeneration { provider: String, message: String },

    #[error("Generated SQL contains unsafe operations (found \"{keyword}\")\n  SQL: {sql_preview}")]
    UnsafeSql { keyword: String, sql_preview: String },

    #[error("SQL execution failed: {message}")]
    SqlExecution { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AskKitError>;
