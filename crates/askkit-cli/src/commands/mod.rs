use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use askkit_core::config::{AskKitConfig, LlmConfig};

pub mod ask;
pub mod datasets;
pub mod ingest;
pub mod kpi;

/// Load the optional askkit.toml from the current directory.
pub(crate) fn load_config() -> Result<AskKitConfig> {
    Ok(askkit_core::config::read_config(Path::new("."))?.unwrap_or_default())
}

/// Resolve database URL from args, env, .env file, or askkit.toml.
pub(crate) fn resolve_db_url(explicit: Option<&str>, config: &AskKitConfig) -> Result<String> {
    if let Some(url) = explicit {
        return Ok(url.to_string());
    }

    // Try environment variable
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return Ok(url);
    }

    // Try .env file
    if dotenvy::dotenv().is_ok() {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return Ok(url);
        }
    }

    // Try askkit.toml
    if let Some(ref url) = config.database.url {
        return Ok(url.clone());
    }

    Err(askkit_core::error::AskKitError::NoDatabaseUrl.into())
}

/// Open a SQLite pool for the given URL.
///
/// `create_if_missing` is set only by `ingest`, which may be creating the
/// database file on first run.
pub(crate) async fn connect(db_url: &str, create_if_missing: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("Invalid SQLite URL: {}", db_url))?
        .create_if_missing(create_if_missing);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| askkit_core::error::AskKitError::Connection {
            message: "Failed to open the analytics database".to_string(),
            connection_hint: db_url.to_string(),
            source: e,
        })?;
    Ok(pool)
}

/// Fill API keys from the environment when askkit.toml leaves them unset.
pub(crate) fn apply_env_keys(llm: &mut LlmConfig) {
    if llm.openai_api_key.is_none() {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            llm.openai_api_key = Some(key);
        }
    }
    if llm.anthropic_api_key.is_none() {
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            llm.anthropic_api_key = Some(key);
        }
    }
}
