//! # Configuration File Parser
//!
//! Reads and parses `askkit.toml`, the optional user configuration file that
//! customizes AskKit's behavior without requiring CLI flags. Supports:
//!
//! - `[database]` — default connection URL
//! - `[llm]` — provider selection, API keys, model names, context limits
//! - `[resolve]` — prompt resolution behavior
//! - `[ingest]` — default CSV data root
//!
//! Example `askkit.toml`:
//!
//! ```toml
//! [database]
//! url = "sqlite://analytics.db"
//!
//! [llm]
//! provider = "ollama"
//! ollama_base_url = "http://localhost:11434"
//! ollama_model = "llama3.2"
//! max_tables = 6
//! max_columns = 15
//!
//! [resolve]
//! fallback_to_heuristic = true
//!
//! [ingest]
//! data_root = "./data"
//! ```
//!
//! API keys can live here too (`openai_api_key`, `anthropic_api_key`), but the
//! CLI prefers the `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` environment variables
//! so keys stay out of committed files.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AskKitError, Result};

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "askkit.toml";

/// Top-level askkit.toml structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AskKitConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// LLM provider settings.
    pub llm: LlmConfig,
    /// Prompt resolution settings.
    pub resolve: ResolveConfig,
    /// CSV ingestion settings.
    pub ingest: IngestConfig,

    /// Absolute path to the directory containing askkit.toml.
    ///
    /// Populated by `read_config()` so that a relative `ingest.data_root`
    /// resolves against the config file's location, not the CWD.
    #[serde(skip)]
    pub config_dir: Option<PathBuf>,
}

/// Database connection configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://analytics.db").
    pub url: Option<String>,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Whether LLM-backed SQL generation is enabled at all.
    pub enabled: bool,
    /// Preferred provider: "ollama", "openai", or "anthropic".
    ///
    /// The preferred provider is tried first; the rest are tried in a fixed
    /// order as fallbacks. Unset means the fixed order alone.
    pub provider: Option<String>,
    /// OpenAI API key. Usually supplied via OPENAI_API_KEY instead.
    pub openai_api_key: Option<String>,
    /// Anthropic API key. Usually supplied via ANTHROPIC_API_KEY instead.
    pub anthropic_api_key: Option<String>,
    /// OpenAI chat model.
    pub openai_model: String,
    /// Anthropic messages model.
    pub anthropic_model: String,
    /// Base URL of the local Ollama server.
    pub ollama_base_url: String,
    /// Ollama model name.
    pub ollama_model: String,
    /// Max tables included in the compact schema context sent to Ollama.
    pub max_tables: usize,
    /// Max columns listed per table in the compact schema context.
    pub max_columns: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: None,
            openai_api_key: None,
            anthropic_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            anthropic_model: "claude-3-5-sonnet-20241022".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
            max_tables: 6,
            max_columns: 15,
        }
    }
}

/// Prompt resolution configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// When an LLM call fails mid-request, fall back to the heuristic query
    /// builder instead of surfacing the error.
    pub fallback_to_heuristic: bool,
}

/// CSV ingestion configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Root directory of the business/category/file.csv tree.
    pub data_root: Option<String>,
}

/// Read and parse an askkit.toml file from the given directory.
///
/// Returns `None` if the file doesn't exist (config is optional).
/// Returns an error if the file exists but can't be parsed.
pub fn read_config(dir: &Path) -> Result<Option<AskKitConfig>> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| AskKitError::Config {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;

    let mut config: AskKitConfig = toml::from_str(&content).map_err(|e| AskKitError::Config {
        message: format!("Failed to parse {}: {}", path.display(), e),
    })?;

    // Capture the absolute path to the config directory so that a relative
    // ingest.data_root resolves against the config's location, not CWD.
    config.config_dir = Some(std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()));

    // Validate semantic constraints that serde can't enforce.
    config.validate()?;

    Ok(Some(config))
}

impl AskKitConfig {
    /// Resolve `ingest.data_root` to a concrete path.
    ///
    /// Relative roots resolve against the config file's directory when known,
    /// the CWD otherwise. Returns `None` when no root is configured.
    pub fn data_root_path(&self) -> Option<PathBuf> {
        let raw = self.ingest.data_root.as_deref()?;
        let path = Path::new(raw);
        if path.is_absolute() {
            return Some(path.to_path_buf());
        }
        match &self.config_dir {
            Some(dir) => Some(dir.join(path)),
            None => Some(path.to_path_buf()),
        }
    }

    /// Validate semantic constraints that serde cannot enforce.
    ///
    /// Call this immediately after parsing. Catches configuration mistakes
    /// (e.g., a malformed Ollama URL) before any provider is contacted.
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = url::Url::parse(&self.llm.ollama_base_url) {
            return Err(AskKitError::Config {
                message: format!(
                    "llm.ollama_base_url '{}' is not a valid URL: {}",
                    self.llm.ollama_base_url, e
                ),
            });
        }
        if self.llm.max_tables == 0 {
            return Err(AskKitError::Config {
                message: "llm.max_tables must be at least 1".to_string(),
            });
        }
        if self.llm.max_columns == 0 {
            return Err(AskKitError::Config {
                message: "llm.max_columns must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
