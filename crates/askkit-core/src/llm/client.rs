//! # LLM API Client
//!
//! Binds the configured provider and sends SQL generation requests to it.
//! Binding is eager and offline: the first provider in the preference order
//! whose requirements are met (an API key for hosted providers; nothing for
//! Ollama) is constructed, without pinging anyone. Whether the provider
//! actually responds is discovered on the first request.

use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;

use super::{parse, prompt, GeneratedSql};
use crate::config::LlmConfig;
use crate::error::{AskKitError, Result};
use crate::registry::DatasetRecord;

/// Fallback order tried after the configured preference.
const DEFAULT_PROVIDER_ORDER: [&str; 3] = ["ollama", "openai", "anthropic"];

/// Maximum time to wait for a hosted API response before aborting.
const API_TIMEOUT: Duration = Duration::from_secs(45);

/// Ollama gets longer: local models on modest hardware are slow.
const OLLAMA_TIMEOUT: Duration = Duration::from_secs(60);

/// A bound SQL generation provider.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Ollama {
        base_url: String,
        model: String,
        max_tables: usize,
        max_columns: usize,
    },
    OpenAI {
        api_key: String,
        model: String,
    },
    Claude {
        api_key: String,
        model: String,
    },
}

impl LlmProvider {
    /// Bind the first constructible provider from the config.
    ///
    /// The configured `llm.provider` is tried first, then "ollama",
    /// "openai", "anthropic" in that order. Hosted providers require a
    /// non-empty API key; Ollama always constructs. Returns `None` only
    /// when `llm.enabled` is false (Ollama closes every chain otherwise).
    pub fn bind(config: &LlmConfig) -> Option<Self> {
        if !config.enabled {
            tracing::debug!("LLM SQL generation disabled in config");
            return None;
        }

        for name in provider_order(config.provider.as_deref()) {
            match name {
                "ollama" => {
                    return Some(LlmProvider::Ollama {
                        base_url: config.ollama_base_url.trim_end_matches('/').to_string(),
                        model: config.ollama_model.clone(),
                        max_tables: config.max_tables,
                        max_columns: config.max_columns,
                    });
                }
                "openai" => {
                    if let Some(api_key) = present(&config.openai_api_key) {
                        return Some(LlmProvider::OpenAI {
                            api_key,
                            model: config.openai_model.clone(),
                        });
                    }
                }
                "anthropic" => {
                    if let Some(api_key) = present(&config.anthropic_api_key) {
                        return Some(LlmProvider::Claude {
                            api_key,
                            model: config.anthropic_model.clone(),
                        });
                    }
                }
                other => {
                    tracing::warn!("Unknown llm.provider '{}' in config, skipping", other);
                }
            }
        }
        None
    }

    /// Wire name of the provider ("ollama", "openai", "anthropic").
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Ollama { .. } => "ollama",
            LlmProvider::OpenAI { .. } => "openai",
            LlmProvider::Claude { .. } => "anthropic",
        }
    }

    /// Model the provider will request.
    pub fn model(&self) -> &str {
        match self {
            LlmProvider::Ollama { model, .. } => model,
            LlmProvider::OpenAI { model, .. } => model,
            LlmProvider::Claude { model, .. } => model,
        }
    }

    /// Generate one SQL statement for the prompt against the registry.
    ///
    /// Hosted providers see the full schema context with sample rows from
    /// the first table; Ollama sees a relevance-filtered compact context.
    /// The response is fence-stripped but not otherwise validated; the
    /// safety guard runs downstream.
    pub async fn generate_sql(
        &self,
        user_prompt: &str,
        datasets: &[DatasetRecord],
        sample_rows: &[IndexMap<String, Value>],
    ) -> Result<GeneratedSql> {
        tracing::debug!("Requesting SQL from {} ({})", self.name(), self.model());

        let raw = match self {
            LlmProvider::Ollama {
                base_url,
                model,
                max_tables,
                max_columns,
            } => {
                let relevant = prompt::filter_relevant_tables(user_prompt, datasets, *max_tables);
                let context = prompt::format_tables_context_compact(&relevant, *max_columns);
                let message = prompt::ollama_prompt(user_prompt, &context);
                call_ollama(base_url, model, &message).await?
            }
            LlmProvider::OpenAI { api_key, model } => {
                let context = prompt::format_tables_context(datasets, sample_rows);
                let message = prompt::openai_user_message(user_prompt, &context);
                call_openai(api_key, model, &message).await?
            }
            LlmProvider::Claude { api_key, model } => {
                let context = prompt::format_tables_context(datasets, sample_rows);
                let message = prompt::claude_user_message(user_prompt, &context);
                call_claude(api_key, model, &message).await?
            }
        };

        let sql = parse::clean_sql(&raw);
        tracing::debug!("{} returned SQL: {}", self.name(), truncate(&sql, 200));

        Ok(GeneratedSql {
            sql,
            provider: self.name().to_string(),
            model: self.model().to_string(),
        })
    }
}

fn provider_order(preferred: Option<&str>) -> Vec<&str> {
    let mut order = Vec::with_capacity(4);
    if let Some(name) = preferred {
        order.push(name);
    }
    for name in DEFAULT_PROVIDER_ORDER {
        if Some(name) != preferred {
            order.push(name);
        }
    }
    order
}

fn present(key: &Option<String>) -> Option<String> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

/// Build an HTTP client with a strict timeout so requests never hang
/// indefinitely on flaky networks or partial API outages.
fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Call a local Ollama server's chat endpoint.
async fn call_ollama(base_url: &str, model: &str, message: &str) -> Result<String> {
    let client = build_http_client(OLLAMA_TIMEOUT);

    let body = serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": message
            }
        ],
        "stream": false,
        "options": {
            "temperature": 0.1,
            "num_predict": 500
        }
    });

    let response = client
        .post(format!("{}/api/chat", base_url))
        .header("content-type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| AskKitError::SqlGeneration {
            provider: "ollama".to_string(),
            message: format!("Failed to call Ollama at {}: {}", base_url, e),
        })?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .map_err(|e| AskKitError::SqlGeneration {
            provider: "ollama".to_string(),
            message: format!("Failed to read Ollama response: {}", e),
        })?;

    if !status.is_success() {
        return Err(AskKitError::SqlGeneration {
            provider: "ollama".to_string(),
            message: format!("Ollama returned {}: {}", status, truncate(&response_text, 500)),
        });
    }

    let parsed: serde_json::Value =
        serde_json::from_str(&response_text).map_err(|e| AskKitError::SqlGeneration {
            provider: "ollama".to_string(),
            message: format!("Failed to parse Ollama response JSON: {}", e),
        })?;

    let text = parsed["message"]["content"]
        .as_str()
        .ok_or_else(|| AskKitError::SqlGeneration {
            provider: "ollama".to_string(),
            message: "Ollama response missing message.content".to_string(),
        })?;

    Ok(text.to_string())
}

/// Call the OpenAI Chat Completions API.
async fn call_openai(api_key: &str, model: &str, message: &str) -> Result<String> {
    let client = build_http_client(API_TIMEOUT);

    let body = serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "system",
                "content": prompt::OPENAI_SYSTEM_PROMPT
            },
            {
                "role": "user",
                "content": message
            }
        ],
        "temperature": 0.1,
        "max_tokens": 500
    });

    let response = client
        .post("https://api.openai.com/v1/chat/completions")
        .header("Authorization", format!("Bearer {}", api_key))
        .header("content-type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| AskKitError::SqlGeneration {
            provider: "openai".to_string(),
            message: format!("Failed to call OpenAI API: {}", e),
        })?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .map_err(|e| AskKitError::SqlGeneration {
            provider: "openai".to_string(),
            message: format!("Failed to read OpenAI API response: {}", e),
        })?;

    if !status.is_success() {
        return Err(AskKitError::SqlGeneration {
            provider: "openai".to_string(),
            message: format!(
                "OpenAI API returned {}: {}",
                status,
                truncate(&response_text, 500),
            ),
        });
    }

    let parsed: serde_json::Value =
        serde_json::from_str(&response_text).map_err(|e| AskKitError::SqlGeneration {
            provider: "openai".to_string(),
            message: format!("Failed to parse OpenAI API response JSON: {}", e),
        })?;

    let text = parsed["choices"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|choice| choice["message"]["content"].as_str())
        .ok_or_else(|| AskKitError::SqlGeneration {
            provider: "openai".to_string(),
            message: "OpenAI API response missing choices[0].message.content".to_string(),
        })?;

    Ok(text.to_string())
}

/// Call the Anthropic Messages API.
async fn call_claude(api_key: &str, model: &str, message: &str) -> Result<String> {
    let client = build_http_client(API_TIMEOUT);

    let body = serde_json::json!({
        "model": model,
        "max_tokens": 500,
        "system": prompt::CLAUDE_SYSTEM_PROMPT,
        "messages": [
            {
                "role": "user",
                "content": message
            }
        ]
    });

    let response = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .header("content-type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| AskKitError::SqlGeneration {
            provider: "anthropic".to_string(),
            message: format!("Failed to call Claude API: {}", e),
        })?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .map_err(|e| AskKitError::SqlGeneration {
            provider: "anthropic".to_string(),
            message: format!("Failed to read Claude API response: {}", e),
        })?;

    if !status.is_success() {
        return Err(AskKitError::SqlGeneration {
            provider: "anthropic".to_string(),
            message: format!(
                "Claude API returned {}: {}",
                status,
                truncate(&response_text, 500),
            ),
        });
    }

    let parsed: serde_json::Value =
        serde_json::from_str(&response_text).map_err(|e| AskKitError::SqlGeneration {
            provider: "anthropic".to_string(),
            message: format!("Failed to parse Claude API response JSON: {}", e),
        })?;

    let text = parsed["content"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|block| block["text"].as_str())
        .ok_or_else(|| AskKitError::SqlGeneration {
            provider: "anthropic".to_string(),
            message: "Claude API response missing content[0].text".to_string(),
        })?;

    Ok(text.to_string())
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
