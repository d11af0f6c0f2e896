//! # SQL Generation Gateway
//!
//! Turns a natural-language prompt plus the dataset registry into a single
//! SQLite query via one of three providers: a local Ollama server, OpenAI,
//! or Anthropic. [`client`] owns provider binding and the HTTP calls,
//! [`prompt`] builds the schema context and messages, and [`parse`] strips
//! markdown fences from whatever the model returns.
//!
//! Hosted providers get the full schema context (business, category, all
//! columns, sample rows). Ollama gets a filtered compact context because
//! small local models lose accuracy on long prompts.

pub mod client;
pub mod parse;
pub mod prompt;

pub use client::LlmProvider;

/// SQL produced by a provider, with attribution for the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSql {
    pub sql: String,
    pub provider: String,
    pub model: String,
}
