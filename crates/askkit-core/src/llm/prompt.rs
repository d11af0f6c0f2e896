//! # Prompt Construction
//!
//! Builds the schema context and message text sent to each provider. Two
//! context shapes exist: the full per-table listing for hosted models, and
//! a compact one-line-per-table listing for Ollama, preceded by relevance
//! filtering so small models see only the tables that matter.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use crate::registry::DatasetRecord;

/// System prompt for OpenAI chat completions.
pub const OPENAI_SYSTEM_PROMPT: &str = "You are a SQL expert specializing in eCommerce analytics. \nGenerate SQLite-compatible SQL queries from natural language questions.\n\nRules:\n- Only use tables and columns that exist in the schema\n- Use SQLite syntax (no CTEs if not needed, use subqueries)\n- Always include LIMIT clauses for large result sets\n- Never use DROP, DELETE, INSERT, UPDATE, or ALTER statements\n- Use proper quoting for table/column names with special characters\n- Return ONLY the SQL query, no explanations unless asked\n- For aggregations, use appropriate GROUP BY clauses\n- Handle date filtering with proper date functions";

/// System prompt for the Anthropic Messages API.
pub const CLAUDE_SYSTEM_PROMPT: &str = "You are a SQL expert specializing in eCommerce analytics. \nGenerate SQLite-compatible SQL queries from natural language questions.\nReturn only the SQL query, no explanations.";

/// Score tables by keyword overlap with the prompt and keep the top
/// `max_tables`, preserving registry order among ties.
///
/// Words of four or more characters score 2 when they appear in the table
/// name, business, category, or dataset name, and 1 when they appear in a
/// column name. Zero-scoring tables still rank, so a vague prompt gets the
/// first `max_tables` datasets rather than nothing.
pub fn filter_relevant_tables<'a>(
    prompt: &str,
    datasets: &'a [DatasetRecord],
    max_tables: usize,
) -> Vec<&'a DatasetRecord> {
    let prompt_lower = prompt.to_lowercase();
    let prompt_words: HashSet<&str> = prompt_lower.split_whitespace().collect();

    let mut scored: Vec<(u32, &DatasetRecord)> = datasets
        .iter()
        .map(|dataset| {
            let table_name = dataset.table_name.to_lowercase();
            let business = dataset.business.to_lowercase();
            let category = dataset.category.to_lowercase();
            let dataset_name = dataset.dataset_name.to_lowercase();

            let mut score = 0u32;
            for word in &prompt_words {
                if word.chars().count() > 3 {
                    if table_name.contains(word)
                        || business.contains(word)
                        || category.contains(word)
                        || dataset_name.contains(word)
                    {
                        score += 2;
                    } else if dataset
                        .columns
                        .iter()
                        .any(|col| col.to_lowercase().contains(word))
                    {
                        score += 1;
                    }
                }
            }
            (score, dataset)
        })
        .collect();

    // Stable sort keeps registry order among equal scores.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(max_tables)
        .map(|(_, dataset)| dataset)
        .collect()
}

/// Full schema context for hosted models.
///
/// One block per table with business, category, and the complete column
/// list. Sample rows come from the first table, so they annotate only the
/// first block.
pub fn format_tables_context(
    datasets: &[DatasetRecord],
    sample_rows: &[IndexMap<String, Value>],
) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (i, dataset) in datasets.iter().enumerate() {
        parts.push(format!("Table: {}", dataset.table_name));
        parts.push(format!(
            "  Business: {}, Category: {}",
            dataset.business, dataset.category
        ));
        parts.push(format!("  Columns: {}", dataset.columns.join(", ")));

        if i == 0 && !sample_rows.is_empty() {
            let preview = &sample_rows[..sample_rows.len().min(2)];
            let encoded = serde_json::to_string(preview).unwrap_or_else(|_| "[]".to_string());
            parts.push(format!("  Sample data: {}", encoded));
        }
    }
    parts.join("\n")
}

/// Compact schema context for Ollama: one line per table.
///
/// Long column lists are cut at `max_columns` with a `... (N total)`
/// marker.
pub fn format_tables_context_compact(datasets: &[&DatasetRecord], max_columns: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    for dataset in datasets {
        let shown: Vec<String> = dataset
            .columns
            .iter()
            .take(max_columns)
            .map(|col| format!("\"{}\"", col))
            .collect();
        let mut cols_str = shown.join(", ");
        if dataset.columns.len() > max_columns {
            cols_str.push_str(&format!(" ... ({} total)", dataset.columns.len()));
        }
        lines.push(format!("\"{}\": {}", dataset.table_name, cols_str));
    }
    lines.join("\n")
}

/// User message for OpenAI.
pub fn openai_user_message(prompt: &str, tables_context: &str) -> String {
    format!(
        "Available datasets:\n{tables_context}\n\nUser question: {prompt}\n\nGenerate a SQL query to answer this question. Return only the SQL, no markdown formatting."
    )
}

/// User message for Anthropic.
pub fn claude_user_message(prompt: &str, tables_context: &str) -> String {
    format!(
        "Available datasets:\n{tables_context}\n\nUser question: {prompt}\n\nGenerate a SQL query to answer this question."
    )
}

/// Single combined prompt for Ollama, rules inlined.
pub fn ollama_prompt(prompt: &str, tables_context: &str) -> String {
    format!(
        "SQLite query. Rules: Use ONLY columns/tables listed. SQLite syntax with \"quotes\". LIMIT 50. No DROP/DELETE/INSERT/UPDATE.\n\nTABLES:\n{tables_context}\n\nQ: {prompt}\nSQL:"
    )
}
