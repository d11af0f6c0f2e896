//! # Heuristic Table Selection
//!
//! The no-LLM path: pick the dataset whose name is closest to the prompt
//! and preview it. Each dataset offers three name candidates (table name,
//! dataset name, "business dataset"); the candidate closest to the prompt
//! by normalized Levenshtein similarity is scored by word overlap, and the
//! best-scoring dataset wins. Ties keep registry order, so selection is
//! deterministic.

use std::collections::HashSet;

use crate::registry::DatasetRecord;

/// Row cap applied to every heuristic preview query.
const ROW_LIMIT: u32 = 50;

/// Column name fragments that mark a sensible ORDER BY column.
const DATE_TOKENS: [&str; 5] = ["date", "day", "occurred_at", "week", "time"];

fn normalize(text: &str) -> String {
    text.to_lowercase().replace('_', " ")
}

/// Pick the dataset that best matches the prompt.
///
/// Returns `None` only for an empty registry. An empty or unrelated prompt
/// scores every dataset equally and yields the first one.
pub fn select_dataset<'a>(
    prompt: &str,
    datasets: &'a [DatasetRecord],
) -> Option<&'a DatasetRecord> {
    let prompt_norm = normalize(prompt);
    let prompt_words: Vec<&str> = prompt_norm.split_whitespace().collect();
    let prompt_word_set: HashSet<&str> = prompt_words.iter().copied().collect();

    let mut best: Option<(f64, &DatasetRecord)> = None;
    for dataset in datasets {
        let candidates = [
            normalize(&dataset.table_name),
            normalize(&dataset.dataset_name),
            normalize(&format!("{} {}", dataset.business, dataset.dataset_name)),
        ];

        // Closest candidate to the prompt, first wins on equal similarity.
        let mut closest: &str = &candidates[0];
        let mut closest_similarity = f64::MIN;
        for candidate in &candidates {
            let similarity = strsim::normalized_levenshtein(&prompt_norm, candidate);
            if similarity > closest_similarity {
                closest_similarity = similarity;
                closest = candidate;
            }
        }

        // Score: distinct candidate words that appear in the prompt,
        // relative to prompt length.
        let candidate_words: HashSet<&str> = closest.split_whitespace().collect();
        let shared = candidate_words
            .iter()
            .filter(|word| prompt_word_set.contains(*word))
            .count();
        let score = shared as f64 / prompt_words.len().max(1) as f64;

        match best {
            Some((best_score, _)) if score <= best_score => {}
            _ => best = Some((score, dataset)),
        }
    }

    best.map(|(_, dataset)| dataset)
}

/// Build the preview query for a selected dataset.
///
/// Orders by the first date-looking column when one exists.
pub fn fallback_query(dataset: &DatasetRecord) -> String {
    let order_column = dataset
        .columns
        .iter()
        .find(|col| DATE_TOKENS.iter().any(|token| col.contains(token)));
    let order_clause = match order_column {
        Some(col) => format!(" ORDER BY \"{}\" DESC", col),
        None => String::new(),
    };
    format!(
        "SELECT * FROM \"{}\"{} LIMIT {};",
        dataset.table_name, order_clause, ROW_LIMIT
    )
}
