//! # Response Cleanup
//!
//! Models return SQL wrapped in markdown fences, language tags, and stray
//! whitespace despite every instruction not to. [`clean_sql`] normalizes the
//! response to the bare statement before the safety guard sees it.

/// Strip markdown fences and surrounding whitespace from a model response.
pub fn clean_sql(raw: &str) -> String {
    let mut sql = raw.trim();
    if let Some(rest) = sql.strip_prefix("```sql") {
        sql = rest;
    } else if let Some(rest) = sql.strip_prefix("```") {
        sql = rest;
    }
    sql = sql.trim();
    if let Some(rest) = sql.strip_suffix("```") {
        sql = rest;
    }
    sql.trim().to_string()
}
