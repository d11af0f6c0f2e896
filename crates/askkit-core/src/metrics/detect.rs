//! # Metric Detection
//!
//! Decides whether a prompt is a KPI summary question ("what is our total
//! revenue") that can be answered from aggregates, or a data question
//! ("revenue by channel") that needs SQL. Plain substring matching on the
//! lowercased prompt, deliberately conservative: any hint of a breakdown
//! ("by", "per", "trend", ...) sends the prompt to the SQL path.

use std::collections::BTreeSet;

use super::MetricKind;

/// Keywords that mark a prompt as asking about a given metric.
const METRIC_KEYWORDS: [(MetricKind, &[&str]); 5] = [
    (
        MetricKind::Revenue,
        &["revenue", "total revenue", "total sales", "sales"],
    ),
    (MetricKind::Aov, &["aov", "average order value"]),
    (MetricKind::Roas, &["roas", "return on ad spend"]),
    (
        MetricKind::ConversionRate,
        &["conversion rate", "cr", "conversions"],
    ),
    (MetricKind::Sessions, &["sessions", "traffic", "visits"]),
];

/// Terms that signal a breakdown or comparison, which aggregates can't
/// answer. The leading spaces avoid matching inside words ("nearby").
const DISQUALIFIERS: [&str; 13] = [
    " group",
    " grouped",
    " by ",
    " per ",
    " breakdown",
    " each ",
    " vs ",
    " over ",
    " trend",
    " split",
    " segment",
    " cohort",
    " channel",
];

/// Terms that confirm a long prompt still wants a summary number.
const SUMMARY_CUES: [&str; 7] = [
    "total",
    "overall",
    "kpi",
    "overview",
    "dashboard",
    "summary",
    "aggregate",
];

/// Detect which KPI metrics a prompt refers to.
///
/// Returns the empty set when the prompt isn't a summary question, in which
/// case the caller should generate SQL instead. "kpi" or "all metrics"
/// selects every metric at once, but a breakdown term still wins: "kpi by
/// channel" is a SQL question.
pub fn detect_metrics(prompt: &str) -> BTreeSet<MetricKind> {
    let prompt_lower = prompt.to_lowercase();

    let mut detected: BTreeSet<MetricKind> = METRIC_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| prompt_lower.contains(kw)))
        .map(|(metric, _)| *metric)
        .collect();

    if prompt_lower.contains("kpi") || prompt_lower.contains("all metrics") {
        detected = MetricKind::ALL.into_iter().collect();
    }

    if detected.is_empty() {
        return detected;
    }

    if DISQUALIFIERS.iter().any(|term| prompt_lower.contains(term)) {
        return BTreeSet::new();
    }

    let word_count = prompt_lower.split_whitespace().count();
    if !SUMMARY_CUES.iter().any(|cue| prompt_lower.contains(cue)) && word_count > 8 {
        return BTreeSet::new();
    }

    detected
}
