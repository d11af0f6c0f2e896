//! Benchmarks for the hot prompt-path pieces — metric detection, heuristic
//! table selection, and LLM context filtering.
//!
//! Each runs once per prompt, but selection and filtering scan the whole
//! registry, so they are worth watching as registries grow.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use askkit_core::llm::prompt::filter_relevant_tables;
use askkit_core::metrics::detect_metrics;
use askkit_core::registry::DatasetRecord;
use askkit_core::resolve::select::select_dataset;

/// Build a registry with N datasets spread across a handful of businesses.
fn build_registry(count: usize) -> Vec<DatasetRecord> {
    let businesses = ["acme", "zeta", "northwind", "globex", "initech"];
    let categories = ["campaigns", "ads", "email", "social", "web"];
    let dataset_names = [
        "summer sale",
        "holiday push",
        "brand awareness",
        "q1 report",
        "retargeting",
    ];
    let columns = ["date", "channel", "spend", "revenue", "orders", "sessions"];

    (0..count)
        .map(|i| {
            let business = businesses[i % businesses.len()];
            let category = categories[(i / businesses.len()) % categories.len()];
            let dataset_name = dataset_names[i % dataset_names.len()];
            DatasetRecord {
                table_name: format!("{}_{}_{}", business, category, i),
                business: business.to_string(),
                category: category.to_string(),
                dataset_name: dataset_name.to_string(),
                source_file: format!("/data/{}/{}/{}.csv", business, category, dataset_name),
                row_count: 1000,
                columns: columns.iter().map(|c| c.to_string()).collect(),
                ingested_at: "2024-06-01T00:00:00+00:00".to_string(),
            }
        })
        .collect()
}

fn bench_detect_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve/detect");

    let cases = vec![
        ("kpi_shortcut", "show me the kpi dashboard"),
        ("single_metric", "what is our total revenue"),
        ("breakdown", "revenue by channel last month"),
        (
            "long_prompt",
            "can you walk me through everything that happened with the spring launch across every market we operate in",
        ),
        ("no_metric", "list the campaigns we ran in march"),
    ];

    for (label, prompt) in &cases {
        group.bench_with_input(BenchmarkId::new("prompt", label), prompt, |b, prompt| {
            b.iter(|| {
                detect_metrics(prompt);
            });
        });
    }
    group.finish();
}

fn bench_select_dataset(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve/select");

    for count in [10, 50, 200] {
        let registry = build_registry(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("datasets", count),
            &registry,
            |b, registry| {
                b.iter(|| {
                    select_dataset("show me the acme summer sale numbers", registry);
                });
            },
        );
    }
    group.finish();
}

fn bench_filter_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve/filter");

    for count in [10, 50, 200] {
        let registry = build_registry(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("datasets", count),
            &registry,
            |b, registry| {
                b.iter(|| {
                    filter_relevant_tables("revenue for the acme summer sale", registry, 6);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_detect_metrics,
    bench_select_dataset,
    bench_filter_tables
);
criterion_main!(benches);
