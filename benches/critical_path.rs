//! Critical path extraction benchmarks
//!
//! Measures tree construction from flat records and both extraction policies
//! on wide (fan-out) and deep (async chain) traces.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use servitrace::config::CriticalPathConfig;
use servitrace::connectivity::ConnectivityEvidence;
use servitrace::critical_path::CriticalPathExtractor;
use servitrace::span_record::SpanRecord;
use servitrace::span_tree::SpanTree;

/// Balanced binary tree of sequential calls
fn fan_out_trace(spans: usize) -> Vec<SpanRecord> {
    (0..spans)
        .map(|i| {
            let parent = if i == 0 {
                None
            } else {
                Some(format!("span_{}", (i - 1) / 2))
            };
            SpanRecord {
                span_id: format!("span_{}", i),
                parent_span_id: parent,
                name: format!("call_{}", i),
                start_time: i as u64 * 10,
                end_time: i as u64 * 10 + 5,
            }
        })
        .collect()
}

/// Chain where every call is an async invocation of its caller
fn async_chain_trace(spans: usize) -> Vec<SpanRecord> {
    (0..spans)
        .map(|i| {
            let parent = if i == 0 {
                None
            } else {
                Some(format!("span_{}", i - 1))
            };
            SpanRecord {
                span_id: format!("span_{}", i),
                parent_span_id: parent,
                name: format!("async_{}", i),
                start_time: i as u64 * 100,
                end_time: i as u64 * 100 + 150,
            }
        })
        .collect()
}

fn bench_tree_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_construction");

    for size in [100, 1_000, 10_000] {
        let records = fan_out_trace(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| SpanTree::from_records(black_box(records)).unwrap());
        });
    }

    group.finish();
}

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    let async_aware = CriticalPathExtractor::new(CriticalPathConfig::default()).unwrap();
    let baseline = CriticalPathExtractor::sync_baseline(CriticalPathConfig::default()).unwrap();

    for (label, records) in [
        ("fan_out_1k", fan_out_trace(1_000)),
        ("async_chain_1k", async_chain_trace(1_000)),
    ] {
        let tree = SpanTree::from_records(&records).unwrap();
        let evidence = ConnectivityEvidence::from_latest_end(&tree);

        group.bench_function(BenchmarkId::new("async", label), |b| {
            b.iter(|| async_aware.extract_trace(black_box(&tree), &evidence).unwrap());
        });
        group.bench_function(BenchmarkId::new("sync", label), |b| {
            b.iter(|| baseline.extract_trace(black_box(&tree), &evidence).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tree_construction, bench_extraction);
criterion_main!(benches);
