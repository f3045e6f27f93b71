//! Benchmark suite for redgreen hot paths.
//!
//! This module provides performance benchmarks for:
//! - Code extraction (cleaning model responses)
//! - Task analysis (instruction to success criteria)
//! - Verification (pattern checks over before/after snapshots)
//! - Framework detection (against the in-memory host)
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Save baseline for comparison
//! cargo bench -- --save-baseline main
//!
//! # Compare against baseline
//! cargo bench -- --baseline main
//! ```
//!
//! Criterion writes JSON estimates and HTML reports under `target/criterion/`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use redgreen::host::FileCache;
use redgreen::testing::MockHost;
use redgreen::verification::{content_hash, FileSnapshot, VerificationOptions};
use redgreen::{
    detect_test_framework, strip_code_block, TaskAnalyzer, VerificationContext,
    VerificationEngine,
};
use std::path::Path;
use std::time::Duration;

/// A callback-heavy JavaScript module with `functions` handlers.
fn legacy_module(functions: usize) -> String {
    (0..functions)
        .map(|i| {
            format!(
                "var handler{i} = function(req, callback) {{\n  \
                 fs.readFile(req.path, function(err, data) {{\n    \
                 if (err) {{ console.log(err); return callback(err); }}\n    \
                 callback(null, data);\n  }});\n}};\n\n"
            )
        })
        .collect()
}

/// The same module after a modernizing edit.
fn modern_module(functions: usize) -> String {
    (0..functions)
        .map(|i| {
            format!(
                "const handler{i} = async (req) => {{\n  \
                 try {{\n    return await fs.promises.readFile(req.path);\n  }} \
                 catch (err) {{\n    throw err;\n  }}\n}};\n\n"
            )
        })
        .collect()
}

// ============================================================================
// Code Extraction Benchmarks
// ============================================================================

/// Benchmark cleaning of typical model responses.
fn bench_strip_code_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("strip_code_block");

    let fenced = format!(
        "Here is the implementation:\n\n```typescript\n{}\n```\n\nThis passes the test.",
        modern_module(20)
    );
    let prose = format!(
        "Sure! The function below adds two numbers.\n\npub fn add(a: i32, b: i32) -> i32 {{\n    a + b\n}}\n{}",
        "// padding\n".repeat(200)
    );
    let glued = "rustfnmain() {\n    letx = 1;\n}".to_string();

    for (name, input) in [("fenced", &fenced), ("prose", &prose), ("glued", &glued)] {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("response", name), input, |b, input| {
            b.iter(|| black_box(strip_code_block(black_box(input))));
        });
    }

    group.finish();
}

// ============================================================================
// Analysis Benchmarks
// ============================================================================

/// Benchmark instruction analysis with and without file content to scan.
fn bench_task_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_analysis");
    let analyzer = TaskAnalyzer::new();
    let instruction = "Convert the nested callbacks to async/await and replace var with const";

    group.bench_function("instruction_only", |b| {
        b.iter(|| black_box(analyzer.analyze(black_box(instruction), None)));
    });

    for functions in [10, 100] {
        let content = legacy_module(functions);
        group.throughput(Throughput::Bytes(content.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("with_file", functions),
            &content,
            |b, content| {
                b.iter(|| black_box(analyzer.analyze(black_box(instruction), Some(content))));
            },
        );
    }

    group.finish();
}

// ============================================================================
// Verification Benchmarks
// ============================================================================

/// Benchmark a full verification pass without external collaborators.
fn bench_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("verification");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = VerificationEngine::new(VerificationOptions {
        use_llm: false,
        ..VerificationOptions::default()
    });
    let instruction = "Convert the nested callbacks to async/await and replace var with const";

    for functions in [10, 100] {
        let before = legacy_module(functions);
        let after = modern_module(functions);
        let criteria = TaskAnalyzer::new().analyze(instruction, Some(&before));
        let mut context = VerificationContext::new(instruction, criteria);
        context.add_snapshot(FileSnapshot::capture("handlers.js", before).complete(after));

        group.throughput(Throughput::Elements(functions as u64));
        group.bench_with_input(
            BenchmarkId::new("verify", functions),
            &context,
            |b, context| {
                b.iter(|| {
                    rt.block_on(async {
                        black_box(engine.verify(black_box(context), None, None).await)
                    })
                });
            },
        );
    }

    let large = legacy_module(500);
    group.throughput(Throughput::Bytes(large.len() as u64));
    group.bench_function("content_hash", |b| {
        b.iter(|| black_box(content_hash(black_box(&large))));
    });

    group.finish();
}

// ============================================================================
// Framework Detection Benchmarks
// ============================================================================

/// Benchmark framework detection with a cold and a warm file cache.
fn bench_framework_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("framework_detection");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let root = Path::new("/proj");

    let host = MockHost::new().with_file(
        "/proj/package.json",
        r#"{"name": "app", "devDependencies": {"vitest": "^1.0.0"}, "scripts": {"test": "vitest"}}"#,
    );

    group.bench_function("cold_cache", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut cache = FileCache::new(Duration::from_secs(5));
                black_box(detect_test_framework(&host, root, &mut cache, None).await)
            })
        });
    });

    let mut warm = FileCache::new(Duration::from_secs(3600));
    group.bench_function("warm_cache", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(detect_test_framework(&host, root, &mut warm, None).await)
            })
        });
    });

    let empty = MockHost::new();
    group.bench_function("request_hint", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut cache = FileCache::new(Duration::from_secs(5));
                black_box(
                    detect_test_framework(
                        &empty,
                        root,
                        &mut cache,
                        Some(black_box("write a python slugify helper")),
                    )
                    .await,
                )
            })
        });
    });

    group.finish();
}

criterion_group!(extraction_benches, bench_strip_code_block);

criterion_group!(analysis_benches, bench_task_analysis);

criterion_group!(
    verification_benches,
    bench_verification,
    bench_framework_detection
);

criterion_main!(extraction_benches, analysis_benches, verification_benches);
