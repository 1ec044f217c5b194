//! Criterion benchmarks for fanout_logger

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fanout_logger::core::{Caller, LogEntry, Sink};
use fanout_logger::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Level Mapper Benchmarks
// ============================================================================

fn bench_level_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_resolution");
    group.throughput(Throughput::Elements(1));

    group.bench_function("known_lowercase", |b| {
        b.iter(|| LogLevel::resolve(black_box("warn")));
    });

    group.bench_function("known_mixed_case", |b| {
        b.iter(|| LogLevel::resolve(black_box("WaRnInG")));
    });

    group.bench_function("unknown", |b| {
        b.iter(|| LogLevel::resolve(black_box("verbose")));
    });

    group.finish();
}

// ============================================================================
// Encoder Benchmarks
// ============================================================================

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");
    group.throughput(Throughput::Elements(1));

    let encoder = JsonEncoder::new(EncoderConfig::default());
    let entry = LogEntry::new(LogLevel::Info, "Order placed".to_string())
        .with_caller(Caller::new("src/handlers/orders.rs", 42));
    let empty = LogContext::new();
    let fields = LogContext::new()
        .with_field("project", "billing")
        .with_field("order_id", 1234i64)
        .with_field("amount", 99.5)
        .with_field("paid", true);

    group.bench_function("no_fields", |b| {
        b.iter(|| encoder.encode(black_box(&entry), &empty));
    });

    group.bench_function("four_fields", |b| {
        b.iter(|| encoder.encode(black_box(&entry), &fields));
    });

    group.finish();
}

// ============================================================================
// Logging Performance Benchmarks
// ============================================================================

fn bench_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("logging");
    group.throughput(Throughput::Elements(1));

    let filtered = Logger::builder()
        .min_level(LogLevel::Error)
        .sink(QueueSink::new(MemoryQueue::new()))
        .build();
    group.bench_function("filtered", |b| {
        b.iter(|| filtered.info(black_box("below threshold")));
    });

    let queue = Arc::new(MemoryQueue::new());
    let to_queue = Logger::builder()
        .sink(QueueSink::new(Arc::clone(&queue)))
        .field("project", "bench")
        .build();
    group.bench_function("memory_queue", |b| {
        b.iter(|| {
            to_queue.info(black_box("queued message"));
            queue.lpop("ELK_LOG")
        });
    });

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let file_sink = RotatingFileSink::new(temp_dir.path().join("bench.log"))
        .expect("Failed to open log file");
    let to_file = Logger::builder().sink(file_sink).build();
    group.bench_function("rotating_file", |b| {
        b.iter(|| to_file.info(black_box("file message")));
    });

    group.finish();
}

// ============================================================================
// Fan-out Benchmarks
// ============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    let payload = b"{\"level\":\"info\",\"msg\":\"fan-out\"}\n";

    for width in [1usize, 3, 8] {
        let queue = Arc::new(MemoryQueue::new());
        let mut sinks = MultiSink::new();
        for i in 0..width {
            sinks = sinks.with_sink(QueueSink::with_key(Arc::clone(&queue), format!("K{}", i)));
        }

        group.throughput(Throughput::Elements(width as u64));
        group.bench_function(format!("{}_sinks", width), |b| {
            b.iter(|| {
                let written = sinks.write(black_box(payload));
                for i in 0..width {
                    queue.lpop(&format!("K{}", i));
                }
                written
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_level_resolution,
    bench_encoding,
    bench_logging,
    bench_fan_out
);
criterion_main!(benches);
