//! Latency benchmarks for the hub.
//!
//! Measures the time from a producer update to the aggregate being
//! published to a consumer.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Instant;
use tilt_core::{ConsumerHandle, Hub, HubConfig, ManualClock, SecondOfMinute};
use tilt_protocol::ProducerUpdate;

/// Benchmark ingest followed by receive.
fn bench_ingest_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_latency");

    group.bench_function("single_consumer", |b| {
        b.iter_custom(|iters| {
            let hub = Hub::new();
            let (handle, mut rx) = ConsumerHandle::channel();
            hub.attach_consumer(handle);
            let _ = rx.try_recv();

            let start = Instant::now();
            for i in 0..iters {
                hub.ingest(ProducerUpdate::new("1", "bench", i as f64, 0.0));
                let _ = rx.try_recv();
            }
            start.elapsed()
        });
    });

    group.bench_function("ten_consumers", |b| {
        b.iter_custom(|iters| {
            let hub = Hub::new();
            let mut rxs: Vec<_> = (0..10)
                .map(|_| {
                    let (handle, rx) = ConsumerHandle::channel();
                    hub.consumers().add(handle);
                    rx
                })
                .collect();

            let start = Instant::now();
            for i in 0..iters {
                hub.ingest(ProducerUpdate::new("1", "bench", i as f64, 0.0));
                for rx in &mut rxs {
                    let _ = rx.try_recv();
                }
            }
            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmark an eviction scan that removes nothing.
fn bench_eviction_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction_scan");

    // Frozen clock keeps every producer fresh for the whole run.
    let clock = Arc::new(ManualClock::new(SecondOfMinute::from_unix_secs(0)));
    let hub = Hub::with_clock(HubConfig::default(), clock);
    for i in 0..1000 {
        hub.ingest(ProducerUpdate::new(i.to_string(), "bench", 0.0, 0.0));
    }

    group.bench_function("1000_fresh_producers", |b| {
        b.iter(|| black_box(hub.evict_stale()))
    });

    group.finish();
}

criterion_group!(benches, bench_ingest_latency, bench_eviction_scan);
criterion_main!(benches);
