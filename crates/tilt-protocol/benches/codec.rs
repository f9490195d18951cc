//! Codec benchmarks for tilt-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tilt_protocol::{codec, Aggregate, DeviceOrientation};

fn aggregate_of(size: i64) -> Aggregate {
    (0..size)
        .map(|id| {
            (
                id,
                DeviceOrientation {
                    username: format!("user-{}", id),
                    fb_tilt: 12.5,
                    lr_tilt: -4.25,
                    last_update: (id % 60) as u8,
                },
            )
        })
        .collect()
}

fn bench_decode_update(c: &mut Criterion) {
    let data = br#"{"ID":"42017","username":"alice","beta":12.5,"gamma":-4.25}"#;

    let mut group = c.benchmark_group("decode_update");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("single", |b| {
        b.iter(|| codec::decode_update(black_box(data)))
    });
    group.finish();
}

fn bench_encode_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_aggregate");
    for size in [1, 40, 500] {
        let aggregate = aggregate_of(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("{}_producers", size), |b| {
            b.iter(|| codec::encode_aggregate(black_box(&aggregate)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode_update, bench_encode_aggregate);
criterion_main!(benches);
