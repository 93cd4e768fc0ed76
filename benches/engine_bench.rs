//! SILT - Performance Benchmarks
//! Measures throughput of the coordination primitives and the full
//! write path using Criterion.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use silt::config::Config;
use silt::engine::segment::Segment;
use silt::engine::watermark::Watermark;
use silt::engine::Silt;

fn bench_watermark(c: &mut Criterion) {
    let mut group = c.benchmark_group("watermark");

    group.bench_function("begin_finish_1000", |b| {
        b.iter(|| {
            let mark = Watermark::new("bench").unwrap();
            for ts in 1..=1000u64 {
                mark.begin(black_box(ts));
                mark.finish(black_box(ts));
            }
            mark.wait_for(1000, Some(Duration::from_secs(5))).unwrap();
        });
    });

    group.bench_function("done_till_read", |b| {
        let mark = Watermark::new("bench").unwrap();
        mark.begin(1);
        mark.finish(1);
        mark.wait_for(1, Some(Duration::from_secs(1))).unwrap();
        b.iter(|| black_box(mark.done_till()));
    });

    group.finish();
}

fn bench_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");

    group.bench_function("set_1000", |b| {
        b.iter(|| {
            let segment = Segment::new(1, 1 << 24);
            for i in 0..1000u64 {
                let key = format!("key_{i:06}");
                let value = format!("value_{i:06}");
                segment.set(black_box(key), i, black_box(value));
            }
        });
    });

    group.bench_function("latest_hit", |b| {
        let segment = Segment::new(1, 1 << 24);
        for i in 0..1000u64 {
            segment.set(format!("key_{i:06}"), i, format!("value_{i:06}"));
        }
        b.iter(|| black_box(segment.latest(b"key_000500", u64::MAX)));
    });

    group.finish();
}

fn bench_engine_e2e(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_e2e");

    for size in [100, 500, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("put_get_cycle", size),
            size,
            |b, &size| {
                b.iter(|| {
                    let engine = Silt::open(
                        Config::default()
                            .with_in_memory(true)
                            .with_segment_capacity(1 << 20),
                    )
                    .unwrap();

                    let mut last = None;
                    for i in 0..size {
                        let key = format!("key_{i:06}");
                        let value = format!("value_{i:06}");
                        last = Some(engine.put(key, value).unwrap());
                    }
                    last.unwrap().wait_applied().unwrap();

                    for i in 0..size {
                        let key = format!("key_{i:06}");
                        black_box(engine.get(key.as_bytes()));
                    }
                    engine.close();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_watermark, bench_segment, bench_engine_e2e);
criterion_main!(benches);
