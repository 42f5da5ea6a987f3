use std::time::Duration;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use tickbucket::{
    AtomicStorage, Bucket, Config, LocalStorage, ManualClock, PaddedAtomicStorage, Throttler,
};

const THREADS: u32 = 24;
const TICK: Duration = Duration::from_millis(10);

fn bench_bucket(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket");
    group
        .throughput(Throughput::Elements(1))
        .sample_size(100)
        .bench_function("take-put-local-storage", |b| {
            let bucket = Bucket::<LocalStorage>::from_parts(1_000, 1_000);
            b.iter(|| {
                let got = std::hint::black_box(bucket.take(1));
                bucket.put(got);
            });
        })
        .bench_function("take-put-atomic-storage", |b| {
            let bucket = Bucket::<AtomicStorage>::from_parts(1_000, 1_000);
            b.iter(|| {
                let got = std::hint::black_box(bucket.take(1));
                bucket.put(got);
            });
        })
        .bench_function("take-put-padded-atomic-storage", |b| {
            let bucket = Bucket::<PaddedAtomicStorage>::from_parts(1_000, 1_000);
            b.iter(|| {
                let got = std::hint::black_box(bucket.take(1));
                bucket.put(got);
            });
        });
    group.finish();
}

fn bench_halt(c: &mut Criterion) {
    let mut group = c.benchmark_group("throttler");
    group
        .throughput(Throughput::Elements(1))
        .bench_function("halt-hot-key", |b| {
            let th = Throttler::with_config(Config::every(TICK).manual()).unwrap();
            th.bucket("hot", 10_000);
            b.iter(|| {
                th.refill();
                std::hint::black_box(th.halt("hot", 1, 10_000));
            });
        })
        .bench_function("halt-1k-keys", |b| {
            let clock = ManualClock::default();
            let th = Throttler::<PaddedAtomicStorage, _>::from_parts(
                Config::every(TICK).manual(),
                &clock,
            )
            .unwrap();
            let keys: Vec<String> = (0..1_000).map(|i| format!("client-{i}")).collect();
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % keys.len();
                std::hint::black_box(th.halt(&keys[i], 1, 10_000));
            });
        })
        .bench_function("refill-1k-buckets", |b| {
            let th = Throttler::with_config(Config::every(TICK).manual()).unwrap();
            for i in 0..1_000 {
                th.bucket(&format!("client-{i}"), 10_000);
            }
            b.iter(|| th.refill());
        });
    group.finish();
}

fn multi_threaded(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_threaded");
    group
        .throughput(Throughput::Elements(1))
        .bench_function("padded", |b| {
            let th = Throttler::<PaddedAtomicStorage, _>::from_parts(
                Config::every(TICK),
                ManualClock::default(),
            )
            .unwrap();
            b.iter_custom(|iters| {
                let start = std::time::Instant::now();
                std::thread::scope(|s| {
                    for t in 0..THREADS {
                        let th = &th;
                        s.spawn(move || {
                            let key = format!("worker-{}", t % 4);
                            for _i in 0..iters {
                                std::hint::black_box(th.halt(&key, 1, 1_000_000));
                            }
                        });
                    }
                });
                start.elapsed()
            })
        })
        .bench_function("atomic", |b| {
            let th = Throttler::<AtomicStorage, _>::from_parts(
                Config::every(TICK),
                ManualClock::default(),
            )
            .unwrap();
            b.iter_custom(|iters| {
                let start = std::time::Instant::now();
                std::thread::scope(|s| {
                    for t in 0..THREADS {
                        let th = &th;
                        s.spawn(move || {
                            let key = format!("worker-{}", t % 4);
                            for _i in 0..iters {
                                std::hint::black_box(th.halt(&key, 1, 1_000_000));
                            }
                        });
                    }
                });
                start.elapsed()
            })
        });
    group.finish();
}

criterion_group!(benches, bench_bucket, bench_halt, multi_threaded);
criterion_main!(benches);
