use cachepool_rs::{CacheKey, CachePool, Config, Pool, PositionerMode};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key(u64);

impl CacheKey for Key {
    fn shard_hash(&self) -> u64 {
        self.0.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Payload {
    a: i64,
    b: i64,
    c: i64,
}

fn bench_pool_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_acquire_release");
    group.throughput(Throughput::Elements(1));

    for mode in [PositionerMode::Slots, PositionerMode::Ring] {
        let pool: Pool<Payload> = Pool::new(0, 1024, mode).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{mode:?}")),
            &pool,
            |b, pool| {
                b.iter(|| {
                    let id = pool.acquire().unwrap();
                    pool.release(id).unwrap();
                });
            },
        );
    }
    group.finish();
}

fn bench_store_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_load");
    group.throughput(Throughput::Elements(1));

    let cp: CachePool<Key, Payload> = CachePool::new(Config::new(4, 1024)).unwrap();
    let value = cp.acquire().unwrap();
    value.write(Payload { a: 1, b: 2, c: 3 });

    group.bench_function("store_overwrite", |b| {
        let mut k = 0u64;
        b.iter(|| {
            let displaced = cp.store(Key(k % 1024), &value);
            k += 1;
            displaced
        });
    });

    let _ = cp.store(Key(7), &value);
    group.bench_function("load_hit", |b| {
        b.iter(|| cp.load(&Key(7)).unwrap());
    });
    group.bench_function("load_miss", |b| {
        b.iter(|| cp.load(&Key(u64::MAX)));
    });

    group.finish();
}

criterion_group!(benches, bench_pool_acquire_release, bench_store_load);
criterion_main!(benches);
