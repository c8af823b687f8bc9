use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use onetier::scanner::collect_nested;
use onetier::{
    CompressionType, Config, Fields, IterScanner, OneTierDatabase, Range, RangeSet, RowScanner,
};
use rand::Rng;
use std::collections::BTreeMap;
use std::time::Duration;
use tempfile::TempDir;

type Db = OneTierDatabase<i64, String, f64, String>;

const FIELDS: [&str; 4] = ["cpu", "mem", "disk", "net"];

/// Helper to build `count` rows starting at `start`, one random value per field
fn random_rows(start: i64, count: i64) -> RowScanner<i64, String, f64> {
    let mut rng = rand::thread_rng();
    let rows = (start..start + count)
        .map(|key| {
            let cells = FIELDS
                .iter()
                .map(|field| (field.to_string(), rng.gen_range(0.0..100.0)))
                .collect();
            (key, IterScanner::boxed(cells))
        })
        .collect();
    IterScanner::boxed(rows)
}

fn open(dir: &TempDir, threshold: usize, compression: CompressionType) -> Db {
    let config = Config::new(dir.path())
        .with_flush_threshold(threshold)
        .with_compression(compression)
        .with_sync_segments(false);
    Db::with_config(config).unwrap()
}

/// Benchmark in-memory upserts (no flush triggered)
fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert_rows");

    for batch in [10i64, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, &batch| {
            let dir = TempDir::new().unwrap();
            let db = open(&dir, usize::MAX, CompressionType::Lz4);
            let schema = BTreeMap::new();
            let mut next = 0i64;

            b.iter(|| {
                db.upsert_rows(random_rows(next, batch), &schema).unwrap();
                next += batch;
            });
        });
    }

    group.finish();
}

/// Benchmark upserts that keep crossing the flush threshold
fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    for compression in [CompressionType::None, CompressionType::Lz4, CompressionType::Zstd] {
        group.bench_function(format!("{:?}", compression), |b| {
            let dir = TempDir::new().unwrap();
            let db = open(&dir, 4_000, compression);
            let schema = BTreeMap::new();
            let mut next = 0i64;

            b.iter(|| {
                db.upsert_rows(random_rows(next, 1_000), &schema).unwrap();
                next += 1_000;
            });
            db.await_flush().unwrap();
        });
    }

    group.finish();
}

/// Benchmark merged range queries over several segments plus memory
fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    let dir = TempDir::new().unwrap();
    let db = open(&dir, 10_000, CompressionType::Lz4);
    let schema = BTreeMap::new();
    for chunk in 0..10 {
        db.upsert_rows(random_rows(chunk * 5_000, 5_000), &schema).unwrap();
    }
    db.delete(&Fields::only(["net".to_string()]), &RangeSet::of(Range::closed(10_000, 20_000)))
        .unwrap();
    db.await_flush().unwrap();

    for width in [100i64, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("range", width), width, |b, &width| {
            let mut rng = rand::thread_rng();
            b.iter(|| {
                let start = rng.gen_range(0..50_000 - width);
                let mut rows = db
                    .query(&Fields::only(["cpu".to_string(), "net".to_string()]), &Range::closed_open(start, start + width))
                    .unwrap();
                black_box(collect_nested(&mut rows).unwrap());
            });
        });
    }

    group.bench_function("ranges", |b| {
        b.iter(|| black_box(db.ranges().unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_upsert,
    bench_flush,
    bench_query,
);

criterion_main!(benches);
