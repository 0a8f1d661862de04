//! Benchmark suite for summary operations
//!
//! Covers the Summary trait on both backends:
//! - Write: add (new entries and merges), add_summary, commit
//! - Read: iter_filtered (empty, report, varcode, datetime), query_summary
//! - Aggregates: data_count, varcodes, datetime_min
//! - Caches: resolve_id hit path
//!
//! Run: cargo bench --bench summary_operations

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use obsarchive::cache::{LevTrCache, LevTrEntry};
use obsarchive::{
    Coords, Datetime, DatetimeRange, IndexSummary, Level, MemorySummary, Query, Station, Summary,
    Trange, VarDesc, Varcode,
};
use tempfile::TempDir;

const REPORTS: [&str; 4] = ["synop", "temp", "metar", "ship"];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_station(i: usize) -> Station {
    let lat = (i % 180) as f64 - 90.0;
    let lon = ((i / 180) % 360) as f64 - 180.0;
    Station::fixed(REPORTS[i % REPORTS.len()], Coords::from_degrees(lat, lon))
}

fn make_var(i: usize) -> VarDesc {
    VarDesc::new(
        Level::single(103, 2000 + (i % 3) as i32 * 1000),
        Trange::of(254, 0, 0),
        Varcode::b(12, 101 + (i % 5) as u8),
    )
}

fn make_dtrange(i: usize) -> DatetimeRange {
    let base = Datetime::ymd(2020, 1, 1).unwrap().timestamp();
    let dt = Datetime::from_timestamp(base + (i as i64 % 1000) * 3600).unwrap();
    DatetimeRange::point(dt)
}

/// `stations` stations with 5 variables each, every variable added twice.
fn fill(summary: &mut dyn Summary<Station>, stations: usize) {
    for i in 0..stations {
        let station = make_station(i);
        for v in 0..5 {
            for round in 0..2 {
                summary
                    .add(&station, &make_var(v), &make_dtrange(i + v + round), 1)
                    .unwrap();
            }
        }
    }
}

fn create_memory(stations: usize) -> MemorySummary<Station> {
    let mut summary = MemorySummary::new();
    fill(&mut summary, stations);
    summary
}

fn create_index(stations: usize) -> IndexSummary<Station> {
    let mut summary = IndexSummary::in_memory();
    fill(&mut summary, stations);
    summary
}

fn count_matches(summary: &dyn Summary<Station>, query: &Query) -> usize {
    let mut n = 0;
    summary
        .iter_filtered(query, &mut |_, _, _, _| {
            n += 1;
            true
        })
        .unwrap();
    n
}

// ---------------------------------------------------------------------------
// Write path
// ---------------------------------------------------------------------------

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add");

    for size in [100, 1000] {
        group.bench_with_input(BenchmarkId::new("memory", size), &size, |b, &size| {
            b.iter(|| {
                let mut summary = MemorySummary::<Station>::new();
                fill(&mut summary, black_box(size));
            });
        });
        group.bench_with_input(BenchmarkId::new("index", size), &size, |b, &size| {
            b.iter(|| {
                let mut summary = IndexSummary::<Station>::in_memory();
                fill(&mut summary, black_box(size));
            });
        });
    }

    group.finish();
}

fn bench_add_summary(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_summary");

    for size in [100, 1000] {
        let source = create_memory(size);

        group.bench_with_input(BenchmarkId::new("into_memory", size), &size, |b, _| {
            b.iter(|| {
                let mut summary = MemorySummary::<Station>::new();
                summary.add_summary(black_box(&source)).unwrap();
            });
        });
        group.bench_with_input(BenchmarkId::new("into_index", size), &size, |b, _| {
            b.iter(|| {
                let mut summary = IndexSummary::<Station>::in_memory();
                summary.add_summary(black_box(&source)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");
    group.sample_size(20);

    for size in [100, 1000] {
        group.bench_with_input(BenchmarkId::new("memory_json", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let dir = TempDir::new().unwrap();
                    let mut summary = MemorySummary::<Station>::open(dir.path().join("s.json")).unwrap();
                    fill(&mut summary, size);
                    (dir, summary)
                },
                |(_dir, mut summary)| summary.commit().unwrap(),
                BatchSize::SmallInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("index_snapshot", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let dir = TempDir::new().unwrap();
                    let mut summary = IndexSummary::<Station>::open(dir.path()).unwrap();
                    fill(&mut summary, size);
                    (dir, summary)
                },
                |(_dir, mut summary)| summary.commit().unwrap(),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

fn bench_iter_filtered(c: &mut Criterion) {
    let mut group = c.benchmark_group("iter_filtered");
    let queries = [
        ("all", Query::new()),
        ("report", Query::new().report("temp")),
        ("varcode", Query::new().varcode(Varcode::b(12, 103))),
        (
            "datetime",
            Query::new().datetime(DatetimeRange::between(
                Datetime::ymd(2020, 1, 10).unwrap(),
                Datetime::ymd(2020, 1, 20).unwrap(),
            )),
        ),
    ];

    let size = 1000;
    let memory = create_memory(size);
    let index = create_index(size);

    for (name, query) in &queries {
        group.bench_with_input(BenchmarkId::new("memory", name), query, |b, query| {
            b.iter(|| black_box(count_matches(&memory, query)));
        });
        group.bench_with_input(BenchmarkId::new("index", name), query, |b, query| {
            b.iter(|| black_box(count_matches(&index, query)));
        });
    }

    group.finish();
}

fn bench_query_summary(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_summary");

    for size in [100, 1000] {
        let memory = create_memory(size);
        let index = create_index(size);
        let query = Query::new().report("synop");

        group.bench_with_input(BenchmarkId::new("memory", size), &size, |b, _| {
            b.iter(|| {
                let mut cursor = memory.query_summary(black_box(&query)).unwrap();
                while cursor.next() {
                    black_box(cursor.count());
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("index", size), &size, |b, _| {
            b.iter(|| {
                let mut cursor = index.query_summary(black_box(&query)).unwrap();
                while cursor.next() {
                    black_box(cursor.count());
                }
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

fn bench_aggregates(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregates");
    let size = 1000;
    let index = create_index(size);

    // Fresh summary per iteration so the lazy stats are recomputed.
    group.bench_function("memory_data_count_cold", |b| {
        b.iter_batched(
            || create_memory(size),
            |summary| black_box(summary.data_count().unwrap()),
            BatchSize::LargeInput,
        );
    });
    group.bench_function("index_data_count", |b| {
        b.iter(|| black_box(index.data_count().unwrap()));
    });
    group.bench_function("index_varcodes", |b| {
        b.iter(|| {
            let mut n = 0;
            index
                .varcodes(&mut |_| {
                    n += 1;
                    true
                })
                .unwrap();
            black_box(n)
        });
    });
    group.bench_function("index_datetime_min", |b| {
        b.iter(|| black_box(index.datetime_min().unwrap()));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Caches
// ---------------------------------------------------------------------------

fn bench_levtr_resolve_hit(c: &mut Criterion) {
    let mut cache = LevTrCache::new();
    let entries: Vec<LevTrEntry> = (0..100)
        .map(|i| LevTrEntry::new(Level::single(103, i * 10), Trange::of(254, 0, 0)))
        .collect();
    for (i, entry) in entries.iter().enumerate() {
        cache.insert_with_id(*entry, i as i32 + 1).unwrap();
    }

    c.bench_function("levtr_resolve_hit", |b| {
        b.iter(|| {
            for entry in &entries {
                black_box(cache.resolve_id(entry, |_| unreachable!()).unwrap());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_add,
    bench_add_summary,
    bench_commit,
    bench_iter_filtered,
    bench_query_summary,
    bench_aggregates,
    bench_levtr_resolve_hit,
);

criterion_main!(benches);
