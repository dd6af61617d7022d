//! Benchmarks for reconciliation and merge over generated datasets.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use envsync_core::{merge, reconcile, Dataset, ExcludedColumns, Row, SelectionBuilder};

/// `tables` tables of `rows` rows each; `variant` shifts some values and keys
fn generate_dataset(tables: usize, rows: usize, variant: usize) -> Dataset {
    let mut dataset = Dataset::default();
    for t in 0..tables {
        let table_rows = (0..rows)
            .map(|i| {
                let mut row = Row::with_key(&format!("key-{}", i + variant));
                row.insert("name", format!("Row {i}"));
                row.insert("rollout", ((i * (variant + 1)) % 100) as i64);
                row.insert("enabled", i % 2 == 0);
                row.insert("lastUpdated", format!("2025-01-{:02}", variant + 1));
                row
            })
            .collect();
        dataset.insert_table(format!("Table{t}"), table_rows);
    }
    dataset
}

fn reconcile_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    let excluded = ExcludedColumns::default();

    for rows in [100usize, 1_000, 10_000].iter() {
        let source = generate_dataset(8, *rows, 0);
        let target = generate_dataset(8, *rows, 3);

        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, _| {
            b.iter(|| reconcile(black_box(&source), black_box(&target), &excluded))
        });
    }

    group.finish();
}

fn merge_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    let excluded = ExcludedColumns::default();

    for rows in [100usize, 1_000].iter() {
        let source = generate_dataset(4, *rows, 0);
        let target = generate_dataset(4, *rows, 3);
        let reconciliation = reconcile(&source, &target, &excluded);

        let mut builder = SelectionBuilder::new(&reconciliation);
        for table in reconciliation.tables() {
            for classified in table.rows.iter().filter(|r| r.classification.is_missing()) {
                let _ = builder.row(&table.name, &classified.key);
            }
        }
        let selection = builder.build();

        group.bench_with_input(BenchmarkId::new("rows", rows), rows, |b, _| {
            b.iter(|| merge(black_box(&target), black_box(&source), &selection))
        });
    }

    group.finish();
}

criterion_group!(benches, reconcile_benchmark, merge_benchmark);
criterion_main!(benches);
