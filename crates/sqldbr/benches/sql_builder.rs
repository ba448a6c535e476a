use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sqldbr::condition::column;
use sqldbr::{ArgBuilder, Insert, Select};

/// SELECT col0, col1, ... FROM t WHERE (col0 = ?) AND (col1 = ?) ...
fn build_select(n: usize) -> Select {
    let mut sel = Select::new((0..n).map(|i| format!("col{i}")));
    sel.from("t")
        .where_((0..n).map(|i| column(format!("col{i}")).placeholder()));
    sel
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/build");

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut sel = build_select(n);
                black_box(sel.to_sql())
            });
        });
    }

    group.finish();
}

fn bench_bind_cached(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/bind_cached");

    for n in [1, 5, 10, 50, 100] {
        let mut sel = build_select(n);
        let template = sel.with_args();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut dbr = template.clone_fresh();
                for i in 0..n {
                    dbr.int(i as i64);
                }
                black_box(dbr.to_sql())
            });
        });
    }

    group.finish();
}

fn bench_expand_in_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/expand_in_list");

    let mut sel = Select::new(["id"]);
    sel.from("t").where_([column("id").is_in().placeholder()]);
    let template = sel.with_args();
    for n in [5, 20, 100, 500] {
        let values: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &values, |b, values| {
            b.iter(|| {
                let mut dbr = template.clone_fresh();
                dbr.expand_placeholders().ints(values.iter().copied());
                black_box(dbr.to_sql())
            });
        });
    }

    group.finish();
}

fn bench_insert_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/insert_rows");

    for rows in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, &rows| {
            b.iter(|| {
                let mut ins = Insert::new("t");
                ins.add_columns(["a", "b", "c"]).set_row_count(rows);
                let mut dbr = ins.with_args();
                for i in 0..rows * 3 {
                    dbr.int(i as i64);
                }
                black_box(dbr.to_sql())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_bind_cached,
    bench_expand_in_list,
    bench_insert_rows
);
criterion_main!(benches);
