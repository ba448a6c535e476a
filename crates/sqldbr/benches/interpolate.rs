use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sqldbr::interpolate::{expand_placeholders, interpolate};
use sqldbr::{Arg, Value, ValueList};

fn mixed_args(n: usize) -> (String, Vec<Arg>) {
    let time = NaiveDate::from_ymd_opt(2024, 2, 29)
        .and_then(|d| d.and_hms_micro_opt(12, 30, 15, 250))
        .map(Value::Time)
        .unwrap_or(Value::Null);
    let mut sql = String::from("SELECT * FROM t WHERE 1");
    let mut args = Vec::with_capacity(n);
    for i in 0..n {
        sql.push_str(&format!(" AND c{i} = ?"));
        args.push(Arg::Value(match i % 4 {
            0 => Value::Int(i as i64),
            1 => Value::Str(format!("it's value {i}\n")),
            2 => time.clone(),
            _ => Value::Float(i as f64 / 3.0),
        }));
    }
    (sql, args)
}

fn bench_interpolate_scalars(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolate/scalars");

    for n in [1, 10, 50, 200] {
        let (sql, args) = mixed_args(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &args, |b, args| {
            b.iter(|| black_box(interpolate(&sql, args)));
        });
    }

    group.finish();
}

fn bench_interpolate_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolate/lists");

    let sql = "SELECT * FROM t WHERE id IN (?) AND name IN (?)";
    for n in [10, 100, 1000] {
        let args = vec![
            Arg::List(ValueList::Ints((0..n).collect())),
            Arg::List(ValueList::Strs((0..n).map(|i| format!("name-{i}")).collect())),
        ];
        group.bench_with_input(BenchmarkId::from_parameter(n), &args, |b, args| {
            b.iter(|| black_box(interpolate(sql, args)));
        });
    }

    group.finish();
}

fn bench_expand_placeholders(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolate/expand_placeholders");

    let sql = "SELECT * FROM t WHERE id IN (?) AND status = ?";
    for n in [10, 100, 1000] {
        let args = vec![
            Arg::List(ValueList::Ints((0..n).collect())),
            Arg::Value(Value::Str("active".into())),
        ];
        group.bench_with_input(BenchmarkId::from_parameter(n), &args, |b, args| {
            b.iter(|| black_box(expand_placeholders(sql, args)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_interpolate_scalars,
    bench_interpolate_lists,
    bench_expand_placeholders
);
criterion_main!(benches);
