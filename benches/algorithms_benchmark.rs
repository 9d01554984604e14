use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pstd_par::ops::{elementwise, predicate, reduce, scan};

const SIZE: usize = 200_000;

fn bench_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce");
    let data: Vec<i64> = (0..SIZE as i64).collect();

    group.bench_function("pstd_par::sum", |b| {
        b.iter(|| black_box(reduce::sum(&data)));
    });
    group.bench_function("std::iter::sum", |b| {
        b.iter(|| black_box(data.iter().sum::<i64>()));
    });

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    let data: Vec<i64> = (0..SIZE as i64).collect();
    let mut output = vec![0i64; SIZE];

    group.bench_function("pstd_par::inclusive_scan", |b| {
        b.iter(|| scan::inclusive_scan(&data, &mut output, |a, b| a + b));
    });
    group.bench_function("std::iter::scan", |b| {
        b.iter(|| {
            let mut running = 0i64;
            for (slot, x) in output.iter_mut().zip(data.iter()) {
                running += x;
                *slot = running;
            }
        });
    });

    group.finish();
}

fn bench_elementwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("elementwise");
    let data: Vec<i64> = (0..SIZE as i64).collect();
    let mut output = vec![0i64; SIZE];

    group.bench_function("pstd_par::transform", |b| {
        b.iter(|| elementwise::transform(&data, &mut output, |x| x.wrapping_mul(3).wrapping_add(1)));
    });
    group.bench_function("std::iter::map", |b| {
        b.iter(|| {
            for (slot, x) in output.iter_mut().zip(data.iter()) {
                *slot = x.wrapping_mul(3).wrapping_add(1);
            }
        });
    });

    let mut reversed = data.clone();
    group.bench_function("pstd_par::reverse", |b| {
        b.iter(|| elementwise::reverse(&mut reversed));
    });
    group.bench_function("[T]::reverse", |b| {
        b.iter(|| reversed.reverse());
    });

    group.finish();
}

fn bench_predicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate");
    let data: Vec<i64> = (0..SIZE as i64).collect();

    group.bench_function("pstd_par::count_if", |b| {
        b.iter(|| black_box(predicate::count_if(&data, |x| x % 7 == 0)));
    });
    group.bench_function("std::iter::filter_count", |b| {
        b.iter(|| black_box(data.iter().filter(|x| *x % 7 == 0).count()));
    });

    group.bench_function("pstd_par::find", |b| {
        b.iter(|| black_box(predicate::find(&data, &(SIZE as i64 - 1))));
    });
    group.bench_function("std::iter::position", |b| {
        b.iter(|| black_box(data.iter().position(|x| *x == SIZE as i64 - 1)));
    });

    group.finish();
}

criterion_group!(benches, bench_reduce, bench_scan, bench_elementwise, bench_predicate);
criterion_main!(benches);
