use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pstd_par::sort::{merge, sort, stable_sort};

const SIZE: usize = 500_000;

fn scrambled(n: usize) -> Vec<i64> {
    (0..n as i64).map(|i| (i.wrapping_mul(2_654_435_761)) % 104_729).collect()
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort");
    let source = scrambled(SIZE);

    group.bench_function("pstd_par::sort", |b| {
        b.iter_batched(
            || source.clone(),
            |mut data| sort(&mut data, i64::cmp),
            criterion::BatchSize::LargeInput,
        );
    });
    group.bench_function("[T]::sort_unstable", |b| {
        b.iter_batched(
            || source.clone(),
            |mut data| data.sort_unstable(),
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_stable_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("stable_sort");
    let source: Vec<(i32, i64)> = scrambled(SIZE).into_iter().map(|x| ((x % 4096) as i32, x)).collect();

    group.bench_function("pstd_par::stable_sort", |b| {
        b.iter_batched(
            || source.clone(),
            |mut data| stable_sort(&mut data, |a, b| a.0.cmp(&b.0)),
            criterion::BatchSize::LargeInput,
        );
    });
    group.bench_function("[T]::sort_by_key", |b| {
        b.iter_batched(
            || source.clone(),
            |mut data| data.sort_by_key(|x| x.0),
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    let mut a = scrambled(SIZE / 2);
    let mut b_input = scrambled(SIZE / 2);
    a.sort_unstable();
    b_input.sort_unstable();
    let mut out = vec![0i64; a.len() + b_input.len()];

    group.bench_function("pstd_par::merge", |bencher| {
        bencher.iter(|| merge(&a, &b_input, &mut out, i64::cmp));
    });
    group.bench_function("itertools_style_merge", |bencher| {
        bencher.iter(|| {
            let mut i = 0;
            let mut j = 0;
            let mut k = 0;
            while i < a.len() && j < b_input.len() {
                if b_input[j] < a[i] {
                    out[k] = b_input[j];
                    j += 1;
                } else {
                    out[k] = a[i];
                    i += 1;
                }
                k += 1;
            }
            out[k..k + (a.len() - i)].copy_from_slice(&a[i..]);
            k += a.len() - i;
            out[k..k + (b_input.len() - j)].copy_from_slice(&b_input[j..]);
        });
    });

    group.finish();
    black_box(&out);
}

criterion_group!(benches, bench_sort, bench_stable_sort, bench_merge);
criterion_main!(benches);
