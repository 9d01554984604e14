//! The work-stealing deque itself is crate-private, so there is nothing to
//! import here directly (unlike the teacher's own deque bench, which
//! benchmarks its public `GhostChaseLevDeque`). These benchmarks exercise it
//! indirectly through `sort`, at sizes and key distributions chosen to push
//! workers into stealing from each other rather than staying purely local.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use pstd_par::sort::sort;

fn highly_skewed(n: usize) -> Vec<i64> {
    // A single dominant run plus a shuffled tail: the partition on this
    // input produces very unequal left/right sub-ranges, forcing frequent
    // pushes of the larger side and steals by otherwise-idle workers.
    let mut data: Vec<i64> = vec![0; n * 9 / 10];
    data.extend((0..(n - data.len()) as i64).map(|i| (i.wrapping_mul(2_654_435_761)) % 104_729));
    data
}

fn bench_work_stealing_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("deque_via_sort");

    for &n in &[50_000usize, 500_000] {
        let source = highly_skewed(n);
        group.bench_function(format!("skewed_partition_n={n}"), |b| {
            b.iter_batched(
                || source.clone(),
                |mut data| sort(&mut data, i64::cmp),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_work_stealing_pressure);
criterion_main!(benches);
