//! Inclusive/exclusive prefix scans: §4.5 of the design.
//!
//! A three-phase algorithm: a parallel pass reduces each chunk locally, a
//! serial pass turns those `chunks` totals into running prefixes, and a
//! final parallel pass writes each chunk's output using its own prefix as
//! the seed. Order within a chunk is strict left-to-right.

use crate::error::{try_vec_with_capacity, Result};
use crate::fabric::{chunks_min_fraction_2, parallel_for};
use crate::partition::RandomAccessPartition;

fn local_chunk_total<T, R>(
    chunk: &[T],
    op: &(impl Fn(R, R) -> R + Sync),
    transform: &(impl Fn(&T) -> R + Sync),
) -> R {
    let mut iter = chunk.iter();
    let first = transform(iter.next().expect("chunk_min_fraction_2 guarantees >=2 elements"));
    iter.fold(first, |acc, x| op(acc, transform(x)))
}

fn write_chunk<T, R: Clone>(
    chunk_in: &[T],
    chunk_out: &mut [R],
    seed: R,
    inclusive: bool,
    op: &(impl Fn(R, R) -> R + Sync),
    transform: &(impl Fn(&T) -> R + Sync),
) {
    let mut running = seed;
    for (x, slot) in chunk_in.iter().zip(chunk_out.iter_mut()) {
        if inclusive {
            running = op(running, transform(x));
            *slot = running.clone();
        } else {
            *slot = running.clone();
            running = op(running, transform(x));
        }
    }
}

fn serial_scan<T, R: Clone>(
    input: &[T],
    output: &mut [R],
    init: R,
    inclusive: bool,
    op: &(impl Fn(R, R) -> R + Sync),
    transform: &(impl Fn(&T) -> R + Sync),
) {
    write_chunk(input, output, init, inclusive, op, transform);
}

fn try_parallel_scan<T, R>(
    input: &[T],
    output: &mut [R],
    init: R,
    inclusive: bool,
    chunks: usize,
    op: &(impl Fn(R, R) -> R + Sync),
    transform: &(impl Fn(&T) -> R + Sync),
) -> Result<()>
where
    T: Sync,
    R: Clone + Send + Sync,
{
    let partition = RandomAccessPartition::new(input.len(), chunks);

    // Phase 1: local totals, computed in parallel.
    let totals_slots: Vec<std::sync::Mutex<Option<R>>> = {
        let mut v = try_vec_with_capacity(chunks)?;
        for _ in 0..chunks {
            v.push(std::sync::Mutex::new(None));
        }
        v
    };
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        let total = local_chunk_total(&input[b.start..b.end], op, transform);
        *totals_slots[i].lock().unwrap() = Some(total);
    });
    let totals: Vec<R> = totals_slots
        .into_iter()
        .map(|m| m.into_inner().unwrap().expect("every chunk wrote its total"))
        .collect();

    // Phase 2: serial prefix over chunk totals.
    let mut prefixes: Vec<R> = try_vec_with_capacity(chunks)?;
    let mut running = init;
    for total in &totals {
        prefixes.push(running.clone());
        running = op(running, total.clone());
    }

    // Phase 3: parallel write-out, each chunk seeded from its own prefix.
    let out_ptr = output.as_mut_ptr() as usize;
    let out_len = output.len();
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        // Safety: chunk `i` owns the disjoint sub-slice `[b.start, b.end)`
        // of `output`; the partition guarantees no two chunks overlap.
        debug_assert!(b.end <= out_len);
        let chunk_out =
            unsafe { std::slice::from_raw_parts_mut((out_ptr as *mut R).add(b.start), b.end - b.start) };
        write_chunk(&input[b.start..b.end], chunk_out, prefixes[i].clone(), inclusive, op, transform);
    });
    Ok(())
}

fn run<T, R>(
    input: &[T],
    output: &mut [R],
    init: R,
    inclusive: bool,
    op: impl Fn(R, R) -> R + Sync,
    transform: impl Fn(&T) -> R + Sync,
) where
    T: Sync,
    R: Clone + Send + Sync,
{
    debug_assert_eq!(input.len(), output.len());
    let n = input.len();
    if n == 0 {
        return;
    }
    let chunks = chunks_min_fraction_2(n);
    if chunks <= 1 || try_parallel_scan(input, output, init.clone(), inclusive, chunks, &op, &transform).is_err()
    {
        serial_scan(input, output, init, inclusive, &op, &transform);
    }
}

/// Transform-and-inclusive-scan with an explicit seed: `output[i]` is the
/// running fold of `transform` over `input[0..=i]`, seeded with `init`.
pub fn transform_inclusive_scan_with_init<T, R, Op, Transform>(
    input: &[T],
    output: &mut [R],
    op: Op,
    transform: Transform,
    init: R,
) where
    T: Sync,
    R: Clone + Send + Sync,
    Op: Fn(R, R) -> R + Sync,
    Transform: Fn(&T) -> R + Sync,
{
    run(input, output, init, true, op, transform);
}

/// Transform-and-inclusive-scan without an explicit seed: the first output
/// is `transform(&input[0])`, and the parallel machinery only runs over the
/// remaining `N-1` elements.
pub fn transform_inclusive_scan<T, R, Op, Transform>(
    input: &[T],
    output: &mut [R],
    op: Op,
    transform: Transform,
) where
    T: Sync,
    R: Clone + Send + Sync,
    Op: Fn(R, R) -> R + Sync,
    Transform: Fn(&T) -> R + Sync,
{
    if input.is_empty() {
        return;
    }
    output[0] = transform(&input[0]);
    let seed = output[0].clone();
    run(&input[1..], &mut output[1..], seed, true, op, transform);
}

/// Transform-and-exclusive-scan: `output[i]` is the running fold of
/// `transform` over `input[0..i]`, seeded with `init`.
pub fn transform_exclusive_scan<T, R, Op, Transform>(
    input: &[T],
    output: &mut [R],
    init: R,
    op: Op,
    transform: Transform,
) where
    T: Sync,
    R: Clone + Send + Sync,
    Op: Fn(R, R) -> R + Sync,
    Transform: Fn(&T) -> R + Sync,
{
    run(input, output, init, false, op, transform);
}

/// `inclusive_scan` with the identity transform.
pub fn inclusive_scan<T>(input: &[T], output: &mut [T], op: impl Fn(T, T) -> T + Sync)
where
    T: Clone + Send + Sync,
{
    transform_inclusive_scan(input, output, op, |x: &T| x.clone());
}

/// `exclusive_scan` with the identity transform.
pub fn exclusive_scan<T>(input: &[T], output: &mut [T], init: T, op: impl Fn(T, T) -> T + Sync)
where
    T: Clone + Send + Sync,
{
    transform_exclusive_scan(input, output, init, op, |x: &T| x.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusive_scan_running_sum() {
        let input = vec![1, 1, 1, 1, 1];
        let mut output = vec![0; 5];
        inclusive_scan(&input, &mut output, |a, b| a + b);
        assert_eq!(output, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn exclusive_scan_running_sum_with_init() {
        let input = vec![1, 1, 1, 1, 1];
        let mut output = vec![0; 5];
        exclusive_scan(&input, &mut output, 10, |a, b| a + b);
        assert_eq!(output, vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn inclusive_scan_matches_serial_for_many_sizes() {
        for n in [0usize, 1, 2, 50, 1000, 50_000] {
            let input: Vec<i64> = (0..n as i64).collect();
            let mut got = vec![0i64; n];
            inclusive_scan(&input, &mut got, |a, b| a + b);
            let mut expected = vec![0i64; n];
            let mut running = 0i64;
            for (i, x) in input.iter().enumerate() {
                running += x;
                expected[i] = running;
            }
            assert_eq!(got, expected, "n={n}");
        }
    }

    #[test]
    fn exclusive_scan_matches_serial_for_many_sizes() {
        for n in [0usize, 1, 2, 50, 1000, 50_000] {
            let input: Vec<i64> = (0..n as i64).collect();
            let mut got = vec![0i64; n];
            exclusive_scan(&input, &mut got, 100, |a, b| a + b);
            let mut expected = vec![0i64; n];
            let mut running = 100i64;
            for (i, x) in input.iter().enumerate() {
                expected[i] = running;
                running += x;
            }
            assert_eq!(got, expected, "n={n}");
        }
    }

    #[test]
    fn empty_scan_is_a_no_op() {
        let input: Vec<i64> = vec![];
        let mut output: Vec<i64> = vec![];
        inclusive_scan(&input, &mut output, |a, b| a + b);
        assert!(output.is_empty());
    }
}
