//! `reduce` and `transform_reduce`: §4.4 of the design.
//!
//! `reduce`'s binary operator is assumed associative but *not* commutative;
//! the parallel path preserves left-to-right evaluation order both within a
//! chunk and during the final fold across chunks, so a non-commutative
//! operator (e.g. string concatenation) still matches the serial left fold.

use std::mem::MaybeUninit;

use crate::error::{try_vec_with_capacity, Result};
use crate::fabric::{chunks_min_fraction_2, parallel_for};
use crate::partition::{ForwardPartition, RandomAccessPartition};

fn serial_transform_reduce<T, R>(
    data: &[T],
    init: R,
    reduce: &(impl Fn(R, R) -> R + Sync),
    transform: &(impl Fn(&T) -> R + Sync),
) -> R {
    data.iter().fold(init, |acc, x| reduce(acc, transform(x)))
}

fn try_parallel_locals<T, R>(
    data: &[T],
    chunks: usize,
    reduce: &(impl Fn(R, R) -> R + Sync),
    transform: &(impl Fn(&T) -> R + Sync),
) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
{
    let partition = RandomAccessPartition::new(data.len(), chunks);
    let mut locals: Vec<MaybeUninit<R>> = try_vec_with_capacity(chunks)?;
    for _ in 0..chunks {
        locals.push(MaybeUninit::uninit());
    }
    let slots = locals.as_ptr() as usize;
    parallel_for(chunks, chunks, |i| {
        let bounds = partition.at(i);
        let chunk = &data[bounds.start..bounds.end];
        debug_assert!(!chunk.is_empty());
        let mut iter = chunk.iter();
        let first = transform(iter.next().unwrap());
        let local = iter.fold(first, |acc, x| reduce(acc, transform(x)));
        // Safety: chunk `i` owns slot `i` exclusively; no other chunk
        // writes it, and it is read back only after every chunk has
        // returned from `parallel_for`.
        unsafe {
            let slot = (slots as *mut MaybeUninit<R>).add(i);
            slot.write(MaybeUninit::new(local));
        }
    });
    // Safety: every slot was written by exactly one chunk above.
    Ok(locals.into_iter().map(|m| unsafe { m.assume_init() }).collect())
}

/// Parallel `transform_reduce` over a single range: reduces
/// `transform(x)` for each `x` in `data`, folding `init` in last.
pub fn transform_reduce<T, R, Reduce, Transform>(
    data: &[T],
    init: R,
    reduce: Reduce,
    transform: Transform,
) -> R
where
    T: Sync,
    R: Send,
    Reduce: Fn(R, R) -> R + Sync,
    Transform: Fn(&T) -> R + Sync,
{
    let n = data.len();
    let chunks = chunks_min_fraction_2(n);
    if chunks <= 1 {
        return serial_transform_reduce(data, init, &reduce, &transform);
    }
    match try_parallel_locals(data, chunks, &reduce, &transform) {
        Ok(locals) => locals.into_iter().fold(init, &reduce),
        Err(_) => serial_transform_reduce(data, init, &reduce, &transform),
    }
}

/// Two-range `transform_reduce`: partitions both ranges with matching
/// chunk indices and applies a binary transform before reducing.
pub fn transform_reduce2<T1, T2, R, Reduce, Transform>(
    data1: &[T1],
    data2: &[T2],
    init: R,
    reduce: Reduce,
    transform: Transform,
) -> R
where
    T1: Sync,
    T2: Sync,
    R: Send,
    Reduce: Fn(R, R) -> R + Sync,
    Transform: Fn(&T1, &T2) -> R + Sync,
{
    debug_assert_eq!(data1.len(), data2.len());
    let n = data1.len();
    let chunks = chunks_min_fraction_2(n);
    let serial = |data1: &[T1], data2: &[T2], init: R| -> R {
        data1
            .iter()
            .zip(data2.iter())
            .fold(init, |acc, (a, b)| reduce(acc, transform(a, b)))
    };
    if chunks <= 1 {
        return serial(data1, data2, init);
    }
    let partition1 = RandomAccessPartition::new(n, chunks);
    let partition2 = RandomAccessPartition::new(n, chunks);
    let result: Result<Vec<R>> = (|| {
        let mut locals: Vec<MaybeUninit<R>> = try_vec_with_capacity(chunks)?;
        for _ in 0..chunks {
            locals.push(MaybeUninit::uninit());
        }
        let slots = locals.as_ptr() as usize;
        parallel_for(chunks, chunks, |i| {
            let b1 = partition1.at(i);
            let b2 = partition2.at(i);
            let c1 = &data1[b1.start..b1.end];
            let c2 = &data2[b2.start..b2.end];
            let mut iter = c1.iter().zip(c2.iter());
            let (a0, b0) = iter.next().unwrap();
            let first = transform(a0, b0);
            let local = iter.fold(first, |acc, (a, b)| reduce(acc, transform(a, b)));
            unsafe {
                let slot = (slots as *mut MaybeUninit<R>).add(i);
                slot.write(MaybeUninit::new(local));
            }
        });
        Ok(locals.into_iter().map(|m| unsafe { m.assume_init() }).collect())
    })();
    match result {
        Ok(locals) => locals.into_iter().fold(init, &reduce),
        Err(_) => serial(data1, data2, init),
    }
}

/// Folds a non-empty iterator: `transform` the first element, then fold the
/// rest through `reduce`. Panics on an empty iterator; callers that may see
/// one handle it themselves, since what to do about it differs (return
/// `init` at the top level, never happens inside a non-empty chunk).
fn fold_nonempty<I, R>(mut iter: I, reduce: &(impl Fn(R, R) -> R + Sync), transform: &(impl Fn(&I::Item) -> R + Sync)) -> R
where
    I: Iterator,
{
    let first = transform(&iter.next().expect("fold_nonempty called on an empty iterator"));
    iter.fold(first, |acc, x| reduce(acc, transform(&x)))
}

fn serial_transform_reduce_iter<I, R>(
    mut iter: I,
    init: R,
    reduce: &(impl Fn(R, R) -> R + Sync),
    transform: &(impl Fn(&I::Item) -> R + Sync),
) -> R
where
    I: Iterator,
{
    match iter.next() {
        None => init,
        Some(first) => {
            let first = transform(&first);
            iter.fold(first, |acc, x| reduce(acc, transform(&x)))
        }
    }
}

/// `transform_reduce` over a forward-only range: any iterator cheap enough
/// to checkpoint by cloning, per the forward iterator-category partition in
/// [`crate::partition`]. There is no O(1) way to jump into the middle of
/// such a range, so chunk boundaries are pre-walked once instead of
/// computed by arithmetic.
pub fn transform_reduce_iter<I, R, Reduce, Transform>(iter: I, init: R, reduce: Reduce, transform: Transform) -> R
where
    I: ExactSizeIterator + Clone + Sync,
    R: Send,
    Reduce: Fn(R, R) -> R + Sync,
    Transform: Fn(&I::Item) -> R + Sync,
{
    let n = iter.len();
    let chunks = chunks_min_fraction_2(n);
    if chunks <= 1 {
        return serial_transform_reduce_iter(iter, init, &reduce, &transform);
    }
    let partition = match ForwardPartition::new(iter.clone(), n, chunks) {
        Ok(p) => p,
        Err(_) => return serial_transform_reduce_iter(iter, init, &reduce, &transform),
    };
    let result: Result<Vec<R>> = (|| {
        let mut locals: Vec<MaybeUninit<R>> = try_vec_with_capacity(chunks)?;
        for _ in 0..chunks {
            locals.push(MaybeUninit::uninit());
        }
        let slots = locals.as_ptr() as usize;
        parallel_for(chunks, chunks, |i| {
            let (chunk_iter, len) = partition.at(i);
            debug_assert!(len > 0);
            let local = fold_nonempty(chunk_iter.take(len), &reduce, &transform);
            // Safety: chunk `i` owns slot `i` exclusively; no other chunk
            // writes it, and it is read back only after every chunk has
            // returned from `parallel_for`.
            unsafe {
                let slot = (slots as *mut MaybeUninit<R>).add(i);
                slot.write(MaybeUninit::new(local));
            }
        });
        Ok(locals.into_iter().map(|m| unsafe { m.assume_init() }).collect())
    })();
    match result {
        Ok(locals) => locals.into_iter().fold(init, &reduce),
        Err(_) => serial_transform_reduce_iter(iter, init, &reduce, &transform),
    }
}

/// Parallel `reduce`: `transform_reduce` with the identity transform.
pub fn reduce<T>(data: &[T], init: T, op: impl Fn(T, T) -> T + Sync) -> T
where
    T: Clone + Send + Sync,
{
    transform_reduce(data, init, op, |x: &T| x.clone())
}

/// Parallel sum, expressed as `reduce` with `+` and a default identity.
pub fn sum<T>(data: &[T]) -> T
where
    T: Default + Clone + Send + Sync + std::ops::Add<Output = T>,
{
    reduce(data, T::default(), |a, b| a + b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_reduce_sums_one_to_ten() {
        let data: Vec<i64> = (1..=10).collect();
        let result = transform_reduce(&data, 0i64, |a, b| a + b, |x| *x);
        assert_eq!(result, 55);
    }

    #[test]
    fn reduce_matches_serial_for_many_sizes() {
        for n in [0usize, 1, 2, 7, 31, 32, 33, 1000, 100_000] {
            let data: Vec<i64> = (0..n as i64).collect();
            let expected: i64 = data.iter().sum();
            assert_eq!(sum(&data), expected, "n={n}");
        }
    }

    #[test]
    fn reduce_preserves_left_fold_order_for_noncommutative_op() {
        let data: Vec<String> = (0..2000).map(|i| i.to_string()).collect();
        let expected = data.iter().fold(String::new(), |mut acc, s| {
            acc.push_str(s);
            acc
        });
        let got = reduce(&data, String::new(), |mut acc, s| {
            acc.push_str(&s);
            acc
        });
        assert_eq!(got, expected);
    }

    #[test]
    fn transform_reduce_iter_matches_transform_reduce_for_many_sizes() {
        for n in [0usize, 1, 2, 7, 31, 32, 33, 1000, 100_000] {
            let data: Vec<i64> = (0..n as i64).collect();
            let expected: i64 = data.iter().sum();
            let got = transform_reduce_iter(data.iter().copied(), 0i64, |a, b| a + b, |x| *x);
            assert_eq!(got, expected, "n={n}");
        }
    }

    #[test]
    fn transform_reduce_iter_preserves_left_fold_order_for_noncommutative_op() {
        let strings: Vec<String> = (0..2000).map(|i| i.to_string()).collect();
        let expected = strings.iter().fold(String::new(), |mut acc, s| {
            acc.push_str(s);
            acc
        });
        let got = transform_reduce_iter(
            strings.iter(),
            String::new(),
            |mut acc, s: String| {
                acc.push_str(&s);
                acc
            },
            |s: &&String| (*s).clone(),
        );
        assert_eq!(got, expected);
    }

    #[test]
    fn transform_reduce2_dot_product() {
        let a: Vec<i64> = (0..5000).collect();
        let b: Vec<i64> = (0..5000).rev().collect();
        let got = transform_reduce2(&a, &b, 0i64, |x, y| x + y, |x, y| x * y);
        let expected: i64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        assert_eq!(got, expected);
    }
}
