//! Serial building blocks shared by [`super::introsort`] and
//! [`super::stable_sort`]: insertion sort, heapsort, and pivot selection.

use std::cmp::Ordering;

use crate::fabric::INSERTION_SORT_LIMIT;

/// Subranges at or below this length skip ninther sampling and fall back to
/// plain median-of-three.
const NINTHER_THRESHOLD: usize = 128;

/// Ceiling of `log2(n)`, `0` for `n <= 1`.
pub(crate) fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

pub(crate) fn insertion_sort<T>(data: &mut [T], cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) {
    for i in 1..data.len() {
        let mut j = i;
        while j > 0 && cmp(&data[j], &data[j - 1]) == Ordering::Less {
            data.swap(j, j - 1);
            j -= 1;
        }
    }
}

fn sift_down<T>(data: &mut [T], mut root: usize, end: usize, cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) {
    loop {
        let mut child = 2 * root + 1;
        if child >= end {
            break;
        }
        if child + 1 < end && cmp(&data[child], &data[child + 1]) == Ordering::Less {
            child += 1;
        }
        if cmp(&data[root], &data[child]) == Ordering::Less {
            data.swap(root, child);
            root = child;
        } else {
            break;
        }
    }
}

/// `make_heap` + `sort_heap`, the introsort depth-exhausted fallback.
pub(crate) fn heapsort<T>(data: &mut [T], cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) {
    let n = data.len();
    if n < 2 {
        return;
    }
    for start in (0..n / 2).rev() {
        sift_down(data, start, n, cmp);
    }
    for end in (1..n).rev() {
        data.swap(0, end);
        sift_down(data, 0, end, cmp);
    }
}

/// Index among `{a, b, c}` holding the median value.
fn median3_index<T>(data: &[T], a: usize, b: usize, c: usize, cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) -> usize {
    if cmp(&data[a], &data[b]) == Ordering::Less {
        if cmp(&data[b], &data[c]) == Ordering::Less {
            b
        } else if cmp(&data[a], &data[c]) == Ordering::Less {
            c
        } else {
            a
        }
    } else if cmp(&data[a], &data[c]) == Ordering::Less {
        a
    } else if cmp(&data[b], &data[c]) == Ordering::Less {
        c
    } else {
        b
    }
}

/// Picks a pivot index: median-of-three for short ranges, ninther
/// (median-of-three medians) for ranges at or above [`NINTHER_THRESHOLD`].
pub(crate) fn choose_pivot<T>(data: &[T], cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) -> usize {
    let n = data.len();
    debug_assert!(n > INSERTION_SORT_LIMIT);
    if n < NINTHER_THRESHOLD {
        return median3_index(data, 0, n / 2, n - 1, cmp);
    }
    let step = n / 8;
    let m1 = median3_index(data, 0, step, 2 * step, cmp);
    let m2 = median3_index(data, n / 2 - step, n / 2, n / 2 + step, cmp);
    let m3 = median3_index(data, n - 1 - 2 * step, n - 1 - step, n - 1, cmp);
    median3_index(data, m1, m2, m3, cmp)
}

/// Bentley–McIlroy-style three-way partition: collects every element equal
/// to the chosen pivot into one contiguous run and returns its `[lo, hi)`
/// bounds, with everything strictly less than the pivot to the left and
/// everything strictly greater to the right.
///
/// Implemented with the Dutch-national-flag index scheme (`lo`/`mid`/`hi`)
/// rather than the original paper's pointer juggling: the pivot is left in
/// place at whatever index it lands on and `pivot_pos` is kept up to date
/// across swaps, so every comparison is against the live pivot slot instead
/// of a copied-out value — this works for any `T`, not just `Copy` types.
pub(crate) fn three_way_partition<T>(data: &mut [T], cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) -> (usize, usize) {
    let mut pivot_pos = choose_pivot(data, cmp);
    let mut lo = 0usize;
    let mut mid = 0usize;
    let mut hi = data.len();
    while mid < hi {
        match cmp(&data[mid], &data[pivot_pos]) {
            Ordering::Less => {
                if lo == pivot_pos {
                    pivot_pos = mid;
                }
                data.swap(lo, mid);
                lo += 1;
                mid += 1;
            }
            Ordering::Equal => {
                mid += 1;
            }
            Ordering::Greater => {
                hi -= 1;
                if hi == pivot_pos {
                    pivot_pos = mid;
                }
                data.swap(mid, hi);
            }
        }
    }
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_sort_matches_std_sort() {
        let mut data = vec![5, 3, 8, 1, 9, 2, 7, 4, 6, 0];
        let mut expected = data.clone();
        expected.sort();
        insertion_sort(&mut data, &i32::cmp);
        assert_eq!(data, expected);
    }

    #[test]
    fn heapsort_matches_std_sort_for_many_sizes() {
        for n in [0usize, 1, 2, 33, 500] {
            let mut data: Vec<i64> = (0..n as i64).rev().collect();
            let mut expected = data.clone();
            expected.sort();
            heapsort(&mut data, &i64::cmp);
            assert_eq!(data, expected, "n={n}");
        }
    }

    #[test]
    fn three_way_partition_separates_into_three_regions() {
        let mut data = vec![3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5];
        let (lo, hi) = three_way_partition(&mut data, &i32::cmp);
        let pivot = data[lo];
        assert!(data[..lo].iter().all(|x| *x < pivot));
        assert!(data[lo..hi].iter().all(|x| *x == pivot));
        assert!(data[hi..].iter().all(|x| *x > pivot));
    }
}
