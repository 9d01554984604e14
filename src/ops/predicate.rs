//! Predicate, search, extremum, and partitioning algorithms: §4.7 of the
//! design.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering as AtomicOrdering};

use crate::fabric::{chunks_min_fraction_1, parallel_for};
use crate::partition::{ForwardPartition, RandomAccessPartition};
use crate::trackers::{Direction, IndexTracker, LockedTracker};

fn chunks_for(n: usize) -> (RandomAccessPartition, usize) {
    let chunks = chunks_min_fraction_1(n);
    // `RandomAccessPartition::new` requires `chunks >= 1`; callers only ever
    // index into the partition after checking `chunks > 1`, so the clamp
    // below is never observed on the live path.
    (RandomAccessPartition::new(n, chunks.max(1)), chunks)
}

// ---------------------------------------------------------------- all/any/none

/// Shared engine for `any_of`/`all_of`/`none_of`: true as soon as any chunk
/// finds an element satisfying `pred`, short-circuiting the rest.
fn any_matching<T: Sync>(data: &[T], pred: &(impl Fn(&T) -> bool + Sync)) -> bool {
    let n = data.len();
    let (partition, chunks) = chunks_for(n);
    if chunks <= 1 {
        return data.iter().any(pred);
    }
    let found = AtomicBool::new(false);
    parallel_for(chunks, chunks, |i| {
        if found.load(AtomicOrdering::Relaxed) {
            return;
        }
        let b = partition.at(i);
        for x in &data[b.start..b.end] {
            if found.load(AtomicOrdering::Relaxed) {
                return;
            }
            if pred(x) {
                found.store(true, AtomicOrdering::Relaxed);
                return;
            }
        }
    });
    found.load(AtomicOrdering::Relaxed)
}

/// True if `pred` holds for every element.
pub fn all_of<T: Sync>(data: &[T], pred: impl Fn(&T) -> bool + Sync) -> bool {
    !any_matching(data, &|x| !pred(x))
}

/// True if `pred` holds for at least one element.
pub fn any_of<T: Sync>(data: &[T], pred: impl Fn(&T) -> bool + Sync) -> bool {
    any_matching(data, &pred)
}

/// True if `pred` holds for no element.
pub fn none_of<T: Sync>(data: &[T], pred: impl Fn(&T) -> bool + Sync) -> bool {
    !any_matching(data, &pred)
}

// ------------------------------------------------------------------- count

/// Counts elements satisfying `pred`.
pub fn count_if<T: Sync>(data: &[T], pred: impl Fn(&T) -> bool + Sync) -> usize {
    let n = data.len();
    let (partition, chunks) = chunks_for(n);
    if chunks <= 1 {
        return data.iter().filter(|x| pred(x)).count();
    }
    let total = AtomicUsize::new(0);
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        let local = data[b.start..b.end].iter().filter(|x| pred(x)).count();
        total.fetch_add(local, AtomicOrdering::Relaxed);
    });
    total.load(AtomicOrdering::Relaxed)
}

/// Counts elements equal to `value`.
pub fn count<T: PartialEq + Sync>(data: &[T], value: &T) -> usize {
    count_if(data, |x| x == value)
}

// -------------------------------------------------------------------- find

fn find_impl<T: Sync>(data: &[T], pred: &(impl Fn(&T) -> bool + Sync)) -> Option<usize> {
    let n = data.len();
    let (partition, chunks) = chunks_for(n);
    if chunks <= 1 {
        return data.iter().position(pred);
    }
    let tracker = IndexTracker::new(Direction::Min);
    parallel_for(chunks, chunks, |i| {
        let chunk_idx = i as u32;
        if tracker.already_beaten(chunk_idx) {
            return;
        }
        let b = partition.at(i);
        if let Some(offset) = data[b.start..b.end].iter().position(pred) {
            tracker.report(chunk_idx, (b.start + offset) as u32);
        }
    });
    tracker.get().map(|(_, pos)| pos as usize)
}

/// Position of the first element equal to `value`.
pub fn find<T: PartialEq + Sync>(data: &[T], value: &T) -> Option<usize> {
    find_impl(data, &|x| x == value)
}

/// Position of the first element satisfying `pred`.
pub fn find_if<T: Sync>(data: &[T], pred: impl Fn(&T) -> bool + Sync) -> Option<usize> {
    find_impl(data, &pred)
}

/// Position of the first element *not* satisfying `pred`.
pub fn find_if_not<T: Sync>(data: &[T], pred: impl Fn(&T) -> bool + Sync) -> Option<usize> {
    find_impl(data, &|x| !pred(x))
}

/// Position of the first element of `data` that equals any element of
/// `candidates`.
pub fn find_first_of<T: PartialEq + Sync>(data: &[T], candidates: &[T]) -> Option<usize> {
    find_impl(data, &|x| candidates.contains(x))
}

/// `find`'s forward-only counterpart: works over any iterator cheap enough
/// to checkpoint by cloning, rather than requiring O(1) indexing. Returns
/// the checkpoint iterator positioned at the first match, since a
/// forward-only range has no index to hand back on its own.
///
/// Uses a [`LockedTracker`] rather than [`IndexTracker`]: the winning
/// position here is a checkpoint of `I`, not a `u32`-packable slice index.
pub fn find_iter<I>(iter: I, value: &I::Item) -> Option<I>
where
    I: ExactSizeIterator + Clone + Sync + Send,
    I::Item: PartialEq + Sync,
{
    let n = iter.len();
    let chunks = chunks_min_fraction_1(n);
    let serial = |mut it: I| -> Option<I> {
        loop {
            let candidate = it.clone();
            match it.next() {
                Some(x) if x == *value => return Some(candidate),
                Some(_) => continue,
                None => return None,
            }
        }
    };
    if chunks <= 1 {
        return serial(iter);
    }
    let partition = match ForwardPartition::new(iter.clone(), n, chunks) {
        Ok(p) => p,
        Err(_) => return serial(iter),
    };
    let tracker: LockedTracker<I> = LockedTracker::new(Direction::Min);
    parallel_for(chunks, chunks, |i| {
        let chunk_idx = i as u32;
        if tracker.already_beaten(chunk_idx) {
            return;
        }
        let (mut it, len) = partition.at(i);
        for _ in 0..len {
            let candidate = it.clone();
            match it.next() {
                Some(x) if x == *value => {
                    tracker.report(chunk_idx, candidate);
                    return;
                }
                _ => {}
            }
        }
    });
    tracker.get().map(|(_, pos)| pos)
}

/// Position of the start of the last occurrence of `needle` in `data`.
///
/// Partitions the valid start positions `0..=data.len() - needle.len()`.
/// Each chunk keeps only the *last* match within its own sub-range and
/// reports it to a `Max` tracker keyed by chunk index — so if two chunks
/// both contain a match, the higher-indexed chunk wins, but only after
/// first collapsing to the last match *inside* that chunk. Because chunks
/// are contiguous and non-overlapping this reproduces the serial "last
/// match overall", but the collapse-then-compare order must not be
/// reassociated.
pub fn find_end<T: PartialEq + Sync>(data: &[T], needle: &[T]) -> Option<usize> {
    if needle.is_empty() || needle.len() > data.len() {
        return if needle.is_empty() { Some(data.len()) } else { None };
    }
    let start_count = data.len() - needle.len() + 1;
    let (partition, chunks) = chunks_for(start_count);
    let matches_at = |start: usize| data[start..start + needle.len()] == *needle;
    if chunks <= 1 {
        return (0..start_count).rev().find(|&s| matches_at(s));
    }
    let tracker = IndexTracker::new(Direction::Max);
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        if let Some(offset) = (b.start..b.end).rev().find(|&s| matches_at(s)) {
            tracker.report(i as u32, offset as u32);
        }
    });
    tracker.get().map(|(_, pos)| pos as usize)
}

/// Position of the start of the first occurrence of `needle` in `data`.
pub fn search<T: PartialEq + Sync>(data: &[T], needle: &[T]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > data.len() {
        return None;
    }
    let start_count = data.len() - needle.len() + 1;
    let (partition, chunks) = chunks_for(start_count);
    let matches_at = |start: usize| data[start..start + needle.len()] == *needle;
    if chunks <= 1 {
        return (0..start_count).find(|&s| matches_at(s));
    }
    let tracker = IndexTracker::new(Direction::Min);
    parallel_for(chunks, chunks, |i| {
        let chunk_idx = i as u32;
        if tracker.already_beaten(chunk_idx) {
            return;
        }
        let b = partition.at(i);
        if let Some(offset) = (b.start..b.end).find(|&s| matches_at(s)) {
            tracker.report(chunk_idx, offset as u32);
        }
    });
    tracker.get().map(|(_, pos)| pos as usize)
}

/// Position of the first run of `count` consecutive elements equal to
/// `value`.
pub fn search_n<T: PartialEq + Sync>(data: &[T], count: usize, value: &T) -> Option<usize> {
    if count == 0 {
        return Some(0);
    }
    if count > data.len() {
        return None;
    }
    let start_count = data.len() - count + 1;
    let matches_at = |start: usize| data[start..start + count].iter().all(|x| x == value);
    let (partition, chunks) = chunks_for(start_count);
    if chunks <= 1 {
        return (0..start_count).find(|&s| matches_at(s));
    }
    let tracker = IndexTracker::new(Direction::Min);
    parallel_for(chunks, chunks, |i| {
        let chunk_idx = i as u32;
        if tracker.already_beaten(chunk_idx) {
            return;
        }
        let b = partition.at(i);
        if let Some(offset) = (b.start..b.end).find(|&s| matches_at(s)) {
            tracker.report(chunk_idx, offset as u32);
        }
    });
    tracker.get().map(|(_, pos)| pos as usize)
}

/// Position of the first adjacent pair satisfying `pred`.
pub fn adjacent_find<T: Sync>(data: &[T], pred: impl Fn(&T, &T) -> bool + Sync) -> Option<usize> {
    if data.len() < 2 {
        return None;
    }
    let pairs = data.len() - 1;
    let (partition, chunks) = chunks_for(pairs);
    if chunks <= 1 {
        return (0..pairs).find(|&i| pred(&data[i], &data[i + 1]));
    }
    let tracker = IndexTracker::new(Direction::Min);
    parallel_for(chunks, chunks, |i| {
        let chunk_idx = i as u32;
        if tracker.already_beaten(chunk_idx) {
            return;
        }
        let b = partition.at(i);
        if let Some(offset) = (b.start..b.end).find(|&k| pred(&data[k], &data[k + 1])) {
            tracker.report(chunk_idx, offset as u32);
        }
    });
    tracker.get().map(|(_, pos)| pos as usize)
}

/// First index where `a` and `b` differ under `pred`, and length-based
/// fallback when one range is a strict prefix of the other.
pub fn mismatch<T: Sync>(a: &[T], b: &[T], pred: impl Fn(&T, &T) -> bool + Sync) -> Option<usize> {
    let n = a.len().min(b.len());
    let (partition, chunks) = chunks_for(n);
    let differs = |i: usize| !pred(&a[i], &b[i]);
    if chunks <= 1 {
        return (0..n).find(|&i| differs(i));
    }
    let tracker = IndexTracker::new(Direction::Min);
    parallel_for(chunks, chunks, |i| {
        let chunk_idx = i as u32;
        if tracker.already_beaten(chunk_idx) {
            return;
        }
        let bnd = partition.at(i);
        if let Some(offset) = (bnd.start..bnd.end).find(|&k| differs(k)) {
            tracker.report(chunk_idx, offset as u32);
        }
    });
    tracker.get().map(|(_, pos)| pos as usize)
}

/// True if `a` and `b` have equal length and every matched pair satisfies
/// `pred`.
pub fn equal<T: Sync>(a: &[T], b: &[T], pred: impl Fn(&T, &T) -> bool + Sync) -> bool {
    if a.len() != b.len() {
        return false;
    }
    mismatch(a, b, pred).is_none()
}

// --------------------------------------------------------------- is_sorted

/// True if `data` is sorted under `cmp` (non-decreasing).
pub fn is_sorted<T: Sync>(data: &[T], cmp: impl Fn(&T, &T) -> Ordering + Sync) -> bool {
    is_sorted_until(data, cmp) == data.len()
}

/// Returns the position of the first element that breaks sortedness, or
/// `data.len()` if the whole range is sorted.
pub fn is_sorted_until<T: Sync>(data: &[T], cmp: impl Fn(&T, &T) -> Ordering + Sync) -> usize {
    if data.len() < 2 {
        return data.len();
    }
    let pairs = data.len() - 1;
    let (partition, chunks) = chunks_for(pairs);
    let breaks = |i: usize| cmp(&data[i + 1], &data[i]) == Ordering::Less;
    if chunks <= 1 {
        return (0..pairs).find(|&i| breaks(i)).map_or(data.len(), |i| i + 1);
    }
    let tracker = IndexTracker::new(Direction::Min);
    parallel_for(chunks, chunks, |i| {
        let chunk_idx = i as u32;
        if tracker.already_beaten(chunk_idx) {
            return;
        }
        let b = partition.at(i);
        if let Some(offset) = (b.start..b.end).find(|&k| breaks(k)) {
            tracker.report(chunk_idx, offset as u32);
        }
    });
    tracker.get().map_or(data.len(), |(_, pos)| pos as usize + 1)
}

// ------------------------------------------------------------ is_partitioned

const NEVER: i64 = i64::MAX;

/// True if every element satisfying `pred` precedes every element that
/// doesn't — i.e. `data` could have been produced by `partition`.
///
/// Implemented with the two-atomic protocol from the design: `right_true`
/// tracks the highest chunk that ended on an unbroken run of `pred`-true
/// elements, `left_false` tracks the lowest chunk that began with a run of
/// `pred`-false elements. A chunk containing a true element *after* a false
/// element (`broken`) forces `right_true` to `NEVER`, which can never be
/// `<=` a real `left_false`, invalidating the whole range.
pub fn is_partitioned<T: Sync>(data: &[T], pred: impl Fn(&T) -> bool + Sync) -> bool {
    let n = data.len();
    let (partition, chunks) = chunks_for(n);
    let classify = |chunk: &[T]| -> (bool, bool, bool) {
        if chunk.is_empty() {
            return (false, false, false);
        }
        let starts_false = !pred(&chunk[0]);
        let ends_true = pred(chunk.last().unwrap());
        let mut seen_false = false;
        let mut broken = false;
        for x in chunk {
            if pred(x) {
                if seen_false {
                    broken = true;
                    break;
                }
            } else {
                seen_false = true;
            }
        }
        (starts_false, ends_true, broken)
    };
    if chunks <= 1 {
        let (_, _, broken) = classify(data);
        return !broken;
    }
    let right_true = AtomicI64::new(-1);
    let left_false = AtomicI64::new(NEVER);
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        let (starts_false, ends_true, broken) = classify(&data[b.start..b.end]);
        if broken {
            right_true.fetch_max(NEVER, AtomicOrdering::Relaxed);
        } else if ends_true {
            right_true.fetch_max(i as i64, AtomicOrdering::Relaxed);
        }
        if starts_false {
            left_false.fetch_min(i as i64, AtomicOrdering::Relaxed);
        }
    });
    right_true.load(AtomicOrdering::Relaxed) <= left_false.load(AtomicOrdering::Relaxed)
}

// --------------------------------------------------------- min/max/minmax

fn local_extremum<T>(chunk: &[T], start: usize, cmp: &(impl Fn(&T, &T) -> Ordering + Sync), want_last_on_tie: bool) -> usize {
    let mut best = 0usize;
    for (k, x) in chunk.iter().enumerate().skip(1) {
        let ord = cmp(x, &chunk[best]);
        let better = if want_last_on_tie {
            ord != Ordering::Less
        } else {
            ord == Ordering::Greater
        };
        if better {
            best = k;
        }
    }
    start + best
}

/// Position of the smallest element (first occurrence on ties).
pub fn min_element<T: Sync>(data: &[T], cmp: impl Fn(&T, &T) -> Ordering + Sync) -> Option<usize> {
    if data.is_empty() {
        return None;
    }
    let (partition, chunks) = chunks_for(data.len());
    let rev = |a: &T, b: &T| cmp(a, b).reverse();
    if chunks <= 1 {
        return Some(local_extremum(data, 0, &rev, false));
    }
    let locals: Vec<usize> = {
        let mut v: Vec<std::sync::Mutex<Option<usize>>> = (0..chunks).map(|_| std::sync::Mutex::new(None)).collect();
        parallel_for(chunks, chunks, |i| {
            let b = partition.at(i);
            let idx = local_extremum(&data[b.start..b.end], b.start, &rev, false);
            *v[i].lock().unwrap() = Some(idx);
        });
        v.into_iter().map(|m| m.into_inner().unwrap().unwrap()).collect()
    };
    let mut best = locals[0];
    for &idx in &locals[1..] {
        if cmp(&data[idx], &data[best]) == Ordering::Less {
            best = idx;
        }
    }
    Some(best)
}

/// Position of the largest element (first occurrence on ties).
pub fn max_element<T: Sync>(data: &[T], cmp: impl Fn(&T, &T) -> Ordering + Sync) -> Option<usize> {
    if data.is_empty() {
        return None;
    }
    let (partition, chunks) = chunks_for(data.len());
    if chunks <= 1 {
        return Some(local_extremum(data, 0, &cmp, false));
    }
    let locals: Vec<usize> = {
        let mut v: Vec<std::sync::Mutex<Option<usize>>> = (0..chunks).map(|_| std::sync::Mutex::new(None)).collect();
        parallel_for(chunks, chunks, |i| {
            let b = partition.at(i);
            let idx = local_extremum(&data[b.start..b.end], b.start, &cmp, false);
            *v[i].lock().unwrap() = Some(idx);
        });
        v.into_iter().map(|m| m.into_inner().unwrap().unwrap()).collect()
    };
    let mut best = locals[0];
    for &idx in &locals[1..] {
        if cmp(&data[idx], &data[best]) == Ordering::Greater {
            best = idx;
        }
    }
    Some(best)
}

/// `(min, max)` positions. The minimum keeps the first occurrence on ties;
/// the maximum keeps the *last* occurrence on ties — this asymmetry matches
/// the serial standard's `minmax_element`, which is not simply
/// `(min_element, max_element)` zipped together.
pub fn minmax_element<T: Sync>(data: &[T], cmp: impl Fn(&T, &T) -> Ordering + Sync) -> Option<(usize, usize)> {
    if data.is_empty() {
        return None;
    }
    let (partition, chunks) = chunks_for(data.len());
    let rev = |a: &T, b: &T| cmp(a, b).reverse();
    if chunks <= 1 {
        return Some((local_extremum(data, 0, &rev, false), local_extremum(data, 0, &cmp, true)));
    }
    let locals: Vec<(usize, usize)> = {
        let mut v: Vec<std::sync::Mutex<Option<(usize, usize)>>> = (0..chunks).map(|_| std::sync::Mutex::new(None)).collect();
        parallel_for(chunks, chunks, |i| {
            let b = partition.at(i);
            let chunk = &data[b.start..b.end];
            let lo = local_extremum(chunk, b.start, &rev, false);
            let hi = local_extremum(chunk, b.start, &cmp, true);
            *v[i].lock().unwrap() = Some((lo, hi));
        });
        v.into_iter().map(|m| m.into_inner().unwrap().unwrap()).collect()
    };
    let mut best_min = locals[0].0;
    let mut best_max = locals[0].1;
    for &(lo, hi) in &locals[1..] {
        if cmp(&data[lo], &data[best_min]) == Ordering::Less {
            best_min = lo;
        }
        if cmp(&data[hi], &data[best_max]) != Ordering::Less {
            best_max = hi;
        }
    }
    Some((best_min, best_max))
}

// ------------------------------------------------------- lexicographical

/// Lexicographic comparison of `a` and `b` under `cmp`.
pub fn lexicographical_compare<T: Sync>(a: &[T], b: &[T], cmp: impl Fn(&T, &T) -> Ordering + Sync) -> Ordering {
    let n = a.len().min(b.len());
    let (partition, chunks) = chunks_for(n);
    let differs_at = |i: usize| cmp(&a[i], &b[i]) != Ordering::Equal;
    let first_diff = if chunks <= 1 {
        (0..n).find(|&i| differs_at(i))
    } else {
        let tracker = IndexTracker::new(Direction::Min);
        parallel_for(chunks, chunks, |i| {
            let chunk_idx = i as u32;
            if tracker.already_beaten(chunk_idx) {
                return;
            }
            let bnd = partition.at(i);
            if let Some(offset) = (bnd.start..bnd.end).find(|&k| differs_at(k)) {
                tracker.report(chunk_idx, offset as u32);
            }
        });
        tracker.get().map(|(_, pos)| pos as usize)
    };
    match first_diff {
        Some(i) => cmp(&a[i], &b[i]),
        None => a.len().cmp(&b.len()),
    }
}
