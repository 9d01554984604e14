//! Parallel introspective quicksort: §4.8 of the design.
//!
//! One Chase–Lev deque per worker. Worker 0 starts with the whole range at
//! depth `2*ceil(log2(N))`; every other worker starts idle and steals. A
//! task that bottoms out (insertion sort, heapsort, or an allocation
//! failure pushing a sub-range) credits its full length to that worker's
//! done counter; a three-way partition credits only the pivot-equal middle,
//! since the two unsorted sides are credited later when they themselves
//! become base cases. Workers exit once every counter sums to `N`.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use crossbeam_utils::CachePadded;

use crate::deque::Deque;
use crate::error::try_vec_with_capacity;
use crate::fabric::{max_hw_threads, with_task_group, INSERTION_SORT_LIMIT};

use super::primitives::{ceil_log2, heapsort, insertion_sort, three_way_partition};

#[derive(Clone, Copy)]
struct Task {
    first: usize,
    last: usize,
    depth: u32,
}

/// Sorts `data` in place under `cmp`. Not stable: equal elements may be
/// reordered relative to each other.
pub fn sort<T: Send>(data: &mut [T], cmp: impl Fn(&T, &T) -> Ordering + Sync) {
    let n = data.len();
    if n <= INSERTION_SORT_LIMIT {
        insertion_sort(data, &cmp);
        return;
    }
    let num_workers = max_hw_threads().max(1);
    if num_workers <= 1 {
        serial_introsort(data, &cmp);
        return;
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(n, num_workers, "starting parallel introsort pool");
    if try_run_parallel(data, &cmp, num_workers).is_none() {
        #[cfg(feature = "tracing")]
        tracing::warn!(n, "parallel introsort pool unavailable, falling back to serial");
        serial_introsort(data, &cmp);
    }
}

fn serial_introsort<T>(data: &mut [T], cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) {
    serial_introsort_depth(data, cmp, 2 * ceil_log2(data.len().max(1)));
}

fn serial_introsort_depth<T>(data: &mut [T], cmp: &(impl Fn(&T, &T) -> Ordering + Sync), depth: u32) {
    if data.len() <= INSERTION_SORT_LIMIT {
        insertion_sort(data, cmp);
        return;
    }
    if depth == 0 {
        heapsort(data, cmp);
        return;
    }
    let (lo, hi) = three_way_partition(data, cmp);
    let (left, rest) = data.split_at_mut(lo);
    let (_equal, right) = rest.split_at_mut(hi - lo);
    serial_introsort_depth(left, cmp, depth - 1);
    serial_introsort_depth(right, cmp, depth - 1);
}

/// Builds the worker pool and drives it to completion. Returns `None` if
/// any allocation needed just to *start* the pool (the deques themselves)
/// fails, signalling the caller to fall back entirely to [`serial_introsort`].
fn try_run_parallel<T: Send>(
    data: &mut [T],
    cmp: &(impl Fn(&T, &T) -> Ordering + Sync),
    num_workers: usize,
) -> Option<()> {
    let mut deques: Vec<Deque<Task>> = try_vec_with_capacity(num_workers).ok()?;
    for _ in 0..num_workers {
        deques.push(Deque::new().ok()?);
    }
    let done: Vec<CachePadded<AtomicUsize>> = (0..num_workers).map(|_| CachePadded::new(AtomicUsize::new(0))).collect();
    let n = data.len();
    let depth = 2 * ceil_log2(n);
    deques[0]
        .push_bottom(Task { first: 0, last: n, depth })
        .ok()?;

    let data_ptr = data.as_mut_ptr() as usize;
    with_task_group(|group| {
        for worker in 0..num_workers {
            let deques = &deques;
            let done = &done;
            group.dispatch(move || {
                worker_loop(worker, num_workers, data_ptr, n, cmp, deques, done);
            });
        }
        group.wait();
    });
    Some(())
}

fn total_done(done: &[CachePadded<AtomicUsize>]) -> usize {
    done.iter().map(|c| c.load(AtomicOrdering::Relaxed)).sum()
}

fn steal_from_others(id: usize, num_workers: usize, deques: &[Deque<Task>]) -> Option<Task> {
    for offset in 1..num_workers {
        let victim = (id + offset) % num_workers;
        if let Some(task) = deques[victim].steal_top() {
            return Some(task);
        }
    }
    None
}

fn worker_loop<T: Send>(
    id: usize,
    num_workers: usize,
    data_ptr: usize,
    n: usize,
    cmp: &(impl Fn(&T, &T) -> Ordering + Sync),
    deques: &[Deque<Task>],
    done: &[CachePadded<AtomicUsize>],
) {
    loop {
        if total_done(done) >= n {
            return;
        }
        let task = deques[id].pop_bottom().or_else(|| steal_from_others(id, num_workers, deques));
        match task {
            Some(task) => process_task(id, data_ptr, task, cmp, deques, done),
            None => {
                if total_done(done) >= n {
                    return;
                }
                std::thread::yield_now();
            }
        }
    }
}

fn process_task<T: Send>(
    id: usize,
    data_ptr: usize,
    mut task: Task,
    cmp: &(impl Fn(&T, &T) -> Ordering + Sync),
    deques: &[Deque<Task>],
    done: &[CachePadded<AtomicUsize>],
) {
    loop {
        let len = task.last - task.first;
        // Safety: every task in flight owns a disjoint `[first, last)`
        // sub-range of the original slice; the partition below only ever
        // produces further disjoint sub-ranges of this one.
        let slice = unsafe { std::slice::from_raw_parts_mut((data_ptr as *mut T).add(task.first), len) };
        if len <= INSERTION_SORT_LIMIT {
            insertion_sort(slice, cmp);
            done[id].fetch_add(len, AtomicOrdering::Relaxed);
            return;
        }
        if task.depth == 0 {
            heapsort(slice, cmp);
            done[id].fetch_add(len, AtomicOrdering::Relaxed);
            return;
        }
        let (lo, hi) = three_way_partition(slice, cmp);
        done[id].fetch_add(hi - lo, AtomicOrdering::Relaxed);

        let left = Task { first: task.first, last: task.first + lo, depth: task.depth - 1 };
        let right = Task { first: task.first + hi, last: task.last, depth: task.depth - 1 };
        let (larger, smaller) = if (left.last - left.first) >= (right.last - right.first) {
            (left, right)
        } else {
            (right, left)
        };

        if larger.last > larger.first {
            if deques[id].push_bottom(larger).is_err() {
                // No room to grow the local deque: finish the larger side
                // serially right here rather than losing the work.
                let larger_len = larger.last - larger.first;
                let larger_slice =
                    unsafe { std::slice::from_raw_parts_mut((data_ptr as *mut T).add(larger.first), larger_len) };
                serial_introsort_depth(larger_slice, cmp, larger.depth);
                done[id].fetch_add(larger_len, AtomicOrdering::Relaxed);
            }
        }

        if smaller.last <= smaller.first {
            return;
        }
        task = smaller;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_matches_std_sort_for_many_sizes() {
        for n in [0usize, 1, 2, 31, 32, 33, 1000, 50_000] {
            let mut data: Vec<i64> = (0..n as i64).map(|i| (i * 2654435761u64 as i64) % 9973).collect();
            let mut expected = data.clone();
            expected.sort();
            sort(&mut data, i64::cmp);
            assert_eq!(data, expected, "n={n}");
        }
    }

    #[test]
    fn sort_handles_many_duplicate_keys() {
        let mut data: Vec<i32> = (0..20_000).map(|i| i % 7).collect();
        sort(&mut data, i32::cmp);
        assert!(data.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn spec_example_sorts_correctly() {
        let mut data = vec![3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5];
        sort(&mut data, i32::cmp);
        assert_eq!(data, vec![1, 1, 2, 3, 3, 4, 5, 5, 5, 6, 9]);
    }
}
