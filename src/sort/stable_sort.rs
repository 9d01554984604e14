//! Bottom-up parallel stable mergesort: §4.9 of the design.
//!
//! `N` leaves are carved out by a [`RandomAccessPartition`]; each is sorted
//! serially in place, then merged up a binary tree one level at a time. Every
//! internal node owns one flag: the first worker to arrive at it flips the
//! flag and walks away to claim another leaf, the second to arrive finds the
//! flag already set and performs that level's merge, then keeps climbing.
//! The leaf count is forced to a power of two with an even exponent so that
//! the output of the top merge always lands back in the caller's own buffer
//! rather than the scratch copy.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

use crate::cache_padded::CachePadded;
use crate::error::try_vec_with_capacity;
use crate::fabric::{max_hw_threads, with_task_group, CHUNKS_PER_CPU, INSERTION_SORT_LIMIT};
use crate::partition::RandomAccessPartition;

use super::merge::serial_merge;
use super::primitives::insertion_sort;

const SERIAL_LIMIT: usize = 4 * INSERTION_SORT_LIMIT;

/// Sorts `data` in place under `cmp`, preserving the relative order of
/// elements that compare equal.
pub fn stable_sort<T: Clone + Send + Sync>(data: &mut [T], cmp: impl Fn(&T, &T) -> Ordering + Sync) {
    let n = data.len();
    if n <= SERIAL_LIMIT {
        serial_stable_sort(data, &cmp);
        return;
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(n, "starting parallel stable_sort merge tree");
    if try_run_parallel(data, &cmp).is_none() {
        #[cfg(feature = "tracing")]
        tracing::warn!(n, "parallel stable_sort merge tree unavailable, falling back to serial");
        serial_stable_sort(data, &cmp);
    }
}

pub(crate) fn serial_stable_sort<T: Clone>(data: &mut [T], cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) {
    if data.len() <= INSERTION_SORT_LIMIT {
        insertion_sort(data, cmp);
        return;
    }
    let mut scratch = data.to_vec();
    merge_sort_recursive(data, &mut scratch, cmp);
}

fn merge_sort_recursive<T: Clone>(data: &mut [T], scratch: &mut [T], cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) {
    let n = data.len();
    if n <= INSERTION_SORT_LIMIT {
        insertion_sort(data, cmp);
        return;
    }
    let mid = n / 2;
    {
        let (left, right) = data.split_at_mut(mid);
        let (s_left, s_right) = scratch.split_at_mut(mid);
        merge_sort_recursive(left, s_left, cmp);
        merge_sort_recursive(right, s_right, cmp);
    }
    let (left, right) = data.split_at(mid);
    serial_merge(left, right, scratch, cmp);
    data.clone_from_slice(scratch);
}

/// Height of the merge tree: `log2` of the leaf count, rounded down to an
/// even number so the final merge always lands in the caller's buffer.
fn tree_height(n: usize, num_workers: usize) -> u32 {
    let by_size = (n / INSERTION_SORT_LIMIT).max(1).ilog2();
    let by_workers = (num_workers * CHUNKS_PER_CPU).max(1).ilog2();
    let mut h = by_size.min(by_workers);
    if h % 2 == 1 {
        h -= 1;
    }
    h
}

/// Flat index of the flag guarding the merge of the two level-`level`
/// children into parent `parent` at level `level + 1`.
fn flag_index(level: u32, parent: usize, leaf_count: usize) -> usize {
    let mut offset = 0usize;
    let mut nodes_at_level = leaf_count;
    for _ in 0..level {
        nodes_at_level /= 2;
        offset += nodes_at_level;
    }
    offset + parent
}

fn try_run_parallel<T: Clone + Send + Sync>(data: &mut [T], cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) -> Option<()> {
    let n = data.len();
    let num_workers = max_hw_threads().max(1);
    let h = tree_height(n, num_workers);
    if h == 0 {
        return None;
    }
    let leaf_count = 1usize << h;
    let leaves = RandomAccessPartition::new(n, leaf_count);

    let mut scratch: Vec<T> = try_vec_with_capacity(n).ok()?;
    scratch.extend(data.iter().cloned());
    let mut flags: Vec<AtomicBool> = try_vec_with_capacity(leaf_count).ok()?;
    flags.extend((0..leaf_count).map(|_| AtomicBool::new(false)));

    // Every worker hits these two atomics on every single leaf claim and
    // every climb step; padding them keeps that traffic off the cache line
    // backing the (far colder) per-node flags.
    let next_leaf = CachePadded::new(AtomicUsize::new(0));
    let root_done = CachePadded::new(AtomicBool::new(false));

    let data_ptr = data.as_mut_ptr() as usize;
    let scratch_ptr = scratch.as_mut_ptr() as usize;

    with_task_group(|group| {
        for _ in 0..num_workers {
            let leaves = &leaves;
            let flags = &flags;
            let next_leaf = &next_leaf;
            let root_done = &root_done;
            group.dispatch(move || {
                worker_loop(data_ptr, scratch_ptr, h, leaf_count, leaves, flags, next_leaf, root_done, cmp);
            });
        }
        group.wait();
    });
    Some(())
}

#[allow(clippy::too_many_arguments)]
fn worker_loop<T: Clone + Send + Sync>(
    data_ptr: usize,
    scratch_ptr: usize,
    h: u32,
    leaf_count: usize,
    leaves: &RandomAccessPartition,
    flags: &[AtomicBool],
    next_leaf: &CachePadded<AtomicUsize>,
    root_done: &CachePadded<AtomicBool>,
    cmp: &(impl Fn(&T, &T) -> Ordering + Sync),
) {
    loop {
        if root_done.load(AtomicOrdering::Acquire) {
            return;
        }
        let leaf = next_leaf.fetch_add(1, AtomicOrdering::Relaxed);
        if leaf >= leaf_count {
            if root_done.load(AtomicOrdering::Acquire) {
                return;
            }
            std::thread::yield_now();
            continue;
        }
        let bounds = leaves.at(leaf);
        // Safety: leaf `leaf` owns the disjoint sub-range `[bounds.start,
        // bounds.end)` of `data`; no other worker touches it until this
        // worker later participates in merging it with its sibling.
        let leaf_slice = unsafe { std::slice::from_raw_parts_mut((data_ptr as *mut T).add(bounds.start), bounds.end - bounds.start) };
        serial_stable_sort(leaf_slice, cmp);

        climb(data_ptr, scratch_ptr, h, leaf, leaves, flags, root_done, cmp);
    }
}

#[allow(clippy::too_many_arguments)]
fn climb<T: Clone + Send + Sync>(
    data_ptr: usize,
    scratch_ptr: usize,
    h: u32,
    mut node: usize,
    leaves: &RandomAccessPartition,
    flags: &[AtomicBool],
    root_done: &CachePadded<AtomicBool>,
    cmp: &(impl Fn(&T, &T) -> Ordering + Sync),
) {
    let mut level = 0u32;
    while level < h {
        let parent = node / 2;
        let idx = flag_index(level, parent, leaves.chunks());
        let arrived_first = !flags[idx].swap(true, AtomicOrdering::AcqRel);
        if arrived_first {
            return;
        }

        let leaves_per_child = 1usize << level;
        let first_leaf = parent * 2 * leaves_per_child;
        let mid_leaf = first_leaf + leaves_per_child;
        let last_leaf = first_leaf + 2 * leaves_per_child;
        let abs_start = leaves.at(first_leaf).start;
        let abs_mid = leaves.at(mid_leaf).start;
        let abs_end = leaves.at(last_leaf - 1).end;

        let input_is_data = level % 2 == 0;
        let (input_ptr, output_ptr): (usize, usize) = if input_is_data { (data_ptr, scratch_ptr) } else { (scratch_ptr, data_ptr) };

        // Safety: at level `level` every node's `[abs_start, abs_end)` range
        // is disjoint from every other node at the same level; this worker
        // is the sole owner of this particular merge because it is the
        // second (and only the second) arrival at `idx`.
        let left = unsafe { std::slice::from_raw_parts((input_ptr as *const T).add(abs_start), abs_mid - abs_start) };
        let right = unsafe { std::slice::from_raw_parts((input_ptr as *const T).add(abs_mid), abs_end - abs_mid) };
        let out = unsafe { std::slice::from_raw_parts_mut((output_ptr as *mut T).add(abs_start), abs_end - abs_start) };
        serial_merge(left, right, out, cmp);

        level += 1;
        node = parent;
    }
    root_done.store(true, AtomicOrdering::Release);
}
