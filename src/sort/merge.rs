//! Parallel stable k-way merge via recursive bisection: §4.9 of the design.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use crossbeam_utils::CachePadded;

use crate::deque::Deque;
use crate::error::try_vec_with_capacity;
use crate::fabric::{max_hw_threads, with_task_group, MERGE_PARALLEL_LIMIT};

/// First index `i` in `data` with `!(data[i] < value)`, i.e. `data[i] >= value`.
fn lower_bound<T>(data: &[T], value: &T, cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) -> usize {
    let (mut lo, mut hi) = (0usize, data.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if cmp(&data[mid], value) == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// First index `j` in `data` with `value < data[j]`, i.e. the count of
/// elements `<= value`.
fn upper_bound<T>(data: &[T], value: &T, cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) -> usize {
    let (mut lo, mut hi) = (0usize, data.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if cmp(value, &data[mid]) == Ordering::Less {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

/// Merges `a` and `b` into `out`, keeping `a`'s elements before `b`'s on
/// ties (stability).
pub(crate) fn serial_merge<T: Clone>(a: &[T], b: &[T], out: &mut [T], cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) {
    debug_assert_eq!(a.len() + b.len(), out.len());
    let (mut i, mut j, mut k) = (0usize, 0usize, 0usize);
    while i < a.len() && j < b.len() {
        if cmp(&b[j], &a[i]) == Ordering::Less {
            out[k] = b[j].clone();
            j += 1;
        } else {
            out[k] = a[i].clone();
            i += 1;
        }
        k += 1;
    }
    out[k..k + (a.len() - i)].clone_from_slice(&a[i..]);
    k += a.len() - i;
    out[k..k + (b.len() - j)].clone_from_slice(&b[j..]);
}

/// Split point `(mid_a, mid_b)` for a bisection step: picks the midpoint of
/// whichever input is longer and locates its stable partner in the other.
fn bisect<T>(a: &[T], b: &[T], cmp: &(impl Fn(&T, &T) -> Ordering + Sync)) -> (usize, usize) {
    if a.len() >= b.len() {
        let mid_a = a.len() / 2;
        let mid_b = lower_bound(b, &a[mid_a], cmp);
        (mid_a, mid_b)
    } else {
        let mid_b = b.len() / 2;
        let mid_a = upper_bound(a, &b[mid_b], cmp);
        (mid_a, mid_b)
    }
}

#[derive(Clone, Copy)]
struct Task {
    a1: usize,
    a2: usize,
    b1: usize,
    b2: usize,
    out_first: usize,
}

/// Merges sorted `a` and `b` into `out`, keeping `a`'s elements before `b`'s
/// on ties.
pub fn merge<T: Clone + Send + Sync>(a: &[T], b: &[T], out: &mut [T], cmp: impl Fn(&T, &T) -> Ordering + Sync) {
    debug_assert_eq!(a.len() + b.len(), out.len());
    let total = a.len() + b.len();
    if total <= MERGE_PARALLEL_LIMIT {
        serial_merge(a, b, out, &cmp);
        return;
    }
    let num_workers = max_hw_threads().max(1);
    if num_workers <= 1 {
        serial_merge(a, b, out, &cmp);
        return;
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(total, num_workers, "starting parallel merge pool");
    if try_run_parallel(a, b, out, &cmp, num_workers).is_none() {
        #[cfg(feature = "tracing")]
        tracing::warn!(total, "parallel merge pool unavailable, falling back to serial");
        serial_merge(a, b, out, &cmp);
    }
}

fn try_run_parallel<T: Send + Sync + Clone>(
    a: &[T],
    b: &[T],
    out: &mut [T],
    cmp: &(impl Fn(&T, &T) -> Ordering + Sync),
    num_workers: usize,
) -> Option<()> {
    let mut deques: Vec<Deque<Task>> = try_vec_with_capacity(num_workers).ok()?;
    for _ in 0..num_workers {
        deques.push(Deque::new().ok()?);
    }
    let done: Vec<CachePadded<AtomicUsize>> = (0..num_workers).map(|_| CachePadded::new(AtomicUsize::new(0))).collect();
    let n = a.len() + b.len();
    deques[0]
        .push_bottom(Task { a1: 0, a2: a.len(), b1: 0, b2: b.len(), out_first: 0 })
        .ok()?;

    let a_ptr = a.as_ptr() as usize;
    let b_ptr = b.as_ptr() as usize;
    let out_ptr = out.as_mut_ptr() as usize;
    with_task_group(|group| {
        for worker in 0..num_workers {
            let deques = &deques;
            let done = &done;
            group.dispatch(move || {
                worker_loop(worker, num_workers, a_ptr, a.len(), b_ptr, b.len(), out_ptr, n, cmp, deques, done);
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

#[allow(clippy::too_many_arguments)]
fn worker_loop<T: Send + Sync + Clone>(
    id: usize,
    num_workers: usize,
    a_ptr: usize,
    a_len: usize,
    b_ptr: usize,
    b_len: usize,
    out_ptr: usize,
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
            Some(task) => process_task(id, a_ptr, a_len, b_ptr, b_len, out_ptr, task, cmp, deques, done),
            None => {
                if total_done(done) >= n {
                    return;
                }
                std::thread::yield_now();
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn process_task<T: Send + Sync + Clone>(
    id: usize,
    a_ptr: usize,
    a_len: usize,
    b_ptr: usize,
    b_len: usize,
    out_ptr: usize,
    mut task: Task,
    cmp: &(impl Fn(&T, &T) -> Ordering + Sync),
    deques: &[Deque<Task>],
    done: &[CachePadded<AtomicUsize>],
) {
    loop {
        let len = (task.a2 - task.a1) + (task.b2 - task.b1);
        // Safety: `a` and `b` are read-only for the whole merge; `out`'s
        // `[out_first, out_first+len)` is owned exclusively by this task,
        // disjoint from every other task's output range.
        let a_slice = unsafe { std::slice::from_raw_parts((a_ptr as *const T).add(task.a1), task.a2 - task.a1) };
        let b_slice = unsafe { std::slice::from_raw_parts((b_ptr as *const T).add(task.b1), task.b2 - task.b1) };
        let out_slice = unsafe { std::slice::from_raw_parts_mut((out_ptr as *mut T).add(task.out_first), len) };
        if len <= MERGE_PARALLEL_LIMIT {
            serial_merge(a_slice, b_slice, out_slice, cmp);
            done[id].fetch_add(len, AtomicOrdering::Relaxed);
            return;
        }

        let (mid_a, mid_b) = bisect(a_slice, b_slice, cmp);
        let left_len = mid_a + mid_b;
        let right = Task {
            a1: task.a1 + mid_a,
            a2: task.a2,
            b1: task.b1 + mid_b,
            b2: task.b2,
            out_first: task.out_first + left_len,
        };
        let left = Task { a1: task.a1, a2: task.a1 + mid_a, b1: task.b1, b2: task.b1 + mid_b, out_first: task.out_first };

        let right_len = (right.a2 - right.a1) + (right.b2 - right.b1);
        if right_len > 0 {
            if deques[id].push_bottom(right).is_err() {
                let r_a = unsafe { std::slice::from_raw_parts((a_ptr as *const T).add(right.a1), right.a2 - right.a1) };
                let r_b = unsafe { std::slice::from_raw_parts((b_ptr as *const T).add(right.b1), right.b2 - right.b1) };
                let r_out = unsafe { std::slice::from_raw_parts_mut((out_ptr as *mut T).add(right.out_first), right_len) };
                serial_merge(r_a, r_b, r_out, cmp);
                done[id].fetch_add(right_len, AtomicOrdering::Relaxed);
            }
        }

        if left.a2 <= left.a1 && left.b2 <= left.b1 {
            let _ = (a_len, b_len); // kept for signature symmetry/debug builds
            return;
        }
        task = left;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_matches_serial_for_many_sizes() {
        for (na, nb) in [(0usize, 0usize), (1, 0), (0, 1), (5, 7), (2000, 3000), (20_000, 1)] {
            let a: Vec<i64> = (0..na as i64).map(|x| x * 2).collect();
            let b: Vec<i64> = (0..nb as i64).map(|x| x * 2 + 1).collect();
            let mut out = vec![0i64; na + nb];
            merge(&a, &b, &mut out, i64::cmp);
            let mut expected: Vec<i64> = a.iter().chain(b.iter()).cloned().collect();
            expected.sort();
            assert_eq!(out, expected, "na={na} nb={nb}");
        }
    }

    #[test]
    fn merge_keeps_first_input_before_second_on_ties() {
        let a = vec![1, 2, 2, 3];
        let b = vec![2, 2, 4];
        let mut out = vec![0; 7];
        merge(&a, &b, &mut out, i32::cmp);
        assert_eq!(out, vec![1, 2, 2, 2, 2, 3, 4]);
    }

    #[test]
    fn spec_examples() {
        let a = vec![1, 3, 5, 7];
        let b = vec![2, 4, 6, 8];
        let mut out = vec![0; 8];
        merge(&a, &b, &mut out, i32::cmp);
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
