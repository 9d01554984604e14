//! The parallel execution fabric: hardware-thread probing, the bulk
//! parallel-for primitive, fire-and-forget dispatch, and scoped task groups.
//!
//! Every bulk algorithm in [`crate::ops`] is built on top of [`parallel_for`],
//! which itself dispatches each worker via [`dispatch_async`]. `sort`,
//! `stable_sort`, and `merge` drive their own work-stealing deques, but stand
//! their worker pools up through [`with_task_group`]/[`TaskGroup`] rather than
//! a raw `std::thread::scope`, so the group's `wait()` is the one place each
//! algorithm's final aggregation blocks on every worker. None of this module
//! is visible outside the crate: the fabric is plumbing, not public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Oversubscription factor used by most bulk algorithms.
pub(crate) const CHUNKS_PER_CPU: usize = 8;
/// Below this length, sort/stable_sort fall back to serial insertion sort.
pub(crate) const INSERTION_SORT_LIMIT: usize = 32;
/// Below this combined length, a merge sub-problem runs serially.
pub(crate) const MERGE_PARALLEL_LIMIT: usize = 8192;

static MAX_HW_THREADS: OnceLock<usize> = OnceLock::new();

/// Returns the cached hardware-thread count, probed once and reused for the
/// lifetime of the process.
///
/// Honors the `PSTD_PAR_MAX_THREADS` environment variable as a test/
/// benchmark override; this is the library's only configuration surface.
pub(crate) fn max_hw_threads() -> usize {
    *MAX_HW_THREADS.get_or_init(|| {
        if let Ok(v) = std::env::var("PSTD_PAR_MAX_THREADS") {
            if let Ok(n) = v.parse::<usize>() {
                if n > 0 {
                    return n;
                }
            }
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

/// `min(hw_threads * CHUNKS_PER_CPU, n)` — used when per-chunk overhead is
/// low and a chunk may legitimately hold a single element.
pub(crate) fn chunks_min_fraction_1(n: usize) -> usize {
    (max_hw_threads() * CHUNKS_PER_CPU).min(n)
}

/// `min(hw_threads * CHUNKS_PER_CPU, n / 2)` — used when each chunk must
/// hold at least two elements (reductions without an identity, extremum
/// search, ...).
pub(crate) fn chunks_min_fraction_2(n: usize) -> usize {
    (max_hw_threads() * CHUNKS_PER_CPU).min(n / 2)
}

/// Submits `f` for asynchronous execution on the fabric and returns
/// immediately: there is no handle, no completion signal, and no way to
/// learn whether `f` panicked. The only guarantee is that `f` runs to
/// completion (or panics) before the enclosing `scope` returns.
pub(crate) fn dispatch_async<'scope, 'env, F>(scope: &'scope std::thread::Scope<'scope, 'env>, f: F)
where
    F: FnOnce() + Send + 'scope,
{
    scope.spawn(f);
}

/// A scoped group of dispatched tasks. `dispatch` fires a task tagged to the
/// group; `wait` blocks until every task dispatched so far has completed.
/// Unlike [`dispatch_async`], the group tracks each task's handle so `wait`
/// can surface (and swallow) a worker panic instead of silently losing it.
pub(crate) struct TaskGroup<'scope, 'env> {
    scope: &'scope std::thread::Scope<'scope, 'env>,
    handles: Vec<std::thread::ScopedJoinHandle<'scope, ()>>,
}

impl<'scope, 'env> TaskGroup<'scope, 'env> {
    fn new(scope: &'scope std::thread::Scope<'scope, 'env>) -> Self {
        Self { scope, handles: Vec::new() }
    }

    /// Dispatches `f` to this group. Multiple dispatches may be issued
    /// before `wait`.
    pub(crate) fn dispatch<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'scope,
    {
        self.handles.push(self.scope.spawn(f));
    }

    /// Blocks until every task dispatched to this group so far has
    /// completed. A task that panicked is reported via `tracing` (when the
    /// feature is enabled); the panic itself still propagates once the
    /// enclosing scope exits, the same as any other scoped thread.
    pub(crate) fn wait(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                #[cfg(feature = "tracing")]
                tracing::error!("a task dispatched to this group panicked");
            }
        }
    }
}

/// Opens a scope, hands the caller a [`TaskGroup`] to dispatch into, and
/// joins every remaining task once `f` returns — the destructor-releases-
/// resources half of the task-group contract, expressed as scope exit rather
/// than `Drop`, since a `Drop` impl can't borrow the `'scope` it needs.
pub(crate) fn with_task_group<'env, R>(f: impl for<'scope> FnOnce(&mut TaskGroup<'scope, 'env>) -> R) -> R {
    std::thread::scope(|scope| {
        let mut group = TaskGroup::new(scope);
        f(&mut group)
    })
}

/// Invokes `f(i)` for every `i` in `[0, iterations)`, blocking until every
/// invocation has completed. Ordering across `i` is unspecified; the degree
/// of parallelism is implementation-chosen (bounded by the hardware-thread
/// count) and some iterations may run on the calling thread.
///
/// This is the crate's "bulk parallel-for": reductions, scans, element-wise
/// operations, predicate searches, and uninitialized-memory construction all
/// partition their range and drive each chunk through one call here. Each
/// worker is fired via [`dispatch_async`]: no individual worker's completion
/// matters on its own, only that all of them are done by the time the
/// enclosing scope returns.
pub(crate) fn parallel_for<F>(iterations: usize, chunks: usize, f: F)
where
    F: Fn(usize) + Sync,
{
    if iterations == 0 {
        return;
    }
    if chunks <= 1 {
        for i in 0..iterations {
            f(i);
        }
        return;
    }
    let next = AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for _ in 0..chunks.min(iterations) {
            dispatch_async(scope, || loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                if i >= iterations {
                    break;
                }
                f(i);
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn parallel_for_visits_every_index_once() {
        let n = 10_000;
        let seen = (0..n).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>();
        parallel_for(n, chunks_min_fraction_1(n), |i| {
            seen[i].fetch_add(1, Ordering::Relaxed);
        });
        assert!(seen.iter().all(|c| c.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn parallel_for_serial_path_runs_in_order_context() {
        let total = AtomicU64::new(0);
        parallel_for(100, 1, |i| {
            total.fetch_add(i as u64, Ordering::Relaxed);
        });
        assert_eq!(total.load(Ordering::Relaxed), (0..100u64).sum());
    }

    #[test]
    fn max_hw_threads_is_at_least_one() {
        assert!(max_hw_threads() >= 1);
    }

    #[test]
    fn task_group_waits_for_every_dispatch() {
        let total = AtomicU64::new(0);
        with_task_group(|group| {
            for i in 0..50u64 {
                let total = &total;
                group.dispatch(move || {
                    total.fetch_add(i, Ordering::Relaxed);
                });
            }
            group.wait();
            assert_eq!(total.load(Ordering::Relaxed), (0..50u64).sum());
        });
    }

    // `std::thread::scope` re-propagates a spawned thread's panic once the
    // scope itself exits, even though `wait` already joined the handle and
    // logged it — this documents that `wait` reports the panic, it doesn't
    // suppress it.
    #[test]
    #[should_panic(expected = "intentional")]
    fn task_group_wait_reports_but_does_not_suppress_a_panicking_task() {
        with_task_group(|group| {
            group.dispatch(|| panic!("intentional"));
            group.wait();
        });
    }
}
