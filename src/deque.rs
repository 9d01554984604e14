//! A growable Chase–Lev work-stealing deque.
//!
//! Adapted from the fixed-capacity, indices-only deque in the teacher's
//! worklist module: the owner drives `push_bottom`/`pop_bottom` from the
//! bottom of the array, while any number of thief threads call `steal_top`
//! from the top. Unlike the original, this deque grows its backing array
//! instead of rejecting a push once full, since sort/stable_sort/merge
//! cannot bound a worker's local stack of pending subranges ahead of time.
//!
//! Element type must be `Copy`: the deque stores small task descriptors and
//! never destructs overwritten slots.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{fence, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Result, try_vec_with_capacity};

struct Buffer<T> {
    cells: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
}

// Safety: access to each cell is serialized by the push/pop/steal protocol
// below; a cell is only read by a thief after the owner's release-store of
// `bottom` has made the write visible, and the owner never writes a slot a
// thief still holds a stealable claim on.
unsafe impl<T: Send> Sync for Buffer<T> {}

impl<T: Copy> Buffer<T> {
    fn with_capacity(capacity: usize) -> Result<Self> {
        debug_assert!(capacity.is_power_of_two());
        let mut v: Vec<UnsafeCell<MaybeUninit<T>>> = try_vec_with_capacity(capacity)?;
        for _ in 0..capacity {
            v.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Ok(Self {
            cells: v.into_boxed_slice(),
            mask: capacity - 1,
        })
    }

    #[inline]
    fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    unsafe fn write(&self, index: usize, value: T) {
        (*self.cells[index & self.mask].get()).write(value);
    }

    #[inline]
    unsafe fn read(&self, index: usize) -> T {
        (*self.cells[index & self.mask].get()).assume_init()
    }
}

/// A single worker's deque of pending [task descriptors](crate::sort).
pub(crate) struct Deque<T> {
    top: AtomicUsize,
    bottom: AtomicUsize,
    buffer: Mutex<Arc<Buffer<T>>>,
}

impl<T: Copy> Deque<T> {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            top: AtomicUsize::new(0),
            bottom: AtomicUsize::new(0),
            buffer: Mutex::new(Arc::new(Buffer::with_capacity(32)?)),
        })
    }

    #[inline]
    fn snapshot(&self) -> Arc<Buffer<T>> {
        // Short critical section: the owner may be mid-grow, but the lock
        // is held only long enough to clone the Arc, never for the actual
        // read/write of a slot.
        Arc::clone(&self.buffer.lock().unwrap())
    }

    /// Owner-only. Pushes `v` to the bottom of the deque, growing the
    /// backing array first if it is full.
    pub(crate) fn push_bottom(&self, v: T) -> Result<()> {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Acquire);
        let mut current = self.snapshot();
        if b.wrapping_sub(t) >= current.len() {
            let grown = Buffer::with_capacity(current.len() * 2)?;
            for i in t..b {
                // Safety: `[t, b)` is exactly the live range; no thief can
                // have claimed past `t` without advancing it first.
                unsafe { grown.write(i, current.read(i)) };
            }
            let grown = Arc::new(grown);
            *self.buffer.lock().unwrap() = Arc::clone(&grown);
            current = grown;
        }
        // Safety: slot `b` is owned exclusively by this push until `bottom`
        // is published below.
        unsafe { current.write(b, v) };
        fence(Ordering::Release);
        self.bottom.store(b + 1, Ordering::Release);
        Ok(())
    }

    /// Owner-only. Pops the most recently pushed element, if any.
    pub(crate) fn pop_bottom(&self) -> Option<T> {
        let b = self.bottom.load(Ordering::Relaxed);
        let t0 = self.top.load(Ordering::Acquire);
        if b <= t0 {
            return None;
        }
        let b1 = b - 1;
        self.bottom.store(b1, Ordering::Relaxed);
        fence(Ordering::SeqCst);
        let t = self.top.load(Ordering::Acquire);
        if t > b1 {
            self.bottom.store(b, Ordering::Relaxed);
            return None;
        }
        let buf = self.snapshot();
        // Safety: slot `b1` was written by a prior `push_bottom` and has
        // not yet been reused (capacity never shrinks).
        let x = unsafe { buf.read(b1) };
        if t == b1 {
            if self
                .top
                .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_err()
            {
                self.bottom.store(b, Ordering::Relaxed);
                return None;
            }
            self.bottom.store(b, Ordering::Relaxed);
        }
        Some(x)
    }

    /// Thief-side. Attempts to steal the oldest element; retries on CAS
    /// contention against other thieves or the owner's `pop_bottom`.
    pub(crate) fn steal_top(&self) -> Option<T> {
        loop {
            let t = self.top.load(Ordering::Acquire);
            fence(Ordering::SeqCst);
            let b = self.bottom.load(Ordering::Acquire);
            if t >= b {
                return None;
            }
            let buf = self.snapshot();
            // Safety: the slot at `t` was published by a release-store of
            // `bottom` that happens-before this acquire-load; reading it
            // before the top CAS is a benign speculative read, discarded if
            // the CAS below loses the race.
            let x = unsafe { buf.read(t) };
            if self
                .top
                .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return Some(x);
            }
        }
    }

    /// True once the deque has no more elements to pop or steal, from the
    /// perspective of the calling thread (racy against concurrent pushes).
    pub(crate) fn is_empty(&self) -> bool {
        let b = self.bottom.load(Ordering::Acquire);
        let t = self.top.load(Ordering::Acquire);
        t >= b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Barrier;

    #[test]
    fn single_thread_lifo_order() {
        let d: Deque<u64> = Deque::new().unwrap();
        for i in 0..1000 {
            d.push_bottom(i).unwrap();
        }
        for i in (0..1000).rev() {
            assert_eq!(d.pop_bottom(), Some(i));
        }
        assert_eq!(d.pop_bottom(), None);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let d: Deque<u64> = Deque::new().unwrap();
        for i in 0..10_000 {
            d.push_bottom(i).unwrap();
        }
        let mut popped = Vec::new();
        while let Some(x) = d.pop_bottom() {
            popped.push(x);
        }
        popped.sort_unstable();
        assert_eq!(popped, (0..10_000).collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_owner_and_thieves_see_every_value_once() {
        let d: Arc<Deque<u64>> = Arc::new(Deque::new().unwrap());
        const N: u64 = 50_000;
        const THIEVES: usize = 4;
        let barrier = Arc::new(Barrier::new(THIEVES + 1));

        std::thread::scope(|scope| {
            let mut stolen_handles = Vec::new();
            for _ in 0..THIEVES {
                let d = Arc::clone(&d);
                let barrier = Arc::clone(&barrier);
                stolen_handles.push(scope.spawn(move || {
                    barrier.wait();
                    let mut got = Vec::new();
                    loop {
                        match d.steal_top() {
                            Some(v) => got.push(v),
                            None => {
                                std::thread::yield_now();
                                if d.is_empty() {
                                    break;
                                }
                            }
                        }
                    }
                    got
                }));
            }

            barrier.wait();
            let mut owner_popped = Vec::new();
            for i in 0..N {
                d.push_bottom(i).unwrap();
                if i % 7 == 0 {
                    if let Some(v) = d.pop_bottom() {
                        owner_popped.push(v);
                    }
                }
            }
            while let Some(v) = d.pop_bottom() {
                owner_popped.push(v);
            }

            let mut all = owner_popped;
            for h in stolen_handles {
                all.extend(h.join().unwrap());
            }

            let mut counts: HashMap<u64, u32> = HashMap::new();
            for v in &all {
                *counts.entry(*v).or_insert(0) += 1;
            }
            assert_eq!(all.len(), N as usize, "no value lost or duplicated");
            assert!(counts.values().all(|&c| c == 1));
        });
    }
}
