//! "Which chunk reported the best-so-far result" tracker used by every
//! find-family algorithm in [`crate::ops::predicate`] and [`crate::ops::reduce`].
//!
//! Split by iterator atomicity per spec §3/§9: [`IndexTracker`] packs a
//! chunk index and a `u32` slice index into one `AtomicU64` and updates both
//! fields with a single CAS loop, for positions that are `Copy` and small
//! enough to pack — every slice index in this crate. [`LockedTracker`] is
//! the fallback for anything else (a forward iterator's checkpoint, which
//! is only `Clone`): the chunk index alone stays a lock-free atomic so
//! `already_beaten` never blocks, and only the CAS winner of that atomic
//! takes a mutex to write the position itself.

#[cfg(not(loom))]
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
#[cfg(loom)]
use loom::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

const UNSET: u32 = u32::MAX;

/// Whether a lower chunk index or a higher chunk index wins ties between
/// concurrent reporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    /// First-match semantics: a writer from a strictly lower chunk index may
    /// overwrite the current best.
    Min,
    /// Last-match semantics: dual of `Min`.
    Max,
}

#[inline]
fn pack(chunk: u32, pos: u32) -> u64 {
    (u64::from(chunk) << 32) | u64::from(pos)
}

#[inline]
fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

/// Lock-free best-chunk tracker for `u32`-representable slice indices.
pub(crate) struct IndexTracker {
    direction: Direction,
    word: AtomicU64,
}

impl IndexTracker {
    pub(crate) fn new(direction: Direction) -> Self {
        Self {
            direction,
            word: AtomicU64::new(pack(UNSET, 0)),
        }
    }

    /// True if no chunk with index `<= chunk` (`Min`) or `>= chunk` (`Max`)
    /// can possibly still win, i.e. this chunk may skip its scan.
    pub(crate) fn already_beaten(&self, chunk: u32) -> bool {
        let (best_chunk, _) = unpack(self.word.load(Ordering::Acquire));
        if best_chunk == UNSET {
            return false;
        }
        match self.direction {
            Direction::Min => best_chunk <= chunk,
            Direction::Max => best_chunk >= chunk,
        }
    }

    /// Reports a candidate `pos` found by `chunk`. Loses the race silently
    /// if a better report has already landed.
    pub(crate) fn report(&self, chunk: u32, pos: u32) {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let (best_chunk, _) = unpack(current);
            let should_write = match self.direction {
                Direction::Min => best_chunk == UNSET || chunk < best_chunk,
                Direction::Max => best_chunk == UNSET || chunk >= best_chunk,
            };
            if !should_write {
                return;
            }
            let new = pack(chunk, pos);
            match self
                .word
                .compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns the winning `(chunk, pos)` pair, if any chunk reported.
    pub(crate) fn get(&self) -> Option<(u32, u32)> {
        let (chunk, pos) = unpack(self.word.load(Ordering::Acquire));
        if chunk == UNSET {
            None
        } else {
            Some((chunk, pos))
        }
    }
}

/// Mutex-guarded best-chunk tracker for position types that can't be packed
/// into one atomic word — a forward iterator's checkpoint, for instance,
/// which is only `Clone`, not `Copy` or `u32`-sized. Same two-step handshake
/// as [`IndexTracker`]'s single CAS, just split across an atomic and a lock:
/// the chunk index is CAS'd first, so a loser never touches the mutex; the
/// CAS winner then takes the lock and re-checks the held position, since a
/// better report may have raced it between the CAS and the lock.
pub(crate) struct LockedTracker<Idx> {
    direction: Direction,
    chunk: AtomicU32,
    slot: Mutex<Option<(u32, Idx)>>,
}

impl<Idx: Clone> LockedTracker<Idx> {
    pub(crate) fn new(direction: Direction) -> Self {
        Self {
            direction,
            chunk: AtomicU32::new(UNSET),
            slot: Mutex::new(None),
        }
    }

    pub(crate) fn already_beaten(&self, chunk: u32) -> bool {
        let best_chunk = self.chunk.load(Ordering::Acquire);
        if best_chunk == UNSET {
            return false;
        }
        match self.direction {
            Direction::Min => best_chunk <= chunk,
            Direction::Max => best_chunk >= chunk,
        }
    }

    /// Reports a candidate `pos` found by `chunk`. Loses the race silently
    /// if a better report has already landed.
    pub(crate) fn report(&self, chunk: u32, pos: Idx) {
        let mut current = self.chunk.load(Ordering::Acquire);
        loop {
            let should_write = match self.direction {
                Direction::Min => current == UNSET || chunk < current,
                Direction::Max => current == UNSET || chunk >= current,
            };
            if !should_write {
                return;
            }
            match self
                .chunk
                .compare_exchange_weak(current, chunk, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        let mut slot = self.slot.lock().unwrap();
        let still_best = match &*slot {
            Some((held_chunk, _)) => match self.direction {
                Direction::Min => chunk <= *held_chunk,
                Direction::Max => chunk >= *held_chunk,
            },
            None => true,
        };
        if still_best {
            *slot = Some((chunk, pos));
        }
    }

    /// Returns the winning `(chunk, pos)` pair, if any chunk reported.
    pub(crate) fn get(&self) -> Option<(u32, Idx)> {
        self.slot.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_tracker_keeps_lowest_chunk() {
        let t = IndexTracker::new(Direction::Min);
        t.report(3, 30);
        t.report(1, 10);
        t.report(2, 20);
        assert_eq!(t.get(), Some((1, 10)));
    }

    #[test]
    fn max_tracker_keeps_highest_chunk() {
        let t = IndexTracker::new(Direction::Max);
        t.report(1, 10);
        t.report(3, 30);
        t.report(2, 20);
        assert_eq!(t.get(), Some((3, 30)));
    }

    #[test]
    fn locked_tracker_min_keeps_lowest_chunk() {
        let t: LockedTracker<String> = LockedTracker::new(Direction::Min);
        t.report(3, "c".to_string());
        t.report(1, "a".to_string());
        t.report(2, "b".to_string());
        assert_eq!(t.get(), Some((1, "a".to_string())));
    }

    #[test]
    fn locked_tracker_max_keeps_highest_chunk() {
        let t: LockedTracker<String> = LockedTracker::new(Direction::Max);
        t.report(1, "a".to_string());
        t.report(3, "c".to_string());
        t.report(2, "b".to_string());
        assert_eq!(t.get(), Some((3, "c".to_string())));
    }

    #[test]
    fn locked_tracker_already_beaten_short_circuits() {
        let t: LockedTracker<String> = LockedTracker::new(Direction::Min);
        t.report(2, "x".to_string());
        assert!(t.already_beaten(2));
        assert!(t.already_beaten(5));
        assert!(!t.already_beaten(1));
    }

    #[test]
    fn locked_tracker_worse_report_after_the_fact_is_ignored() {
        let t: LockedTracker<String> = LockedTracker::new(Direction::Min);
        t.report(1, "first".to_string());
        t.report(5, "later".to_string());
        assert_eq!(t.get(), Some((1, "first".to_string())));
    }

    #[test]
    fn already_beaten_short_circuits() {
        let t = IndexTracker::new(Direction::Min);
        t.report(2, 0);
        assert!(t.already_beaten(2));
        assert!(t.already_beaten(5));
        assert!(!t.already_beaten(1));
    }
}

/// Model-checks the `report` CAS loop under every thread interleaving. Run
/// with `RUSTFLAGS="--cfg loom" cargo test --release loom_ -- --test-threads=1`.
/// `IndexTracker`'s state space is just one `AtomicU64`, small enough for
/// loom to explore exhaustively (unlike [`crate::deque::Deque`], whose
/// growable backing array loom cannot practically cover).
#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;

    #[test]
    fn loom_concurrent_reports_pick_the_lowest_chunk() {
        loom::model(|| {
            let t = Arc::new(IndexTracker::new(Direction::Min));

            let t1 = Arc::clone(&t);
            let h1 = loom::thread::spawn(move || t1.report(1, 10));
            let t2 = Arc::clone(&t);
            let h2 = loom::thread::spawn(move || t2.report(2, 20));

            h1.join().unwrap();
            h2.join().unwrap();

            assert_eq!(t.get(), Some((1, 10)));
        });
    }
}
