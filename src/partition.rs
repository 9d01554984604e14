//! Splitting a range of `count` elements into `chunks` contiguous sub-ranges.
//!
//! Iterator categories are capabilities (spec §9): a range that supports
//! O(1) indexing picks [`RandomAccessPartition`], one that only supports
//! O(N) forward advance picks [`ForwardPartition`], and `reverse` picks
//! [`ReversePartition`] to walk a matching range backward. [`RandomAccessRange`]
//! and [`ForwardRange`] are the capability markers that decide which.

use crate::error::{try_vec_with_capacity, Result};

/// `(length, leftover)` such that the first `leftover` chunks get
/// `length + 1` elements and the rest get `length` elements, per the length
/// rule in the data model: `fraction = count / chunks`,
/// `leftover = count % chunks`.
#[inline]
fn fraction_and_leftover(count: usize, chunks: usize) -> (usize, usize) {
    (count / chunks, count % chunks)
}

/// The `[start, end)` bounds of chunk `i`, as plain indices into the
/// original range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bounds {
    pub start: usize,
    pub end: usize,
}

/// Capability marker for a range that supports O(1) index arithmetic — the
/// Rust analogue of a random-access iterator range. `[T]`/`&mut [T]` are
/// the only instance this crate needs.
pub(crate) trait RandomAccessRange {
    fn len(&self) -> usize;
}

impl<T> RandomAccessRange for [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }
}

/// Capability marker for a range that supports only O(N) forward advance —
/// any iterator cheap enough to checkpoint by cloning. Every `Iterator +
/// Clone` is one; there is nothing crate-specific to add.
pub(crate) trait ForwardRange: ExactSizeIterator + Clone {}

impl<I: ExactSizeIterator + Clone> ForwardRange for I {}

/// A partition of `[0, count)` into `chunks` contiguous sub-ranges, usable
/// whenever the underlying range supports O(1) indexing (slices, in this
/// crate — the Rust analogue of a random-access iterator range).
pub(crate) struct RandomAccessPartition {
    count: usize,
    chunks: usize,
    fraction: usize,
    leftover: usize,
}

impl RandomAccessPartition {
    /// Construction is O(1) and never allocates.
    pub(crate) fn new(count: usize, chunks: usize) -> Self {
        debug_assert!(chunks >= 1);
        let (fraction, leftover) = fraction_and_leftover(count, chunks);
        Self {
            count,
            chunks,
            fraction,
            leftover,
        }
    }

    pub(crate) fn chunks(&self) -> usize {
        self.chunks
    }

    /// Returns the `[start, end)` bounds of chunk `i` in O(1).
    pub(crate) fn at(&self, i: usize) -> Bounds {
        debug_assert!(i < self.chunks);
        let start = if i < self.leftover {
            i * (self.fraction + 1)
        } else {
            self.leftover * (self.fraction + 1) + (i - self.leftover) * self.fraction
        };
        let len = if i < self.leftover {
            self.fraction + 1
        } else {
            self.fraction
        };
        Bounds {
            start,
            end: start + len,
        }
    }

    pub(crate) fn end(&self) -> usize {
        self.count
    }
}

impl RandomAccessPartition {
    /// Builds a partition over any [`RandomAccessRange`] in one call,
    /// instead of making every caller pull `range.len()` out by hand first.
    pub(crate) fn for_range<R: RandomAccessRange + ?Sized>(range: &R, chunks: usize) -> Self {
        Self::new(range.len(), chunks)
    }
}

/// A partition of a forward-only range into `chunks` contiguous sub-ranges.
/// Construction is O(N): it walks the range once, storing a checkpoint
/// (a clone of the iterator positioned at the chunk's start) and a length
/// for each chunk, since there is no arithmetic way to jump ahead.
pub(crate) struct ForwardPartition<I> {
    checkpoints: Vec<(I, usize)>,
    end: usize,
}

impl<I: ForwardRange> ForwardPartition<I> {
    /// `count` must equal `iter.len()`; callers already have it on hand from
    /// sizing the chunk count, so it is taken rather than recomputed.
    pub(crate) fn new(mut iter: I, count: usize, chunks: usize) -> Result<Self> {
        debug_assert!(chunks >= 1);
        debug_assert_eq!(iter.len(), count);
        let (fraction, leftover) = fraction_and_leftover(count, chunks);
        let mut checkpoints = try_vec_with_capacity(chunks)?;
        for i in 0..chunks {
            let len = if i < leftover { fraction + 1 } else { fraction };
            checkpoints.push((iter.clone(), len));
            for _ in 0..len {
                iter.next();
            }
        }
        Ok(Self { checkpoints, end: count })
    }

    pub(crate) fn chunks(&self) -> usize {
        self.checkpoints.len()
    }

    /// Returns chunk `i`'s checkpoint iterator and the number of elements it
    /// covers.
    pub(crate) fn at(&self, i: usize) -> (I, usize) {
        self.checkpoints[i].clone()
    }

    pub(crate) fn end(&self) -> usize {
        self.end
    }
}

/// A partition that hands out the same chunk boundaries as a
/// [`RandomAccessPartition`] over `[0, count)`, but mirrored against a range
/// of `total_len` elements — `reverse`'s backward-walking partner to a
/// forward partition over the same `count`.
pub(crate) struct ReversePartition {
    inner: RandomAccessPartition,
    total_len: usize,
}

impl ReversePartition {
    pub(crate) fn new(count: usize, chunks: usize, total_len: usize) -> Self {
        debug_assert!(count <= total_len);
        Self {
            inner: RandomAccessPartition::new(count, chunks),
            total_len,
        }
    }

    pub(crate) fn chunks(&self) -> usize {
        self.inner.chunks()
    }

    /// Returns the `[start, end)` bounds of chunk `i`, mirrored to the tail
    /// of a range of `total_len` elements.
    pub(crate) fn at(&self, i: usize) -> Bounds {
        let b = self.inner.at(i);
        Bounds {
            start: self.total_len - b.end,
            end: self.total_len - b.start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(count: usize, chunks: usize) {
        let p = RandomAccessPartition::new(count, chunks);
        assert_eq!(p.chunks(), chunks);
        let mut covered = Vec::with_capacity(count);
        for i in 0..p.chunks() {
            let b = p.at(i);
            covered.extend(b.start..b.end);
        }
        assert_eq!(covered, (0..count).collect::<Vec<_>>());
        assert_eq!(p.end(), count);
    }

    #[test]
    fn partition_covers_exactly_once_for_every_n_k() {
        for count in 0..40 {
            for chunks in 1..=count.max(1) {
                coverage(count, chunks);
            }
        }
    }

    #[test]
    fn leading_chunks_get_the_remainder() {
        let p = RandomAccessPartition::new(10, 3);
        assert_eq!(p.at(0), Bounds { start: 0, end: 4 });
        assert_eq!(p.at(1), Bounds { start: 4, end: 7 });
        assert_eq!(p.at(2), Bounds { start: 7, end: 10 });
    }

    #[test]
    fn for_range_matches_explicit_len() {
        let data = [1, 2, 3, 4, 5, 6, 7];
        let p = RandomAccessPartition::for_range(data.as_slice(), 3);
        assert_eq!(p.end(), data.len());
        assert_eq!(p.chunks(), 3);
    }

    #[test]
    fn forward_partition_covers_exactly_once_and_matches_random_access() {
        for count in 0..40usize {
            for chunks in 1..=count.max(1) {
                let ra = RandomAccessPartition::new(count, chunks);
                let fwd = ForwardPartition::new(0..count, count, chunks).unwrap();
                assert_eq!(fwd.chunks(), ra.chunks());
                assert_eq!(fwd.end(), ra.end());
                let mut covered = Vec::with_capacity(count);
                for i in 0..fwd.chunks() {
                    let b = ra.at(i);
                    let (checkpoint, len) = fwd.at(i);
                    assert_eq!(len, b.end - b.start);
                    let collected: Vec<usize> = checkpoint.take(len).collect();
                    assert_eq!(collected, (b.start..b.end).collect::<Vec<_>>());
                    covered.extend(collected);
                }
                assert_eq!(covered, (0..count).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn reverse_partition_mirrors_a_forward_partition_to_the_tail() {
        let total_len = 10;
        let count = 4; // e.g. `reverse`'s half of a 10-element (even would be 5; use 4 here)
        for chunks in 1..=count {
            let rev = ReversePartition::new(count, chunks, total_len);
            assert_eq!(rev.chunks(), chunks);
            let mut covered = Vec::with_capacity(count);
            for i in 0..rev.chunks() {
                let b = rev.at(i);
                covered.extend(b.start..b.end);
            }
            covered.sort_unstable();
            assert_eq!(covered, ((total_len - count)..total_len).collect::<Vec<_>>());
        }
    }
}
