//! The one internal failure kind the library ever raises.

/// Raised when the parallel machinery cannot acquire the memory or threads it
/// needs (a partition buffer, a result slot, a deque array, a worker thread).
///
/// This type never crosses a public function boundary: every parallel entry
/// point catches it internally and falls back to the serial equivalent, so a
/// caller of this crate can never observe it. It exists so the fallback
/// decision can be expressed with `?` instead of threading a `bool` through
/// every allocation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParallelismUnavailable;

impl core::fmt::Display for ParallelismUnavailable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("parallel execution unavailable, falling back to serial")
    }
}

impl std::error::Error for ParallelismUnavailable {}

pub(crate) type Result<T> = std::result::Result<T, ParallelismUnavailable>;

/// Converts a fallible allocation into a [`ParallelismUnavailable`].
pub(crate) fn try_vec_with_capacity<T>(capacity: usize) -> Result<Vec<T>> {
    let mut v: Vec<T> = Vec::new();
    v.try_reserve_exact(capacity).map_err(|_| ParallelismUnavailable)?;
    Ok(v)
}
