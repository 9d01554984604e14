//! Parallel sequence algorithms, mirroring `std`'s serial equivalents one
//! for one. Every public function here follows the same four-step
//! graceful-degradation shape:
//!
//! 1. measure `N` and compute a chunk count;
//! 2. if the chunk count is `<= 1`, run the serial algorithm directly;
//! 3. else try to allocate the parallel working set — on failure, fall back
//!    to serial with the original arguments;
//! 4. run the parallel algorithm and return its result.
//!
//! No function here ever returns an error: [`crate::error::ParallelismUnavailable`]
//! is caught internally at step 3.

pub mod elementwise;
pub mod predicate;
pub mod reduce;
pub mod scan;
pub mod uninit;
