//! A drop-in parallel replacement for the standard library's sequence
//! algorithms.
//!
//! Every function in [`ops`] and [`sort`] mirrors a serial `std`/`core`
//! counterpart one for one: same arguments modulo a trailing comparator or
//! predicate, same return value, same edge-case behavior on empty and
//! single-element inputs. The only externally visible difference is that
//! the work may run on more than one thread.
//!
//! There is exactly one piece of runtime configuration: the
//! `PSTD_PAR_MAX_THREADS` environment variable, read once and cached for the
//! life of the process (see [`fabric::max_hw_threads`]). Everything else —
//! chunk counts, the insertion-sort cutover, the parallel-merge cutover — is
//! an internal constant tuned for throughput, never part of the public API.
//!
//! Allocation failure while standing up a parallel working set is never
//! fatal: every public entry point falls back to the equivalent serial
//! algorithm rather than panicking or returning an error. See
//! [`error::ParallelismUnavailable`] for the internal type this is built on.

mod cache_padded;
mod deque;
mod error;
mod fabric;
mod partition;
mod trackers;

pub mod ops;
pub mod sort;
