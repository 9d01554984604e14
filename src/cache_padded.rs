//! Cache-padded wrapper to prevent false sharing between per-worker state.

use std::ops::{Deref, DerefMut};

/// Pads `T` out to 128 bytes.
///
/// 128 bytes is used rather than the more common 64 to stay safe on
/// architectures with larger destructive-interference sizes (e.g. Apple
/// Silicon's prefetcher reads pairs of 64-byte lines together).
#[repr(align(128))]
pub struct CachePadded<T> {
    value: T,
}

impl<T> CachePadded<T> {
    /// Creates a new cache-padded value.
    pub const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CachePadded<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}
