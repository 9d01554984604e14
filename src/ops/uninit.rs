//! Parallel construction/destruction over uninitialized memory: §4.10 of
//! the design.
//!
//! Every function here operates on `&mut [MaybeUninit<T>]`, the idiomatic
//! analogue of the original's raw-pointer uninitialized buffer. None of them
//! roll back on a panicking constructor: a panic unwinds past whatever
//! chunk it happened in, leaving that chunk's already-constructed prefix
//! initialized and the rest not, exactly as the serial `std` equivalents
//! behave. Callers that need transactional semantics must build it
//! themselves on top of these primitives.

use std::mem::MaybeUninit;

use crate::fabric::{chunks_min_fraction_1, parallel_for};
use crate::partition::RandomAccessPartition;

fn run_over<T: Send>(data: &mut [MaybeUninit<T>], f: impl Fn(&mut [MaybeUninit<T>]) + Sync) {
    let n = data.len();
    let chunks = chunks_min_fraction_1(n);
    if chunks <= 1 {
        f(data);
        return;
    }
    let partition = RandomAccessPartition::new(n, chunks);
    let ptr = data.as_mut_ptr() as usize;
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        // Safety: chunk `i` owns the disjoint sub-slice `[b.start, b.end)`
        // of `data`; the partition guarantees no two chunks overlap.
        let chunk = unsafe {
            std::slice::from_raw_parts_mut((ptr as *mut MaybeUninit<T>).add(b.start), b.end - b.start)
        };
        f(chunk);
    });
}

/// Default-constructs every slot of `data`.
pub fn uninitialized_default_construct<T: Default + Send>(data: &mut [MaybeUninit<T>]) {
    run_over(data, |chunk| {
        for slot in chunk {
            slot.write(T::default());
        }
    });
}

/// `uninitialized_default_construct` limited to the first `count` slots.
pub fn uninitialized_default_construct_n<T: Default + Send>(data: &mut [MaybeUninit<T>], count: usize) {
    let n = count.min(data.len());
    uninitialized_default_construct(&mut data[..n]);
}

/// Value-initializes every slot of `data` (identical to
/// [`uninitialized_default_construct`] in Rust, where there is no
/// distinction between a type's "default" and "value-initialized" state;
/// kept as a separate entry point for parity with the serial surface).
pub fn uninitialized_value_construct<T: Default + Send>(data: &mut [MaybeUninit<T>]) {
    uninitialized_default_construct(data);
}

/// `uninitialized_value_construct` limited to the first `count` slots.
pub fn uninitialized_value_construct_n<T: Default + Send>(data: &mut [MaybeUninit<T>], count: usize) {
    uninitialized_default_construct_n(data, count);
}

/// Clones every element of `input` into the matching slot of `output`.
pub fn uninitialized_copy<T: Clone + Sync + Send>(input: &[T], output: &mut [MaybeUninit<T>]) {
    debug_assert_eq!(input.len(), output.len());
    let n = input.len();
    let chunks = chunks_min_fraction_1(n);
    let apply = |input: &[T], out: &mut [MaybeUninit<T>]| {
        for (x, slot) in input.iter().zip(out.iter_mut()) {
            slot.write(x.clone());
        }
    };
    if chunks <= 1 {
        apply(input, output);
        return;
    }
    let partition = RandomAccessPartition::new(n, chunks);
    let out_ptr = output.as_mut_ptr() as usize;
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        let chunk_out = unsafe {
            std::slice::from_raw_parts_mut((out_ptr as *mut MaybeUninit<T>).add(b.start), b.end - b.start)
        };
        apply(&input[b.start..b.end], chunk_out);
    });
}

/// `uninitialized_copy` limited to the first `count` elements.
pub fn uninitialized_copy_n<T: Clone + Sync + Send>(input: &[T], count: usize, output: &mut [MaybeUninit<T>]) {
    let n = count.min(input.len());
    uninitialized_copy(&input[..n], &mut output[..n]);
}

/// Moves every element of `input` into the matching slot of `output`,
/// leaving `input`'s elements in their default state.
pub fn uninitialized_move<T: Default + Send>(input: &mut [T], output: &mut [MaybeUninit<T>]) {
    debug_assert_eq!(input.len(), output.len());
    let n = input.len();
    let chunks = chunks_min_fraction_1(n);
    let apply = |input: &mut [T], out: &mut [MaybeUninit<T>]| {
        for (src, slot) in input.iter_mut().zip(out.iter_mut()) {
            slot.write(std::mem::take(src));
        }
    };
    if chunks <= 1 {
        apply(input, output);
        return;
    }
    let partition = RandomAccessPartition::new(n, chunks);
    let in_ptr = input.as_mut_ptr() as usize;
    let out_ptr = output.as_mut_ptr() as usize;
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        let chunk_in =
            unsafe { std::slice::from_raw_parts_mut((in_ptr as *mut T).add(b.start), b.end - b.start) };
        let chunk_out = unsafe {
            std::slice::from_raw_parts_mut((out_ptr as *mut MaybeUninit<T>).add(b.start), b.end - b.start)
        };
        apply(chunk_in, chunk_out);
    });
}

/// `uninitialized_move` limited to the first `count` elements.
pub fn uninitialized_move_n<T: Default + Send>(input: &mut [T], count: usize, output: &mut [MaybeUninit<T>]) {
    let n = count.min(input.len());
    uninitialized_move(&mut input[..n], &mut output[..n]);
}

/// Fills every slot of `data` with clones of `value`.
pub fn uninitialized_fill<T: Clone + Send + Sync>(data: &mut [MaybeUninit<T>], value: T) {
    run_over(data, |chunk| {
        for slot in chunk {
            slot.write(value.clone());
        }
    });
}

/// `uninitialized_fill` limited to the first `count` slots.
pub fn uninitialized_fill_n<T: Clone + Send + Sync>(data: &mut [MaybeUninit<T>], count: usize, value: T) {
    let n = count.min(data.len());
    uninitialized_fill(&mut data[..n], value);
}

/// Drops every already-initialized element of `data` in place, leaving the
/// slots logically uninitialized again.
///
/// # Safety
///
/// Every element in `data` must currently be initialized.
pub unsafe fn destroy<T: Send>(data: &mut [MaybeUninit<T>]) {
    run_over(data, |chunk| {
        for slot in chunk {
            // Safety: the caller guarantees every slot holds a live `T`.
            unsafe {
                slot.assume_init_drop();
            }
        }
    });
}

/// `destroy` limited to the first `count` slots.
///
/// # Safety
///
/// The first `count` elements of `data` must currently be initialized.
pub unsafe fn destroy_n<T: Send>(data: &mut [MaybeUninit<T>], count: usize) {
    let n = count.min(data.len());
    unsafe { destroy(&mut data[..n]) };
}

/// Moves every initialized element of `input` into the matching slot of
/// `output`, without touching `input`'s own storage afterward (the caller
/// owns disposing of the now-moved-from slots).
///
/// # Safety
///
/// Every element in `input` must currently be initialized.
pub unsafe fn r#move<T: Send>(input: &mut [MaybeUninit<T>], output: &mut [MaybeUninit<T>]) {
    debug_assert_eq!(input.len(), output.len());
    let n = input.len();
    let chunks = chunks_min_fraction_1(n);
    let apply = |input: &mut [MaybeUninit<T>], out: &mut [MaybeUninit<T>]| {
        for (src, dst) in input.iter_mut().zip(out.iter_mut()) {
            // Safety: the caller guarantees every slot of `input` holds a
            // live `T`; reading it out and writing it into `dst` transfers
            // ownership without dropping the original.
            unsafe {
                dst.write(src.assume_init_read());
            }
        }
    };
    if chunks <= 1 {
        apply(input, output);
        return;
    }
    let partition = RandomAccessPartition::new(n, chunks);
    let in_ptr = input.as_mut_ptr() as usize;
    let out_ptr = output.as_mut_ptr() as usize;
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        let chunk_in = unsafe {
            std::slice::from_raw_parts_mut((in_ptr as *mut MaybeUninit<T>).add(b.start), b.end - b.start)
        };
        let chunk_out = unsafe {
            std::slice::from_raw_parts_mut((out_ptr as *mut MaybeUninit<T>).add(b.start), b.end - b.start)
        };
        apply(chunk_in, chunk_out);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uninit_vec<T>(n: usize) -> Vec<MaybeUninit<T>> {
        (0..n).map(|_| MaybeUninit::uninit()).collect()
    }

    #[test]
    fn default_construct_zeroes_every_slot() {
        let mut buf = uninit_vec::<i64>(5000);
        uninitialized_default_construct(&mut buf);
        let values: Vec<i64> = buf.into_iter().map(|m| unsafe { m.assume_init() }).collect();
        assert!(values.iter().all(|&x| x == 0));
    }

    #[test]
    fn copy_matches_source() {
        let input: Vec<i64> = (0..10_000).collect();
        let mut buf = uninit_vec::<i64>(input.len());
        uninitialized_copy(&input, &mut buf);
        let values: Vec<i64> = buf.into_iter().map(|m| unsafe { m.assume_init() }).collect();
        assert_eq!(values, input);
    }

    #[test]
    fn move_leaves_input_defaulted_and_output_populated() {
        let mut input: Vec<i64> = (0..10_000).collect();
        let expected = input.clone();
        let mut buf = uninit_vec::<i64>(input.len());
        uninitialized_move(&mut input, &mut buf);
        assert!(input.iter().all(|&x| x == 0));
        let values: Vec<i64> = buf.into_iter().map(|m| unsafe { m.assume_init() }).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn fill_writes_the_same_value_everywhere() {
        let mut buf = uninit_vec::<String>(2000);
        uninitialized_fill(&mut buf, "x".to_string());
        let values: Vec<String> = buf.into_iter().map(|m| unsafe { m.assume_init() }).collect();
        assert!(values.iter().all(|s| s == "x"));
    }

    #[test]
    fn destroy_drops_every_element() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        struct Counted<'a>(&'a AtomicUsize);
        impl Drop for Counted<'_> {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }
        let drops = AtomicUsize::new(0);
        let mut buf: Vec<MaybeUninit<Counted>> = (0..500).map(|_| MaybeUninit::new(Counted(&drops))).collect();
        unsafe { destroy(&mut buf) };
        assert_eq!(drops.load(Ordering::Relaxed), 500);
    }

    #[test]
    fn move_transfers_ownership_between_uninitialized_buffers() {
        let mut src: Vec<MaybeUninit<i64>> = (0..3000).map(|i| MaybeUninit::new(i as i64)).collect();
        let mut dst = uninit_vec::<i64>(3000);
        unsafe { r#move(&mut src, &mut dst) };
        let values: Vec<i64> = dst.into_iter().map(|m| unsafe { m.assume_init() }).collect();
        assert_eq!(values, (0..3000).collect::<Vec<_>>());
    }
}
