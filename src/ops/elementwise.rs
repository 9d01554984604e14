//! Element-wise algorithms: §4.6 of the design. Every function here
//! partitions with [`chunks_min_fraction_1`] and runs the serial equivalent
//! independently on each chunk — no cross-chunk communication, so there is
//! nothing to fall back from beyond "run the same loop on one thread".

use crate::fabric::{chunks_min_fraction_1, parallel_for};
use crate::partition::{RandomAccessPartition, ReversePartition};

/// Invokes `f` on every element of `data`, in unspecified order across
/// chunks but left-to-right within a chunk.
pub fn for_each<T: Sync>(data: &[T], f: impl Fn(&T) + Sync) {
    let n = data.len();
    let chunks = chunks_min_fraction_1(n);
    if chunks <= 1 {
        data.iter().for_each(&f);
        return;
    }
    let partition = RandomAccessPartition::new(n, chunks);
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        data[b.start..b.end].iter().for_each(&f);
    });
}

/// `for_each` limited to the first `count` elements.
pub fn for_each_n<T: Sync>(data: &[T], count: usize, f: impl Fn(&T) + Sync) {
    for_each(&data[..count.min(data.len())], f);
}

/// Invokes `f` on every element of `data` through a mutable reference.
pub fn for_each_mut<T: Send>(data: &mut [T], f: impl Fn(&mut T) + Sync) {
    let n = data.len();
    let chunks = chunks_min_fraction_1(n);
    if chunks <= 1 {
        data.iter_mut().for_each(&f);
        return;
    }
    let partition = RandomAccessPartition::new(n, chunks);
    let ptr = data.as_mut_ptr() as usize;
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        // Safety: chunk `i` owns the disjoint sub-slice `[b.start, b.end)`.
        let chunk = unsafe { std::slice::from_raw_parts_mut((ptr as *mut T).add(b.start), b.end - b.start) };
        chunk.iter_mut().for_each(&f);
    });
}

/// Writes `transform(x)` for every `x` in `input` to the matching position
/// in `output`.
pub fn transform<T: Sync, R: Send>(input: &[T], output: &mut [R], f: impl Fn(&T) -> R + Sync) {
    debug_assert_eq!(input.len(), output.len());
    let n = input.len();
    let chunks = chunks_min_fraction_1(n);
    let apply = |input: &[T], output: &mut [R]| {
        for (x, slot) in input.iter().zip(output.iter_mut()) {
            *slot = f(x);
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
        let chunk_out = unsafe { std::slice::from_raw_parts_mut((out_ptr as *mut R).add(b.start), b.end - b.start) };
        apply(&input[b.start..b.end], chunk_out);
    });
}

/// Writes `f(a, b)` for every matched pair in `input1`/`input2` to `output`.
pub fn transform2<T1: Sync, T2: Sync, R: Send>(
    input1: &[T1],
    input2: &[T2],
    output: &mut [R],
    f: impl Fn(&T1, &T2) -> R + Sync,
) {
    debug_assert_eq!(input1.len(), input2.len());
    debug_assert_eq!(input1.len(), output.len());
    let n = input1.len();
    let chunks = chunks_min_fraction_1(n);
    let apply = |i1: &[T1], i2: &[T2], out: &mut [R]| {
        for ((a, b), slot) in i1.iter().zip(i2.iter()).zip(out.iter_mut()) {
            *slot = f(a, b);
        }
    };
    if chunks <= 1 {
        apply(input1, input2, output);
        return;
    }
    let partition = RandomAccessPartition::new(n, chunks);
    let out_ptr = output.as_mut_ptr() as usize;
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        let chunk_out = unsafe { std::slice::from_raw_parts_mut((out_ptr as *mut R).add(b.start), b.end - b.start) };
        apply(&input1[b.start..b.end], &input2[b.start..b.end], chunk_out);
    });
}

/// Copies `input` into `output` element-wise.
pub fn copy<T: Clone + Sync + Send>(input: &[T], output: &mut [T]) {
    transform(input, output, |x| x.clone());
}

/// Copies the first `count` elements of `input` into `output`.
pub fn copy_n<T: Clone + Sync + Send>(input: &[T], count: usize, output: &mut [T]) {
    copy(&input[..count], &mut output[..count]);
}

/// Moves `input` into `output` element-wise, leaving `input`'s elements in
/// their default state.
pub fn move_slice<T: Default + Send>(input: &mut [T], output: &mut [T]) {
    debug_assert_eq!(input.len(), output.len());
    let n = input.len();
    let chunks = chunks_min_fraction_1(n);
    let apply = |i: &mut [T], o: &mut [T]| {
        for (src, dst) in i.iter_mut().zip(o.iter_mut()) {
            *dst = std::mem::take(src);
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
        let chunk_in = unsafe { std::slice::from_raw_parts_mut((in_ptr as *mut T).add(b.start), b.end - b.start) };
        let chunk_out = unsafe { std::slice::from_raw_parts_mut((out_ptr as *mut T).add(b.start), b.end - b.start) };
        apply(chunk_in, chunk_out);
    });
}

/// Fills `data` with clones of `value`.
pub fn fill<T: Clone + Send + Sync>(data: &mut [T], value: T) {
    for_each_mut(data, |slot| *slot = value.clone());
}

/// Fills the first `count` elements of `data` with clones of `value`.
pub fn fill_n<T: Clone + Send + Sync>(data: &mut [T], count: usize, value: T) {
    let end = count.min(data.len());
    fill(&mut data[..end], value);
}

/// Fills `data` with values produced by `generator`.
///
/// `generator` is invoked concurrently from multiple threads with
/// unspecified interleaving — this is an intentional relaxation of the
/// serial contract's strictly sequential invocation order. Callers that
/// depend on call order (e.g. a seeded PRNG expecting N sequential draws)
/// must use the serial `std` equivalent instead.
pub fn generate<T: Send>(data: &mut [T], generator: impl Fn() -> T + Sync) {
    for_each_mut(data, |slot| *slot = generator());
}

/// `generate` limited to the first `count` elements.
pub fn generate_n<T: Send>(data: &mut [T], count: usize, generator: impl Fn() -> T + Sync) {
    let end = count.min(data.len());
    generate(&mut data[..end], generator);
}

/// Swaps `a[i]` with `b[i]` for every matched index.
pub fn swap_ranges<T: Send>(a: &mut [T], b: &mut [T]) {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let chunks = chunks_min_fraction_1(n);
    let apply = |a: &mut [T], b: &mut [T]| {
        for (x, y) in a.iter_mut().zip(b.iter_mut()) {
            std::mem::swap(x, y);
        }
    };
    if chunks <= 1 {
        apply(a, b);
        return;
    }
    let partition = RandomAccessPartition::new(n, chunks);
    let a_ptr = a.as_mut_ptr() as usize;
    let b_ptr = b.as_mut_ptr() as usize;
    parallel_for(chunks, chunks, |i| {
        let bounds = partition.at(i);
        let ca = unsafe { std::slice::from_raw_parts_mut((a_ptr as *mut T).add(bounds.start), bounds.end - bounds.start) };
        let cb = unsafe { std::slice::from_raw_parts_mut((b_ptr as *mut T).add(bounds.start), bounds.end - bounds.start) };
        apply(ca, cb);
    });
}

/// Writes `input[k] - input[k-1]` to `output[k]` for `k >= 1`, and
/// `input[0]` to `output[0]`. The first output is written serially before
/// the parallel pass so every chunk can read `(in[k], in[k-1])`
/// independently.
pub fn adjacent_difference<T, R>(input: &[T], output: &mut [R], op: impl Fn(&T, &T) -> R + Sync)
where
    T: Sync,
    R: Send,
    T: Into<R> + Clone,
{
    debug_assert_eq!(input.len(), output.len());
    if input.is_empty() {
        return;
    }
    output[0] = input[0].clone().into();
    let n = input.len() - 1;
    let chunks = chunks_min_fraction_1(n);
    let apply = |start: usize, out: &mut [R]| {
        for k in 0..out.len() {
            let idx = start + k + 1;
            out[k] = op(&input[idx], &input[idx - 1]);
        }
    };
    if chunks <= 1 {
        apply(0, &mut output[1..]);
        return;
    }
    let partition = RandomAccessPartition::new(n, chunks);
    let out_ptr = output.as_mut_ptr() as usize;
    parallel_for(chunks, chunks, |i| {
        let b = partition.at(i);
        let chunk_out =
            unsafe { std::slice::from_raw_parts_mut((out_ptr as *mut R).add(1 + b.start), b.end - b.start) };
        apply(b.start, chunk_out);
    });
}

/// Replaces every element equal to `old` with `new`.
pub fn replace<T: PartialEq + Clone + Send + Sync>(data: &mut [T], old: &T, new: T) {
    replace_if(data, |x| x == old, new);
}

/// Replaces every element satisfying `pred` with `new`.
pub fn replace_if<T: Clone + Send + Sync>(data: &mut [T], pred: impl Fn(&T) -> bool + Sync, new: T) {
    for_each_mut(data, |slot| {
        if pred(slot) {
            *slot = new.clone();
        }
    });
}

/// Reverses `data` in place. Two matched partitions — forward from the
/// start, backward from the end via [`ReversePartition`] — meet in the
/// middle; each chunk swaps its forward sub-range against the mirrored
/// backward sub-range the two partitions agree on.
pub fn reverse<T: Send>(data: &mut [T]) {
    let n = data.len();
    let half = n / 2;
    let chunks = chunks_min_fraction_1(half);
    let ptr = data.as_mut_ptr() as usize;
    let apply = |fwd_start: usize, fwd_len: usize| {
        let data = unsafe { std::slice::from_raw_parts_mut(ptr as *mut T, n) };
        for k in 0..fwd_len {
            data.swap(fwd_start + k, n - 1 - (fwd_start + k));
        }
    };
    if chunks <= 1 {
        apply(0, half);
        return;
    }
    let forward = RandomAccessPartition::new(half, chunks);
    let backward = ReversePartition::new(half, chunks, n);
    parallel_for(chunks, chunks, |i| {
        let fwd = forward.at(i);
        let bwd = backward.at(i);
        debug_assert_eq!(fwd.start, n - bwd.end);
        apply(fwd.start, fwd.end - fwd.start);
    });
}
