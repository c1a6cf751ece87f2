//! Parallel sum kernels.
//!
//! Every kernel accumulates into a single `u32` in global memory that the host
//! zeroes before the launch. They differ in how many atomic operations reach
//! that value: one per element, one per thread, or one per block.

use crate::{step::div_step, VALUES_PER_WORK_ITEM, WORK_GROUP_SIZE};
#[cfg(not(target_os = "cuda"))]
use core::sync::atomic::AtomicU32;
use core::sync::atomic::Ordering;
use cuda_std::{kernel, shared_array, thread};

/// Atomically adds `value` into the result.
///
/// # Safety
///
/// `sum` must be valid and 4-byte aligned, and every concurrent access to it
/// must also be atomic.
#[inline]
pub unsafe fn atomic_add(sum: *mut u32, value: u32) {
    #[cfg(target_os = "cuda")]
    cuda_std::atomic::mid::atomic_fetch_add_u32_device(sum, Ordering::Relaxed, value);
    // Host emulator.
    #[cfg(not(target_os = "cuda"))]
    (*(sum as *const AtomicU32)).fetch_add(value, Ordering::Relaxed);
}

/// One atomic add per element.
///
/// # Safety
///
/// See [`atomic_add`].
#[inline]
pub unsafe fn sum_atomic_item(xs: &[u32], sum: *mut u32, i: usize) {
    if i >= xs.len() {
        return;
    }
    atomic_add(sum, xs[i]);
}

/// Thread `i` owns the contiguous run `[i * 64, i * 64 + 64)`. Neighboring
/// threads read addresses 64 elements apart.
///
/// # Safety
///
/// See [`atomic_add`].
#[inline]
pub unsafe fn sum_loop_not_coalesced_item(xs: &[u32], sum: *mut u32, i: usize) {
    let start = i * VALUES_PER_WORK_ITEM;
    if start >= xs.len() {
        return;
    }

    let end = (start + VALUES_PER_WORK_ITEM).min(xs.len());
    let mut acc = 0u32;
    for x in &xs[start..end] {
        acc = acc.wrapping_add(*x);
    }
    atomic_add(sum, acc);
}

/// Block `group` owns a span of `group_size * 64` elements. In round `r`,
/// thread `local` reads `span_start + r * group_size + local`, so the block
/// reads one contiguous row per round.
///
/// # Safety
///
/// See [`atomic_add`].
#[inline]
pub unsafe fn sum_loop_coalesced_item(
    xs: &[u32],
    sum: *mut u32,
    group: usize,
    local: usize,
    group_size: usize,
) {
    let span_start = group * group_size * VALUES_PER_WORK_ITEM;
    if span_start >= xs.len() {
        return;
    }

    let mut acc = 0u32;
    for round in 0..VALUES_PER_WORK_ITEM {
        let j = span_start + round * group_size + local;
        if j < xs.len() {
            acc = acc.wrapping_add(xs[j]);
        }
    }
    atomic_add(sum, acc);
}

/// Thread 0 sums everything on its own and stores the result directly.
///
/// # Safety
///
/// `sum` must be valid and no other thread may access it during the launch.
#[inline]
pub unsafe fn sum_main_thread_item(xs: &[u32], sum: *mut u32, i: usize) {
    if i != 0 {
        return;
    }

    let mut acc = 0u32;
    for x in xs {
        acc = acc.wrapping_add(*x);
    }
    *(&mut *sum) = acc;
}

/// Loads this thread's element into block-local memory, or 0 past the end of
/// the input.
///
/// # Safety
///
/// `local_xs` must have room for at least `local + 1` elements.
#[inline]
pub unsafe fn tree_load(local_xs: *mut u32, xs: &[u32], local: usize, i: usize) {
    *(&mut *local_xs.add(local)) = if i < xs.len() { xs[i] } else { 0 };
}

/// One level of the block tree: the lower `width` threads each fold in the
/// element `width` positions above them.
///
/// # Safety
///
/// `local_xs` must have room for `2 * width` elements, and the caller must
/// place a block barrier between levels.
#[inline]
pub unsafe fn tree_combine(local_xs: *mut u32, local: usize, width: usize) {
    if local < width {
        *(&mut *local_xs.add(local)) =
            (*local_xs.add(local)).wrapping_add(*local_xs.add(local + width));
    }
}

/// Widths of the successive tree levels for a block of `group_size` threads.
pub fn tree_widths(group_size: usize) -> impl Iterator<Item = usize> {
    div_step(group_size / 2, 2).take_while(|&w| w > 0)
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn sum_atomic(xs: &[u32], sum: *mut u32) {
    let i = (thread::thread_idx_x() + thread::block_idx_x() * thread::block_dim_x()) as usize;
    sum_atomic_item(xs, sum, i);
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn sum_loop_not_coalesced(xs: &[u32], sum: *mut u32) {
    let i = (thread::thread_idx_x() + thread::block_idx_x() * thread::block_dim_x()) as usize;
    sum_loop_not_coalesced_item(xs, sum, i);
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn sum_loop_coalesced(xs: &[u32], sum: *mut u32) {
    let t_idx = thread::thread_idx_x() as usize;
    let b_idx = thread::block_idx_x() as usize;
    let b_dim = thread::block_dim_x() as usize;
    sum_loop_coalesced_item(xs, sum, b_idx, t_idx, b_dim);
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn sum_main_thread(xs: &[u32], sum: *mut u32) {
    let i = (thread::thread_idx_x() + thread::block_idx_x() * thread::block_dim_x()) as usize;
    sum_main_thread_item(xs, sum, i);
}

/// Block-level tree reduction. The launch block size must equal
/// `WORK_GROUP_SIZE`.
#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn sum_tree(xs: &[u32], sum: *mut u32) {
    let t_idx = thread::thread_idx_x() as usize;
    let i = (thread::thread_idx_x() + thread::block_idx_x() * thread::block_dim_x()) as usize;

    let local_xs = shared_array![u32; WORK_GROUP_SIZE];
    tree_load(local_xs, xs, t_idx, i);
    thread::sync_threads();

    for width in tree_widths(WORK_GROUP_SIZE) {
        tree_combine(local_xs, t_idx, width);
        thread::sync_threads();
    }

    if t_idx == 0 {
        atomic_add(sum, *local_xs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(n: usize) -> Vec<u32> {
        (0..n as u32).map(|x| x % 1000).collect()
    }

    fn expected(xs: &[u32]) -> u32 {
        xs.iter().fold(0u32, |acc, x| acc.wrapping_add(*x))
    }

    #[test]
    fn tree_widths_test() {
        let widths: Vec<usize> = tree_widths(8).collect();
        assert_eq!(widths, vec![4, 2, 1]);
        assert_eq!(tree_widths(WORK_GROUP_SIZE).count(), 7);
    }

    #[test]
    fn atomic_add_from_many_threads() {
        let mut sum = 0u32;
        let addr = &mut sum as *mut u32 as usize;
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(move || {
                    for _ in 0..10_000 {
                        unsafe { atomic_add(addr as *mut u32, 3) };
                    }
                });
            }
        });
        assert_eq!(sum, 8 * 10_000 * 3);
    }

    #[test]
    fn atomic_items_cover_input() {
        let xs = input(1000);
        let mut sum = 0u32;
        for i in 0..1024 {
            unsafe { sum_atomic_item(&xs, &mut sum, i) };
        }
        assert_eq!(sum, expected(&xs));
    }

    #[test]
    fn loop_items_handle_ragged_tail() {
        // 130 full runs plus a partial one.
        let xs = input(130 * VALUES_PER_WORK_ITEM + 17);

        let mut not_coalesced = 0u32;
        for i in 0..WORK_GROUP_SIZE * 2 {
            unsafe { sum_loop_not_coalesced_item(&xs, &mut not_coalesced, i) };
        }
        assert_eq!(not_coalesced, expected(&xs));

        let mut coalesced = 0u32;
        for group in 0..2 {
            for local in 0..WORK_GROUP_SIZE {
                unsafe {
                    sum_loop_coalesced_item(&xs, &mut coalesced, group, local, WORK_GROUP_SIZE)
                };
            }
        }
        assert_eq!(coalesced, expected(&xs));
    }

    #[test]
    fn only_thread_zero_writes_main_thread_result() {
        let xs = input(300);
        let mut sum = 7u32;
        unsafe { sum_main_thread_item(&xs, &mut sum, 5) };
        assert_eq!(sum, 7);
        unsafe { sum_main_thread_item(&xs, &mut sum, 0) };
        assert_eq!(sum, expected(&xs));
    }

    #[test]
    fn tree_levels_fold_block() {
        let xs = input(100);
        let mut local_xs = [0u32; WORK_GROUP_SIZE];
        for local in 0..WORK_GROUP_SIZE {
            unsafe { tree_load(local_xs.as_mut_ptr(), &xs, local, local) };
        }
        for width in tree_widths(WORK_GROUP_SIZE) {
            for local in 0..WORK_GROUP_SIZE {
                unsafe { tree_combine(local_xs.as_mut_ptr(), local, width) };
            }
        }
        assert_eq!(local_xs[0], expected(&xs));
    }
}
