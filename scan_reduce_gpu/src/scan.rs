//! Work-efficient (Brent-Kung) inclusive prefix sum over global memory.
//!
//! Unlike a single-block shared-memory scan, each tree level is a separate
//! launch over the whole array, so there is no section size limit. The host
//! launches one up-sweep per `block_size` in `2, 4, ..., n` and then one
//! down-sweep per `block_size` in `n/4, n/8, ..., 1`. The launch boundary is
//! the only synchronization between levels.

use cuda_std::{kernel, thread};

/// Number of threads doing useful work in an up-sweep round.
pub fn up_sweep_items(n: usize, block_size: usize) -> usize {
    n / block_size
}

/// Number of threads doing useful work in a down-sweep round.
pub fn down_sweep_items(n: usize, block_size: usize) -> usize {
    (n / (2 * block_size)).saturating_sub(1)
}

/// Adds the value at the middle of block `item` into the last element of the
/// block. Threads past the last block return without touching `xs`.
///
/// # Safety
///
/// `xs` must point to at least `n` elements, and no other thread may write
/// to the two elements this thread touches during the same launch.
#[inline]
pub unsafe fn up_sweep_item(xs: *mut u32, n: usize, block_size: usize, item: usize) {
    if item >= up_sweep_items(n, block_size) {
        return;
    }

    let end = (item + 1) * block_size - 1;
    let mid = end - block_size / 2;
    *(&mut *xs.add(end)) = (*xs.add(end)).wrapping_add(*xs.add(mid));
}

/// Pushes the prefix accumulated at the end of one `2 * block_size` block into
/// the element `block_size` positions after it.
///
/// # Safety
///
/// Same contract as [`up_sweep_item`].
#[inline]
pub unsafe fn down_sweep_item(xs: *mut u32, n: usize, block_size: usize, item: usize) {
    if item >= down_sweep_items(n, block_size) {
        return;
    }

    let src = (item + 1) * 2 * block_size - 1;
    let dst = src + block_size;
    *(&mut *xs.add(dst)) = (*xs.add(dst)).wrapping_add(*xs.add(src));
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn work_efficient_prefix_sum_up_sweep(xs: *mut u32, n: usize, block_size: usize) {
    let i = (thread::thread_idx_x() + thread::block_idx_x() * thread::block_dim_x()) as usize;
    up_sweep_item(xs, n, block_size, i);
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn work_efficient_prefix_sum_down_sweep(xs: *mut u32, n: usize, block_size: usize) {
    let i = (thread::thread_idx_x() + thread::block_idx_x() * thread::block_dim_x()) as usize;
    down_sweep_item(xs, n, block_size, i);
}

#[cfg(test)]
mod tests {
    use super::{down_sweep_item, down_sweep_items, up_sweep_item, up_sweep_items};
    use crate::step::{div_step, mult_step};

    /// Runs every round one thread at a time, including the padded tail.
    fn scan_in_order(xs: &mut [u32], padded: usize) {
        let n = xs.len();
        for block_size in mult_step(2, 2).take_while(|&b| b <= n) {
            for item in 0..up_sweep_items(n, block_size) + padded {
                unsafe { up_sweep_item(xs.as_mut_ptr(), n, block_size, item) };
            }
        }
        for block_size in div_step(n / 4, 2).take_while(|&b| b > 0) {
            for item in 0..down_sweep_items(n, block_size) + padded {
                unsafe { down_sweep_item(xs.as_mut_ptr(), n, block_size, item) };
            }
        }
    }

    #[test]
    fn item_counts_test() {
        assert_eq!(up_sweep_items(16, 2), 8);
        assert_eq!(up_sweep_items(16, 16), 1);
        assert_eq!(down_sweep_items(16, 4), 1);
        assert_eq!(down_sweep_items(16, 1), 7);
        assert_eq!(down_sweep_items(4, 4), 0);
    }

    #[test]
    fn up_sweep_leaves_block_totals() {
        let mut xs = [1u32; 8];
        for block_size in [2, 4, 8] {
            for item in 0..up_sweep_items(8, block_size) {
                unsafe { up_sweep_item(xs.as_mut_ptr(), 8, block_size, item) };
            }
        }
        assert_eq!(xs, [1, 2, 1, 4, 1, 2, 1, 8]);
    }

    #[test]
    fn four_elements() {
        let mut xs = [1, 2, 3, 4];
        scan_in_order(&mut xs, 0);
        assert_eq!(xs, [1, 3, 6, 10]);
    }

    #[test]
    fn padded_threads_are_no_ops() {
        let mut xs = [1u32; 32];
        scan_in_order(&mut xs, 128);
        let expected: Vec<u32> = (1..=32).collect();
        assert_eq!(xs.to_vec(), expected);
    }

    #[test]
    fn wraps_on_overflow() {
        let mut xs = [u32::MAX, 1, u32::MAX, 2];
        scan_in_order(&mut xs, 0);
        assert_eq!(xs, [u32::MAX, 0, u32::MAX, 1]);
    }
}
