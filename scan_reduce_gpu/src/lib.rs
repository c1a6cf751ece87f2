#![cfg_attr(
    target_os = "cuda",
    no_std,
    feature(register_attr),
    register_attr(nvvm_internal)
)]

pub mod reduce;
pub mod scan;
pub mod step;

/// Number of threads per block for every launch. The tree reduction relies on
/// this being a power of two.
pub const WORK_GROUP_SIZE: usize = 128;

/// Number of elements each thread accumulates in the loop reductions.
pub const VALUES_PER_WORK_ITEM: usize = 64;
