//! Benchmarks and validates a work-efficient parallel prefix sum and five
//! parallel sum strategies on a data-parallel accelerator.
//!
//! The engines are generic over [`Accelerator`]. [`HostDevice`] emulates the
//! launch model on CPU threads and is always available. `CudaDevice` runs the
//! PTX kernels from `scan_reduce_gpu` and requires the `cuda` feature.

pub mod bench;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod device;
mod error;
pub mod host;
pub mod reduce;
pub mod reference;
pub mod scan;
pub mod verify;

#[cfg(feature = "cuda")]
pub use cuda::CudaDevice;
pub use device::{Accelerator, DeviceMemory, WorkSize};
pub use error::{Error, Result};
pub use host::{HostDevice, Schedule};
pub use reduce::{ReductionEngine, Strategy};
pub use scan::{ScanEngine, ScanPass};
