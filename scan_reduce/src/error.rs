use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A parallel result disagrees with the sequential reference. For scalar
    /// results `index` is 0.
    #[error("result is inconsistent at index {index}: expected {expected}, got {actual}")]
    Consistency {
        index: usize,
        expected: u32,
        actual: u32,
    },

    #[error("scan requires a power-of-two length, got {0}")]
    NotPowerOfTwo(usize),

    #[error("host slice has {host} elements but the device buffer has {device}")]
    LengthMismatch { host: usize, device: usize },

    #[error("unknown reduction strategy `{name}`, expected one of: {known}")]
    UnknownStrategy { name: String, known: String },

    #[error("{0} support is not compiled in")]
    Unsupported(&'static str),

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[cfg(feature = "cuda")]
    #[error(transparent)]
    Cuda(#[from] cust::error::CudaError),
}
