use thiserror::Error;

/// The crate-wide error type.
///
/// Every fallible boundary in the tensor/graph/arena core returns one of
/// these variants so callers can match on kind instead of parsing strings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GPError {
    /// Bad axis/range, shape mismatch, non-power-of-two alignment, a
    /// non-positive size where one must be positive, a non-positive
    /// quantization scale, or a type mismatch in attribute access.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A requested attribute key does not exist.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A backing allocator returned null for a construction that required
    /// data.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// A structural violation: dangling reference, cycle, wrong producer,
    /// non-contiguous reshape, and similar invariant breaks.
    #[error("runtime error: {0}")]
    RuntimeError(String),

    /// An optional capability (e.g. reallocation without a known old size)
    /// that this implementation does not support.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Alias used throughout the crate.
pub type GPResult<T> = Result<T, GPError>;

impl GPError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        GPError::InvalidArgument(msg.into())
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        GPError::OutOfRange(msg.into())
    }

    pub fn out_of_memory(msg: impl Into<String>) -> Self {
        GPError::OutOfMemory(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        GPError::RuntimeError(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        GPError::NotImplemented(msg.into())
    }
}
