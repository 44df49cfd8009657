//! Error types for WebGPU backend operations.

use std::fmt;

/// WebGPU backend error type.
#[derive(Debug)]
#[non_exhaustive]
pub enum WgpuError {
    /// No suitable GPU adapter found.
    NoAdapter,
    /// GPU device initialization failed.
    DeviceInit(String),
    /// The device was lost while work was in flight.
    DeviceLost(String),
    /// A kernel raised a validation or out-of-memory error.
    Validation {
        /// Phase that was being recorded.
        kernel: String,
        /// Driver message.
        message: String,
    },
    /// Buffer creation or mapping failed.
    Buffer(String),
    /// Invalid dimension or size.
    InvalidDimension(String),
    /// Buffer size exceeds GPU limits.
    BufferTooLarge {
        /// Required buffer size in bytes.
        required: u64,
        /// Maximum binding size supported.
        max_buffer: u64,
    },
}

impl fmt::Display for WgpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WgpuError::NoAdapter => write!(f, "No suitable GPU adapter found"),
            WgpuError::DeviceInit(msg) => write!(f, "GPU device initialization failed: {}", msg),
            WgpuError::DeviceLost(msg) => write!(f, "GPU device lost: {}", msg),
            WgpuError::Validation { kernel, message } => {
                write!(f, "GPU kernel {} failed: {}", kernel, message)
            }
            WgpuError::Buffer(msg) => write!(f, "GPU buffer operation failed: {}", msg),
            WgpuError::InvalidDimension(msg) => write!(f, "Invalid dimension: {}", msg),
            WgpuError::BufferTooLarge {
                required,
                max_buffer,
            } => write!(
                f,
                "Batch requires {} bytes but max binding size is {}",
                required, max_buffer
            ),
        }
    }
}

impl std::error::Error for WgpuError {}

/// Result type for wgpu operations.
pub type Result<T> = std::result::Result<T, WgpuError>;
