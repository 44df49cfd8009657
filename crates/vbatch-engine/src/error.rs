//! Error types for batched LU factorization.

use thiserror::Error;
use vbatch_core::{Param, Precision};

/// Status code reported when workspace allocation fails.
pub const ALLOCATION_CODE: i32 = -113;

/// Status code reported when a launch faults on its queue.
pub const DEVICE_FAULT_CODE: i32 = -114;

/// Errors that can occur during batched LU operations.
///
/// Singular matrices are not errors: they are reported through the
/// per-matrix status array and never abort the batch.
#[derive(Debug, Error)]
pub enum BatchedLuError {
    /// A caller-supplied argument violates the batch contract.
    #[error("Invalid argument {param}: {message}")]
    InvalidArgument { param: Param, message: String },

    /// Workspace allocation failed before any work was queued.
    #[error("Workspace allocation failed: {0}")]
    Allocation(String),

    /// A launched kernel faulted; the queue stays faulted until reset.
    #[error("Device fault in {kernel}: {message}")]
    DeviceFault { kernel: String, message: String },

    /// Execution queue could not be created.
    #[error("Queue initialization failed: {0}")]
    QueueInit(String),

    /// No backend of the requested kind is available.
    #[error("No {0} backend available")]
    NoBackend(String),

    /// The backend cannot factor elements of this precision.
    #[error("{backend} backend does not support precision '{precision}'")]
    UnsupportedPrecision {
        backend: String,
        precision: Precision,
    },

    /// Backend-specific error.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Layout or oracle error from vbatch-core.
    #[error("Core error: {0}")]
    Core(vbatch_core::Error),
}

impl BatchedLuError {
    /// Integer status code following the LAPACK `info` convention.
    ///
    /// Invalid arguments report the negated parameter position; allocation
    /// failures and device faults have dedicated codes; everything else is -1.
    pub fn status_code(&self) -> i32 {
        match self {
            BatchedLuError::InvalidArgument { param, .. } => param.code(),
            BatchedLuError::Allocation(_) => ALLOCATION_CODE,
            BatchedLuError::DeviceFault { .. } => DEVICE_FAULT_CODE,
            BatchedLuError::Core(e) => e.status_code(),
            _ => -1,
        }
    }

    /// Whether this error came from the device rather than the caller.
    pub fn is_device_fault(&self) -> bool {
        matches!(self, BatchedLuError::DeviceFault { .. })
    }

    pub(crate) fn invalid(param: Param, message: impl Into<String>) -> Self {
        BatchedLuError::InvalidArgument {
            param,
            message: message.into(),
        }
    }
}

impl From<vbatch_core::Error> for BatchedLuError {
    fn from(e: vbatch_core::Error) -> Self {
        match e {
            vbatch_core::Error::InvalidArgument { param, message } => {
                BatchedLuError::InvalidArgument { param, message }
            }
            other => BatchedLuError::Core(other),
        }
    }
}

#[cfg(feature = "wgpu")]
impl From<vbatch_backend_wgpu::WgpuError> for BatchedLuError {
    fn from(e: vbatch_backend_wgpu::WgpuError) -> Self {
        match e {
            vbatch_backend_wgpu::WgpuError::NoAdapter => BatchedLuError::NoBackend("wgpu".into()),
            vbatch_backend_wgpu::WgpuError::DeviceLost(msg) => BatchedLuError::DeviceFault {
                kernel: "wgpu".into(),
                message: msg,
            },
            vbatch_backend_wgpu::WgpuError::Validation { kernel, message } => {
                BatchedLuError::DeviceFault { kernel, message }
            }
            other => BatchedLuError::Backend(other.to_string()),
        }
    }
}

/// Result type for batched LU operations.
pub type Result<T> = std::result::Result<T, BatchedLuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(BatchedLuError::invalid(Param::LeadingDim, "ld 2 < rows 3").status_code(), -4);
        assert_eq!(BatchedLuError::Allocation("oom".into()).status_code(), -113);
        let fault = BatchedLuError::DeviceFault {
            kernel: "panel".into(),
            message: "index out of bounds".into(),
        };
        assert_eq!(fault.status_code(), -114);
        assert!(fault.is_device_fault());
        assert_eq!(BatchedLuError::Backend("x".into()).status_code(), -1);
    }

    #[test]
    fn test_core_invalid_argument_keeps_position() {
        let core = vbatch_core::Error::invalid(Param::BatchCount, "empty");
        let err: BatchedLuError = core.into();
        assert!(matches!(
            err,
            BatchedLuError::InvalidArgument {
                param: Param::BatchCount,
                ..
            }
        ));
        assert_eq!(err.status_code(), -7);
    }
}
