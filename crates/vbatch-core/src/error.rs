//! Error types for batch layout and argument validation.

use std::fmt;
use thiserror::Error;

/// Parameter positions of the checked factorization entry.
///
/// Invalid-argument status codes are the negated position, so a bad leading
/// dimension reports `-4` in both the overall status and the per-matrix
/// status entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Per-matrix row counts.
    Rows = 1,
    /// Per-matrix column counts.
    Cols = 2,
    /// Packed data buffer (footprint out of range or overlapping).
    Data = 3,
    /// Per-matrix leading dimensions.
    LeadingDim = 4,
    /// Packed pivot buffer.
    Pivots = 5,
    /// Per-matrix status array.
    Info = 6,
    /// Number of matrices in the batch.
    BatchCount = 7,
}

impl Param {
    /// 1-based position of the parameter.
    pub fn position(self) -> i32 {
        self as i32
    }

    /// Status code reported for an invalid value of this parameter.
    pub fn code(self) -> i32 {
        -(self as i32)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Param::Rows => "rows",
            Param::Cols => "cols",
            Param::Data => "data",
            Param::LeadingDim => "ld",
            Param::Pivots => "pivots",
            Param::Info => "info",
            Param::BatchCount => "batch_count",
        };
        write!(f, "{} (#{})", name, self.position())
    }
}

/// Errors raised while describing or validating a batch.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied argument violates the batch contract.
    #[error("Invalid argument {param}: {message}")]
    InvalidArgument { param: Param, message: String },

    /// The pivot sequence of a matrix references a row outside the matrix.
    #[error("Pivot {index} of matrix {matrix} is {value}, expected 1..={rows}")]
    PivotOutOfRange {
        matrix: usize,
        index: usize,
        value: i32,
        rows: usize,
    },

    /// Two buffers that must agree in shape do not.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl Error {
    /// Convenience constructor for invalid-argument errors.
    pub fn invalid(param: Param, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            param,
            message: message.into(),
        }
    }

    /// Integer status code (negative parameter position, or -1).
    pub fn status_code(&self) -> i32 {
        match self {
            Error::InvalidArgument { param, .. } => param.code(),
            _ => -1,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
