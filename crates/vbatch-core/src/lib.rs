//! Core types for variable-size batched LU factorization.
//!
//! This crate holds everything the engine and its callers share: element
//! types, the packed batch layout, tuned block sizes, the FLOP model and the
//! residual checks used to validate factors.

pub mod advisor;
pub mod error;
pub mod flops;
pub mod layout;
pub mod residual;
pub mod scalar;

pub use advisor::{
    alignment, block_size, getrf_vbatched_params, Factorization, GETRF_RECURSIVE_NB,
};
pub use error::{Error, Param, Result};
pub use flops::getrf_flops;
pub use layout::{
    BatchAggregates, BatchBuffers, BatchLayout, BatchLayoutBuilder, BatchMut, MatRef, MatrixDesc,
    MatrixMut,
};
pub use residual::{apply_row_swaps, check_pivots, lu_residual, max_nan};
pub use scalar::{Precision, Scalar};
