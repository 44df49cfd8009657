//! WebGPU backend for variable-size batched LU factorization.
//!
//! Runs the same panel / swap / update phases as the host engine, one
//! compute pass per phase, on single-precision data.

pub mod batched_lu;
pub mod context;
pub mod error;

pub use batched_lu::{MAX_BATCH, WgpuBatchedLu};
pub use context::WgpuContext;
pub use error::{Result, WgpuError};
pub use wgpu::Backend;
