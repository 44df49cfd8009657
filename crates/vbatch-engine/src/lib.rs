//! Variable-size batched LU factorization with partial pivoting.
//!
//! Factors many independent general matrices of differing shapes in one
//! call, `P * A = L * U` per matrix, in place in a packed batch buffer.
//!
//! # Entry points
//!
//! - [`getrf_vbatched`]: validates the batch, sizes the workspace from the
//!   block-size advisor and runs the panel loop on a [`Queue`].
//! - [`getrf_vbatched_max_nocheck`]: the same loop with caller-supplied
//!   maxima, block sizes and workspace, no validation.
//! - [`reference::getrf_batch`]: per-matrix nalgebra LU used as an oracle.
//! - [`SolverSelector`]: picks a [`DeviceSolver`] (native engine, per-matrix
//!   baseline, or the WebGPU accelerator with the `wgpu` feature).
//!
//! # Example
//!
//! ```
//! use vbatch_engine::{getrf_vbatched, Queue};
//! use vbatch_engine::vbatch_core::{BatchBuffers, BatchLayout};
//!
//! let layout = BatchLayout::new(&[2, 3], &[2, 2]).unwrap();
//! let mut batch = BatchBuffers::<f64>::new(layout);
//! batch.write_matrix(0, &[4.0, 2.0, 3.0, 1.0], 2);
//! batch.write_matrix(1, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3);
//!
//! let queue = Queue::new().unwrap();
//! let mut info = vec![0; 2];
//! getrf_vbatched(batch.view_mut(), &mut info, &queue).unwrap();
//! assert_eq!(info, vec![0, 0]);
//! ```

pub mod config;
pub mod error;
pub mod getrf;
mod kernels;
pub mod queue;
pub mod reference;
pub mod solver;
pub mod validate;
pub mod workspace;

#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use config::{DEFAULT_COLUMN_GRAIN, EngineConfig, QueueConfig, ReferenceConfig};
pub use error::{ALLOCATION_CODE, BatchedLuError, DEVICE_FAULT_CODE, Result};
pub use getrf::{MaxHints, getrf_vbatched, getrf_vbatched_max_nocheck, getrf_vbatched_with_config};
pub use queue::Queue;
pub use solver::{DeviceSolver, NativeSolver, SolverKind, SolverSelector, VendorSolver};
pub use validate::check_batch;
pub use workspace::Workspace;

pub use vbatch_core;

#[cfg(feature = "wgpu")]
pub use self::wgpu::WgpuSolver;
