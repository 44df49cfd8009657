//! WebGPU accelerator behind [`DeviceSolver`].
//!
//! Only single precision is supported. The batch is validated on the host,
//! factored on the GPU with the same panel loop as the native engine
//! (unblocked panels) and copied back before `factorize` returns.

use crate::config::EngineConfig;
use crate::error::{BatchedLuError, Result};
use crate::solver::{DeviceSolver, SolverKind};
use crate::validate::check_batch;
use std::sync::Arc;
use vbatch_backend_wgpu::{Backend, WgpuBatchedLu, WgpuContext};
use vbatch_core::{BatchAggregates, BatchMut, Precision, Scalar};

/// Batched LU on a WebGPU device.
pub struct WgpuSolver {
    lu: WgpuBatchedLu,
    config: EngineConfig,
}

impl WgpuSolver {
    /// Create a solver on the best available adapter.
    pub fn new(config: EngineConfig) -> Result<Self> {
        if !WgpuContext::is_available() {
            return Err(BatchedLuError::NoBackend("wgpu (no adapter found)".into()));
        }
        let ctx = Arc::new(WgpuContext::new()?);
        Self::with_context(ctx, config)
    }

    /// Create a solver on an existing context.
    pub fn with_context(ctx: Arc<WgpuContext>, config: EngineConfig) -> Result<Self> {
        log::info!("wgpu adapter {} ({:?})", ctx.adapter_name(), ctx.backend());
        let lu = WgpuBatchedLu::new(ctx)?;
        Ok(Self { lu, config })
    }

    /// Name of the adapter in use.
    pub fn adapter_name(&self) -> &str {
        self.lu.context().adapter_name()
    }

    /// Graphics API behind the adapter (Metal, Vulkan, etc.).
    pub fn backend(&self) -> Backend {
        self.lu.context().backend()
    }
}

impl std::fmt::Debug for WgpuSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuSolver")
            .field("adapter", &self.adapter_name())
            .field("backend", &self.backend())
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Scalar> DeviceSolver<T> for WgpuSolver {
    fn factorize(&self, batch: BatchMut<'_, T>, info: &mut [i32]) -> Result<()> {
        if T::PRECISION != Precision::Single {
            return Err(BatchedLuError::UnsupportedPrecision {
                backend: "wgpu".into(),
                precision: T::PRECISION,
            });
        }
        check_batch(batch.descs(), batch.data_len(), batch.pivots_len(), info)?;

        let agg = BatchAggregates::from_descs(batch.descs());
        let (nb, _) = self
            .config
            .block_sizes(agg.max_rows, agg.max_cols, Precision::Single);

        let (descs, data, pivots) = batch.into_parts();
        let mut staged: Vec<f32> = data.iter().map(|v| v.parts().0 as f32).collect();

        self.lu
            .factorize(descs, &mut staged, pivots, info, nb, agg.max_min_dim)?;

        for (dst, &v) in data.iter_mut().zip(&staged) {
            *dst = T::from_parts(v as f64, 0.0);
        }

        let singular = info.iter().filter(|&&s| s > 0).count();
        if singular > 0 {
            log::warn!("{} of {} matrices have an exactly zero pivot", singular, descs.len());
        }
        Ok(())
    }

    fn synchronize(&self) -> Result<()> {
        Ok(self.lu.context().synchronize()?)
    }

    fn kind(&self) -> SolverKind {
        SolverKind::Wgpu
    }
}
