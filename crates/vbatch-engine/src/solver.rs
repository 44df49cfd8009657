//! Device solver trait and backend selection.
//!
//! Every way of factoring a batch (the native engine, a per-matrix library
//! baseline, the WebGPU accelerator) sits behind [`DeviceSolver`] and is
//! chosen once at configuration time through [`SolverSelector`].

use crate::config::{EngineConfig, QueueConfig};
use crate::error::{BatchedLuError, Result};
use crate::getrf::getrf_vbatched_with_config;
use crate::queue::Queue;
use crate::reference::factor_matrix;
use crate::validate::check_batch;
use vbatch_core::{BatchMut, Precision, Scalar};

/// Kind of device solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverKind {
    /// Variable-size batched engine on a host queue.
    Native,
    /// One library factorization per matrix, round-robin over queues.
    Vendor,
    /// WebGPU accelerator (single precision).
    Wgpu,
}

impl SolverKind {
    /// Parse from a string.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "native" | "engine" => Some(SolverKind::Native),
            "vendor" | "library" => Some(SolverKind::Vendor),
            "wgpu" | "gpu" | "webgpu" => Some(SolverKind::Wgpu),
            _ => None,
        }
    }
}

impl std::fmt::Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverKind::Native => write!(f, "native"),
            SolverKind::Vendor => write!(f, "vendor"),
            SolverKind::Wgpu => write!(f, "wgpu"),
        }
    }
}

/// A batched LU factorization backend.
pub trait DeviceSolver<T: Scalar>: Send + Sync {
    /// Factor every matrix of `batch` in place.
    ///
    /// Same contract as [`getrf_vbatched`](crate::getrf_vbatched): argument
    /// errors fail the call, zero pivots are reported through `info`.
    fn factorize(&self, batch: BatchMut<'_, T>, info: &mut [i32]) -> Result<()>;

    /// Wait for outstanding work and report device faults.
    fn synchronize(&self) -> Result<()>;

    /// Solver kind.
    fn kind(&self) -> SolverKind;
}

/// Selector for choosing a device solver.
#[derive(Debug, Clone)]
pub struct SolverSelector {
    /// Preferred kind; `None` picks the accelerator when it can handle the
    /// precision and falls back to the native engine.
    pub preferred: Option<SolverKind>,
    /// Blocking parameters for the native engine.
    pub engine: EngineConfig,
    /// Queue configuration.
    pub queue: QueueConfig,
    /// Number of queues used by the vendor baseline.
    pub queues: usize,
}

impl Default for SolverSelector {
    fn default() -> Self {
        Self {
            preferred: None,
            engine: EngineConfig::default(),
            queue: QueueConfig::default(),
            queues: 1,
        }
    }
}

impl SolverSelector {
    /// Automatic selection.
    pub fn auto() -> Self {
        Self::default()
    }

    /// Select a specific kind.
    pub fn with_kind(kind: SolverKind) -> Self {
        Self {
            preferred: Some(kind),
            ..Self::default()
        }
    }

    /// Native engine only.
    pub fn native() -> Self {
        Self::with_kind(SolverKind::Native)
    }

    /// Per-matrix library baseline over `queues` queues.
    pub fn vendor(queues: usize) -> Self {
        Self::with_kind(SolverKind::Vendor).with_queues(queues)
    }

    /// Set the engine configuration.
    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = config;
        self
    }

    /// Set the queue configuration.
    pub fn with_queue_config(mut self, config: QueueConfig) -> Self {
        self.queue = config;
        self
    }

    /// Set the number of vendor queues (at least 1).
    pub fn with_queues(mut self, queues: usize) -> Self {
        self.queues = queues.max(1);
        self
    }

    /// Create a solver for element type `T`.
    pub fn create_solver<T: Scalar>(&self) -> Result<Box<dyn DeviceSolver<T>>> {
        if let Some(kind) = self.preferred {
            let solver = self.try_create::<T>(kind)?;
            log::info!("Using {} solver", solver.kind());
            return Ok(solver);
        }

        match self.try_create::<T>(SolverKind::Wgpu) {
            Ok(solver) => {
                log::info!("Using {} solver", solver.kind());
                return Ok(solver);
            }
            Err(e) => log::debug!("wgpu solver unavailable: {}", e),
        }

        let solver = self.try_create::<T>(SolverKind::Native)?;
        log::info!("Using {} solver", solver.kind());
        Ok(solver)
    }

    fn try_create<T: Scalar>(&self, kind: SolverKind) -> Result<Box<dyn DeviceSolver<T>>> {
        match kind {
            SolverKind::Native => Ok(Box::new(NativeSolver::new(
                Queue::with_config(self.queue.clone())?,
                self.engine.clone(),
            ))),
            SolverKind::Vendor => Ok(Box::new(VendorSolver::new(&self.queue, self.queues)?)),
            SolverKind::Wgpu if T::PRECISION != Precision::Single => {
                Err(BatchedLuError::UnsupportedPrecision {
                    backend: "wgpu".to_string(),
                    precision: T::PRECISION,
                })
            }
            #[cfg(feature = "wgpu")]
            SolverKind::Wgpu => Ok(Box::new(crate::wgpu::WgpuSolver::new(self.engine.clone())?)),
            #[cfg(not(feature = "wgpu"))]
            SolverKind::Wgpu => Err(BatchedLuError::NoBackend(
                "wgpu (feature not enabled)".to_string(),
            )),
        }
    }
}

/// The variable-size batched engine on a host queue.
#[derive(Debug)]
pub struct NativeSolver {
    queue: Queue,
    config: EngineConfig,
}

impl NativeSolver {
    /// Create a solver that runs on `queue`.
    pub fn new(queue: Queue, config: EngineConfig) -> Self {
        Self { queue, config }
    }

    /// The queue launches run on.
    pub fn queue(&self) -> &Queue {
        &self.queue
    }
}

impl<T: Scalar> DeviceSolver<T> for NativeSolver {
    fn factorize(&self, batch: BatchMut<'_, T>, info: &mut [i32]) -> Result<()> {
        getrf_vbatched_with_config(batch, info, &self.queue, &self.config)
    }

    fn synchronize(&self) -> Result<()> {
        self.queue.synchronize()
    }

    fn kind(&self) -> SolverKind {
        SolverKind::Native
    }
}

/// Baseline: one library LU per matrix, dispatched round-robin over queues.
///
/// Matrix `i` runs on queue `i % queues`; queues work concurrently and are
/// all synchronized before `factorize` returns.
#[derive(Debug)]
pub struct VendorSolver {
    queues: Vec<Queue>,
}

impl VendorSolver {
    /// Create `queues` queues splitting the configured threads between them.
    pub fn new(config: &QueueConfig, queues: usize) -> Result<Self> {
        let queues = queues.max(1);
        let threads = config
            .threads
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));
        let per_queue = (threads / queues).max(1);

        let queues = (0..queues)
            .map(|q| {
                Queue::with_config(
                    config
                        .clone()
                        .with_threads(per_queue)
                        .with_name(format!("{}-vendor{}", config.name, q)),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { queues })
    }

    /// Number of queues.
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }
}

impl<T: Scalar> DeviceSolver<T> for VendorSolver {
    fn factorize(&self, batch: BatchMut<'_, T>, info: &mut [i32]) -> Result<()> {
        check_batch(batch.descs(), batch.data_len(), batch.pivots_len(), info)?;

        let nq = self.queues.len();
        let mut lanes: Vec<Vec<_>> = (0..nq).map(|_| Vec::new()).collect();
        for (i, (a, status)) in batch.split().into_iter().zip(info.iter_mut()).enumerate() {
            lanes[i % nq].push((a, status));
        }

        let results: Vec<Result<()>> = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .queues
                .iter()
                .zip(lanes)
                .map(|(queue, lane)| {
                    s.spawn(move || -> Result<()> {
                        for (a, status) in lane {
                            *status = queue.launch("vendor_getrf", move || factor_matrix(a))?;
                        }
                        Ok(())
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(BatchedLuError::Backend("vendor dispatch thread panicked".into()))
                    })
                })
                .collect()
        });

        results.into_iter().collect::<Result<()>>()?;
        <Self as DeviceSolver<T>>::synchronize(self)
    }

    fn synchronize(&self) -> Result<()> {
        self.queues.iter().try_for_each(Queue::synchronize)
    }

    fn kind(&self) -> SolverKind {
        SolverKind::Vendor
    }
}
