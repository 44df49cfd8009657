//! Execution path selection.

use crate::options::{BackendArg, Cli, Version};
use std::time::Instant;
use vbatch_core::{BatchAggregates, BatchMut, Scalar};
use vbatch_engine::{
    DeviceSolver, EngineConfig, MaxHints, Queue, QueueConfig, SolverSelector, Workspace,
    getrf_vbatched_max_nocheck,
};

/// How a trial factors its batch.
pub enum Runner<T: Scalar> {
    /// Through a device solver (checked engine, vendor baseline, WebGPU).
    Solver(Box<dyn DeviceSolver<T>>),
    /// Unchecked engine entry on a host queue.
    Unchecked(Queue),
}

impl<T: Scalar> Runner<T> {
    /// Short label for reports.
    pub fn label(&self) -> String {
        match self {
            Runner::Solver(s) => s.kind().to_string(),
            Runner::Unchecked(_) => "native-nocheck".to_string(),
        }
    }

    /// Factor `batch` and return the seconds spent from launch to
    /// synchronization. Setup of the unchecked path is not timed.
    pub fn factor(&self, batch: BatchMut<'_, T>, info: &mut [i32]) -> vbatch_engine::Result<f64> {
        match self {
            Runner::Solver(solver) => {
                let start = Instant::now();
                solver.factorize(batch, info)?;
                solver.synchronize()?;
                Ok(start.elapsed().as_secs_f64())
            }
            Runner::Unchecked(queue) => {
                let hints = MaxHints::from(&BatchAggregates::from_descs(batch.descs()));
                let (nb, recnb) = EngineConfig::default().block_sizes(hints.max_m, hints.max_n, T::PRECISION);
                let mut workspace = Workspace::new(batch.len(), hints.max_m)?;

                let start = Instant::now();
                getrf_vbatched_max_nocheck(batch, &hints, nb, recnb, &mut workspace, info, queue)?;
                queue.synchronize()?;
                Ok(start.elapsed().as_secs_f64())
            }
        }
    }
}

/// Pick the execution path for the requested version and backend.
///
/// A WebGPU request that cannot be honoured falls back to the host queue
/// with a warning.
pub fn select_runner<T: Scalar>(cli: &Cli) -> vbatch_engine::Result<Runner<T>> {
    if cli.backend == BackendArg::Wgpu {
        if cli.version != Version::Checked {
            log::warn!("{:?} version runs on the host queue only", cli.version);
        } else {
            #[cfg(feature = "wgpu")]
            {
                match SolverSelector::with_kind(vbatch_engine::SolverKind::Wgpu).create_solver::<T>() {
                    Ok(solver) => return Ok(Runner::Solver(solver)),
                    Err(e) => log::warn!("WebGPU requested but unavailable ({}), falling back to host", e),
                }
            }
            #[cfg(not(feature = "wgpu"))]
            {
                log::warn!("WebGPU support not compiled in, falling back to host");
            }
        }
    }

    match cli.version {
        Version::Checked => Ok(Runner::Solver(SolverSelector::native().create_solver::<T>()?)),
        Version::Nocheck => Ok(Runner::Unchecked(Queue::with_config(QueueConfig::default())?)),
        Version::Vendor => Ok(Runner::Solver(
            SolverSelector::vendor(cli.queues).create_solver::<T>()?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_versions_map_to_runners() {
        let cli = Cli::try_parse_from(["vbatch-bench"]).unwrap();
        assert_eq!(select_runner::<f64>(&cli).unwrap().label(), "native");

        let cli = Cli::try_parse_from(["vbatch-bench", "--version", "nocheck"]).unwrap();
        assert_eq!(select_runner::<f64>(&cli).unwrap().label(), "native-nocheck");

        let cli = Cli::try_parse_from(["vbatch-bench", "--version", "vendor", "--queues", "2"]).unwrap();
        assert_eq!(select_runner::<f64>(&cli).unwrap().label(), "vendor");
    }

    #[test]
    fn test_wgpu_double_falls_back_to_host() {
        let cli = Cli::try_parse_from(["vbatch-bench", "--backend", "wgpu", "--precision", "d"]).unwrap();
        assert_eq!(select_runner::<f64>(&cli).unwrap().label(), "native");
    }
}
