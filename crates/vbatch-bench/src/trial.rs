//! Batch generation, timing and accuracy checks.

use crate::backend::{Runner, select_runner};
use crate::options::{Cli, SizeSpec};
use crate::output::Row;
use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use vbatch_core::{BatchBuffers, BatchLayout, Scalar, check_pivots, getrf_flops, lu_residual, max_nan};
use vbatch_engine::ReferenceConfig;
use vbatch_engine::reference::getrf_batch;

/// Run every test of `cli` for element type `T`.
pub fn run_all<T: Scalar>(cli: &Cli) -> anyhow::Result<Vec<Row>> {
    let runner = select_runner::<T>(cli).context("creating solver")?;
    log::info!(
        "{}getrf_vbatched on {} path: {} tests x {} iterations, batch {}",
        T::PRECISION,
        runner.label(),
        cli.sizes.len(),
        cli.niter,
        cli.batch
    );

    let mut rows = Vec::with_capacity(cli.sizes.len() * cli.niter);
    for (test, &size) in cli.sizes.iter().enumerate() {
        for iter in 0..cli.niter {
            rows.push(run_iteration::<T>(cli, &runner, test + 1, iter, size)?);
        }
    }
    Ok(rows)
}

/// Draw per-matrix shapes for one test.
///
/// `M = 1 + rand % max_m`, `N = max(1, round(max_n / max_m * M))`, so the
/// aspect ratio of the test's maximum is kept.
pub fn draw_shapes(size: SizeSpec, batch: usize, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let ratio = size.max_n as f64 / size.max_m as f64;
    let rows: Vec<usize> = (0..batch).map(|_| 1 + rng.gen_range(0..size.max_m)).collect();
    let cols = rows
        .iter()
        .map(|&m| ((ratio * m as f64).round() as usize).max(1))
        .collect();
    (rows, cols)
}

/// Buffers filled with uniform (0, 1) entries (both parts for complex).
pub fn random_buffers<T: Scalar>(layout: BatchLayout, rng: &mut StdRng) -> BatchBuffers<T> {
    let mut buffers = BatchBuffers::<T>::new(layout);
    let descs = buffers.layout().descs().to_vec();
    let data = buffers.data_mut();
    for d in &descs {
        for j in 0..d.cols {
            for i in 0..d.rows {
                let re: f64 = rng.r#gen();
                let im: f64 = rng.r#gen();
                data[d.index(i, j)] = T::from_parts(re, im);
            }
        }
    }
    buffers
}

fn run_iteration<T: Scalar>(
    cli: &Cli,
    runner: &Runner<T>,
    test: usize,
    iter: usize,
    size: SizeSpec,
) -> anyhow::Result<Row> {
    // Shapes repeat across iterations; entries do not.
    let mut size_rng = StdRng::seed_from_u64(cli.seed.wrapping_add(test as u64));
    let (rows, cols) = draw_shapes(size, cli.batch, &mut size_rng);
    let layout = BatchLayout::builder()
        .ld_alignment(cli.align)
        .build(&rows, &cols)
        .with_context(|| format!("building layout for test {}", test))?;

    let mut entry_rng = StdRng::seed_from_u64(
        cli.seed
            .wrapping_mul(1_000_003)
            .wrapping_add((test * 7919 + iter) as u64),
    );
    let original = random_buffers::<T>(layout, &mut entry_rng);
    let mut buffers = original.clone();

    let gflop = rows
        .iter()
        .zip(&cols)
        .map(|(&m, &n)| getrf_flops(T::PRECISION, m, n))
        .sum::<f64>()
        / 1e9;

    let mut row = Row {
        test,
        iter,
        precision: T::PRECISION.to_string(),
        path: runner.label(),
        batch: cli.batch,
        max_m: size.max_m,
        max_n: size.max_n,
        gflop,
        engine_ms: None,
        engine_gflops: None,
        reference_ms: None,
        reference_gflops: None,
        error: None,
        singular: 0,
        status: 0,
        message: None,
        passed: true,
    };

    let mut info = vec![0; cli.batch];
    match runner.factor(buffers.view_mut(), &mut info) {
        Ok(seconds) => {
            row.engine_ms = Some(seconds * 1e3);
            row.engine_gflops = Some(gflop / seconds);
        }
        Err(e) => {
            log::error!("Test {} iteration {}: {}", test, iter, e);
            row.status = e.status_code();
            row.message = Some(e.to_string());
            row.passed = false;
            return Ok(row);
        }
    }

    row.singular = info.iter().filter(|&&s| s > 0).count();
    for (i, s) in nonzero_statuses(&info) {
        log::debug!("Matrix {} ({}x{}) returned status {}", i, rows[i], cols[i], s);
    }
    if row.singular > 0 {
        log::warn!(
            "Test {} iteration {}: {} matrices with a zero pivot",
            test,
            iter,
            row.singular
        );
    }

    if cli.lapack {
        let mut reference = original.clone();
        let mut ref_info = vec![0; cli.batch];
        let config = ReferenceConfig::default().with_threads(cli.threads.unwrap_or(0));
        let start = Instant::now();
        getrf_batch(reference.view_mut(), &mut ref_info, &config).context("reference factorization")?;
        let seconds = start.elapsed().as_secs_f64();
        row.reference_ms = Some(seconds * 1e3);
        row.reference_gflops = Some(gflop / seconds);

        let ref_statuses = nonzero_statuses(&ref_info);
        for &(i, s) in &ref_statuses {
            log::debug!("Reference matrix {} ({}x{}) returned status {}", i, rows[i], cols[i], s);
        }
        if !ref_statuses.is_empty() {
            log::warn!(
                "Test {} iteration {}: reference reported {} nonzero statuses",
                test,
                iter,
                ref_statuses.len()
            );
        }
    }

    if cli.check {
        let error = max_scaled_error(&original, &buffers);
        let tol = cli.tolerance * T::epsilon();
        // NaN compares false, so a failed pivot check fails the test.
        row.passed = error < tol;
        row.error = Some(error / T::epsilon());
        if !row.passed {
            log::warn!(
                "Test {} iteration {}: error {:e} exceeds tolerance {:e}",
                test,
                iter,
                error,
                tol
            );
        }
    }

    Ok(row)
}

/// Matrices with a nonzero `info` entry, in batch order.
pub fn nonzero_statuses(info: &[i32]) -> Vec<(usize, i32)> {
    info.iter()
        .enumerate()
        .filter(|(_, s)| **s != 0)
        .map(|(i, &s)| (i, s))
        .collect()
}

/// Largest residual over the batch, `NaN` if any pivot is out of range.
pub fn max_scaled_error<T: Scalar>(original: &BatchBuffers<T>, factored: &BatchBuffers<T>) -> f64 {
    let mut error = 0.0;
    for (i, d) in factored.layout().descs().iter().enumerate() {
        let ipiv = factored.matrix_pivots(i);
        if let Err(e) = check_pivots(i, ipiv, d.rows) {
            log::warn!("{}", e);
            return f64::NAN;
        }
        let r = lu_residual(original.matrix(i), factored.matrix(i), ipiv).unwrap_or(f64::NAN);
        error = max_nan(error, r);
    }
    error
}
