//! vbatch-bench: timing and accuracy driver for variable-size batched LU.
//!
//! Each `--range` entry is one test. Every iteration draws a fresh batch of
//! shapes up to the test's maximum, factors it on the selected path and
//! optionally times the reference path and checks the factors. The exit
//! status is the number of failed tests.

mod backend;
mod options;
mod output;
mod trial;

use std::collections::BTreeSet;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use num_complex::Complex;
use vbatch_core::Precision;

use options::Cli;
use output::Row;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(filter)).init();

    match run(&cli) {
        Ok(failed) => {
            if failed > 0 {
                log::warn!("{} of {} tests failed", failed, cli.sizes.len());
            }
            ExitCode::from(failed.min(u8::MAX as usize) as u8)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<usize> {
    let rows = match cli.precision {
        Precision::Single => trial::run_all::<f32>(cli)?,
        Precision::Double => trial::run_all::<f64>(cli)?,
        Precision::ComplexSingle => trial::run_all::<Complex<f32>>(cli)?,
        Precision::ComplexDouble => trial::run_all::<Complex<f64>>(cli)?,
    };

    if cli.json {
        output::print_json(&rows)?;
    } else {
        output::print_table(&rows);
    }

    Ok(failed_tests(&rows))
}

/// Tests with at least one failed iteration.
fn failed_tests(rows: &[Row]) -> usize {
    rows.iter()
        .filter(|r| !r.passed)
        .map(|r| r.test)
        .collect::<BTreeSet<_>>()
        .len()
}
