//! Command-line options.

use clap::{Parser, ValueEnum};
use vbatch_core::Precision;

/// Largest shape drawn for one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSpec {
    pub max_m: usize,
    pub max_n: usize,
}

/// Engine entry point to time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Version {
    /// Checked entry: validation, advisor block sizes, private workspace
    Checked,
    /// Unchecked entry with advisor parameters and a preallocated workspace
    Nocheck,
    /// One library factorization per matrix, round-robin over queues
    Vendor,
}

/// Where the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// Host queue backed by a thread pool
    Host,
    /// WebGPU accelerator (single precision only)
    Wgpu,
}

#[derive(Parser, Debug)]
#[command(name = "vbatch-bench")]
#[command(about = "Time and check variable-size batched LU factorization")]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Maximum sizes per test as M:N (or N for square), comma separated
    #[arg(long = "range", value_parser = parse_size, value_delimiter = ',', default_value = "32:32,64:64,128:128")]
    pub sizes: Vec<SizeSpec>,

    /// Number of matrices per batch
    #[arg(long, default_value_t = 100)]
    pub batch: usize,

    /// Iterations per test
    #[arg(long, default_value_t = 1)]
    pub niter: usize,

    /// Element precision: s, d, c or z
    #[arg(long, value_parser = parse_precision, default_value = "d")]
    pub precision: Precision,

    /// Entry point to time
    #[arg(long, value_enum, default_value_t = Version::Checked)]
    pub version: Version,

    /// Execution backend
    #[arg(long, value_enum, default_value_t = BackendArg::Host)]
    pub backend: BackendArg,

    /// Queues used by the vendor version
    #[arg(long, default_value_t = 4)]
    pub queues: usize,

    /// Also time the reference factorization
    #[arg(long)]
    pub lapack: bool,

    /// Check pivots and residuals
    #[arg(long)]
    pub check: bool,

    /// Residual tolerance in units of machine epsilon
    #[arg(long, default_value_t = 30.0)]
    pub tolerance: f64,

    /// Threads for the reference path (default: one per core)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Leading dimension alignment
    #[arg(long, default_value_t = 1)]
    pub align: usize,

    /// Seed for sizes and entries
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse `M:N` or `N`.
pub fn parse_size(s: &str) -> Result<SizeSpec, String> {
    let parse = |v: &str| -> Result<usize, String> {
        let n: usize = v
            .trim()
            .parse()
            .map_err(|_| format!("invalid size '{}'", v))?;
        if n == 0 {
            return Err("sizes must be at least 1".to_string());
        }
        Ok(n)
    };

    match s.split_once(':') {
        Some((m, n)) => Ok(SizeSpec {
            max_m: parse(m)?,
            max_n: parse(n)?,
        }),
        None => {
            let n = parse(s)?;
            Ok(SizeSpec { max_m: n, max_n: n })
        }
    }
}

/// Parse a LAPACK precision letter.
pub fn parse_precision(s: &str) -> Result<Precision, String> {
    match s.to_lowercase().as_str() {
        "s" | "single" | "f32" => Ok(Precision::Single),
        "d" | "double" | "f64" => Ok(Precision::Double),
        "c" | "complex-single" | "c32" => Ok(Precision::ComplexSingle),
        "z" | "complex-double" | "c64" => Ok(Precision::ComplexDouble),
        _ => Err(format!("unknown precision '{}', expected s, d, c or z", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_selects_entry_point() {
        let cli = Cli::try_parse_from(["vbatch-bench", "--version", "vendor"]).unwrap();
        assert_eq!(cli.version, Version::Vendor);
        let cli = Cli::try_parse_from(["vbatch-bench"]).unwrap();
        assert_eq!(cli.version, Version::Checked);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("10:20").unwrap(), SizeSpec { max_m: 10, max_n: 20 });
        assert_eq!(parse_size("64").unwrap(), SizeSpec { max_m: 64, max_n: 64 });
        assert!(parse_size("0:4").is_err());
        assert!(parse_size("a:b").is_err());
    }

    #[test]
    fn test_parse_precision() {
        assert_eq!(parse_precision("Z").unwrap(), Precision::ComplexDouble);
        assert_eq!(parse_precision("s").unwrap(), Precision::Single);
        assert!(parse_precision("q").is_err());
    }

    #[test]
    fn test_cli_defaults_and_ranges() {
        let cli = Cli::try_parse_from([
            "vbatch-bench",
            "--range",
            "8:16,32",
            "--precision",
            "c",
            "--version",
            "nocheck",
            "--check",
        ])
        .unwrap();
        assert_eq!(cli.sizes.len(), 2);
        assert_eq!(cli.sizes[1], SizeSpec { max_m: 32, max_n: 32 });
        assert_eq!(cli.precision, Precision::ComplexSingle);
        assert_eq!(cli.version, Version::Nocheck);
        assert_eq!(cli.backend, BackendArg::Host);
        assert!(cli.check);
        assert_eq!(cli.tolerance, 30.0);
    }
}
