//! Empirically tuned block sizes.
//!
//! Every (factorization, precision) pair has its own step function over the
//! largest problem dimension of the batch. A single block size applies to the
//! whole batch call, so callers pass the batch maximum rather than a
//! per-matrix dimension.

use crate::scalar::Precision;

/// Recursive block size used to subdivide LU panels.
pub const GETRF_RECURSIVE_NB: usize = 32;

/// Factorization whose blocking is being tuned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Factorization {
    /// LU with partial pivoting (`getrf`).
    Lu,
    /// Cholesky (`potrf`).
    Cholesky,
    /// QR (`geqrf`).
    Qr,
    /// QL (`geqlf`).
    Ql,
    /// LQ (`gelqf`).
    Lq,
    /// Hessenberg reduction (`gehrd`).
    Hessenberg,
}

impl Factorization {
    /// All tuned factorizations.
    pub const ALL: [Factorization; 6] = [
        Factorization::Lu,
        Factorization::Cholesky,
        Factorization::Qr,
        Factorization::Ql,
        Factorization::Lq,
        Factorization::Hessenberg,
    ];

    /// LAPACK routine suffix.
    pub fn routine(self) -> &'static str {
        match self {
            Factorization::Lu => "getrf",
            Factorization::Cholesky => "potrf",
            Factorization::Qr => "geqrf",
            Factorization::Ql => "geqlf",
            Factorization::Lq => "gelqf",
            Factorization::Hessenberg => "gehrd",
        }
    }
}

/// Divisibility constraint the returned block size always satisfies.
///
/// LU blocking loops assume panels aligned to 64 columns; the other
/// factorizations need a multiple of 32.
pub fn alignment(kind: Factorization) -> usize {
    match kind {
        Factorization::Lu => 64,
        _ => 32,
    }
}

/// Tuned block size for `kind` in `precision` at problem dimension `dim`.
pub fn block_size(kind: Factorization, precision: Precision, dim: usize) -> usize {
    use Factorization::*;
    use Precision::*;

    match (kind, precision) {
        (Lu, Single | Double | ComplexSingle) => {
            if dim <= 2048 {
                64
            } else {
                128
            }
        }
        (Lu, ComplexDouble) => 128,

        (Cholesky, Single) => {
            if dim <= 3328 {
                128
            } else if dim <= 4256 {
                224
            } else {
                288
            }
        }
        (Cholesky, Double) => {
            if dim <= 4256 {
                128
            } else {
                256
            }
        }
        (Cholesky, ComplexSingle | ComplexDouble) => 64,

        (Qr, Single | ComplexSingle) => {
            if dim <= 2048 {
                32
            } else if dim <= 4032 {
                64
            } else {
                128
            }
        }
        (Qr, Double | ComplexDouble) => {
            if dim <= 2048 {
                64
            } else {
                128
            }
        }

        (Ql, _) => {
            if dim <= 1024 {
                32
            } else if dim <= 4032 {
                64
            } else {
                128
            }
        }

        (Lq, _) => {
            if dim <= 2048 {
                32
            } else if dim <= 4032 {
                64
            } else {
                128
            }
        }

        (Hessenberg, Single | ComplexSingle) => {
            if dim <= 1024 {
                32
            } else {
                64
            }
        }
        (Hessenberg, Double | ComplexDouble) => {
            if dim <= 2048 {
                32
            } else {
                64
            }
        }
    }
}

/// Panel width and recursive block size for a variable-size LU batch.
///
/// Returns `(nb, recnb)`: `nb` is the LU table evaluated at the largest
/// dimension of the batch, `recnb` the width below which panels are factored
/// without further recursion. `recnb` always divides `nb`.
pub fn getrf_vbatched_params(max_m: usize, max_n: usize, precision: Precision) -> (usize, usize) {
    let nb = block_size(Factorization::Lu, precision, max_m.max(max_n));
    (nb, GETRF_RECURSIVE_NB)
}
