//! Operation counts for throughput reporting (LAPACK working-note model).

use crate::scalar::Precision;

/// Multiplications performed by `getrf` on an m×n matrix.
pub fn getrf_muls(m: usize, n: usize) -> f64 {
    let (m, n) = (m as f64, n as f64);
    if m < n {
        0.5 * m * (m * (n - m / 3.0 - 1.0) + n) + 2.0 / 3.0 * m
    } else {
        0.5 * n * (n * (m - n / 3.0 - 1.0) + m) + 2.0 / 3.0 * n
    }
}

/// Additions performed by `getrf` on an m×n matrix.
pub fn getrf_adds(m: usize, n: usize) -> f64 {
    let (m, n) = (m as f64, n as f64);
    if m < n {
        0.5 * m * (m * (n - m / 3.0) - n) + m / 6.0
    } else {
        0.5 * n * (n * (m - n / 3.0) - m) + n / 6.0
    }
}

/// Real floating-point operations of `getrf`; a complex multiply counts
/// as 6 and a complex add as 2.
pub fn getrf_flops(precision: Precision, m: usize, n: usize) -> f64 {
    if precision.is_complex() {
        6.0 * getrf_muls(m, n) + 2.0 * getrf_adds(m, n)
    } else {
        getrf_muls(m, n) + getrf_adds(m, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_leading_term() {
        // Square getrf costs ~2/3 n^3 real flops.
        let n = 1000;
        let flops = getrf_flops(Precision::Double, n, n);
        let leading = 2.0 / 3.0 * (n as f64).powi(3);
        assert!((flops / leading - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_small_counts() {
        let close = |a: f64, b: f64| (a - b).abs() < 1e-12;
        // n^3/3 + 2n/3 multiplications, n^3/3 - n^2/2 + n/6 additions.
        assert!(close(getrf_muls(2, 2), 4.0));
        assert!(close(getrf_adds(2, 2), 1.0));
        assert!(close(getrf_muls(1, 1), 1.0));
        assert!(close(getrf_adds(1, 1), 0.0));
    }

    #[test]
    fn test_complex_weighting() {
        let real = getrf_flops(Precision::Double, 64, 32);
        let complex = getrf_flops(Precision::ComplexDouble, 64, 32);
        assert!(complex > 3.0 * real);
    }
}
