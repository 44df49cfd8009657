//! End-to-end tests for the variable-size batched LU engine.

use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vbatch_engine::reference::getrf_batch;
use vbatch_engine::vbatch_core::{
    BatchBuffers, BatchLayout, MatRef, MatrixDesc, Scalar, check_pivots, lu_residual,
};
use vbatch_engine::{
    BatchedLuError, EngineConfig, MaxHints, Queue, QueueConfig, ReferenceConfig, Workspace,
    getrf_vbatched, getrf_vbatched_max_nocheck, getrf_vbatched_with_config,
};

const CANARY: f64 = -7777.0;

fn queue() -> Queue {
    Queue::with_config(QueueConfig::default().with_threads(4).with_column_grain(8)).unwrap()
}

/// Random batch with values uniform in [-1, 1]; padding rows hold a canary.
fn random_batch<T: Scalar>(
    rows: &[usize],
    cols: &[usize],
    ld_alignment: usize,
    seed: u64,
) -> (BatchBuffers<T>, Vec<Vec<T>>) {
    let layout = BatchLayout::builder()
        .ld_alignment(ld_alignment)
        .build(rows, cols)
        .unwrap();
    let mut buffers = BatchBuffers::<T>::new(layout);
    for v in buffers.data_mut() {
        *v = T::from_parts(CANARY, 0.0);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut originals = Vec::with_capacity(rows.len());
    for (idx, (&m, &n)) in rows.iter().zip(cols).enumerate() {
        let a: Vec<T> = (0..m * n)
            .map(|_| {
                let re = rng.gen_range(-1.0..1.0);
                let im = rng.gen_range(-1.0..1.0);
                T::from_parts(re, im)
            })
            .collect();
        buffers.write_matrix(idx, &a, m);
        originals.push(a);
    }
    (buffers, originals)
}

fn assert_factored<T: Scalar>(buffers: &BatchBuffers<T>, originals: &[Vec<T>], info: &[i32]) {
    let tol = 50.0 * T::epsilon();
    for (idx, d) in buffers.layout().descs().iter().enumerate() {
        assert_eq!(info[idx], 0, "matrix {} reported status {}", idx, info[idx]);
        let ipiv = buffers.matrix_pivots(idx);
        check_pivots(idx, ipiv, d.rows).unwrap();
        let original = MatRef::compact(d.rows, d.cols, &originals[idx]);
        let r = lu_residual(original, buffers.matrix(idx), ipiv).unwrap();
        assert!(
            r < tol,
            "{} matrix {} ({}x{}) residual {:e} exceeds {:e}",
            T::PRECISION,
            idx,
            d.rows,
            d.cols,
            r,
            tol
        );
    }
}

fn assert_padding_untouched<T: Scalar>(buffers: &BatchBuffers<T>) {
    let data = buffers.data();
    for (idx, d) in buffers.layout().descs().iter().enumerate() {
        for j in 0..d.cols {
            for i in d.rows..d.ld {
                let v = data[d.index(i, j)].parts().0;
                assert_eq!(v, CANARY, "padding ({}, {}) of matrix {} overwritten", i, j, idx);
            }
        }
    }
}

#[test]
fn test_heterogeneous_batch_factors() {
    let rows = [1, 5, 40, 17, 64, 3, 100, 33];
    let cols = [1, 9, 40, 60, 16, 3, 70, 33];
    let (mut buffers, originals) = random_batch::<f64>(&rows, &cols, 8, 11);

    let mut info = vec![-99; rows.len()];
    // Small blocking so several panels and the recursive path are exercised.
    let config = EngineConfig::default().with_nb(8).with_recnb(2);
    getrf_vbatched_with_config(buffers.view_mut(), &mut info, &queue(), &config).unwrap();

    assert_factored(&buffers, &originals, &info);
    assert_padding_untouched(&buffers);
}

#[test]
fn test_large_batch_with_advisor_blocking() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut rows: Vec<usize> = (0..24).map(|_| rng.gen_range(1..=300)).collect();
    let mut cols: Vec<usize> = (0..24).map(|_| rng.gen_range(1..=300)).collect();
    // A tall and a wide matrix spanning many panels.
    rows.extend([1024, 150]);
    cols.extend([170, 1024]);
    let (mut buffers, originals) = random_batch::<f64>(&rows, &cols, 32, 99);

    let hints = MaxHints::from(buffers.layout().aggregates());
    let (nb, recnb) =
        EngineConfig::default().block_sizes(hints.max_m, hints.max_n, f64::PRECISION);
    assert!(nb > recnb && hints.max_min_mn > 2 * nb);

    let mut info = vec![-99; rows.len()];
    getrf_vbatched(buffers.view_mut(), &mut info, &queue()).unwrap();

    assert_factored(&buffers, &originals, &info);
    assert_padding_untouched(&buffers);
}

#[test]
fn test_all_precisions() {
    let rows = [12, 30, 7];
    let cols = [20, 30, 4];

    let (mut s, so) = random_batch::<f32>(&rows, &cols, 4, 1);
    let (mut d, dox) = random_batch::<f64>(&rows, &cols, 4, 2);
    let (mut c, co) = random_batch::<Complex<f32>>(&rows, &cols, 4, 3);
    let (mut z, zo) = random_batch::<Complex<f64>>(&rows, &cols, 4, 4);
    let q = queue();
    let mut info = vec![0; 3];

    getrf_vbatched(s.view_mut(), &mut info, &q).unwrap();
    assert_factored(&s, &so, &info);
    getrf_vbatched(d.view_mut(), &mut info, &q).unwrap();
    assert_factored(&d, &dox, &info);
    getrf_vbatched(c.view_mut(), &mut info, &q).unwrap();
    assert_factored(&c, &co, &info);
    getrf_vbatched(z.view_mut(), &mut info, &q).unwrap();
    assert_factored(&z, &zo, &info);
}

#[test]
fn test_single_matrix_matches_reference() {
    let (mut engine, _) = random_batch::<f64>(&[45], &[45], 1, 21);
    let mut reference = engine.clone();

    let mut info_e = vec![0];
    let mut info_r = vec![0];
    getrf_vbatched(engine.view_mut(), &mut info_e, &queue()).unwrap();
    getrf_batch(reference.view_mut(), &mut info_r, &ReferenceConfig::default()).unwrap();

    assert_eq!(info_e, info_r);
    assert_eq!(engine.pivots(), reference.pivots());
    for (x, y) in engine.data().iter().zip(reference.data()) {
        assert!((x - y).abs() < 1e-10, "{} vs {}", x, y);
    }
}

#[test]
fn test_deterministic_across_runs_and_threads() {
    let rows = [20, 64, 9];
    let cols = [31, 64, 9];
    let (first, _) = random_batch::<f64>(&rows, &cols, 1, 5);

    let run = |threads: usize| {
        let mut b = first.clone();
        let mut info = vec![0; 3];
        let q = Queue::with_config(QueueConfig::default().with_threads(threads).with_column_grain(1))
            .unwrap();
        getrf_vbatched(b.view_mut(), &mut info, &q).unwrap();
        (b, info)
    };

    let (a, info_a) = run(1);
    let (b, info_b) = run(4);
    assert_eq!(info_a, info_b);
    assert_eq!(a.pivots(), b.pivots());
    assert_eq!(a.data(), b.data());
}

#[test]
fn test_singular_matrices_are_reported_not_fatal() {
    let rows = [50, 50, 50];
    let cols = [50, 50, 50];
    let (mut buffers, originals) = random_batch::<f64>(&rows, &cols, 1, 8);

    // Matrix 1: column 3 (1-based) exactly zero.
    let mut zeroed = originals[1].clone();
    for i in 0..50 {
        zeroed[i + 2 * 50] = 0.0;
    }
    buffers.write_matrix(1, &zeroed, 50);

    let mut info = vec![0; 3];
    let result = getrf_vbatched(buffers.view_mut(), &mut info, &queue());
    assert!(result.is_ok());
    assert_eq!(info, vec![0, 3, 0]);

    // The factorization of the singular matrix is still completed.
    let r = lu_residual(MatRef::compact(50, 50, &zeroed), buffers.matrix(1), buffers.matrix_pivots(1)).unwrap();
    assert!(r < 50.0 * f64::EPSILON);
    check_pivots(1, buffers.matrix_pivots(1), 50).unwrap();

    // Its neighbours are unaffected.
    for idx in [0, 2] {
        check_pivots(idx, buffers.matrix_pivots(idx), 50).unwrap();
        let original = MatRef::compact(50, 50, &originals[idx]);
        let r = lu_residual(original, buffers.matrix(idx), buffers.matrix_pivots(idx)).unwrap();
        assert!(r < 50.0 * f64::EPSILON, "matrix {} residual {:e}", idx, r);
    }
}

#[test]
fn test_zero_matrix_reports_first_column() {
    let layout = BatchLayout::new(&[4], &[6]).unwrap();
    let mut buffers = BatchBuffers::<f64>::new(layout);
    let mut info = vec![0];
    getrf_vbatched(buffers.view_mut(), &mut info, &queue()).unwrap();
    assert_eq!(info, vec![1]);
    assert_eq!(buffers.matrix_pivots(0), &[1, 2, 3, 4]);
}

#[test]
fn test_invalid_leading_dimension() {
    let descs = vec![
        MatrixDesc {
            rows: 3,
            cols: 3,
            ld: 3,
            offset: 0,
            pivot_offset: 0,
        },
        MatrixDesc {
            rows: 4,
            cols: 2,
            ld: 2,
            offset: 9,
            pivot_offset: 3,
        },
        MatrixDesc {
            rows: 2,
            cols: 2,
            ld: 2,
            offset: 17,
            pivot_offset: 5,
        },
    ];
    let mut buffers = BatchBuffers::<f64>::new(BatchLayout::from_descs(descs));
    let before = buffers.data().to_vec();
    let mut info = vec![99; 3];

    let err = getrf_vbatched(buffers.view_mut(), &mut info, &queue()).unwrap_err();
    assert_eq!(err.status_code(), -4);
    assert!(matches!(err, BatchedLuError::InvalidArgument { .. }));
    assert_eq!(info, vec![0, -4, 0]);
    // Nothing was factored.
    assert_eq!(buffers.data(), before.as_slice());
}

#[test]
fn test_short_status_array() {
    let layout = BatchLayout::new(&[2, 2], &[2, 2]).unwrap();
    let mut buffers = BatchBuffers::<f32>::new(layout);
    let mut info = vec![0; 1];
    let err = getrf_vbatched(buffers.view_mut(), &mut info, &queue()).unwrap_err();
    assert_eq!(err.status_code(), -6);
}

#[test]
fn test_nocheck_with_caller_workspace() {
    let rows = [10, 25];
    let cols = [25, 10];
    let (mut buffers, originals) = random_batch::<f64>(&rows, &cols, 1, 31);
    let hints = MaxHints::from(buffers.layout().aggregates());
    let mut workspace = Workspace::new(2, hints.max_m).unwrap();
    let mut info = vec![0; 2];
    let q = queue();

    getrf_vbatched_max_nocheck(buffers.view_mut(), &hints, 4, 2, &mut workspace, &mut info, &q)
        .unwrap();
    assert_factored(&buffers, &originals, &info);
    assert!(q.launches() > 1);
}

#[test]
fn test_undersized_workspace_faults_queue() {
    let (mut buffers, _) = random_batch::<f64>(&[8, 8], &[8, 8], 1, 3);
    let hints = MaxHints::from(buffers.layout().aggregates());
    let mut workspace = Workspace::new(1, 8).unwrap();
    let mut info = vec![0; 2];
    let q = queue();

    let err = getrf_vbatched_max_nocheck(buffers.view_mut(), &hints, 4, 2, &mut workspace, &mut info, &q)
        .unwrap_err();
    assert!(err.is_device_fault());
    assert_eq!(err.status_code(), -114);

    // The fault sticks until the queue is reset.
    assert!(q.synchronize().is_err());
    assert!(getrf_vbatched(buffers.view_mut(), &mut info, &q).is_err());
    q.reset();
    getrf_vbatched(buffers.view_mut(), &mut info, &q).unwrap();
    assert_eq!(info, vec![0, 0]);
}
