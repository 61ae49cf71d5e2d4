//! The sequential-axis sweep must agree with a direct dense solve of the
//! full Kronecker-product system.
use adsolve::lin::{BandSystem, LineSolver};
use adsolve::solver::ads_solve;
use adsolve::tensor::Tensor;
use nalgebra::{DMatrix, DVector};

/// Diagonally dominant tridiagonal operator with slight asymmetry so the test
/// does not accidentally rely on symmetry.
fn test_operator(n: usize, shift: f64) -> BandSystem {
    let mut sys = BandSystem::new(1, 1, n);
    let m = sys.matrix_mut();
    for i in 0..n {
        m.add(i, i, 4.0 + shift + 0.1 * i as f64).unwrap();
        if i > 0 {
            m.add(i, i - 1, -1.0).unwrap();
        }
        if i + 1 < n {
            m.add(i, i + 1, -1.2).unwrap();
        }
    }
    sys.factorize().unwrap();
    sys
}

fn to_dense(sys: &BandSystem) -> DMatrix<f64> {
    let n = sys.size();
    DMatrix::from_fn(n, n, |i, j| sys.matrix().get(i, j))
}

fn check_equivalence(n1: usize, n2: usize) {
    let a1 = test_operator(n1, 0.0);
    let a2 = test_operator(n2, 0.5);

    let mut rhs = Tensor::zeros(&[n1, n2]);
    for i in 0..n1 {
        for j in 0..n2 {
            rhs[[i, j]] = ((i * n2 + j) as f64 * 0.37).sin() + 0.5;
        }
    }

    // Reference: dense solve of (A1 (x) A2) x = r, with the row-major
    // flattening matching the tensor layout.
    let full = to_dense(&a1).kronecker(&to_dense(&a2));
    let mut reference = DVector::from_column_slice(rhs.as_slice());
    assert!(full.lu().solve_mut(&mut reference));

    let mut buffer = Tensor::zeros(&[n1, n2]);
    let dims: [&dyn LineSolver; 2] = [&a1, &a2];
    ads_solve(&mut rhs, &mut buffer, &dims).unwrap();

    for (k, &computed) in rhs.as_slice().iter().enumerate() {
        let expected = reference[k];
        let denom = expected.abs().max(1.0);
        assert!(
            (computed - expected).abs() / denom < 1e-10,
            "entry {}: {} vs {}",
            k,
            computed,
            expected
        );
    }
}

#[test]
fn splitting_matches_dense_kronecker_solve_4x4() {
    check_equivalence(4, 4);
}

#[test]
fn splitting_matches_dense_kronecker_solve_6x6() {
    check_equivalence(6, 6);
}

#[test]
fn splitting_matches_dense_kronecker_solve_rectangular() {
    check_equivalence(4, 7);
}

#[test]
fn zero_rhs_yields_zero_solution() {
    let a1 = test_operator(5, 0.0);
    let a2 = test_operator(5, 1.0);
    let mut rhs = Tensor::zeros(&[5, 5]);
    let mut buffer = Tensor::zeros(&[5, 5]);
    let dims: [&dyn LineSolver; 2] = [&a1, &a2];
    ads_solve(&mut rhs, &mut buffer, &dims).unwrap();
    assert!(rhs.as_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn three_axis_splitting_matches_dense_solve() {
    let a1 = test_operator(3, 0.0);
    let a2 = test_operator(4, 0.3);
    let a3 = test_operator(2, 0.7);

    let mut rhs = Tensor::zeros(&[3, 4, 2]);
    for (k, v) in rhs.as_mut_slice().iter_mut().enumerate() {
        *v = (k as f64 * 0.61).cos();
    }

    let full = to_dense(&a1).kronecker(&to_dense(&a2)).kronecker(&to_dense(&a3));
    let mut reference = DVector::from_column_slice(rhs.as_slice());
    assert!(full.lu().solve_mut(&mut reference));

    let mut buffer = Tensor::zeros(&[3, 4, 2]);
    let dims: [&dyn LineSolver; 3] = [&a1, &a2, &a3];
    ads_solve(&mut rhs, &mut buffer, &dims).unwrap();

    for (k, &computed) in rhs.as_slice().iter().enumerate() {
        assert!((computed - reference[k]).abs() < 1e-10);
    }
}
