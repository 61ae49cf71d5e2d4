//! The dimensional-splitting (alternating-direction) solve.
//!
//! Tensor-product spline discretizations factor the global operator into a
//! Kronecker product `A = A_1 (x) A_2 (x) ... (x) A_d` of small banded 1D
//! operators. The full system is therefore never formed: the solution is
//! obtained by solving with each `A_k` along its own axis in turn, rotating
//! the tensor layout between sweeps so every axis gets its turn as the
//! leading (batched-solve) axis. Each sweep costs `O(n * bandwidth^2)` per
//! line instead of the `O(n^d)` a monolithic solve would need.
use crate::error::{ConfigError, LinError};
use crate::lin::{multiply, DenseSystem, LineSolver, Transpose};
use crate::tensor::{cyclic_transpose, Tensor};
use nalgebra::DMatrix;

/// Solves the separable system in place.
///
/// `rhs` enters holding the assembled right-hand side and leaves holding the
/// solution, in canonical axis order. `buffer` is scratch of the same size;
/// its contents on exit are unspecified. `dims` supplies one factorized 1D
/// operator per axis, in canonical axis order.
///
/// # Panics
///
/// Panics if the number of operators does not match the tensor rank, or if
/// `buffer` does not match the size of `rhs`.
pub fn ads_solve(
    rhs: &mut Tensor,
    buffer: &mut Tensor,
    dims: &[&dyn LineSolver],
) -> Result<(), LinError> {
    assert_eq!(dims.len(), rhs.ndim(), "one operator per tensor axis is required");
    assert_eq!(rhs.len(), buffer.len(), "buffer must match the rhs size");

    for dim in dims {
        dim.solve_lines(rhs)?;
        // Rotate so the next axis leads; d rotations restore canonical order.
        reshape_rotated(rhs, buffer);
        cyclic_transpose(rhs, buffer);
        std::mem::swap(rhs, buffer);
    }
    Ok(())
}

/// Gives `buffer` the cyclically rotated shape of `src`, reusing its storage.
fn reshape_rotated(src: &Tensor, buffer: &mut Tensor) {
    let rotated = crate::tensor::rotated_shape(src.shape());
    if buffer.shape() != rotated.as_slice() {
        *buffer = Tensor::zeros(&rotated);
    }
}

/// Forms and factorizes the Petrov-Galerkin normal operator `K = B^T A^{-1} B`.
///
/// `b` maps the trial space (columns) into the test space (rows); `a` is the
/// factorized test-space Gram operator. The result is a square trial-space
/// operator, factorized and ready for use in a splitting sweep. It must be
/// rebuilt whenever `a` or `b` changes (once per step for time-varying
/// coefficients).
pub fn normal_operator(b: &DMatrix<f64>, a: &DenseSystem) -> Result<DenseSystem, NormalOperatorError> {
    let (test_dofs, trial_dofs) = (b.nrows(), b.ncols());
    if trial_dofs > test_dofs {
        return Err(NormalOperatorError::Config(ConfigError::TrialSpaceTooLarge {
            trial_dofs,
            test_dofs,
        }));
    }
    assert_eq!(a.size(), test_dofs, "Gram operator must act on the test space");

    let mut a_inv_b = b.clone();
    a.factors().map_err(NormalOperatorError::Lin)?.solve_matrix(&mut a_inv_b);

    let mut k = DMatrix::zeros(trial_dofs, trial_dofs);
    multiply(b, &a_inv_b, &mut k, Transpose::Left);

    let mut system = DenseSystem::from_matrix(k);
    system.factorize().map_err(NormalOperatorError::Lin)?;
    Ok(system)
}

/// Failure modes of [`normal_operator`].
#[derive(Debug, Clone, PartialEq)]
pub enum NormalOperatorError {
    Config(ConfigError),
    Lin(LinError),
}

impl std::fmt::Display for NormalOperatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalOperatorError::Config(e) => e.fmt(f),
            NormalOperatorError::Lin(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for NormalOperatorError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lin::BandSystem;

    fn spd_band(n: usize, diag: f64) -> BandSystem {
        let mut sys = BandSystem::new(1, 1, n);
        let m = sys.matrix_mut();
        for i in 0..n {
            m.add(i, i, diag).unwrap();
            if i > 0 {
                m.add(i, i - 1, -1.0).unwrap();
                m.add(i - 1, i, -1.0).unwrap();
            }
        }
        sys.factorize().unwrap();
        sys
    }

    #[test]
    fn identity_operators_leave_rhs_unchanged() {
        let mut id_x = BandSystem::new(0, 0, 3);
        let mut id_y = BandSystem::new(0, 0, 4);
        for i in 0..3 {
            id_x.matrix_mut().add(i, i, 1.0).unwrap();
        }
        for i in 0..4 {
            id_y.matrix_mut().add(i, i, 1.0).unwrap();
        }
        id_x.factorize().unwrap();
        id_y.factorize().unwrap();

        let mut rhs = Tensor::zeros(&[3, 4]);
        for i in 0..3 {
            for j in 0..4 {
                rhs[[i, j]] = (i * 4 + j) as f64;
            }
        }
        let expected = rhs.clone();
        let mut buffer = Tensor::zeros(&[3, 4]);
        ads_solve(&mut rhs, &mut buffer, &[&id_x, &id_y]).unwrap();
        assert_eq!(rhs, expected);
    }

    #[test]
    fn stale_factorization_aborts_the_sweep() {
        let mut sys = spd_band(3, 4.0);
        sys.matrix_mut().add(0, 0, 1.0).unwrap();

        let mut rhs = Tensor::zeros(&[3]);
        let mut buffer = Tensor::zeros(&[3]);
        assert_eq!(
            ads_solve(&mut rhs, &mut buffer, &[&sys]),
            Err(LinError::NotFactorized)
        );
    }

    #[test]
    fn normal_operator_rejects_oversized_trial_space() {
        let b = DMatrix::zeros(3, 5);
        let mut a = DenseSystem::from_matrix(DMatrix::identity(3, 3));
        a.factorize().unwrap();
        match normal_operator(&b, &a) {
            Err(NormalOperatorError::Config(ConfigError::TrialSpaceTooLarge { trial_dofs, test_dofs })) => {
                assert_eq!((trial_dofs, test_dofs), (5, 3));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn normal_operator_of_identity_is_identity() {
        let b = DMatrix::identity(4, 4);
        let mut a = DenseSystem::from_matrix(DMatrix::identity(4, 4));
        a.factorize().unwrap();
        let k = normal_operator(&b, &a).unwrap();

        let mut rhs = Tensor::zeros(&[4]);
        rhs[[2]] = 1.5;
        let expected = rhs.clone();
        let mut buffer = Tensor::zeros(&[4]);
        ads_solve(&mut rhs, &mut buffer, &[&k]).unwrap();
        assert_eq!(rhs, expected);
    }
}
