//! Structured linear operators with factorize-once / solve-many semantics.
//!
//! Operators and their factorizations are bundled into a single owned
//! resource ([`BandSystem`], [`DenseSystem`]) with three effective states:
//! built, factorized, and stale. Mutating the matrix after factorization
//! moves the resource back to the built state, so a solve against outdated
//! factors is impossible by construction and surfaces as
//! [`LinError::NotFactorized`](crate::error::LinError::NotFactorized).
mod band;
mod dense;

pub use band::{BandLu, BandMatrix};
pub use dense::{multiply, DenseLu, DenseSystem, Transpose};

use crate::error::LinError;
use crate::tensor::Tensor;

/// A factorized 1D operator that can solve all lines along the leading axis
/// of a tensor in one batched pass.
pub trait LineSolver {
    fn solve_lines(&self, rhs: &mut Tensor) -> Result<(), LinError>;
}

/// A band operator together with its factorization state.
#[derive(Debug, Clone)]
pub struct BandSystem {
    matrix: BandMatrix,
    factors: Option<BandLu>,
}

impl BandSystem {
    pub fn new(lower: usize, upper: usize, n: usize) -> Self {
        Self {
            matrix: BandMatrix::new(lower, upper, n),
            factors: None,
        }
    }

    pub fn size(&self) -> usize {
        self.matrix.size()
    }

    pub fn matrix(&self) -> &BandMatrix {
        &self.matrix
    }

    /// Mutable access to the operator entries. Drops the factorization.
    pub fn matrix_mut(&mut self) -> &mut BandMatrix {
        self.factors = None;
        &mut self.matrix
    }

    pub fn is_factorized(&self) -> bool {
        self.factors.is_some()
    }

    pub fn factorize(&mut self) -> Result<(), LinError> {
        self.factors = Some(BandLu::factorize(&self.matrix)?);
        Ok(())
    }
}

impl LineSolver for BandSystem {
    fn solve_lines(&self, rhs: &mut Tensor) -> Result<(), LinError> {
        let factors = self.factors.as_ref().ok_or(LinError::NotFactorized)?;
        let n = rhs.shape()[0];
        assert_eq!(n, factors.size(), "tensor leading extent must match operator size");
        let m = rhs.len() / n;
        factors.solve_block(rhs.as_mut_slice(), m);
        Ok(())
    }
}

impl LineSolver for DenseSystem {
    fn solve_lines(&self, rhs: &mut Tensor) -> Result<(), LinError> {
        DenseSystem::solve_lines(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_system_tracks_factorization_state() {
        let mut sys = BandSystem::new(1, 1, 4);
        for i in 0..4 {
            sys.matrix_mut().add(i, i, 2.0).unwrap();
        }
        let mut rhs = Tensor::zeros(&[4]);
        assert_eq!(
            LineSolver::solve_lines(&sys, &mut rhs),
            Err(LinError::NotFactorized)
        );

        sys.factorize().unwrap();
        assert!(sys.is_factorized());
        LineSolver::solve_lines(&sys, &mut rhs).unwrap();

        // Mutation invalidates factors
        sys.matrix_mut().add(0, 0, 1.0).unwrap();
        assert!(!sys.is_factorized());
        assert_eq!(
            LineSolver::solve_lines(&sys, &mut rhs),
            Err(LinError::NotFactorized)
        );
    }

    #[test]
    fn repeated_solves_are_idempotent() {
        let mut sys = BandSystem::new(1, 1, 5);
        for i in 0..5 {
            sys.matrix_mut().add(i, i, 3.0).unwrap();
            if i > 0 {
                sys.matrix_mut().add(i, i - 1, -1.0).unwrap();
                sys.matrix_mut().add(i - 1, i, -1.0).unwrap();
            }
        }
        sys.factorize().unwrap();

        let mut rhs1 = Tensor::zeros(&[5]);
        for i in 0..5 {
            rhs1[[i]] = i as f64;
        }
        let mut rhs2 = rhs1.clone();
        LineSolver::solve_lines(&sys, &mut rhs1).unwrap();
        LineSolver::solve_lines(&sys, &mut rhs2).unwrap();
        assert_eq!(rhs1, rhs2);
    }
}
