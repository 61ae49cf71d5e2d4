//! Dense rectangular operators for schemes where trial and test spaces differ.
use crate::error::LinError;
use crate::tensor::Tensor;
use nalgebra::{DMatrix, Dyn, LU};

/// Whether the left operand of [`multiply`] is applied transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transpose {
    No,
    Left,
}

/// Computes `c = a * b` or `c = a^T * b`.
///
/// Used to build composite Petrov-Galerkin operators such as `K = B^T A^{-1} B`.
///
/// # Panics
///
/// Panics on incompatible operand shapes.
pub fn multiply(a: &DMatrix<f64>, b: &DMatrix<f64>, c: &mut DMatrix<f64>, mode: Transpose) {
    match mode {
        Transpose::No => {
            assert_eq!(a.ncols(), b.nrows(), "inner dimensions must agree");
            assert_eq!((c.nrows(), c.ncols()), (a.nrows(), b.ncols()));
            a.mul_to(b, c);
        }
        Transpose::Left => {
            assert_eq!(a.nrows(), b.nrows(), "inner dimensions must agree");
            assert_eq!((c.nrows(), c.ncols()), (a.ncols(), b.ncols()));
            a.tr_mul_to(b, c);
        }
    }
}

/// LU factors (with partial pivoting) of a square dense operator.
#[derive(Debug, Clone)]
pub struct DenseLu {
    lu: LU<f64, Dyn, Dyn>,
    n: usize,
}

impl DenseLu {
    pub fn factorize(matrix: &DMatrix<f64>) -> Result<Self, LinError> {
        assert_eq!(matrix.nrows(), matrix.ncols(), "only square operators can be factorized");
        let n = matrix.nrows();
        let lu = matrix.clone().lu();
        // A vanishing pivot in U indicates singularity within working precision
        let tol = f64::EPSILON * matrix.amax() * n as f64;
        for i in 0..n {
            if lu.u()[(i, i)].abs() <= tol {
                return Err(LinError::SingularMatrix { pivot_index: i });
            }
        }
        Ok(Self { lu, n })
    }

    pub fn size(&self) -> usize {
        self.n
    }

    /// Solves `A X = B` in place for an `n x m` row-major block.
    pub fn solve_block(&self, block: &mut [f64], m: usize) {
        let n = self.n;
        assert_eq!(block.len(), n * m, "block shape mismatch in dense solve");
        // nalgebra stores column-major, so the row-major block transposes into
        // a DMatrix whose columns are the independent lines.
        let mut rhs = DMatrix::from_row_slice(n, m, block);
        let solved = self.lu.solve_mut(&mut rhs);
        debug_assert!(solved, "factorization was validated as nonsingular");
        for i in 0..n {
            for j in 0..m {
                block[i * m + j] = rhs[(i, j)];
            }
        }
    }

    /// Solves `A X = B` where `B` is a dense matrix, overwriting `B` with `X`.
    pub fn solve_matrix(&self, b: &mut DMatrix<f64>) {
        assert_eq!(b.nrows(), self.n, "row count mismatch in dense solve");
        let solved = self.lu.solve_mut(b);
        debug_assert!(solved, "factorization was validated as nonsingular");
    }
}

/// A square dense operator together with its factorization state.
///
/// Mutating the matrix invalidates any existing factorization, so a stale
/// context can never be applied: [`DenseSystem::solve_lines`] fails with
/// [`LinError::NotFactorized`] until [`DenseSystem::factorize`] runs again.
#[derive(Debug, Clone)]
pub struct DenseSystem {
    matrix: DMatrix<f64>,
    factors: Option<DenseLu>,
}

impl DenseSystem {
    pub fn new(n: usize) -> Self {
        Self {
            matrix: DMatrix::zeros(n, n),
            factors: None,
        }
    }

    pub fn from_matrix(matrix: DMatrix<f64>) -> Self {
        assert_eq!(matrix.nrows(), matrix.ncols());
        Self { matrix, factors: None }
    }

    pub fn size(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Mutable access to the operator entries. Drops the factorization.
    pub fn matrix_mut(&mut self) -> &mut DMatrix<f64> {
        self.factors = None;
        &mut self.matrix
    }

    pub fn is_factorized(&self) -> bool {
        self.factors.is_some()
    }

    pub fn factorize(&mut self) -> Result<(), LinError> {
        self.factors = Some(DenseLu::factorize(&self.matrix)?);
        Ok(())
    }

    pub fn factors(&self) -> Result<&DenseLu, LinError> {
        self.factors.as_ref().ok_or(LinError::NotFactorized)
    }

    /// Batched solve along the leading axis of `rhs`.
    pub fn solve_lines(&self, rhs: &mut Tensor) -> Result<(), LinError> {
        let factors = self.factors()?;
        let n = rhs.shape()[0];
        assert_eq!(n, factors.size(), "tensor leading extent must match operator size");
        let m = rhs.len() / n;
        factors.solve_block(rhs.as_mut_slice(), m);
        Ok(())
    }
}
