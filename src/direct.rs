//! Interface to external sparse direct solvers and the capped substep loop
//! used by coupled (saddle-point) formulations.
//!
//! The solver backend itself is an opaque collaborator: it receives a
//! triplet-assembled problem with a dense right-hand-side buffer and
//! overwrites the buffer with the solution. Any nonzero backend status is
//! fatal. A dense LU reference backend is provided for tests and small runs.
use crate::error::DirectSolverError;
use nalgebra::{DMatrix, DVector};

/// A sparse linear system in triplet (COO) form with its solution buffer.
///
/// Duplicate `(row, col)` entries are summed, so assembly order is
/// irrelevant. Indices are zero-based here; backends whose native protocol is
/// one-based (common in Fortran-derived solvers) adjust internally.
#[derive(Debug, Clone)]
pub struct SparseProblem {
    n: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
    /// Right-hand side on entry, solution on successful return.
    pub rhs: Vec<f64>,
}

impl SparseProblem {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            rows: Vec::new(),
            cols: Vec::new(),
            values: Vec::new(),
            rhs: vec![0.0; n],
        }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Accumulates `value` into entry `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.n && col < self.n, "triplet index out of range");
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(value);
    }

    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.values)
            .map(|((&r, &c), &v)| (r, c, v))
    }

    /// Discards assembled entries (not the buffer), for per-step reassembly.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.cols.clear();
        self.values.clear();
    }
}

/// An external direct solver treated as a black box.
pub trait DirectSolver {
    /// Solves the assembled problem, overwriting `problem.rhs` with the
    /// solution. Runs to completion before returning.
    fn solve(&self, problem: &mut SparseProblem) -> Result<(), DirectSolverError>;
}

/// Reference backend: scatters the triplets into a dense matrix and solves
/// with partial-pivoting LU. Only sensible for small unknown counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenseDirectSolver;

impl DirectSolver for DenseDirectSolver {
    fn solve(&self, problem: &mut SparseProblem) -> Result<(), DirectSolverError> {
        let n = problem.size();
        let mut a = DMatrix::zeros(n, n);
        for (r, c, v) in problem.triplets() {
            a[(r, c)] += v;
        }
        let mut b = DVector::from_column_slice(&problem.rhs);
        if !a.lu().solve_mut(&mut b) {
            return Err(DirectSolverError { status: -1 });
        }
        problem.rhs.copy_from_slice(b.as_slice());
        Ok(())
    }
}

/// Termination parameters of the iterative substep loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationConfig {
    /// Increment norm below which the loop stops.
    pub tolerance: f64,
    /// Hard cap on substeps; reaching it terminates the loop normally.
    pub max_iterations: usize,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-7,
            max_iterations: 30,
        }
    }
}

/// Result of an iterative substep loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationOutcome {
    pub iterations: usize,
    /// Increment norm of the last substep taken.
    pub residual: f64,
    /// False when the loop stopped at the iteration cap. Not an error:
    /// higher-level code decides how to treat it.
    pub converged: bool,
}

/// Runs `substep` until the increment norm it returns drops below the
/// tolerance or the iteration cap is reached, whichever comes first.
///
/// Each substep is expected to solve the coupled system for an increment,
/// accumulate it into the running solution, and return the increment norm.
/// Errors from a substep abort the loop immediately.
pub fn iterate_to_convergence<E>(
    config: IterationConfig,
    mut substep: impl FnMut(usize) -> Result<f64, E>,
) -> Result<IterationOutcome, E> {
    let mut residual = f64::INFINITY;
    let mut iterations = 0;
    while iterations < config.max_iterations {
        residual = substep(iterations)?;
        iterations += 1;
        if residual < config.tolerance {
            return Ok(IterationOutcome {
                iterations,
                residual,
                converged: true,
            });
        }
    }
    log::debug!(
        "substep loop stopped at cap ({} iterations), last increment norm {:e}",
        iterations,
        residual
    );
    Ok(IterationOutcome {
        iterations,
        residual,
        converged: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_backend_solves_triplet_system() {
        let mut problem = SparseProblem::new(3);
        // duplicate entries must accumulate
        problem.add(0, 0, 1.0);
        problem.add(0, 0, 1.0);
        problem.add(1, 1, 4.0);
        problem.add(2, 2, 1.0);
        problem.add(0, 1, 1.0);
        problem.rhs = vec![3.0, 4.0, 5.0];

        DenseDirectSolver.solve(&mut problem).unwrap();
        // A = [[2, 1, 0], [0, 4, 0], [0, 0, 1]], b = [3, 4, 5]
        assert!((problem.rhs[1] - 1.0).abs() < 1e-12);
        assert!((problem.rhs[0] - 1.0).abs() < 1e-12);
        assert!((problem.rhs[2] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn iteration_loop_stops_on_tolerance() {
        let outcome = iterate_to_convergence::<()>(IterationConfig::default(), |i| {
            Ok(10.0f64.powi(-(i as i32 + 4)))
        })
        .unwrap();
        assert!(outcome.converged);
        // substep i returns 1e-(i+4); the first value strictly below 1e-7 is
        // at i = 4, the fifth iteration
        assert_eq!(outcome.iterations, 5);
    }

    #[test]
    fn iteration_cap_is_normal_termination() {
        let config = IterationConfig {
            tolerance: 1e-7,
            max_iterations: 5,
        };
        let outcome = iterate_to_convergence::<()>(config, |_| Ok(1.0)).unwrap();
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 5);
        assert_eq!(outcome.residual, 1.0);
    }
}
