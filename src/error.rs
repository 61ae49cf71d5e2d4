//! Error types shared across the crate.
use std::fmt;

/// Errors produced by the structured linear algebra layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinError {
    /// An entry outside the stored band of a band matrix was written to.
    OutOfBand {
        row: usize,
        col: usize,
        lower: usize,
        upper: usize,
    },
    /// Factorization encountered a pivot that is zero within tolerance.
    ///
    /// A singular 1D operator almost always indicates a modeling bug, such as a
    /// missing boundary condition, and is therefore never retried.
    SingularMatrix { pivot_index: usize },
    /// A solve was requested against an operator whose factorization is absent
    /// or was invalidated by a subsequent mutation of the matrix.
    NotFactorized,
}

impl fmt::Display for LinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinError::OutOfBand { row, col, lower, upper } => write!(
                f,
                "entry ({}, {}) lies outside the stored band (lower = {}, upper = {})",
                row, col, lower, upper
            ),
            LinError::SingularMatrix { pivot_index } => {
                write!(f, "matrix is numerically singular (zero pivot at index {})", pivot_index)
            }
            LinError::NotFactorized => {
                write!(f, "operator has no valid factorization (missing or stale)")
            }
        }
    }
}

impl std::error::Error for LinError {}

/// Errors reported when validating a discretization configuration.
///
/// These are detected at construction time and are not recoverable: they
/// indicate a malformed discretization rather than a transient condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The trial space has more degrees of freedom than the test space, which
    /// makes the Petrov-Galerkin normal operator rank deficient.
    TrialSpaceTooLarge { trial_dofs: usize, test_dofs: usize },
    /// A dimension was configured with zero elements or degree zero.
    DegenerateDimension { degree: usize, elements: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TrialSpaceTooLarge { trial_dofs, test_dofs } => write!(
                f,
                "trial space dimension {} exceeds test space dimension {}",
                trial_dofs, test_dofs
            ),
            ConfigError::DegenerateDimension { degree, elements } => write!(
                f,
                "degenerate dimension: degree = {}, elements = {} (both must be positive)",
                degree, elements
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Opaque failure reported by an external direct solver backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectSolverError {
    /// Backend-specific status code. Any nonzero status is treated as fatal.
    pub status: i32,
}

impl fmt::Display for DirectSolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "direct solver reported failure status {}", self.status)
    }
}

impl std::error::Error for DirectSolverError {}
