//! Per-axis discretization state: basis tables plus the owned 1D operator.
use crate::bspline::BasisData;
use crate::error::{ConfigError, LinError};
use crate::lin::{BandMatrix, BandSystem};
use serde::{Deserialize, Serialize};

/// Configuration of a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimConfig {
    pub degree: usize,
    pub elements: usize,
    /// Domain interval endpoints.
    pub a: f64,
    pub b: f64,
}

impl DimConfig {
    pub fn new(degree: usize, elements: usize) -> Self {
        Self { degree, elements, a: 0.0, b: 1.0 }
    }
}

/// Values of a univariate basis function at a quadrature point: the function
/// value and its first derivative. Passed to the bilinear form when
/// assembling 1D operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasisValue {
    pub val: f64,
    pub der: f64,
}

/// Accumulates `form(trial, test) * w * J` over all quadrature points into a
/// band operator. `form` receives the trial and test basis values; the mass
/// matrix is `|u, v| u.val * v.val`, adding `eta * u.der * v.der` yields the
/// mass-plus-scaled-stiffness operators of implicit schemes.
pub fn assemble_operator(
    matrix: &mut BandMatrix,
    basis: &BasisData,
    form: impl Fn(BasisValue, BasisValue) -> f64,
) -> Result<(), LinError> {
    for e in 0..basis.elements() {
        let first = basis.first_dof(e);
        let last = basis.last_dof(e);
        for q in 0..basis.quad_order() {
            let scale = basis.weight(q) * basis.jacobian(e);
            for a in 0..=(last - first) {
                for b in 0..=(last - first) {
                    let trial = BasisValue {
                        val: basis.value(e, q, 0, b),
                        der: basis.value(e, q, 1, b),
                    };
                    let test = BasisValue {
                        val: basis.value(e, q, 0, a),
                        der: basis.value(e, q, 1, a),
                    };
                    matrix.add(first + a, first + b, form(trial, test) * scale)?;
                }
            }
        }
    }
    Ok(())
}

/// One axis of the tensor-product discretization.
///
/// Owns the precomputed basis tables and a mass-type band operator with its
/// factorization. The operator is immutable after [`Dimension::factorize_matrix`]
/// except through [`Dimension::rebuild_matrix`], which re-assembles and
/// invalidates the factorization in one controlled step.
#[derive(Debug, Clone)]
pub struct Dimension {
    config: DimConfig,
    basis: BasisData,
    system: BandSystem,
    fixed: Vec<usize>,
}

impl Dimension {
    pub fn new(config: DimConfig) -> Result<Self, ConfigError> {
        if config.degree == 0 || config.elements == 0 {
            return Err(ConfigError::DegenerateDimension {
                degree: config.degree,
                elements: config.elements,
            });
        }
        let basis = BasisData::new(config.degree, config.elements, config.a, config.b);
        let mut system = BandSystem::new(config.degree, config.degree, basis.dofs());
        assemble_operator(system.matrix_mut(), &basis, |u, v| u.val * v.val)
            .expect("mass assembly stays within the band by construction");
        Ok(Self {
            config,
            basis,
            system,
            fixed: Vec::new(),
        })
    }

    pub fn degree(&self) -> usize {
        self.config.degree
    }

    pub fn elements(&self) -> usize {
        self.config.elements
    }

    pub fn dofs(&self) -> usize {
        self.basis.dofs()
    }

    pub fn basis(&self) -> &BasisData {
        &self.basis
    }

    /// Marks the first DOF as Dirichlet-fixed.
    pub fn fix_left(&mut self) {
        self.fixed.push(0);
    }

    /// Marks the last DOF as Dirichlet-fixed.
    pub fn fix_right(&mut self) {
        self.fixed.push(self.dofs() - 1);
    }

    /// DOF indices with enforced Dirichlet rows.
    pub fn fixed_dofs(&self) -> &[usize] {
        &self.fixed
    }

    /// Applies the recorded Dirichlet rows and factorizes the operator.
    pub fn factorize_matrix(&mut self) -> Result<(), LinError> {
        for &i in &self.fixed {
            self.system.matrix_mut().fix_dof(i);
        }
        self.system.factorize()
    }

    /// Re-assembles the operator with a new bilinear form (for time-varying
    /// coefficients), re-applies Dirichlet rows, and refactorizes.
    pub fn rebuild_matrix(
        &mut self,
        form: impl Fn(BasisValue, BasisValue) -> f64,
    ) -> Result<(), LinError> {
        let matrix = self.system.matrix_mut();
        matrix.zero();
        assemble_operator(matrix, &self.basis, form)?;
        self.factorize_matrix()
    }

    /// The owned operator with its factorization state.
    pub fn system(&self) -> &BandSystem {
        &self.system
    }
}
