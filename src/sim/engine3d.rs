//! The 3D tensor-product engine.
//!
//! Same services as [`Sim2d`](crate::sim::Sim2d) with one more axis: the
//! tensor, transpose and splitting layers are already d-dimensional, so the
//! engine only supplies the 3D element/quadrature iteration, basis products
//! and norms.
use crate::error::{ConfigError, LinError};
use crate::executor::Executor;
use crate::lin::LineSolver;
use crate::sim::{DimConfig, Dimension, TimeSteps};
use crate::solver::ads_solve;
use crate::tensor::Tensor;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Full configuration of a 3D simulation instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config3d {
    pub x: DimConfig,
    pub y: DimConfig,
    pub z: DimConfig,
    pub steps: TimeSteps,
    /// Worker pool width for element-parallel assembly.
    pub threads: usize,
}

/// Value and gradient of a trivariate field at a point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Value3 {
    pub val: f64,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

/// Inner product of the gradients of two values.
#[inline]
pub fn grad_dot3(u: Value3, v: Value3) -> f64 {
    u.dx * v.dx + u.dy * v.dy + u.dz * v.dz
}

/// Three [`Dimension`]s, a solve buffer, and the element-parallel executor.
#[derive(Debug)]
pub struct Sim3d {
    x: Dimension,
    y: Dimension,
    z: Dimension,
    steps: TimeSteps,
    executor: Executor,
    buffer: Tensor,
}

impl Sim3d {
    pub fn new(config: &Config3d) -> Result<Self, ConfigError> {
        let x = Dimension::new(config.x)?;
        let y = Dimension::new(config.y)?;
        let z = Dimension::new(config.z)?;
        let buffer = Tensor::zeros(&[x.dofs(), y.dofs(), z.dofs()]);
        Ok(Self {
            x,
            y,
            z,
            steps: config.steps,
            executor: Executor::new(config.threads.max(1)),
            buffer,
        })
    }

    pub fn x(&self) -> &Dimension {
        &self.x
    }

    pub fn y(&self) -> &Dimension {
        &self.y
    }

    pub fn z(&self) -> &Dimension {
        &self.z
    }

    pub fn x_mut(&mut self) -> &mut Dimension {
        &mut self.x
    }

    pub fn y_mut(&mut self) -> &mut Dimension {
        &mut self.y
    }

    pub fn z_mut(&mut self) -> &mut Dimension {
        &mut self.z
    }

    pub fn steps(&self) -> TimeSteps {
        self.steps
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Shape of solution fields: per-axis DOF counts.
    pub fn shape(&self) -> [usize; 3] {
        [self.x.dofs(), self.y.dofs(), self.z.dofs()]
    }

    /// Per-axis element ranges for [`Executor::for_each`].
    pub fn elements(&self) -> [Range<usize>; 3] {
        [0..self.x.elements(), 0..self.y.elements(), 0..self.z.elements()]
    }

    /// Quadrature point multi-indices within one element.
    pub fn quad_points(&self) -> impl Iterator<Item = [usize; 3]> {
        (0..self.x.basis().quad_order())
            .cartesian_product(0..self.y.basis().quad_order())
            .cartesian_product(0..self.z.basis().quad_order())
            .map(|((qx, qy), qz)| [qx, qy, qz])
    }

    /// Global DOF multi-indices supported on element `e`.
    pub fn dofs_on_element(&self, e: [usize; 3]) -> impl Iterator<Item = [usize; 3]> {
        let bx = self.x.basis();
        let by = self.y.basis();
        let bz = self.z.basis();
        (bx.first_dof(e[0])..=bx.last_dof(e[0]))
            .cartesian_product(by.first_dof(e[1])..=by.last_dof(e[1]))
            .cartesian_product(bz.first_dof(e[2])..=bz.last_dof(e[2]))
            .map(|((ax, ay), az)| [ax, ay, az])
    }

    /// Element-local index of global DOF `a` on element `e`.
    #[inline]
    pub fn dof_global_to_local(&self, e: [usize; 3], a: [usize; 3]) -> [usize; 3] {
        [
            a[0] - self.x.basis().first_dof(e[0]),
            a[1] - self.y.basis().first_dof(e[1]),
            a[2] - self.z.basis().first_dof(e[2]),
        ]
    }

    #[inline]
    pub fn jacobian(&self, e: [usize; 3]) -> f64 {
        self.x.basis().jacobian(e[0]) * self.y.basis().jacobian(e[1]) * self.z.basis().jacobian(e[2])
    }

    #[inline]
    pub fn weight(&self, q: [usize; 3]) -> f64 {
        self.x.basis().weight(q[0]) * self.y.basis().weight(q[1]) * self.z.basis().weight(q[2])
    }

    /// Physical coordinates of quadrature point `q` of element `e`.
    #[inline]
    pub fn point(&self, e: [usize; 3], q: [usize; 3]) -> [f64; 3] {
        [
            self.x.basis().point(e[0], q[0]),
            self.y.basis().point(e[1], q[1]),
            self.z.basis().point(e[2], q[2]),
        ]
    }

    /// Value and gradient of the tensor-product basis function `a` at
    /// quadrature point `q` of element `e`.
    #[inline]
    pub fn eval_basis(&self, e: [usize; 3], q: [usize; 3], a: [usize; 3]) -> Value3 {
        let local = self.dof_global_to_local(e, a);
        let bx = self.x.basis();
        let by = self.y.basis();
        let bz = self.z.basis();
        let vx = bx.value(e[0], q[0], 0, local[0]);
        let vy = by.value(e[1], q[1], 0, local[1]);
        let vz = bz.value(e[2], q[2], 0, local[2]);
        let dx = bx.value(e[0], q[0], 1, local[0]);
        let dy = by.value(e[1], q[1], 1, local[1]);
        let dz = bz.value(e[2], q[2], 1, local[2]);
        Value3 {
            val: vx * vy * vz,
            dx: dx * vy * vz,
            dy: vx * dy * vz,
            dz: vx * vy * dz,
        }
    }

    /// Value and gradient of the field `u` at quadrature point `q` of element `e`.
    pub fn eval_fun(&self, u: &Tensor, e: [usize; 3], q: [usize; 3]) -> Value3 {
        let mut out = Value3::default();
        for a in self.dofs_on_element(e) {
            let coeff = u[a];
            let basis = self.eval_basis(e, q, a);
            out.val += coeff * basis.val;
            out.dx += coeff * basis.dx;
            out.dy += coeff * basis.dy;
            out.dz += coeff * basis.dz;
        }
        out
    }

    /// Fresh element-local accumulator sized `(px + 1) x (py + 1) x (pz + 1)`.
    pub fn element_rhs(&self) -> Tensor {
        Tensor::zeros(&[self.x.degree() + 1, self.y.degree() + 1, self.z.degree() + 1])
    }

    /// Scatter-adds an element-local contribution into the global tensor.
    /// Must only be called inside a `synchronized` section.
    pub fn update_global_rhs(&self, global: &mut Tensor, local: &Tensor, e: [usize; 3]) {
        for a in self.dofs_on_element(e) {
            let aa = self.dof_global_to_local(e, a);
            global[a] += local[aa];
        }
    }

    /// Visits every boundary DOF multi-index once. Not performance sensitive.
    pub fn for_boundary_dofs(&self, mut f: impl FnMut([usize; 3])) {
        let [nx, ny, nz] = self.shape();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let on_wall = i == 0
                        || i == nx - 1
                        || j == 0
                        || j == ny - 1
                        || k == 0
                        || k == nz - 1;
                    if on_wall {
                        f([i, j, k]);
                    }
                }
            }
        }
    }

    /// Assembles the L2-projection right-hand side in parallel over elements.
    /// Follow with [`Sim3d::solve_mass`] to obtain the projected coefficients.
    pub fn projection(&self, rhs: &mut Tensor, f: impl Fn(f64, f64, f64) -> f64 + Sync) {
        rhs.zero();
        self.executor.for_each(self.elements(), rhs, |e, shared| {
            let mut local = self.element_rhs();
            let jacobian = self.jacobian(e);
            for q in self.quad_points() {
                let w = self.weight(q);
                let [px, py, pz] = self.point(e, q);
                let fval = f(px, py, pz);
                for a in self.dofs_on_element(e) {
                    let aa = self.dof_global_to_local(e, a);
                    let v = self.eval_basis(e, q, a);
                    local[aa] += fval * v.val * w * jacobian;
                }
            }
            shared.synchronized(|rhs| self.update_global_rhs(rhs, &local, e));
        });
    }

    /// Applies the inverse mass operator along all three axes (ADI sweep).
    pub fn solve_mass(&mut self, u: &mut Tensor) -> Result<(), LinError> {
        ads_solve(
            u,
            &mut self.buffer,
            &[self.x.system(), self.y.system(), self.z.system()],
        )
    }

    /// ADI sweep against caller-provided per-axis operators, reusing the
    /// engine's solve buffer.
    pub fn solve_with(&mut self, u: &mut Tensor, dims: &[&dyn LineSolver]) -> Result<(), LinError> {
        ads_solve(u, &mut self.buffer, dims)
    }

    /// L2 norm of the spline field `u`.
    pub fn norm_l2(&self, u: &Tensor) -> f64 {
        self.integrate(|e, q| {
            let v = self.eval_fun(u, e, q);
            v.val * v.val
        })
        .sqrt()
    }

    /// Relative L2 error of `u` against a closed-form solution.
    pub fn error_l2(&self, u: &Tensor, exact: impl Fn(f64, f64, f64) -> f64) -> f64 {
        let diff = self
            .integrate(|e, q| {
                let [px, py, pz] = self.point(e, q);
                let d = self.eval_fun(u, e, q).val - exact(px, py, pz);
                d * d
            })
            .sqrt();
        let scale = self
            .integrate(|e, q| {
                let [px, py, pz] = self.point(e, q);
                let v = exact(px, py, pz);
                v * v
            })
            .sqrt();
        diff / scale
    }

    fn integrate(&self, f: impl Fn([usize; 3], [usize; 3]) -> f64) -> f64 {
        let mut total = 0.0;
        for ex in 0..self.x.elements() {
            for ey in 0..self.y.elements() {
                for ez in 0..self.z.elements() {
                    let e = [ex, ey, ez];
                    let jacobian = self.jacobian(e);
                    for q in self.quad_points() {
                        total += f(e, q) * self.weight(q) * jacobian;
                    }
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> Config3d {
        Config3d {
            x: DimConfig::new(2, 3),
            y: DimConfig::new(2, 3),
            z: DimConfig::new(2, 3),
            steps: TimeSteps { step_count: 1, dt: 0.01 },
            threads: 2,
        }
    }

    #[test]
    fn projection_reproduces_constant_exactly() {
        let mut sim = Sim3d::new(&small_config()).unwrap();
        sim.x_mut().factorize_matrix().unwrap();
        sim.y_mut().factorize_matrix().unwrap();
        sim.z_mut().factorize_matrix().unwrap();

        let mut u = Tensor::zeros(&sim.shape());
        sim.projection(&mut u, |_, _, _| 2.25);
        sim.solve_mass(&mut u).unwrap();

        for &c in u.as_slice() {
            assert!((c - 2.25).abs() < 1e-10);
        }
        assert!((sim.norm_l2(&u) - 2.25).abs() < 1e-10);
    }

    #[test]
    fn projection_of_polynomial_has_tiny_l2_error() {
        let mut sim = Sim3d::new(&small_config()).unwrap();
        sim.x_mut().factorize_matrix().unwrap();
        sim.y_mut().factorize_matrix().unwrap();
        sim.z_mut().factorize_matrix().unwrap();

        let f = |x: f64, y: f64, z: f64| x * x + y * z - 2.0 * z;
        let mut u = Tensor::zeros(&sim.shape());
        sim.projection(&mut u, f);
        sim.solve_mass(&mut u).unwrap();

        // degree-2 polynomial is exactly representable by quadratic splines
        assert!(sim.error_l2(&u, f) < 1e-10);
    }

    #[test]
    fn boundary_dofs_are_visited_once() {
        let sim = Sim3d::new(&small_config()).unwrap();
        let [nx, ny, nz] = sim.shape();
        let mut seen = std::collections::BTreeSet::new();
        sim.for_boundary_dofs(|idx| {
            assert!(seen.insert(idx), "dof {:?} visited twice", idx);
        });
        let interior = (nx - 2) * (ny - 2) * (nz - 2);
        assert_eq!(seen.len(), nx * ny * nz - interior);
    }
}
