//! Simulation lifecycle and the tensor-product engines.
//!
//! A simulation advances through `created -> initialized -> stepping ->
//! finished`; the [`Simulation`] trait supplies the hooks and [`run`] drives
//! them. Numerical services (element iteration, basis evaluation, projection,
//! mass solves, norms) live in the [`Sim2d`] and [`Sim3d`] engines, which
//! problem types hold by composition.
mod dimension;
mod engine3d;
mod multistep;
mod ring;

pub use dimension::{assemble_operator, BasisValue, DimConfig, Dimension};
pub use engine3d::{grad_dot3, Config3d, Sim3d, Value3};
pub use multistep::{ParseSchemeError, Scheme};
pub use ring::Ring;

use crate::error::{ConfigError, LinError};
use crate::executor::Executor;
use crate::lin::LineSolver;
use crate::solver::ads_solve;
use crate::tensor::Tensor;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Time-stepping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSteps {
    pub step_count: usize,
    pub dt: f64,
}

/// Full configuration of a 2D simulation instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config2d {
    pub x: DimConfig,
    pub y: DimConfig,
    pub steps: TimeSteps,
    /// Worker pool width for element-parallel assembly.
    pub threads: usize,
}

/// Value and gradient of a bivariate field at a point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Value {
    pub val: f64,
    pub dx: f64,
    pub dy: f64,
}

/// Inner product of the gradients of two values.
#[inline]
pub fn grad_dot(u: Value, v: Value) -> f64 {
    u.dx * v.dx + u.dy * v.dy
}

/// Lifecycle hooks of a time-dependent simulation.
///
/// Errors from any hook propagate to the step boundary and abort the run; the
/// core retries nothing.
pub trait Simulation {
    fn time_steps(&self) -> TimeSteps;

    /// Build and factorize operators, set the initial state.
    fn before(&mut self) -> eyre::Result<()> {
        Ok(())
    }

    /// Typically rotates previous/current field buffers.
    fn before_step(&mut self, _iter: usize, _t: f64) -> eyre::Result<()> {
        Ok(())
    }

    /// Assembles the right-hand side and performs the solve.
    fn step(&mut self, iter: usize, t: f64) -> eyre::Result<()>;

    /// Reporting, periodic output, optional operator rebuild.
    fn after_step(&mut self, _iter: usize, _t: f64) -> eyre::Result<()> {
        Ok(())
    }

    fn after(&mut self) -> eyre::Result<()> {
        Ok(())
    }
}

/// Drives a simulation from initialization to completion.
pub fn run(sim: &mut dyn Simulation) -> eyre::Result<()> {
    let steps = sim.time_steps();
    log::info!("starting simulation: {} steps, dt = {}", steps.step_count, steps.dt);

    sim.before()?;
    for iter in 0..steps.step_count {
        let t = iter as f64 * steps.dt;
        sim.before_step(iter, t)?;
        sim.step(iter, t)?;
        sim.after_step(iter, t)?;
    }
    sim.after()?;

    log::info!("simulation finished after {} steps", steps.step_count);
    Ok(())
}

/// The 2D tensor-product engine: two [`Dimension`]s, a solve buffer, and the
/// element-parallel executor.
#[derive(Debug)]
pub struct Sim2d {
    x: Dimension,
    y: Dimension,
    steps: TimeSteps,
    executor: Executor,
    buffer: Tensor,
}

impl Sim2d {
    pub fn new(config: &Config2d) -> Result<Self, ConfigError> {
        let x = Dimension::new(config.x)?;
        let y = Dimension::new(config.y)?;
        let buffer = Tensor::zeros(&[x.dofs(), y.dofs()]);
        Ok(Self {
            x,
            y,
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

    pub fn x_mut(&mut self) -> &mut Dimension {
        &mut self.x
    }

    pub fn y_mut(&mut self) -> &mut Dimension {
        &mut self.y
    }

    pub fn steps(&self) -> TimeSteps {
        self.steps
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Shape of solution fields: per-axis DOF counts.
    pub fn shape(&self) -> [usize; 2] {
        [self.x.dofs(), self.y.dofs()]
    }

    /// Per-axis element ranges for [`Executor::for_each`].
    pub fn elements(&self) -> [Range<usize>; 2] {
        [0..self.x.elements(), 0..self.y.elements()]
    }

    /// Quadrature point multi-indices within one element.
    pub fn quad_points(&self) -> impl Iterator<Item = [usize; 2]> {
        (0..self.x.basis().quad_order())
            .cartesian_product(0..self.y.basis().quad_order())
            .map(|(qx, qy)| [qx, qy])
    }

    /// Global DOF multi-indices supported on element `e`.
    pub fn dofs_on_element(&self, e: [usize; 2]) -> impl Iterator<Item = [usize; 2]> {
        let bx = self.x.basis();
        let by = self.y.basis();
        (bx.first_dof(e[0])..=bx.last_dof(e[0]))
            .cartesian_product(by.first_dof(e[1])..=by.last_dof(e[1]))
            .map(|(ax, ay)| [ax, ay])
    }

    /// Element-local index of global DOF `a` on element `e`.
    #[inline]
    pub fn dof_global_to_local(&self, e: [usize; 2], a: [usize; 2]) -> [usize; 2] {
        [a[0] - self.x.basis().first_dof(e[0]), a[1] - self.y.basis().first_dof(e[1])]
    }

    #[inline]
    pub fn jacobian(&self, e: [usize; 2]) -> f64 {
        self.x.basis().jacobian(e[0]) * self.y.basis().jacobian(e[1])
    }

    #[inline]
    pub fn weight(&self, q: [usize; 2]) -> f64 {
        self.x.basis().weight(q[0]) * self.y.basis().weight(q[1])
    }

    /// Physical coordinates of quadrature point `q` of element `e`.
    #[inline]
    pub fn point(&self, e: [usize; 2], q: [usize; 2]) -> [f64; 2] {
        [self.x.basis().point(e[0], q[0]), self.y.basis().point(e[1], q[1])]
    }

    /// Value and gradient of the tensor-product basis function `a` at
    /// quadrature point `q` of element `e`.
    #[inline]
    pub fn eval_basis(&self, e: [usize; 2], q: [usize; 2], a: [usize; 2]) -> Value {
        let local = self.dof_global_to_local(e, a);
        let bx = self.x.basis();
        let by = self.y.basis();
        let vx = bx.value(e[0], q[0], 0, local[0]);
        let vy = by.value(e[1], q[1], 0, local[1]);
        let dx = bx.value(e[0], q[0], 1, local[0]);
        let dy = by.value(e[1], q[1], 1, local[1]);
        Value {
            val: vx * vy,
            dx: dx * vy,
            dy: vx * dy,
        }
    }

    /// Value and gradient of the field `u` at quadrature point `q` of element `e`.
    pub fn eval_fun(&self, u: &Tensor, e: [usize; 2], q: [usize; 2]) -> Value {
        let mut out = Value::default();
        for a in self.dofs_on_element(e) {
            let coeff = u[a];
            let basis = self.eval_basis(e, q, a);
            out.val += coeff * basis.val;
            out.dx += coeff * basis.dx;
            out.dy += coeff * basis.dy;
        }
        out
    }

    /// Fresh element-local accumulator sized `(px + 1) x (py + 1)`.
    pub fn element_rhs(&self) -> Tensor {
        Tensor::zeros(&[self.x.degree() + 1, self.y.degree() + 1])
    }

    /// Scatter-adds an element-local contribution into the global tensor.
    /// Must only be called inside a `synchronized` section.
    pub fn update_global_rhs(&self, global: &mut Tensor, local: &Tensor, e: [usize; 2]) {
        for a in self.dofs_on_element(e) {
            let aa = self.dof_global_to_local(e, a);
            global[a] += local[aa];
        }
    }

    /// Visits every boundary DOF multi-index once.
    pub fn for_boundary_dofs(&self, mut f: impl FnMut([usize; 2])) {
        let [nx, ny] = self.shape();
        for i in 0..nx {
            f([i, 0]);
            f([i, ny - 1]);
        }
        for j in 1..ny - 1 {
            f([0, j]);
            f([nx - 1, j]);
        }
    }

    /// Assembles the L2-projection right-hand side `rhs_a = int f phi_a` in
    /// parallel over elements. Follow with [`Sim2d::solve_mass`] to obtain the
    /// projected coefficients.
    pub fn projection(&self, rhs: &mut Tensor, f: impl Fn(f64, f64) -> f64 + Sync) {
        rhs.zero();
        self.executor.for_each(self.elements(), rhs, |e, shared| {
            let mut local = self.element_rhs();
            let jacobian = self.jacobian(e);
            for q in self.quad_points() {
                let w = self.weight(q);
                let [px, py] = self.point(e, q);
                let fval = f(px, py);
                for a in self.dofs_on_element(e) {
                    let aa = self.dof_global_to_local(e, a);
                    let v = self.eval_basis(e, q, a);
                    local[aa] += fval * v.val * w * jacobian;
                }
            }
            shared.synchronized(|rhs| self.update_global_rhs(rhs, &local, e));
        });
    }

    /// Applies the inverse mass operator along both axes (ADI sweep).
    pub fn solve_mass(&mut self, u: &mut Tensor) -> Result<(), LinError> {
        ads_solve(u, &mut self.buffer, &[self.x.system(), self.y.system()])
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

    /// Full H1 norm of the spline field `u`.
    pub fn norm_h1(&self, u: &Tensor) -> f64 {
        self.integrate(|e, q| {
            let v = self.eval_fun(u, e, q);
            v.val * v.val + v.dx * v.dx + v.dy * v.dy
        })
        .sqrt()
    }

    /// Relative L2 error of `u` against a closed-form solution.
    pub fn error_l2(&self, u: &Tensor, exact: impl Fn(f64, f64) -> f64) -> f64 {
        let diff = self
            .integrate(|e, q| {
                let [px, py] = self.point(e, q);
                let d = self.eval_fun(u, e, q).val - exact(px, py);
                d * d
            })
            .sqrt();
        let scale = self
            .integrate(|e, q| {
                let [px, py] = self.point(e, q);
                let v = exact(px, py);
                v * v
            })
            .sqrt();
        diff / scale
    }

    /// Relative H1 error of `u` against a closed-form solution with gradient.
    pub fn error_h1(&self, u: &Tensor, exact: impl Fn(f64, f64) -> Value) -> f64 {
        let norm_sq = |v: Value| v.val * v.val + v.dx * v.dx + v.dy * v.dy;
        let diff = self
            .integrate(|e, q| {
                let [px, py] = self.point(e, q);
                let uh = self.eval_fun(u, e, q);
                let ex = exact(px, py);
                norm_sq(Value {
                    val: uh.val - ex.val,
                    dx: uh.dx - ex.dx,
                    dy: uh.dy - ex.dy,
                })
            })
            .sqrt();
        let scale = self
            .integrate(|e, q| {
                let [px, py] = self.point(e, q);
                norm_sq(exact(px, py))
            })
            .sqrt();
        diff / scale
    }

    fn integrate(&self, f: impl Fn([usize; 2], [usize; 2]) -> f64) -> f64 {
        let mut total = 0.0;
        for ex in 0..self.x.elements() {
            for ey in 0..self.y.elements() {
                let e = [ex, ey];
                let jacobian = self.jacobian(e);
                for q in self.quad_points() {
                    total += f(e, q) * self.weight(q) * jacobian;
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> Config2d {
        Config2d {
            x: DimConfig::new(2, 4),
            y: DimConfig::new(2, 4),
            steps: TimeSteps { step_count: 1, dt: 0.01 },
            threads: 2,
        }
    }

    #[test]
    fn projection_reproduces_constant_exactly() {
        let mut sim = Sim2d::new(&small_config()).unwrap();
        sim.x_mut().factorize_matrix().unwrap();
        sim.y_mut().factorize_matrix().unwrap();

        let mut u = Tensor::zeros(&sim.shape());
        sim.projection(&mut u, |_, _| 3.5);
        sim.solve_mass(&mut u).unwrap();

        // A constant lies in every spline space; partition of unity makes all
        // coefficients equal to the constant.
        for &c in u.as_slice() {
            assert!((c - 3.5).abs() < 1e-10);
        }
        assert!((sim.norm_l2(&u) - 3.5).abs() < 1e-10);
    }

    #[test]
    fn projection_of_polynomial_has_tiny_l2_error() {
        let mut sim = Sim2d::new(&small_config()).unwrap();
        sim.x_mut().factorize_matrix().unwrap();
        sim.y_mut().factorize_matrix().unwrap();

        let f = |x: f64, y: f64| x * x + 2.0 * y - x * y;
        let mut u = Tensor::zeros(&sim.shape());
        sim.projection(&mut u, f);
        sim.solve_mass(&mut u).unwrap();

        // degree-2 polynomial is exactly representable by quadratic splines
        assert!(sim.error_l2(&u, f) < 1e-10);
    }

    #[test]
    fn boundary_dofs_are_visited_once() {
        let sim = Sim2d::new(&small_config()).unwrap();
        let [nx, ny] = sim.shape();
        let mut seen = std::collections::BTreeSet::new();
        sim.for_boundary_dofs(|idx| {
            assert!(seen.insert(idx), "dof {:?} visited twice", idx);
        });
        assert_eq!(seen.len(), 2 * nx + 2 * ny - 4);
    }
}
