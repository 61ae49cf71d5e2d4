//! Problem definitions and ready-made simulation variants.
//!
//! Physics enters the core purely through a [`Problem2d`]: an initial state,
//! a forcing term, and optionally a closed-form solution for error reporting.
//! Drivers look problems up by identifier in a [`Registry`] rather than
//! branching on strings at the call site.
use crate::error::{ConfigError, LinError};
use crate::lin::BandSystem;
use crate::output::OutputManager;
use crate::sim::{
    assemble_operator, grad_dot, Config2d, Ring, Scheme, Sim2d, Simulation, TimeSteps, Value,
};
use crate::tensor::Tensor;
use std::collections::BTreeMap;

type ScalarFn = Box<dyn Fn(f64, f64) -> f64 + Send + Sync>;
type ForcingFn = Box<dyn Fn(f64, f64, f64) -> f64 + Send + Sync>;
type ExactFn = Box<dyn Fn(f64, f64, f64) -> Value + Send + Sync>;

/// The closed capability set a 2D problem supplies to the engine.
pub struct Problem2d {
    pub name: &'static str,
    pub initial: ScalarFn,
    /// Forcing term `f(x, y, t)`.
    pub forcing: ForcingFn,
    /// Closed-form solution, when one exists.
    pub exact: Option<ExactFn>,
}

impl std::fmt::Debug for Problem2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem2d")
            .field("name", &self.name)
            .field("has_exact", &self.exact.is_some())
            .finish()
    }
}

/// Maps problem identifiers to factories.
#[derive(Debug, Default)]
pub struct Registry {
    builders: BTreeMap<&'static str, fn() -> Problem2d>,
}

impl Registry {
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register("heat", heat);
        registry.register("manufactured-poly", manufactured_poly);
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: fn() -> Problem2d) {
        self.builders.insert(name, factory);
    }

    pub fn create(&self, name: &str) -> Option<Problem2d> {
        self.builders.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builders.keys().copied()
    }
}

/// Pure diffusion of a smooth bump with homogeneous Dirichlet walls.
pub fn heat() -> Problem2d {
    Problem2d {
        name: "heat",
        initial: Box::new(|x, y| {
            let dx = x - 0.5;
            let dy = y - 0.5;
            let r2 = (12.0 * (dx * dx + dy * dy)).min(1.0);
            (r2 - 1.0) * (r2 - 1.0) * (r2 + 1.0) * (r2 + 1.0)
        }),
        forcing: Box::new(|_, _, _| 0.0),
        exact: None,
    }
}

/// Manufactured polynomial solution `u = (1 + t) x(1-x) y(1-y)` with the
/// matching forcing term, for verifying assembly and solve together.
pub fn manufactured_poly() -> Problem2d {
    let u = |x: f64, y: f64, t: f64| (1.0 + t) * x * (1.0 - x) * y * (1.0 - y);
    Problem2d {
        name: "manufactured-poly",
        initial: Box::new(move |x, y| u(x, y, 0.0)),
        forcing: Box::new(|x, y, t| {
            // f = u_t - laplacian(u)
            x * (1.0 - x) * y * (1.0 - y) + 2.0 * (1.0 + t) * (x * (1.0 - x) + y * (1.0 - y))
        }),
        exact: Some(Box::new(move |x, y, t| Value {
            val: u(x, y, t),
            dx: (1.0 + t) * (1.0 - 2.0 * x) * y * (1.0 - y),
            dy: (1.0 + t) * x * (1.0 - x) * (1.0 - 2.0 * y),
        })),
    }
}

/// Crank-Nicolson diffusion stepped by dimensional splitting.
///
/// Each axis owns the implicit operator `M + (dt/2) K`; the explicit half of
/// the diffusion and the forcing enter through the right-hand side assembled
/// from the previous step's field.
#[derive(Debug)]
pub struct Heat2d {
    sim: Sim2d,
    problem: Problem2d,
    u: Tensor,
    u_prev: Tensor,
    ax: BandSystem,
    ay: BandSystem,
    output: Option<(OutputManager, usize)>,
}

impl Heat2d {
    pub fn new(config: &Config2d, problem: Problem2d) -> Result<Self, ConfigError> {
        let sim = Sim2d::new(config)?;
        let shape = sim.shape();
        let ax = BandSystem::new(config.x.degree, config.x.degree, shape[0]);
        let ay = BandSystem::new(config.y.degree, config.y.degree, shape[1]);
        Ok(Self {
            u: Tensor::zeros(&shape),
            u_prev: Tensor::zeros(&shape),
            sim,
            problem,
            ax,
            ay,
            output: None,
        })
    }

    /// Enables periodic file output every `every` steps.
    pub fn with_output(mut self, manager: OutputManager, every: usize) -> Self {
        self.output = Some((manager, every.max(1)));
        self
    }

    pub fn solution(&self) -> &Tensor {
        &self.u
    }

    pub fn sim(&self) -> &Sim2d {
        &self.sim
    }

    fn prepare_matrices(&mut self) -> Result<(), LinError> {
        self.sim.x_mut().fix_left();
        self.sim.x_mut().fix_right();
        self.sim.y_mut().fix_left();
        self.sim.y_mut().fix_right();
        self.sim.x_mut().factorize_matrix()?;
        self.sim.y_mut().factorize_matrix()?;

        let eta = 0.5 * self.sim.steps().dt;
        fill_implicit_operator(&mut self.ax, self.sim.x(), eta)?;
        fill_implicit_operator(&mut self.ay, self.sim.y(), eta)?;
        Ok(())
    }

    fn compute_rhs(&mut self, t: f64) {
        let Self { sim, problem, u, u_prev, .. } = self;
        let sim = &*sim;
        let u_prev = &*u_prev;
        let forcing = &problem.forcing;
        let dt = sim.steps().dt;

        u.zero();
        sim.executor().for_each(sim.elements(), u, |e, shared| {
            let mut local = sim.element_rhs();
            let jacobian = sim.jacobian(e);
            for q in sim.quad_points() {
                let w = sim.weight(q);
                let [px, py] = sim.point(e, q);
                let prev = sim.eval_fun(u_prev, e, q);
                let f_avg = 0.5 * (forcing(px, py, t) + forcing(px, py, t + dt));
                for a in sim.dofs_on_element(e) {
                    let aa = sim.dof_global_to_local(e, a);
                    let v = sim.eval_basis(e, q, a);
                    let val = prev.val * v.val - 0.5 * dt * grad_dot(prev, v) + dt * f_avg * v.val;
                    local[aa] += val * w * jacobian;
                }
            }
            shared.synchronized(|rhs| sim.update_global_rhs(rhs, &local, e));
        });
    }

    fn apply_bc(sim: &Sim2d, rhs: &mut Tensor) {
        sim.for_boundary_dofs(|idx| rhs[idx] = 0.0);
    }

    fn report_error(&self, label: &str, t: f64) {
        if let Some(exact) = &self.problem.exact {
            let err = self.sim.error_l2(&self.u, |x, y| exact(x, y, t).val);
            log::info!("{}: t = {:.4}, relative L2 error = {:.3e}", label, t, err);
        }
    }
}

impl Simulation for Heat2d {
    fn time_steps(&self) -> TimeSteps {
        self.sim.steps()
    }

    fn before(&mut self) -> eyre::Result<()> {
        self.prepare_matrices()?;

        let Self { sim, problem, u, .. } = self;
        sim.projection(u, |x, y| (problem.initial)(x, y));
        Self::apply_bc(sim, u);
        sim.solve_mass(u)?;

        if let Some((manager, _)) = &self.output {
            manager.to_file(&self.u, 0)?;
        }
        Ok(())
    }

    fn before_step(&mut self, _iter: usize, _t: f64) -> eyre::Result<()> {
        std::mem::swap(&mut self.u, &mut self.u_prev);
        Ok(())
    }

    fn step(&mut self, _iter: usize, t: f64) -> eyre::Result<()> {
        self.compute_rhs(t);
        Self::apply_bc(&self.sim, &mut self.u);
        let Self { sim, u, ax, ay, .. } = self;
        sim.solve_with(u, &[&*ax, &*ay])?;
        Ok(())
    }

    fn after_step(&mut self, iter: usize, t: f64) -> eyre::Result<()> {
        if let Some((manager, every)) = &self.output {
            if (iter + 1) % every == 0 {
                manager.to_file(&self.u, iter + 1)?;
            }
        }
        self.report_error("step", t + self.sim.steps().dt);
        Ok(())
    }

    fn after(&mut self) -> eyre::Result<()> {
        let t = self.sim.steps().dt * self.sim.steps().step_count as f64;
        self.report_error("final", t);
        Ok(())
    }
}

/// Diffusion stepped by a linear multistep scheme over a ring of history
/// states. The implicit operator per axis is `M + b_0 dt K`.
#[derive(Debug)]
pub struct Multistep2d {
    sim: Sim2d,
    problem: Problem2d,
    scheme: Scheme,
    us: Ring<Tensor>,
    rhs: Tensor,
    ax: BandSystem,
    ay: BandSystem,
}

impl Multistep2d {
    pub fn new(config: &Config2d, problem: Problem2d, scheme: Scheme) -> Result<Self, ConfigError> {
        let sim = Sim2d::new(config)?;
        let shape = sim.shape();
        let capacity = (scheme.steps() + 1).max(2);
        let us = Ring::with(capacity, || Tensor::zeros(&shape));
        let ax = BandSystem::new(config.x.degree, config.x.degree, shape[0]);
        let ay = BandSystem::new(config.y.degree, config.y.degree, shape[1]);
        Ok(Self {
            rhs: Tensor::zeros(&shape),
            sim,
            problem,
            scheme,
            us,
            ax,
            ay,
        })
    }

    pub fn solution(&self) -> &Tensor {
        self.us.newest()
    }

    pub fn sim(&self) -> &Sim2d {
        &self.sim
    }

    fn compute_rhs(&mut self, t: f64) {
        let Self { sim, problem, scheme, us, rhs, .. } = self;
        let sim = &*sim;
        let us = &*us;
        let scheme = &*scheme;
        let forcing = &problem.forcing;
        let dt = sim.steps().dt;
        let t_next = t + dt;
        let s = scheme.steps();

        rhs.zero();
        sim.executor().for_each(sim.elements(), rhs, |e, shared| {
            let mut local = sim.element_rhs();
            let jacobian = sim.jacobian(e);
            for q in sim.quad_points() {
                let w = sim.weight(q);
                let [px, py] = sim.point(e, q);
                let history: Vec<_> = (1..=s).map(|i| sim.eval_fun(&us[i], e, q)).collect();
                for a in sim.dofs_on_element(e) {
                    let aa = sim.dof_global_to_local(e, a);
                    let v = sim.eval_basis(e, q, a);

                    let mut val = 0.0;
                    for i in 0..=s {
                        let ti = t_next - i as f64 * dt;
                        val += dt * scheme.b(i) * forcing(px, py, ti) * v.val;
                    }
                    for (i, state) in history.iter().enumerate() {
                        let i = i + 1;
                        val -= scheme.a(i) * state.val * v.val;
                        val -= dt * scheme.b(i) * grad_dot(*state, v);
                    }
                    local[aa] += val * w * jacobian;
                }
            }
            shared.synchronized(|rhs| sim.update_global_rhs(rhs, &local, e));
        });
    }
}

impl Simulation for Multistep2d {
    fn time_steps(&self) -> TimeSteps {
        self.sim.steps()
    }

    fn before(&mut self) -> eyre::Result<()> {
        self.sim.x_mut().fix_left();
        self.sim.x_mut().fix_right();
        self.sim.y_mut().fix_left();
        self.sim.y_mut().fix_right();
        self.sim.x_mut().factorize_matrix()?;
        self.sim.y_mut().factorize_matrix()?;

        let eta = self.scheme.b(0) * self.sim.steps().dt;
        fill_implicit_operator(&mut self.ax, self.sim.x(), eta)?;
        fill_implicit_operator(&mut self.ay, self.sim.y(), eta)?;

        // Seed the history ring with known states at t = 0, dt, ...
        let dt = self.sim.steps().dt;
        let needed = self.us.len() - 1;
        let Self { sim, us, rhs, problem, .. } = self;
        for i in 0..needed {
            let t = i as f64 * dt;
            // Best available state for time t: the closed-form solution when
            // the problem has one, otherwise the initial state (sufficient to
            // seed single-step schemes).
            sim.projection(rhs, |x, y| match &problem.exact {
                Some(exact) => exact(x, y, t).val,
                None => (problem.initial)(x, y),
            });
            Heat2d::apply_bc(sim, rhs);
            sim.solve_mass(rhs)?;
            std::mem::swap(us.newest_mut(), rhs);
            us.rotate();
        }
        us.rotate();
        Ok(())
    }

    fn before_step(&mut self, _iter: usize, _t: f64) -> eyre::Result<()> {
        self.us.rotate();
        Ok(())
    }

    fn step(&mut self, iter: usize, t: f64) -> eyre::Result<()> {
        // While seeded states still cover the target time there is nothing to do
        if iter + 2 < self.us.len() {
            return Ok(());
        }
        self.compute_rhs(t);
        Heat2d::apply_bc(&self.sim, &mut self.rhs);
        let Self { sim, us, rhs, ax, ay, .. } = self;
        sim.solve_with(rhs, &[&*ax, &*ay])?;
        std::mem::swap(us.newest_mut(), rhs);
        Ok(())
    }

    fn after_step(&mut self, _iter: usize, t: f64) -> eyre::Result<()> {
        if let Some(exact) = &self.problem.exact {
            let tt = t + self.sim.steps().dt;
            let err = self.sim.error_l2(self.us.newest(), |x, y| exact(x, y, tt).val);
            log::info!("multistep: t = {:.4}, relative L2 error = {:.3e}", tt, err);
        }
        Ok(())
    }
}

/// Fills and factorizes `M + eta K` for one axis, with the axis's Dirichlet
/// rows applied before factorization.
fn fill_implicit_operator(
    system: &mut BandSystem,
    dim: &crate::sim::Dimension,
    eta: f64,
) -> Result<(), LinError> {
    let matrix = system.matrix_mut();
    matrix.zero();
    assemble_operator(matrix, dim.basis(), |u, v| u.val * v.val + eta * u.der * v.der)?;
    for &i in dim.fixed_dofs() {
        matrix.fix_dof(i);
    }
    system.factorize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_default_problems() {
        let registry = Registry::with_defaults();
        assert!(registry.create("heat").is_some());
        assert!(registry.create("manufactured-poly").is_some());
        assert!(registry.create("no-such-problem").is_none());
        assert_eq!(registry.names().count(), 2);
    }

    #[test]
    fn manufactured_forcing_matches_residual() {
        // finite-difference check of f = u_t - lap(u) at a few points
        let problem = manufactured_poly();
        let exact = problem.exact.as_ref().unwrap();
        let h = 1e-5;
        for &(x, y, t) in &[(0.3, 0.7, 0.0), (0.5, 0.5, 1.0), (0.25, 0.1, 0.4)] {
            let ut = (exact(x, y, t + h).val - exact(x, y, t - h).val) / (2.0 * h);
            let lap = (exact(x + h, y, t).val - 2.0 * exact(x, y, t).val + exact(x - h, y, t).val
                + exact(x, y + h, t).val - 2.0 * exact(x, y, t).val
                + exact(x, y - h, t).val)
                / (h * h);
            let f = (problem.forcing)(x, y, t);
            assert!((f - (ut - lap)).abs() < 1e-4);
        }
    }
}
