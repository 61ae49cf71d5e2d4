//! The capped substep loop driven through the simulation lifecycle, the way
//! coupled formulations use an external direct solver inside `step`.
use adsolve::direct::{
    iterate_to_convergence, DenseDirectSolver, DirectSolver, IterationConfig, IterationOutcome,
    SparseProblem,
};
use adsolve::sim::{run, Simulation, TimeSteps};

const N: usize = 4;

/// Two-field model problem `A x = b` with cross-field coupling. Each substep
/// solves the block-diagonal part for an increment against the current
/// residual and accumulates it, so the loop has to iterate to convergence.
struct CoupledIteration {
    matrix: [[f64; N]; N],
    rhs: [f64; N],
    solution: [f64; N],
    outcome: Option<IterationOutcome>,
}

impl CoupledIteration {
    fn new() -> Self {
        Self {
            matrix: [
                [10.0, 2.0, 1.0, 0.0],
                [2.0, 10.0, 0.0, 1.0],
                [1.0, 0.0, 10.0, 2.0],
                [0.0, 1.0, 2.0, 10.0],
            ],
            rhs: [1.0, 2.0, 3.0, 4.0],
            solution: [0.0; N],
            outcome: None,
        }
    }

    fn residual(&self) -> [f64; N] {
        let mut r = self.rhs;
        for i in 0..N {
            for j in 0..N {
                r[i] -= self.matrix[i][j] * self.solution[j];
            }
        }
        r
    }
}

impl Simulation for CoupledIteration {
    fn time_steps(&self) -> TimeSteps {
        TimeSteps { step_count: 1, dt: 1.0 }
    }

    fn step(&mut self, _iter: usize, _t: f64) -> eyre::Result<()> {
        let diagonal: Vec<f64> = (0..N).map(|i| self.matrix[i][i]).collect();
        let outcome = iterate_to_convergence::<adsolve::error::DirectSolverError>(
            IterationConfig::default(),
            |_| {
                let residual = self.residual();
                let mut problem = SparseProblem::new(N);
                for (i, &d) in diagonal.iter().enumerate() {
                    problem.add(i, i, d);
                }
                problem.rhs.copy_from_slice(&residual);
                DenseDirectSolver.solve(&mut problem)?;

                let mut increment_sq = 0.0;
                for (x, &delta) in self.solution.iter_mut().zip(&problem.rhs) {
                    *x += delta;
                    increment_sq += delta * delta;
                }
                Ok(increment_sq.sqrt())
            },
        )?;
        self.outcome = Some(outcome);
        Ok(())
    }
}

#[test]
fn substep_loop_solves_coupled_system_through_the_lifecycle() {
    let mut sim = CoupledIteration::new();
    run(&mut sim).unwrap();

    let outcome = sim.outcome.expect("step must record the loop outcome");
    assert!(outcome.converged);
    assert!(outcome.iterations < IterationConfig::default().max_iterations);
    assert!(outcome.residual < IterationConfig::default().tolerance);

    // the accumulated increments must solve the full coupled system
    let mut reference = SparseProblem::new(N);
    for i in 0..N {
        for j in 0..N {
            if sim.matrix[i][j] != 0.0 {
                reference.add(i, j, sim.matrix[i][j]);
            }
        }
    }
    reference.rhs.copy_from_slice(&sim.rhs);
    DenseDirectSolver.solve(&mut reference).unwrap();

    for (computed, expected) in sim.solution.iter().zip(&reference.rhs) {
        assert!((computed - expected).abs() < 1e-5, "{} vs {}", computed, expected);
    }
}
