//! Heat equation driver: diffusion of a smooth bump (or a registered
//! problem) on the unit square.
use adsolve::output::OutputManager;
use adsolve::problems::{Heat2d, Registry};
use adsolve::sim::{run, Config2d, DimConfig, TimeSteps};
use clap::Parser;
use eyre::eyre;

#[derive(Parser, Debug)]
#[clap(about = "2D diffusion solved by isogeometric alternating-direction splitting")]
struct Opts {
    /// B-spline degree along each axis
    degree: usize,

    /// Elements along each axis
    elements: usize,

    /// Number of time steps
    steps: usize,

    /// Time step size
    dt: f64,

    /// Write a data file every this many steps
    #[clap(long, default_value = "100")]
    output_every: usize,

    /// Problem identifier from the registry
    #[clap(long, default_value = "heat")]
    problem: String,

    /// Worker pool width for element-parallel assembly
    #[clap(long, default_value = "8")]
    threads: usize,
}

fn main() -> eyre::Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;
    let opts = Opts::parse();

    let registry = Registry::with_defaults();
    let problem = registry
        .create(&opts.problem)
        .ok_or_else(|| eyre!("unknown problem '{}'", opts.problem))?;

    let config = Config2d {
        x: DimConfig::new(opts.degree, opts.elements),
        y: DimConfig::new(opts.degree, opts.elements),
        steps: TimeSteps {
            step_count: opts.steps,
            dt: opts.dt,
        },
        threads: opts.threads,
    };

    let mut simulation = Heat2d::new(&config, problem)?
        .with_output(OutputManager::new("out_{}.data"), opts.output_every);
    run(&mut simulation)?;
    Ok(())
}
