//! Cuckoo Search vs Particle Swarm on a small principal-curve problem.
//!
//! Run with: cargo run --example cuckoo_vs_pso -- --points 50 --iterations 30

use std::time::Instant;

use clap::{Parser, ValueEnum};
use cuckoo_pc::comparison::{sample_arc, CurveMetrics};
use cuckoo_pc::curve::{estimate_principal_curve, CurveConfig};
use cuckoo_pc::optimization::{
    CuckooParameters, CuckooSearch, Optimizer, ParticleSwarm, SwarmParameters,
};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Parser)]
#[command(name = "Cuckoo vs PSO Demo")]
struct Args {
    /// Data set to fit
    #[arg(short, long, default_value = "uniform")]
    data: DataSet,

    /// Number of points
    #[arg(short, long, default_value = "50")]
    points: usize,

    /// Optimizer iterations
    #[arg(short, long, default_value = "30")]
    iterations: usize,

    /// Nests / particles
    #[arg(long, default_value = "15")]
    population: usize,

    /// Ordering-regularity weight
    #[arg(long, default_value = "1.0")]
    rho: f64,

    /// Noise level for the arc data set
    #[arg(long, default_value = "0.1")]
    noise: f64,

    /// Random seed
    #[arg(short, long, default_value = "42")]
    seed: u64,
}

#[derive(ValueEnum, Clone, Debug)]
enum DataSet {
    /// Points uniform in the unit square
    Uniform,
    /// Noisy half circle
    Arc,
}

fn main() {
    let args = Args::parse();

    println!("Cuckoo vs PSO Demo");
    println!("==================");
    println!("Data set: {:?}", args.data);
    println!("Points: {}", args.points);
    println!("Iterations: {}", args.iterations);
    println!("Population: {}", args.population);
    println!();

    let mut data_rng = StdRng::seed_from_u64(args.seed);
    let (points, truth) = match args.data {
        DataSet::Uniform => (
            DMatrix::from_fn(args.points, 2, |_, _| data_rng.r#gen::<f64>()),
            None,
        ),
        DataSet::Arc => match sample_arc(args.points, args.noise, &mut data_rng) {
            Ok(sample) => (sample.data, Some(sample.truth)),
            Err(err) => {
                eprintln!("Failed to generate data: {}", err);
                std::process::exit(1);
            }
        },
    };

    let config = CurveConfig::default()
        .with_rho(args.rho)
        .with_max_iter(args.iterations)
        .with_population_size(args.population)
        .with_verbose(false);

    let cuckoo =
        CuckooSearch::new(CuckooParameters::default().with_population_size(args.population));
    let pso = ParticleSwarm::new(SwarmParameters::default().with_population_size(args.population));
    let (cuckoo, pso) = match (cuckoo, pso) {
        (Ok(cuckoo), Ok(pso)) => (cuckoo, pso),
        (Err(err), _) | (_, Err(err)) => {
            eprintln!("Invalid optimizer settings: {}", err);
            std::process::exit(1);
        }
    };

    run("Cuckoo Search", &cuckoo, &points, truth.as_ref(), &config, args.seed);
    run("Particle Swarm", &pso, &points, truth.as_ref(), &config, args.seed);
}

fn run<O: Optimizer>(
    label: &str,
    optimizer: &O,
    points: &DMatrix<f64>,
    truth: Option<&DMatrix<f64>>,
    config: &CurveConfig,
    seed: u64,
) {
    println!("Running {}...", label);
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let start = Instant::now();
    let result = match estimate_principal_curve(points, config, optimizer, &mut rng) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("  {} failed: {}", label, err);
            return;
        }
    };
    let elapsed = start.elapsed().as_secs_f64();

    println!("  {} completed, final cost: {:.4}", label, result.cost);
    println!("  Evaluations: {} in {:.2}s", result.evaluations, elapsed);
    if let (Some(first), Some(last)) = (result.history.first(), result.history.last()) {
        println!("  Best cost: {:.4} after iteration 1, {:.4} at the end", first, last);
    }

    if let Some(truth) = truth {
        match CurveMetrics::compute(&result.curve, truth, points) {
            Ok(metrics) => {
                println!("  Distance to true curve: {:.4}", metrics.to_true);
                println!("  Data fit: {:.4}", metrics.data_fit);
                println!("  Length ratio: {:.3}", metrics.length_ratio);
            }
            Err(err) => eprintln!("  Metrics unavailable: {}", err),
        }
    }
    println!();
}
