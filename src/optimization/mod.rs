//! Population-based global optimization.
//!
//! This module provides Cuckoo Search and Particle Swarm optimizers behind a
//! common [`Optimizer`] trait, together with the batched [`Objective`]
//! contract and the principal-curve loss.
//!
//! # Example
//!
//! ```
//! use cuckoo_pc::optimization::{
//!     Bounds, CuckooParameters, CuckooSearch, FnObjective, Optimizer,
//! };
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! // Minimize a sphere centred at 0.5 inside the unit square
//! let objective = FnObjective::new(2, |x: &[f64]| {
//!     x.iter().map(|v| (v - 0.5).powi(2)).sum()
//! });
//!
//! let optimizer = CuckooSearch::new(CuckooParameters::default()).unwrap();
//! let mut rng = StdRng::seed_from_u64(42);
//! let result = optimizer
//!     .optimize(&objective, &Bounds::unit(2), 50, &mut rng)
//!     .unwrap();
//!
//! println!("best score {:.6} at {:?}", result.best_score, result.best_position.as_slice());
//! ```

pub mod algorithm;
pub mod cuckoo;
pub mod levy;
pub mod objective;
pub mod population;
pub mod swarm;
pub mod types;

// Re-export commonly used items
pub use algorithm::{Backend, BackendKind, Optimizer};
pub use cuckoo::CuckooSearch;
pub use levy::{mantegna_sigma, LevyFlight};
pub use objective::{
    argsort, order_points, FnObjective, Objective, PrincipalCurveObjective, DEGENERATE_PENALTY,
};
pub use population::{
    calculate_diversity, calculate_population_stats, clamp_to_bounds, get_best_index,
    get_worst_indices, random_population, uniform_matrix, UNSCORED_FITNESS,
};
pub use swarm::ParticleSwarm;
pub use types::{
    Bounds, CuckooParameters, OptimizationResult, PopulationStats, ProgressUpdate, SwarmParameters,
};
