//! Principal-curve estimation by population-based global search.
//!
//! Each observed point receives a position in [0, 1] along an unknown curve.
//! Positions are searched with Lévy-flight Cuckoo Search or Particle Swarm
//! Optimization, scoring each candidate ordering by the residual of a cubic
//! smoothing spline plus an ordering-regularity penalty.
//!
//! ```
//! use cuckoo_pc::curve::{estimate_with_backend, CurveConfig};
//! use cuckoo_pc::optimization::BackendKind;
//! use nalgebra::DMatrix;
//!
//! let points = DMatrix::from_fn(20, 2, |i, j| {
//!     let t = i as f64 / 19.0;
//!     if j == 0 { t } else { t * t }
//! });
//! let config = CurveConfig::default()
//!     .with_max_iter(10)
//!     .with_population_size(10)
//!     .with_seed(7)
//!     .with_backend(BackendKind::ParticleSwarm);
//!
//! let result = estimate_with_backend(&points, &config).unwrap();
//! assert_eq!(result.curve.shape(), (20, 2));
//! assert_eq!(result.history.len(), 10);
//! ```

pub mod comparison;
pub mod curve;
pub mod error;
pub mod optimization;
pub mod smoothing;

pub use curve::{
    estimate_principal_curve, estimate_principal_curve_cuckoo, estimate_principal_curve_pso,
    estimate_with_backend, CurveConfig, EstimationResult, HistoryMode,
};
pub use error::{CurveError, CurveResult};
pub use optimization::{
    Backend, BackendKind, Bounds, CuckooParameters, CuckooSearch, FnObjective, Objective,
    OptimizationResult, Optimizer, ParticleSwarm, PrincipalCurveObjective, ProgressUpdate,
    SwarmParameters, DEGENERATE_PENALTY,
};
pub use smoothing::{eval_smoother, fit_smoother, SmootherConfig, SmoothingSpline};
