//! Principal-curve estimation driver.
//!
//! Binds the principal-curve objective to a point cloud, searches position
//! vectors in the unit hyper-cube with a population optimizer, then sorts the
//! best positions and refits the smoother to produce the final curve.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CurveError, CurveResult};
use crate::optimization::{
    argsort, Backend, BackendKind, Bounds, Optimizer, PrincipalCurveObjective, ProgressUpdate,
};
use crate::smoothing::{eval_smoother, fit_smoother, SmootherConfig};

/// How the reported cost history is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Best score after each iteration.
    #[default]
    Trace,
    /// The final cost repeated once per iteration.
    Constant,
}

/// Configuration for one estimation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Weight of the ordering-regularity term
    pub rho: f64,
    /// Optimizer iterations
    pub max_iter: usize,
    /// Nests or particles
    pub population_size: usize,
    /// Log the final cost at info level
    pub verbose: bool,
    pub history: HistoryMode,
    /// Seed for the random source; entropy when absent
    pub seed: Option<u64>,
    pub smoother: SmootherConfig,
    pub backend: BackendKind,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            rho: 1.0,
            max_iter: 60,
            population_size: 20,
            verbose: true,
            history: HistoryMode::Trace,
            seed: None,
            smoother: SmootherConfig::default(),
            backend: BackendKind::Cuckoo,
        }
    }
}

impl CurveConfig {
    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_population_size(mut self, population_size: usize) -> Self {
        self.population_size = population_size;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_history(mut self, history: HistoryMode) -> Self {
        self.history = history;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_smoother(mut self, smoother: SmootherConfig) -> Self {
        self.smoother = smoother;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> CurveResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CurveResult<()> {
        if !self.rho.is_finite() {
            return Err(CurveError::InvalidParameter {
                name: "rho",
                value: self.rho,
                reason: "must be finite",
            });
        }
        if self.population_size == 0 {
            return Err(CurveError::InvalidPopulationSize(self.population_size));
        }
        self.smoother.validate()
    }

    /// Random source for a run: seeded when `seed` is set.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Output of an estimation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationResult {
    /// Fitted curve, one row per point in position order (N x D)
    pub curve: DMatrix<f64>,
    /// Best positions sorted ascending
    pub omega: DVector<f64>,
    /// Point index of each curve row
    pub order: Vec<usize>,
    pub cost: f64,
    /// Length `max_iter`
    pub history: Vec<f64>,
    pub evaluations: usize,
}

/// Estimate a principal curve through the rows of `points` with `optimizer`.
pub fn estimate_principal_curve<Opt, R>(
    points: &DMatrix<f64>,
    config: &CurveConfig,
    optimizer: &Opt,
    rng: &mut R,
) -> CurveResult<EstimationResult>
where
    Opt: Optimizer,
    R: Rng + ?Sized,
{
    config.validate()?;
    let objective =
        PrincipalCurveObjective::new(points, config.rho)?.with_smoother(config.smoother);
    let bounds = Bounds::unit(points.nrows());

    debug!(
        optimizer = optimizer.name(),
        n_points = points.nrows(),
        n_dims = points.ncols(),
        population = optimizer.population_size(),
        max_iter = config.max_iter,
        "starting principal curve estimation"
    );
    let started = Instant::now();

    let mut trace = Vec::with_capacity(config.max_iter);
    let result = optimizer.optimize_with_progress(
        &objective,
        &bounds,
        config.max_iter,
        rng,
        Some(|update: ProgressUpdate| {
            if update.iteration > 0 {
                trace.push(update.best_fitness);
            }
        }),
    )?;

    let cost = result.best_score;
    let order = argsort(result.best_position.as_slice());
    let omega: Vec<f64> = order.iter().map(|&i| result.best_position[i]).collect();
    let ordered = points.select_rows(order.iter());
    let splines = fit_smoother(&omega, &ordered, &config.smoother)?;
    let curve = eval_smoother(&splines, &omega);

    let duration_ms = started.elapsed().as_millis();
    if config.verbose {
        info!(
            optimizer = optimizer.name(),
            cost,
            evaluations = result.evaluations,
            duration_ms,
            "principal curve estimation complete"
        );
    } else {
        debug!(
            optimizer = optimizer.name(),
            cost,
            evaluations = result.evaluations,
            duration_ms,
            "principal curve estimation complete"
        );
    }

    let history = match config.history {
        HistoryMode::Trace => trace,
        HistoryMode::Constant => vec![cost; config.max_iter],
    };

    Ok(EstimationResult {
        curve,
        omega: DVector::from_vec(omega),
        order,
        cost,
        history,
        evaluations: result.evaluations,
    })
}

/// Build the configured backend and run it on a fresh random source.
pub fn estimate_with_backend(
    points: &DMatrix<f64>,
    config: &CurveConfig,
) -> CurveResult<EstimationResult> {
    config.validate()?;
    let backend = Backend::from_kind(config.backend, config.population_size)?;
    let mut rng = config.rng();
    estimate_principal_curve(points, config, &backend, &mut rng)
}

/// Principal curve by Cuckoo Search with default coefficients.
pub fn estimate_principal_curve_cuckoo(
    points: &DMatrix<f64>,
    rho: f64,
    max_iter: usize,
    n_nests: usize,
    verbose: bool,
) -> CurveResult<EstimationResult> {
    let config = CurveConfig::default()
        .with_rho(rho)
        .with_max_iter(max_iter)
        .with_population_size(n_nests)
        .with_verbose(verbose)
        .with_backend(BackendKind::Cuckoo);
    estimate_with_backend(points, &config)
}

/// Principal curve by Particle Swarm with default coefficients.
pub fn estimate_principal_curve_pso(
    points: &DMatrix<f64>,
    rho: f64,
    max_iter: usize,
    n_particles: usize,
    verbose: bool,
) -> CurveResult<EstimationResult> {
    let config = CurveConfig::default()
        .with_rho(rho)
        .with_max_iter(max_iter)
        .with_population_size(n_particles)
        .with_verbose(verbose)
        .with_backend(BackendKind::ParticleSwarm);
    estimate_with_backend(points, &config)
}
