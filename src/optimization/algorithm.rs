//! Optimizer contract shared by Cuckoo Search and Particle Swarm.
//!
//! Both optimizers minimize a batched [`Objective`] inside box [`Bounds`]
//! for a fixed number of iterations, drawing all randomness from an
//! explicit `Rng` so seeded runs are reproducible.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult};

use super::cuckoo::CuckooSearch;
use super::objective::Objective;
use super::population::{calculate_diversity, calculate_population_stats, UNSCORED_FITNESS};
use super::swarm::ParticleSwarm;
use super::types::{
    Bounds, CuckooParameters, OptimizationResult, ProgressUpdate, SwarmParameters,
};

/// A population-based minimizer.
pub trait Optimizer {
    /// Short name used in log events.
    fn name(&self) -> &'static str;

    fn population_size(&self) -> usize;

    /// Run for `iterations` iterations, reporting the initial population as
    /// iteration 0 and then every completed iteration.
    ///
    /// The returned position always lies within `bounds`; with zero
    /// iterations it is the best member of the initial population.
    fn optimize_with_progress<O, R, F>(
        &self,
        objective: &O,
        bounds: &Bounds,
        iterations: usize,
        rng: &mut R,
        on_progress: Option<F>,
    ) -> CurveResult<OptimizationResult>
    where
        O: Objective + ?Sized,
        R: Rng + ?Sized,
        F: FnMut(ProgressUpdate);

    /// Run without a progress callback.
    fn optimize<O, R>(
        &self,
        objective: &O,
        bounds: &Bounds,
        iterations: usize,
        rng: &mut R,
    ) -> CurveResult<OptimizationResult>
    where
        O: Objective + ?Sized,
        R: Rng + ?Sized,
    {
        self.optimize_with_progress::<O, R, fn(ProgressUpdate)>(
            objective, bounds, iterations, rng, None,
        )
    }
}

/// Which optimizer a configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Cuckoo,
    ParticleSwarm,
}

/// Runtime-selected optimizer.
#[derive(Debug, Clone)]
pub enum Backend {
    Cuckoo(CuckooSearch),
    ParticleSwarm(ParticleSwarm),
}

impl Backend {
    /// Build the selected optimizer with default coefficients.
    pub fn from_kind(kind: BackendKind, population_size: usize) -> CurveResult<Self> {
        match kind {
            BackendKind::Cuckoo => Ok(Backend::Cuckoo(CuckooSearch::new(
                CuckooParameters::default().with_population_size(population_size),
            )?)),
            BackendKind::ParticleSwarm => Ok(Backend::ParticleSwarm(ParticleSwarm::new(
                SwarmParameters::default().with_population_size(population_size),
            )?)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Cuckoo(_) => BackendKind::Cuckoo,
            Backend::ParticleSwarm(_) => BackendKind::ParticleSwarm,
        }
    }
}

impl Optimizer for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Cuckoo(inner) => inner.name(),
            Backend::ParticleSwarm(inner) => inner.name(),
        }
    }

    fn population_size(&self) -> usize {
        match self {
            Backend::Cuckoo(inner) => inner.population_size(),
            Backend::ParticleSwarm(inner) => inner.population_size(),
        }
    }

    fn optimize_with_progress<O, R, F>(
        &self,
        objective: &O,
        bounds: &Bounds,
        iterations: usize,
        rng: &mut R,
        on_progress: Option<F>,
    ) -> CurveResult<OptimizationResult>
    where
        O: Objective + ?Sized,
        R: Rng + ?Sized,
        F: FnMut(ProgressUpdate),
    {
        match self {
            Backend::Cuckoo(inner) => {
                inner.optimize_with_progress(objective, bounds, iterations, rng, on_progress)
            }
            Backend::ParticleSwarm(inner) => {
                inner.optimize_with_progress(objective, bounds, iterations, rng, on_progress)
            }
        }
    }
}

/// Check that the objective and bounds agree before allocating anything.
pub(crate) fn check_problem<O>(objective: &O, bounds: &Bounds) -> CurveResult<()>
where
    O: Objective + ?Sized,
{
    if objective.dimension() != bounds.dimension() {
        return Err(CurveError::DimensionMismatch {
            expected: objective.dimension(),
            found: bounds.dimension(),
        });
    }
    Ok(())
}

/// Evaluate a population. NaN or infinite scores are stored as
/// [`UNSCORED_FITNESS`] so they lose every comparison.
pub(crate) fn evaluate_population<O>(
    objective: &O,
    population: &DMatrix<f64>,
) -> CurveResult<DVector<f64>>
where
    O: Objective + ?Sized,
{
    let mut fitness = objective.evaluate(population)?;
    if fitness.len() != population.nrows() {
        return Err(CurveError::DimensionMismatch {
            expected: population.nrows(),
            found: fitness.len(),
        });
    }
    for value in fitness.iter_mut() {
        if !value.is_finite() {
            *value = UNSCORED_FITNESS;
        }
    }
    Ok(fitness)
}

pub(crate) fn report_progress<F>(
    on_progress: &mut Option<F>,
    iteration: usize,
    best_fitness: f64,
    fitness: &DVector<f64>,
    population: &DMatrix<f64>,
    evaluations: usize,
) where
    F: FnMut(ProgressUpdate),
{
    if let Some(progress) = on_progress.as_mut() {
        let stats = calculate_population_stats(fitness);
        progress(ProgressUpdate {
            iteration,
            best_fitness,
            average_fitness: stats.average_fitness,
            diversity: calculate_diversity(population),
            evaluations,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::objective::FnObjective;
    use crate::optimization::population::get_best_index;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sphere(dimension: usize) -> FnObjective<impl Fn(&[f64]) -> f64 + Sync> {
        FnObjective::new(dimension, |x: &[f64]| x.iter().map(|v| (v - 0.3).powi(2)).sum())
    }

    #[test]
    fn backend_from_kind_builds_matching_optimizer() {
        let cuckoo = Backend::from_kind(BackendKind::Cuckoo, 12).unwrap();
        assert_eq!(cuckoo.kind(), BackendKind::Cuckoo);
        assert_eq!(cuckoo.population_size(), 12);
        assert_eq!(cuckoo.name(), "cuckoo");

        let swarm = Backend::from_kind(BackendKind::ParticleSwarm, 7).unwrap();
        assert_eq!(swarm.kind(), BackendKind::ParticleSwarm);
        assert_eq!(swarm.population_size(), 7);
        assert_eq!(swarm.name(), "pso");
    }

    #[test]
    fn backend_rejects_zero_population() {
        assert_eq!(
            Backend::from_kind(BackendKind::Cuckoo, 0).err(),
            Some(CurveError::InvalidPopulationSize(0))
        );
    }

    #[test]
    fn backend_kind_serializes_snake_case() {
        let json = serde_json::to_string(&BackendKind::ParticleSwarm).unwrap();
        assert_eq!(json, "\"particle_swarm\"");
    }

    #[test]
    fn mismatched_bounds_are_rejected_before_running() {
        let optimizer = Backend::from_kind(BackendKind::Cuckoo, 5).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let result = optimizer.optimize(&sphere(3), &Bounds::unit(4), 10, &mut rng);
        assert_eq!(
            result,
            Err(CurveError::DimensionMismatch {
                expected: 3,
                found: 4
            })
        );
    }

    #[test]
    fn non_finite_scores_are_replaced() {
        let objective = FnObjective::new(1, |x: &[f64]| match x[0] {
            v if v > 0.7 => f64::NAN,
            v if v > 0.5 => f64::INFINITY,
            v if v < 0.1 => f64::NEG_INFINITY,
            v => v,
        });
        let population = DMatrix::from_row_slice(4, 1, &[0.2, 0.6, 0.8, 0.05]);
        let fitness = evaluate_population(&objective, &population).unwrap();

        assert!(fitness.iter().all(|f| f.is_finite()));
        assert_eq!(fitness[0], 0.2);
        assert_eq!(fitness[1], UNSCORED_FITNESS);
        assert_eq!(fitness[2], UNSCORED_FITNESS);
        assert_eq!(fitness[3], UNSCORED_FITNESS);
        assert_eq!(get_best_index(&fitness), 0);
    }

    #[test]
    fn progress_callback_receives_updates() {
        for kind in [BackendKind::Cuckoo, BackendKind::ParticleSwarm] {
            let optimizer = Backend::from_kind(kind, 6).unwrap();
            let mut rng = StdRng::seed_from_u64(5);
            let mut iterations = Vec::new();
            optimizer
                .optimize_with_progress(
                    &sphere(2),
                    &Bounds::unit(2),
                    4,
                    &mut rng,
                    Some(|update: ProgressUpdate| iterations.push(update.iteration)),
                )
                .unwrap();
            assert_eq!(iterations, vec![0, 1, 2, 3, 4]);
        }
    }
}
