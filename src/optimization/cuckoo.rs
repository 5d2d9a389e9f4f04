//! Cuckoo Search with Lévy flights.
//!
//! Each iteration every nest lays one egg by a Lévy flight scaled by its
//! distance to the best nest. An egg replaces its nest only when strictly
//! better. Afterwards the worst `floor(pa * n)` nests are abandoned and
//! rebuilt uniformly at random.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use tracing::{debug, trace};

use crate::error::CurveResult;

use super::algorithm::{check_problem, evaluate_population, report_progress, Optimizer};
use super::levy::LevyFlight;
use super::objective::Objective;
use super::population::{clamp_to_bounds, get_best_index, get_worst_indices, random_population};
use super::types::{Bounds, CuckooParameters, OptimizationResult, ProgressUpdate};

#[derive(Debug, Clone)]
pub struct CuckooSearch {
    params: CuckooParameters,
    levy: LevyFlight,
}

impl CuckooSearch {
    pub fn new(params: CuckooParameters) -> CurveResult<Self> {
        params.validate()?;
        let levy = LevyFlight::new(params.levy_exponent)?;
        Ok(Self { params, levy })
    }

    pub fn parameters(&self) -> &CuckooParameters {
        &self.params
    }

    /// Nests rebuilt per iteration.
    pub fn abandon_count(&self) -> usize {
        (self.params.abandon_fraction * self.params.population_size as f64).floor() as usize
    }

    fn lay_eggs<R>(
        &self,
        nests: &DMatrix<f64>,
        best: &DVector<f64>,
        bounds: &Bounds,
        rng: &mut R,
    ) -> DMatrix<f64>
    where
        R: Rng + ?Sized,
    {
        let (n, dim) = nests.shape();
        let alpha = self.params.step_scale;
        let mut eggs = DMatrix::zeros(n, dim);
        for i in 0..n {
            let step = self.levy.step(dim, rng);
            for j in 0..dim {
                let x = nests[(i, j)];
                eggs[(i, j)] = x + alpha * step[j] * (x - best[j]);
            }
        }
        clamp_to_bounds(&mut eggs, bounds);
        eggs
    }
}

impl Optimizer for CuckooSearch {
    fn name(&self) -> &'static str {
        "cuckoo"
    }

    fn population_size(&self) -> usize {
        self.params.population_size
    }

    fn optimize_with_progress<O, R, F>(
        &self,
        objective: &O,
        bounds: &Bounds,
        iterations: usize,
        rng: &mut R,
        mut on_progress: Option<F>,
    ) -> CurveResult<OptimizationResult>
    where
        O: Objective + ?Sized,
        R: Rng + ?Sized,
        F: FnMut(ProgressUpdate),
    {
        check_problem(objective, bounds)?;
        let n = self.params.population_size;
        let n_abandon = self.abandon_count();

        let mut nests = random_population(n, bounds, rng);
        let mut fitness = evaluate_population(objective, &nests)?;
        let mut evaluations = n;

        let start = get_best_index(&fitness);
        let mut best_nest: DVector<f64> = nests.row(start).transpose();
        let mut best_score = fitness[start];

        report_progress(&mut on_progress, 0, best_score, &fitness, &nests, evaluations);

        for iteration in 1..=iterations {
            // Lévy flights around the current best
            let eggs = self.lay_eggs(&nests, &best_nest, bounds, rng);
            let egg_fitness = evaluate_population(objective, &eggs)?;
            evaluations += n;

            for i in 0..n {
                if egg_fitness[i] < fitness[i] {
                    nests.set_row(i, &eggs.row(i));
                    fitness[i] = egg_fitness[i];
                }
            }

            // Abandon the worst nests
            if n_abandon > 0 {
                let worst = get_worst_indices(&fitness, n_abandon);
                let fresh = random_population(n_abandon, bounds, rng);
                let fresh_fitness = evaluate_population(objective, &fresh)?;
                evaluations += n_abandon;

                for (k, &i) in worst.iter().enumerate() {
                    nests.set_row(i, &fresh.row(k));
                    fitness[i] = fresh_fitness[k];
                }
                trace!(iteration, abandoned = n_abandon, "rebuilt worst nests");
            }

            let current = get_best_index(&fitness);
            if fitness[current] < best_score {
                best_score = fitness[current];
                best_nest = nests.row(current).transpose();
            }

            debug!(optimizer = "cuckoo", iteration, best_score, "iteration complete");
            report_progress(&mut on_progress, iteration, best_score, &fitness, &nests, evaluations);
        }

        Ok(OptimizationResult {
            best_score,
            best_position: best_nest,
            iterations,
            evaluations,
        })
    }
}
