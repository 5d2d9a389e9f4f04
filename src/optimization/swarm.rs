//! Particle Swarm Optimization.
//!
//! Velocities follow `v = w*v + c1*r1*(pbest - x) + c2*r2*(gbest - x)` with
//! fresh uniform `r1`, `r2` per coordinate, and positions are clipped into
//! bounds after every move. Velocities themselves are not clamped.

use nalgebra::DVector;
use rand::Rng;
use tracing::debug;

use crate::error::CurveResult;

use super::algorithm::{check_problem, evaluate_population, report_progress, Optimizer};
use super::objective::Objective;
use super::population::{clamp_to_bounds, get_best_index, random_population, uniform_matrix};
use super::types::{Bounds, OptimizationResult, ProgressUpdate, SwarmParameters};

#[derive(Debug, Clone)]
pub struct ParticleSwarm {
    params: SwarmParameters,
}

impl ParticleSwarm {
    pub fn new(params: SwarmParameters) -> CurveResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn parameters(&self) -> &SwarmParameters {
        &self.params
    }
}

impl Optimizer for ParticleSwarm {
    fn name(&self) -> &'static str {
        "pso"
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
        let dim = bounds.dimension();
        let mut positions = random_population(n, bounds, rng);
        let mut velocities = uniform_matrix(n, dim, -1.0, 1.0, rng);
        let fitness = evaluate_population(objective, &positions)?;
        let mut evaluations = n;

        let mut personal_best = positions.clone();
        let mut personal_fitness = fitness;

        let start = get_best_index(&personal_fitness);
        let mut global_best: DVector<f64> = personal_best.row(start).transpose();
        let mut global_score = personal_fitness[start];

        report_progress(
            &mut on_progress,
            0,
            global_score,
            &personal_fitness,
            &positions,
            evaluations,
        );

        for iteration in 1..=iterations {
            let r1 = uniform_matrix(n, dim, 0.0, 1.0, rng);
            let r2 = uniform_matrix(n, dim, 0.0, 1.0, rng);

            for i in 0..n {
                for j in 0..dim {
                    let x = positions[(i, j)];
                    let v = velocity(
                        &self.params,
                        velocities[(i, j)],
                        x,
                        personal_best[(i, j)],
                        global_best[j],
                        r1[(i, j)],
                        r2[(i, j)],
                    );
                    velocities[(i, j)] = v;
                    positions[(i, j)] = x + v;
                }
            }
            clamp_to_bounds(&mut positions, bounds);

            let fitness = evaluate_population(objective, &positions)?;
            evaluations += n;

            for i in 0..n {
                if fitness[i] < personal_fitness[i] {
                    personal_best.set_row(i, &positions.row(i));
                    personal_fitness[i] = fitness[i];
                }
            }

            let current = get_best_index(&personal_fitness);
            if personal_fitness[current] < global_score {
                global_score = personal_fitness[current];
                global_best = personal_best.row(current).transpose();
            }

            debug!(optimizer = "pso", iteration, best_score = global_score, "iteration complete");
            report_progress(
                &mut on_progress,
                iteration,
                global_score,
                &fitness,
                &positions,
                evaluations,
            );
        }

        Ok(OptimizationResult {
            best_score: global_score,
            best_position: global_best,
            iterations,
            evaluations,
        })
    }
}

/// Velocity update for one coordinate.
fn velocity(
    params: &SwarmParameters,
    v: f64,
    x: f64,
    pbest: f64,
    gbest: f64,
    r1: f64,
    r2: f64,
) -> f64 {
    params.inertia * v + params.cognitive * r1 * (pbest - x) + params.social * r2 * (gbest - x)
}
