//! Population management shared by the optimizers.
//!
//! A population is a `DMatrix<f64>` with one candidate per row and one
//! column per decision variable; fitness lives in a parallel `DVector<f64>`.

use std::cmp::Ordering;

use nalgebra::{DMatrix, DVector};
use rand::Rng;

use super::types::{Bounds, PopulationStats};

/// Fitness stored for candidates whose score came back NaN or infinite.
pub const UNSCORED_FITNESS: f64 = f64::MAX;

/// Draw `size` candidates uniformly inside `bounds`.
pub fn random_population<R>(size: usize, bounds: &Bounds, rng: &mut R) -> DMatrix<f64>
where
    R: Rng + ?Sized,
{
    let dim = bounds.dimension();
    let mut population = DMatrix::zeros(size, dim);
    for i in 0..size {
        for j in 0..dim {
            let (lo, hi) = (bounds.lower[j], bounds.upper[j]);
            population[(i, j)] = lo + rng.r#gen::<f64>() * (hi - lo);
        }
    }
    population
}

/// Draw a `rows x cols` matrix with entries uniform in `[low, high)`.
pub fn uniform_matrix<R>(rows: usize, cols: usize, low: f64, high: f64, rng: &mut R) -> DMatrix<f64>
where
    R: Rng + ?Sized,
{
    let mut matrix = DMatrix::zeros(rows, cols);
    for value in matrix.iter_mut() {
        *value = low + rng.r#gen::<f64>() * (high - low);
    }
    matrix
}

/// Clip every candidate into bounds in place. NaN coordinates are pulled
/// to the lower bound.
pub fn clamp_to_bounds(population: &mut DMatrix<f64>, bounds: &Bounds) {
    for j in 0..population.ncols() {
        let (lo, hi) = (bounds.lower[j], bounds.upper[j]);
        for value in population.column_mut(j).iter_mut() {
            *value = if value.is_nan() { lo } else { value.clamp(lo, hi) };
        }
    }
}

/// Index of the lowest fitness. Ties resolve to the first occurrence.
pub fn get_best_index(fitness: &DVector<f64>) -> usize {
    fitness
        .iter()
        .enumerate()
        .min_by(|(ia, a), (ib, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal).then(ia.cmp(ib)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Indices of the `count` highest fitness values, worst first.
pub fn get_worst_indices(fitness: &DVector<f64>, count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..fitness.len()).collect();
    order.sort_by(|&a, &b| fitness[b].partial_cmp(&fitness[a]).unwrap_or(Ordering::Equal));
    order.truncate(count);
    order
}

/// Calculate population statistics over the scored fitness values.
pub fn calculate_population_stats(fitness: &DVector<f64>) -> PopulationStats {
    let mut sorted: Vec<f64> = fitness
        .iter()
        .copied()
        .filter(|f| f.is_finite() && *f < UNSCORED_FITNESS)
        .collect();

    if sorted.is_empty() {
        return PopulationStats {
            best_fitness: f64::INFINITY,
            worst_fitness: f64::INFINITY,
            average_fitness: f64::INFINITY,
            median_fitness: f64::INFINITY,
            standard_deviation: 0.0,
        };
    }

    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n = sorted.len();
    let average = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let variance = sorted.iter().map(|f| (f - average).powi(2)).sum::<f64>() / n as f64;

    PopulationStats {
        best_fitness: sorted[0],
        worst_fitness: sorted[n - 1],
        average_fitness: average,
        median_fitness: median,
        standard_deviation: variance.sqrt(),
    }
}

/// Root-mean per-coordinate variance across the population.
pub fn calculate_diversity(population: &DMatrix<f64>) -> f64 {
    let (rows, cols) = population.shape();
    if rows < 2 || cols == 0 {
        return 0.0;
    }

    let total_variance: f64 = population
        .column_iter()
        .map(|column| {
            let mean = column.sum() / rows as f64;
            column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / rows as f64
        })
        .sum();

    (total_variance / cols as f64).sqrt()
}
