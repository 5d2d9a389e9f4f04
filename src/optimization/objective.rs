//! Objective functions scored by the optimizers.
//!
//! The principal-curve loss for a position vector ω is
//!
//! loss = (1/N) * sum_i ||Y_i - Ŷ_i||² + rho * sum_k |ω_(k+1) - ω_(k)|
//!
//! where ω is sorted, Y is reordered to match, and Ŷ is the smoothing spline
//! fit evaluated at the sorted positions. Orderings with ties, and orderings
//! whose gaps are too small for the spline solve, score the fixed
//! [`DEGENERATE_PENALTY`].

use nalgebra::{DMatrix, DVector};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::trace;

use crate::error::{CurveError, CurveResult};
use crate::smoothing::{eval_smoother, fit_smoother, SmootherConfig};

/// Loss assigned to orderings whose sorted gaps are not all positive.
pub const DEGENERATE_PENALTY: f64 = 1e6;

/// Batched objective: B candidate rows in, B losses out (lower is better).
pub trait Objective: Sync {
    /// Number of decision variables per candidate.
    fn dimension(&self) -> usize;

    fn evaluate(&self, candidates: &DMatrix<f64>) -> CurveResult<DVector<f64>>;
}

/// Principal-curve objective bound to one point cloud.
#[derive(Debug, Clone)]
pub struct PrincipalCurveObjective<'a> {
    points: &'a DMatrix<f64>,
    rho: f64,
    smoother: SmootherConfig,
    penalty: f64,
}

impl<'a> PrincipalCurveObjective<'a> {
    pub fn new(points: &'a DMatrix<f64>, rho: f64) -> CurveResult<Self> {
        let (rows, cols) = points.shape();
        if rows == 0 || cols == 0 {
            return Err(CurveError::EmptyPointCloud { rows, cols });
        }
        if let Some(index) = points.iter().position(|v| !v.is_finite()) {
            return Err(CurveError::NonFiniteValue {
                what: "point cloud",
                index,
            });
        }
        if !rho.is_finite() {
            return Err(CurveError::InvalidParameter {
                name: "rho",
                value: rho,
                reason: "must be finite",
            });
        }

        Ok(Self {
            points,
            rho,
            smoother: SmootherConfig::default(),
            penalty: DEGENERATE_PENALTY,
        })
    }

    pub fn with_smoother(mut self, smoother: SmootherConfig) -> Self {
        self.smoother = smoother;
        self
    }

    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn points(&self) -> &DMatrix<f64> {
        self.points
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn smoother(&self) -> &SmootherConfig {
        &self.smoother
    }

    /// Score a single position vector.
    pub fn loss(&self, omega: &[f64]) -> CurveResult<f64> {
        check_dimension(self.points.nrows(), omega.len())?;

        let clipped: Vec<f64> = omega
            .iter()
            .map(|&w| if w.is_nan() { 0.0 } else { w.clamp(0.0, 1.0) })
            .collect();
        let (sorted, ordered) = order_points(&clipped, self.points);

        if sorted.windows(2).any(|pair| pair[1] - pair[0] <= 0.0) {
            return Ok(self.penalty);
        }

        // Near-coincident knots can defeat the spline solve
        let splines = match fit_smoother(&sorted, &ordered, &self.smoother) {
            Ok(splines) => splines,
            Err(CurveError::IllConditioned { min_gap }) => {
                trace!(min_gap, "ill-conditioned ordering scored with penalty");
                return Ok(self.penalty);
            }
            Err(err) => return Err(err),
        };
        let fitted = eval_smoother(&splines, &sorted);

        let data_fit = (&ordered - &fitted).norm_squared() / sorted.len() as f64;
        let regularity: f64 = sorted.windows(2).map(|pair| (pair[1] - pair[0]).abs()).sum();

        let loss = data_fit + self.rho * regularity;
        if loss.is_finite() {
            Ok(loss)
        } else {
            Ok(self.penalty)
        }
    }
}

impl Objective for PrincipalCurveObjective<'_> {
    fn dimension(&self) -> usize {
        self.points.nrows()
    }

    fn evaluate(&self, candidates: &DMatrix<f64>) -> CurveResult<DVector<f64>> {
        check_dimension(self.dimension(), candidates.ncols())?;
        evaluate_rows(candidates, |omega| self.loss(omega))
    }
}

/// Adapts a plain function of one candidate to the batched contract.
///
/// ```
/// use cuckoo_pc::optimization::{FnObjective, Objective};
/// use nalgebra::DMatrix;
///
/// let sphere = FnObjective::new(2, |x: &[f64]| x.iter().map(|v| v * v).sum());
/// let scores = sphere.evaluate(&DMatrix::from_row_slice(1, 2, &[3.0, 4.0])).unwrap();
/// assert_eq!(scores[0], 25.0);
/// ```
#[derive(Debug, Clone)]
pub struct FnObjective<F> {
    dimension: usize,
    function: F,
}

impl<F> FnObjective<F>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    pub fn new(dimension: usize, function: F) -> Self {
        Self {
            dimension,
            function,
        }
    }
}

impl<F> Objective for FnObjective<F>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn evaluate(&self, candidates: &DMatrix<f64>) -> CurveResult<DVector<f64>> {
        check_dimension(self.dimension, candidates.ncols())?;
        evaluate_rows(candidates, |x| Ok((self.function)(x)))
    }
}

/// Indices that sort `positions` ascending.
pub fn argsort(positions: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..positions.len()).collect();
    order.sort_by(|&a, &b| positions[a].total_cmp(&positions[b]));
    order
}

/// Sort positions ascending and reorder the rows of `points` identically.
pub fn order_points(positions: &[f64], points: &DMatrix<f64>) -> (Vec<f64>, DMatrix<f64>) {
    let order = argsort(positions);
    let sorted = order.iter().map(|&i| positions[i]).collect();
    let ordered = points.select_rows(order.iter());
    (sorted, ordered)
}

fn check_dimension(expected: usize, found: usize) -> CurveResult<()> {
    if expected != found {
        return Err(CurveError::DimensionMismatch { expected, found });
    }
    Ok(())
}

/// Score every row of `candidates`.
/// Uses parallel processing when the `parallel` feature is enabled.
#[cfg(feature = "parallel")]
fn evaluate_rows<F>(candidates: &DMatrix<f64>, loss: F) -> CurveResult<DVector<f64>>
where
    F: Fn(&[f64]) -> CurveResult<f64> + Sync,
{
    let scores = (0..candidates.nrows())
        .into_par_iter()
        .map(|i| {
            let row: Vec<f64> = candidates.row(i).iter().copied().collect();
            loss(&row)
        })
        .collect::<CurveResult<Vec<f64>>>()?;
    Ok(DVector::from_vec(scores))
}

/// Score every row of `candidates` (sequential).
#[cfg(not(feature = "parallel"))]
fn evaluate_rows<F>(candidates: &DMatrix<f64>, loss: F) -> CurveResult<DVector<f64>>
where
    F: Fn(&[f64]) -> CurveResult<f64> + Sync,
{
    let scores = (0..candidates.nrows())
        .map(|i| {
            let row: Vec<f64> = candidates.row(i).iter().copied().collect();
            loss(&row)
        })
        .collect::<CurveResult<Vec<f64>>>()?;
    Ok(DVector::from_vec(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::sample_arc;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn arc(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, 2, |i, j| {
            let theta = PI * i as f64 / (n - 1) as f64;
            if j == 0 {
                theta.cos()
            } else {
                theta.sin()
            }
        })
    }

    fn linspace(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 / (n - 1) as f64).collect()
    }

    #[test]
    fn increasing_positions_give_finite_nonnegative_loss() {
        let mut rng = StdRng::seed_from_u64(17);
        let sample = sample_arc(50, 0.1, &mut rng).unwrap();
        let objective = PrincipalCurveObjective::new(&sample.data, 1.0).unwrap();

        let check = |omega: &[f64]| {
            let loss = objective.loss(omega).unwrap();
            assert!(loss.is_finite() && loss >= 0.0, "loss {} for {:?}", loss, omega);
        };

        for _ in 0..200 {
            let omega: Vec<f64> = (0..50).map(|_| rng.r#gen::<f64>()).collect();
            check(&omega);
        }
        for gap in [1e-10, 1e-12, 1e-14, f64::from_bits(1)] {
            for _ in 0..50 {
                let mut omega: Vec<f64> = (0..50).map(|_| rng.r#gen::<f64>()).collect();
                omega[1] = omega[0] + gap;
                check(&omega);
            }
        }

        // A position clipped to zero next to tiny positive ones
        let mut omega = linspace(50);
        omega[0] = -0.3;
        omega[1] = 1e-300;
        check(&omega);
        omega[1] = f64::from_bits(1);
        check(&omega);
    }

    #[test]
    fn well_spaced_positions_score_below_penalty() {
        let points = arc(12);
        let objective = PrincipalCurveObjective::new(&points, 1.0).unwrap();
        let loss = objective.loss(&linspace(12)).unwrap();
        assert!(loss >= 0.0);
        assert!(loss < DEGENERATE_PENALTY);
    }

    #[test]
    fn subnormal_gap_scores_penalty() {
        let points = arc(8);
        let objective = PrincipalCurveObjective::new(&points, 1.0)
            .unwrap()
            .with_smoother(SmootherConfig::new(0.0));
        let mut omega = linspace(8);
        omega[1] = f64::from_bits(1);
        assert_eq!(objective.loss(&omega).unwrap(), DEGENERATE_PENALTY);
    }

    #[test]
    fn duplicate_positions_score_penalty() {
        let points = arc(6);
        let objective = PrincipalCurveObjective::new(&points, 1.0).unwrap();
        let omega = [0.1, 0.4, 0.4, 0.6, 0.8, 0.9];
        assert_eq!(objective.loss(&omega).unwrap(), DEGENERATE_PENALTY);
    }

    #[test]
    fn positions_clipped_to_same_boundary_score_penalty() {
        let points = arc(6);
        let objective = PrincipalCurveObjective::new(&points, 1.0).unwrap();
        let omega = [-0.5, -0.2, 0.3, 0.5, 0.7, 0.9];
        assert_eq!(objective.loss(&omega).unwrap(), DEGENERATE_PENALTY);
    }

    #[test]
    fn two_identical_points_score_penalty() {
        let points = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 1.0, 2.0]);
        let objective = PrincipalCurveObjective::new(&points, 1.0).unwrap();
        assert_eq!(objective.loss(&[0.5, 0.5]).unwrap(), DEGENERATE_PENALTY);
    }

    #[test]
    fn custom_penalty_is_used() {
        let points = arc(5);
        let objective = PrincipalCurveObjective::new(&points, 1.0)
            .unwrap()
            .with_penalty(42.0);
        assert_eq!(objective.loss(&[0.0; 5]).unwrap(), 42.0);
    }

    #[test]
    fn regularity_term_scales_with_rho() {
        let points = arc(10);
        let omega = [0.1, 0.15, 0.2, 0.3, 0.35, 0.5, 0.55, 0.6, 0.7, 0.8];

        let plain = PrincipalCurveObjective::new(&points, 0.0).unwrap();
        let weighted = PrincipalCurveObjective::new(&points, 2.0).unwrap();

        let difference = weighted.loss(&omega).unwrap() - plain.loss(&omega).unwrap();
        // Sum of gaps of sorted positions is max - min
        assert_abs_diff_eq!(difference, 2.0 * 0.7, epsilon = 1e-9);
    }

    #[test]
    fn batch_matches_single_evaluation() {
        let points = arc(8);
        let objective = PrincipalCurveObjective::new(&points, 1.0).unwrap();
        let rows = [
            linspace(8),
            vec![0.9, 0.1, 0.5, 0.3, 0.7, 0.2, 0.8, 0.4],
            vec![0.5; 8],
        ];
        let candidates = DMatrix::from_fn(3, 8, |i, j| rows[i][j]);

        let batch = objective.evaluate(&candidates).unwrap();
        assert_eq!(batch.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(batch[i], objective.loss(row).unwrap());
        }
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let points = arc(6);
        let objective = PrincipalCurveObjective::new(&points, 1.0).unwrap();
        let candidates = DMatrix::zeros(2, 5);
        assert_eq!(
            objective.evaluate(&candidates),
            Err(CurveError::DimensionMismatch {
                expected: 6,
                found: 5
            })
        );
    }

    #[test]
    fn too_few_distinct_points_propagate_smoother_error() {
        let points = arc(3);
        let objective = PrincipalCurveObjective::new(&points, 1.0).unwrap();
        assert_eq!(
            objective.loss(&[0.1, 0.5, 0.9]),
            Err(CurveError::TooFewPoints { got: 3, min: 4 })
        );
    }

    #[test]
    fn constructor_validates_inputs() {
        let empty = DMatrix::<f64>::zeros(0, 2);
        assert_eq!(
            PrincipalCurveObjective::new(&empty, 1.0).err(),
            Some(CurveError::EmptyPointCloud { rows: 0, cols: 2 })
        );

        let mut points = arc(5);
        points[(2, 1)] = f64::NAN;
        assert!(matches!(
            PrincipalCurveObjective::new(&points, 1.0),
            Err(CurveError::NonFiniteValue { what: "point cloud", .. })
        ));

        let points = arc(5);
        assert!(matches!(
            PrincipalCurveObjective::new(&points, f64::INFINITY),
            Err(CurveError::InvalidParameter { name: "rho", .. })
        ));
    }

    #[test]
    fn order_points_reorders_rows() {
        let points = DMatrix::from_row_slice(3, 1, &[10.0, 20.0, 30.0]);
        let (sorted, ordered) = order_points(&[0.7, 0.1, 0.4], &points);
        assert_eq!(sorted, vec![0.1, 0.4, 0.7]);
        assert_eq!(argsort(&[0.7, 0.1, 0.4]), vec![1, 2, 0]);
        assert_eq!(ordered.as_slice(), &[20.0, 30.0, 10.0]);
    }

    #[test]
    fn fn_objective_scores_rows() {
        let sphere = FnObjective::new(3, |x: &[f64]| x.iter().map(|v| v * v).sum());
        let candidates = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 2.0, 0.0, 0.0, 0.0]);
        let scores = sphere.evaluate(&candidates).unwrap();
        assert_eq!(scores.as_slice(), &[9.0, 0.0]);
    }
}
