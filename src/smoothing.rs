//! Cubic smoothing splines for fitting a curve through ordered points.
//!
//! The spline follows Reinsch's formulation: among natural cubic splines `g`
//! it minimizes the roughness `∫ g''(x)² dx` subject to
//!
//! Σᵢ (yᵢ - g(xᵢ))² ≤ s
//!
//! where `s` is the smoothing factor. For a fixed penalty weight λ the
//! second derivatives γ at the interior knots solve the banded system
//!
//! (R + λ QᵀQ) γ = Qᵀ y,    g = y - λ Q γ
//!
//! and λ is chosen by a root search on `ln λ` so that the residual sum of
//! squares matches `s`. `s = 0` yields the interpolating spline; a smoothing
//! factor larger than the least-squares line residual yields that line.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_10;
use tracing::trace;

use crate::error::{CurveError, CurveResult};

/// Minimum number of points for a cubic fit.
pub const MIN_SPLINE_POINTS: usize = 4;

/// Relative tolerance on the residual constraint.
const RESIDUAL_TOLERANCE: f64 = 1e-3;
const MAX_BRACKET_STEPS: usize = 40;
const MAX_ROOT_ITERATIONS: usize = 60;

/// Smoothing strength shared by every fit of one estimation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    /// Upper bound on the residual sum of squares of each fit.
    pub smoothing: f64,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self { smoothing: 2.0 }
    }
}

impl SmootherConfig {
    pub fn new(smoothing: f64) -> Self {
        Self { smoothing }
    }

    pub fn validate(&self) -> CurveResult<()> {
        if !self.smoothing.is_finite() || self.smoothing < 0.0 {
            return Err(CurveError::InvalidParameter {
                name: "smoothing",
                value: self.smoothing,
                reason: "must be finite and non-negative",
            });
        }
        Ok(())
    }
}

/// A fitted natural cubic smoothing spline.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingSpline {
    /// Strictly increasing knot positions.
    knots: Vec<f64>,
    /// Fitted values at the knots.
    values: Vec<f64>,
    /// Second derivatives at the knots (zero at both ends).
    second_derivatives: Vec<f64>,
    /// Penalty weight λ (infinite for the straight-line fit).
    penalty: f64,
    residual_sum_of_squares: f64,
}

impl SmoothingSpline {
    /// Fit a smoothing spline to sorted `x` and matching `y`.
    ///
    /// # Errors
    /// `TooFewPoints` for fewer than [`MIN_SPLINE_POINTS`] points,
    /// `NonIncreasingPositions` if `x` is not strictly increasing,
    /// `LengthMismatch`, `NonFiniteValue`, or `InvalidParameter` for a
    /// negative smoothing factor. `IllConditioned` when knots are so close
    /// that no penalty weight yields a finite solution.
    pub fn fit(x: &[f64], y: &[f64], smoothing: f64) -> CurveResult<Self> {
        SmootherConfig::new(smoothing).validate()?;
        validate_inputs(x, y)?;

        let system = ReinschSystem::new(x, y);

        if smoothing == 0.0 {
            let solution = system.solve(0.0);
            check_solution(x, &solution)?;
            return Ok(Self::from_solution(x, solution, 0.0));
        }

        let (line, line_rss) = least_squares_line(x, y);
        if line_rss <= smoothing {
            return Ok(Self {
                knots: x.to_vec(),
                values: line,
                second_derivatives: vec![0.0; x.len()],
                penalty: f64::INFINITY,
                residual_sum_of_squares: line_rss,
            });
        }

        let (penalty, solution) = search_penalty(&system, smoothing);
        check_solution(x, &solution)?;
        trace!(
            penalty,
            rss = solution.residual_sum_of_squares,
            smoothing,
            "smoothing penalty found"
        );
        Ok(Self::from_solution(x, solution, penalty))
    }

    fn from_solution(x: &[f64], solution: Solution, penalty: f64) -> Self {
        let n = x.len();
        let mut second_derivatives = vec![0.0; n];
        second_derivatives[1..n - 1].copy_from_slice(&solution.gamma);

        Self {
            knots: x.to_vec(),
            values: solution.fitted,
            second_derivatives,
            penalty,
            residual_sum_of_squares: solution.residual_sum_of_squares,
        }
    }

    /// Evaluate the spline at `x`.
    ///
    /// Outside the knot range the boundary cubic piece is extended.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.knots.len();
        let hi = self.knots.partition_point(|&k| k <= x).clamp(1, n - 1);
        let lo = hi - 1;

        let h = self.knots[hi] - self.knots[lo];
        let a = (self.knots[hi] - x) / h;
        let b = (x - self.knots[lo]) / h;

        a * self.values[lo]
            + b * self.values[hi]
            + ((a * a * a - a) * self.second_derivatives[lo]
                + (b * b * b - b) * self.second_derivatives[hi])
                * h
                * h
                / 6.0
    }

    pub fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.evaluate(x)).collect()
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Fitted values at the knots.
    pub fn fitted_values(&self) -> &[f64] {
        &self.values
    }

    pub fn second_derivatives(&self) -> &[f64] {
        &self.second_derivatives
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn residual_sum_of_squares(&self) -> f64 {
        self.residual_sum_of_squares
    }
}

/// Fit one smoothing spline per column of `values` against `positions`.
///
/// Positions must already be sorted ascending with the rows of `values`
/// reordered to match; no sorting happens here.
pub fn fit_smoother(
    positions: &[f64],
    values: &DMatrix<f64>,
    config: &SmootherConfig,
) -> CurveResult<Vec<SmoothingSpline>> {
    if values.nrows() != positions.len() {
        return Err(CurveError::LengthMismatch {
            positions: positions.len(),
            values: values.nrows(),
        });
    }

    values
        .column_iter()
        .map(|column| {
            let column: Vec<f64> = column.iter().copied().collect();
            SmoothingSpline::fit(positions, &column, config.smoothing)
        })
        .collect()
}

/// Evaluate every spline at `positions`, stacking the results column-wise.
pub fn eval_smoother(splines: &[SmoothingSpline], positions: &[f64]) -> DMatrix<f64> {
    DMatrix::from_fn(positions.len(), splines.len(), |i, j| {
        splines[j].evaluate(positions[i])
    })
}

fn validate_inputs(x: &[f64], y: &[f64]) -> CurveResult<()> {
    if x.len() != y.len() {
        return Err(CurveError::LengthMismatch {
            positions: x.len(),
            values: y.len(),
        });
    }
    if x.len() < MIN_SPLINE_POINTS {
        return Err(CurveError::TooFewPoints {
            got: x.len(),
            min: MIN_SPLINE_POINTS,
        });
    }
    if let Some(index) = x.iter().position(|v| !v.is_finite()) {
        return Err(CurveError::NonFiniteValue {
            what: "positions",
            index,
        });
    }
    if let Some(index) = y.iter().position(|v| !v.is_finite()) {
        return Err(CurveError::NonFiniteValue {
            what: "values",
            index,
        });
    }
    if let Some(index) = (1..x.len()).find(|&i| x[i] <= x[i - 1]) {
        return Err(CurveError::NonIncreasingPositions { index });
    }
    Ok(())
}

fn check_solution(x: &[f64], solution: &Solution) -> CurveResult<()> {
    if solution.is_finite() {
        return Ok(());
    }
    let min_gap = x
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold(f64::INFINITY, f64::min);
    Err(CurveError::IllConditioned { min_gap })
}

/// Ordinary least-squares line through the points, with its residual sum
/// of squares.
fn least_squares_line(x: &[f64], y: &[f64]) -> (Vec<f64>, f64) {
    let n = x.len() as f64;
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;

    let (sxx, sxy) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxx, sxy), (&xi, &yi)| {
            let dx = xi - x_mean;
            (sxx + dx * dx, sxy + dx * (yi - y_mean))
        });
    let slope = sxy / sxx;

    let fitted: Vec<f64> = x.iter().map(|&xi| y_mean + slope * (xi - x_mean)).collect();
    let rss = fitted
        .iter()
        .zip(y)
        .map(|(f, yi)| (yi - f) * (yi - f))
        .sum();
    (fitted, rss)
}

/// Fitted values and interior second derivatives for one penalty weight.
#[derive(Debug, Clone)]
struct Solution {
    fitted: Vec<f64>,
    gamma: Vec<f64>,
    residual_sum_of_squares: f64,
}

impl Solution {
    /// Marker for a factorization that hit a non-positive pivot.
    fn failed(n: usize) -> Self {
        Self {
            fitted: vec![f64::NAN; n],
            gamma: vec![f64::NAN; n.saturating_sub(2)],
            residual_sum_of_squares: f64::NAN,
        }
    }

    fn is_finite(&self) -> bool {
        self.residual_sum_of_squares.is_finite()
            && self.fitted.iter().all(|v| v.is_finite())
            && self.gamma.iter().all(|v| v.is_finite())
    }
}

/// Banded pieces of the Reinsch system that do not depend on λ.
///
/// Column `c` of Q belongs to interior knot `j = c + 1` and has three
/// non-zeros: `q_prev[c]` at row `j - 1`, `q_mid[c]` at row `j` and
/// `q_next[c]` at row `j + 1`.
struct ReinschSystem<'a> {
    y: &'a [f64],
    q_prev: Vec<f64>,
    q_mid: Vec<f64>,
    q_next: Vec<f64>,
    r_diag: Vec<f64>,
    r_off: Vec<f64>,
    qtq_diag: Vec<f64>,
    qtq_off1: Vec<f64>,
    qtq_off2: Vec<f64>,
    qty: Vec<f64>,
}

impl<'a> ReinschSystem<'a> {
    fn new(x: &[f64], y: &'a [f64]) -> Self {
        let m = x.len() - 2;

        let mut q_prev = Vec::with_capacity(m);
        let mut q_mid = Vec::with_capacity(m);
        let mut q_next = Vec::with_capacity(m);
        let mut r_diag = Vec::with_capacity(m);
        let mut r_off = Vec::with_capacity(m);

        for j in 1..=m {
            let h_prev = x[j] - x[j - 1];
            let h_next = x[j + 1] - x[j];
            q_prev.push(1.0 / h_prev);
            q_next.push(1.0 / h_next);
            q_mid.push(-1.0 / h_prev - 1.0 / h_next);
            r_diag.push((h_prev + h_next) / 3.0);
            r_off.push(h_next / 6.0);
        }

        let qtq_diag: Vec<f64> = (0..m)
            .map(|c| q_prev[c] * q_prev[c] + q_mid[c] * q_mid[c] + q_next[c] * q_next[c])
            .collect();
        let qtq_off1: Vec<f64> = (0..m.saturating_sub(1))
            .map(|c| q_mid[c] * q_prev[c + 1] + q_next[c] * q_mid[c + 1])
            .collect();
        let qtq_off2: Vec<f64> = (0..m.saturating_sub(2))
            .map(|c| q_next[c] * q_prev[c + 2])
            .collect();
        let qty: Vec<f64> = (0..m)
            .map(|c| q_prev[c] * y[c] + q_mid[c] * y[c + 1] + q_next[c] * y[c + 2])
            .collect();

        Self {
            y,
            q_prev,
            q_mid,
            q_next,
            r_diag,
            r_off,
            qtq_diag,
            qtq_off1,
            qtq_off2,
            qty,
        }
    }

    /// Solve for penalty weight `lambda` with a pentadiagonal LDLᵀ
    /// factorization.
    ///
    /// For λ > 1 the system is divided through by λ and solved as
    /// (R/λ + QᵀQ) δ = Qᵀy with γ = δ/λ and y - g = Q δ. The returned
    /// solution is marked failed if a pivot is not strictly positive.
    fn solve(&self, lambda: f64) -> Solution {
        let m = self.qty.len();
        let scale = lambda.max(1.0);
        let r_weight = 1.0 / scale;
        let q_weight = lambda / scale;

        // d: pivots, l1[i] = L[i+1, i], l2[i] = L[i+2, i]
        let mut d = vec![0.0; m];
        let mut l1 = vec![0.0; m];
        let mut l2 = vec![0.0; m];

        for i in 0..m {
            let mut pivot = r_weight * self.r_diag[i] + q_weight * self.qtq_diag[i];
            if i >= 1 {
                pivot -= l1[i - 1] * l1[i - 1] * d[i - 1];
            }
            if i >= 2 {
                pivot -= l2[i - 2] * l2[i - 2] * d[i - 2];
            }
            if !(pivot > 0.0 && pivot.is_finite()) {
                return Solution::failed(self.y.len());
            }
            d[i] = pivot;

            if i + 1 < m {
                let mut off = r_weight * self.r_off[i] + q_weight * self.qtq_off1[i];
                if i >= 1 {
                    off -= l1[i - 1] * l2[i - 1] * d[i - 1];
                }
                l1[i] = off / pivot;
            }
            if i + 2 < m {
                l2[i] = q_weight * self.qtq_off2[i] / pivot;
            }
        }

        // Forward substitution, diagonal scaling, back substitution.
        let mut gamma = vec![0.0; m];
        for i in 0..m {
            let mut z = self.qty[i];
            if i >= 1 {
                z -= l1[i - 1] * gamma[i - 1];
            }
            if i >= 2 {
                z -= l2[i - 2] * gamma[i - 2];
            }
            gamma[i] = z;
        }
        for i in 0..m {
            gamma[i] /= d[i];
        }
        for i in (0..m).rev() {
            if i + 1 < m {
                gamma[i] -= l1[i] * gamma[i + 1];
            }
            if i + 2 < m {
                gamma[i] -= l2[i] * gamma[i + 2];
            }
        }

        // Residual y - g = λ Q γ = (λ / scale) Q δ
        let mut q_delta = vec![0.0; self.y.len()];
        for (c, &g) in gamma.iter().enumerate() {
            q_delta[c] += self.q_prev[c] * g;
            q_delta[c + 1] += self.q_mid[c] * g;
            q_delta[c + 2] += self.q_next[c] * g;
        }

        let mut residual_sum_of_squares = 0.0;
        let fitted = self
            .y
            .iter()
            .zip(&q_delta)
            .map(|(&yi, &qd)| {
                let residual = q_weight * qd;
                residual_sum_of_squares += residual * residual;
                yi - residual
            })
            .collect();

        for value in gamma.iter_mut() {
            *value /= scale;
        }

        Solution {
            fitted,
            gamma,
            residual_sum_of_squares,
        }
    }
}

/// One evaluation of the residual constraint at `ln λ`.
struct Trial {
    log_lambda: f64,
    gap: f64,
    solution: Solution,
}

/// Find λ such that the residual sum of squares matches `target`.
///
/// The residual grows monotonically with λ, so the search walks in decades
/// until the gap changes sign and then refines with Illinois regula falsi.
/// Trials whose factorization fails are skipped; they never bound the
/// bracket and are never returned unless no trial succeeds at all.
fn search_penalty(system: &ReinschSystem<'_>, target: f64) -> (f64, Solution) {
    let tolerance = RESIDUAL_TOLERANCE * target;
    let attempt = |log_lambda: f64| {
        let solution = system.solve(log_lambda.exp());
        Trial {
            log_lambda,
            gap: solution.residual_sum_of_squares - target,
            solution,
        }
    };

    let first = attempt(0.0);
    let mut previous = if first.gap.is_finite() {
        first
    } else {
        // Fan out from λ = 1 for any weight the factorization survives
        match (1..=MAX_BRACKET_STEPS)
            .flat_map(|k| [k as f64 * LN_10, -(k as f64) * LN_10])
            .map(&attempt)
            .find(|trial| trial.gap.is_finite())
        {
            Some(trial) => trial,
            None => return (1.0, first.solution),
        }
    };
    if previous.gap.abs() <= tolerance {
        return (previous.log_lambda.exp(), previous.solution);
    }

    let step = if previous.gap < 0.0 { LN_10 } else { -LN_10 };
    let mut log_lambda = previous.log_lambda;
    let mut crossing = None;
    for _ in 0..MAX_BRACKET_STEPS {
        log_lambda += step;
        let next = attempt(log_lambda);
        if !next.gap.is_finite() {
            continue;
        }
        if next.gap.abs() <= tolerance {
            return (next.log_lambda.exp(), next.solution);
        }
        if (next.gap < 0.0) != (previous.gap < 0.0) {
            crossing = Some(next);
            break;
        }
        previous = next;
    }

    let Some(crossing) = crossing else {
        return (previous.log_lambda.exp(), previous.solution);
    };

    let (mut t_lo, mut f_lo, mut t_hi, mut f_hi) = if previous.gap < 0.0 {
        (previous.log_lambda, previous.gap, crossing.log_lambda, crossing.gap)
    } else {
        (crossing.log_lambda, crossing.gap, previous.log_lambda, previous.gap)
    };
    let mut best = if crossing.gap.abs() < previous.gap.abs() {
        crossing
    } else {
        previous
    };

    // -1: last update moved the low end, 1: the high end
    let mut side = 0i8;
    for _ in 0..MAX_ROOT_ITERATIONS {
        if t_hi - t_lo < 1e-12 {
            break;
        }
        let mut trial = attempt(t_lo - f_lo * (t_hi - t_lo) / (f_hi - f_lo));
        if !trial.gap.is_finite() {
            trial = attempt(0.5 * (t_lo + t_hi));
            if !trial.gap.is_finite() {
                break;
            }
        }
        let t = trial.log_lambda;
        let gap = trial.gap;
        if gap.abs() < best.gap.abs() {
            best = trial;
        }
        if gap.abs() <= tolerance {
            break;
        }

        if gap < 0.0 {
            t_lo = t;
            f_lo = gap;
            if side == -1 {
                f_hi *= 0.5;
            }
            side = -1;
        } else {
            t_hi = t;
            f_hi = gap;
            if side == 1 {
                f_lo *= 0.5;
            }
            side = 1;
        }
    }

    (best.log_lambda.exp(), best.solution)
}
