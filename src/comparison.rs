//! Comparison records and curve-quality metrics.
//!
//! A [`ComparisonReport`] maps a scenario name to the timings and quality
//! metrics of a reference fit and a Cuckoo fit. The serialized field names
//! are stable so reports can be charted by external tooling.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult};

/// Scenario name -> record.
pub type ComparisonReport = BTreeMap<String, ScenarioRecord>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    /// Seconds spent by the reference fit
    pub hastie_time: f64,
    /// Seconds spent by the Cuckoo fit
    pub cuckoo_time: f64,
    pub metrics: ComparisonMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetrics {
    pub hastie_to_true: f64,
    pub cuckoo_to_true: f64,
    pub hastie_data_fit: f64,
    pub cuckoo_data_fit: f64,
    pub hastie_length_ratio: f64,
    pub cuckoo_length_ratio: f64,
}

impl ScenarioRecord {
    pub fn new(
        hastie: &CurveMetrics,
        hastie_time: f64,
        cuckoo: &CurveMetrics,
        cuckoo_time: f64,
    ) -> Self {
        Self {
            hastie_time,
            cuckoo_time,
            metrics: ComparisonMetrics {
                hastie_to_true: hastie.to_true,
                cuckoo_to_true: cuckoo.to_true,
                hastie_data_fit: hastie.data_fit,
                cuckoo_data_fit: cuckoo.data_fit,
                hastie_length_ratio: hastie.length_ratio,
                cuckoo_length_ratio: cuckoo.length_ratio,
            },
        }
    }
}

/// Quality of one fitted curve against a known truth and its data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveMetrics {
    /// Mean distance from fitted vertices to the true curve
    pub to_true: f64,
    /// Mean distance from data points to the fitted curve
    pub data_fit: f64,
    /// Fitted length over true length
    pub length_ratio: f64,
}

impl CurveMetrics {
    pub fn compute(
        fitted: &DMatrix<f64>,
        truth: &DMatrix<f64>,
        data: &DMatrix<f64>,
    ) -> CurveResult<Self> {
        Ok(Self {
            to_true: mean_distance_to_curve(fitted, truth)?,
            data_fit: mean_distance_to_curve(data, fitted)?,
            length_ratio: length_ratio(fitted, truth),
        })
    }
}

pub fn report_to_json(report: &ComparisonReport) -> CurveResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Polyline length through the rows of `curve`.
pub fn curve_length(curve: &DMatrix<f64>) -> f64 {
    (1..curve.nrows())
        .map(|i| (curve.row(i) - curve.row(i - 1)).norm())
        .sum()
}

/// `curve_length(fitted) / curve_length(truth)`; infinite for a
/// zero-length truth unless the fit is also zero-length (then 1).
pub fn length_ratio(fitted: &DMatrix<f64>, truth: &DMatrix<f64>) -> f64 {
    let fitted_length = curve_length(fitted);
    let true_length = curve_length(truth);
    if true_length > 0.0 {
        fitted_length / true_length
    } else if fitted_length > 0.0 {
        f64::INFINITY
    } else {
        1.0
    }
}

/// Mean Euclidean distance from each row of `points` to the polyline
/// through the rows of `curve`.
pub fn mean_distance_to_curve(points: &DMatrix<f64>, curve: &DMatrix<f64>) -> CurveResult<f64> {
    if curve.nrows() == 0 || points.nrows() == 0 {
        return Err(CurveError::EmptyPointCloud {
            rows: curve.nrows().min(points.nrows()),
            cols: curve.ncols(),
        });
    }
    if points.ncols() != curve.ncols() {
        return Err(CurveError::DimensionMismatch {
            expected: curve.ncols(),
            found: points.ncols(),
        });
    }

    let vertices: Vec<Vec<f64>> = curve.row_iter().map(|r| r.iter().copied().collect()).collect();
    let total: f64 = points
        .row_iter()
        .map(|row| {
            let p: Vec<f64> = row.iter().copied().collect();
            if vertices.len() == 1 {
                return distance(&p, &vertices[0]);
            }
            vertices
                .windows(2)
                .map(|seg| distance_to_segment(&p, &seg[0], &seg[1]))
                .fold(f64::INFINITY, f64::min)
        })
        .sum();

    Ok(total / points.nrows() as f64)
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

fn distance_to_segment(p: &[f64], a: &[f64], b: &[f64]) -> f64 {
    let ab: Vec<f64> = a.iter().zip(b).map(|(x, y)| y - x).collect();
    let length_sq: f64 = ab.iter().map(|v| v * v).sum();
    if length_sq == 0.0 {
        return distance(p, a);
    }
    let t = p
        .iter()
        .zip(a)
        .zip(&ab)
        .map(|((pi, ai), d)| (pi - ai) * d)
        .sum::<f64>()
        / length_sq;
    let t = t.clamp(0.0, 1.0);
    let projection: Vec<f64> = a.iter().zip(&ab).map(|(ai, d)| ai + t * d).collect();
    distance(p, &projection)
}

/// Points scattered around the upper unit half-circle.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcSample {
    /// Noisy observations in random order (n x 2)
    pub data: DMatrix<f64>,
    /// Dense noise-free polyline along the arc
    pub truth: DMatrix<f64>,
    /// Arc parameter in [0, 1) of each observation
    pub latent: Vec<f64>,
}

const TRUTH_RESOLUTION: usize = 200;

/// Draw `n` points on the arc `(cos πt, sin πt)` with Gaussian noise of
/// standard deviation `noise` on each coordinate.
pub fn sample_arc<R>(n: usize, noise: f64, rng: &mut R) -> CurveResult<ArcSample>
where
    R: Rng + ?Sized,
{
    if n == 0 {
        return Err(CurveError::EmptyPointCloud { rows: 0, cols: 2 });
    }
    if !noise.is_finite() || noise < 0.0 {
        return Err(CurveError::InvalidParameter {
            name: "noise",
            value: noise,
            reason: "must be finite and non-negative",
        });
    }

    let latent: Vec<f64> = (0..n).map(|_| rng.r#gen::<f64>()).collect();
    let mut data = DMatrix::zeros(n, 2);
    for (i, &t) in latent.iter().enumerate() {
        let theta = PI * t;
        let dx: f64 = StandardNormal.sample(&mut *rng);
        let dy: f64 = StandardNormal.sample(&mut *rng);
        data[(i, 0)] = theta.cos() + noise * dx;
        data[(i, 1)] = theta.sin() + noise * dy;
    }

    let truth = DMatrix::from_fn(TRUTH_RESOLUTION, 2, |i, j| {
        let theta = PI * i as f64 / (TRUTH_RESOLUTION - 1) as f64;
        if j == 0 {
            theta.cos()
        } else {
            theta.sin()
        }
    });

    Ok(ArcSample { data, truth, latent })
}
