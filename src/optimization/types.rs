//! Type definitions for population-based optimization.

use std::fmt;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult};

/// Elementwise box constraints defining the feasible hyper-cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl Bounds {
    /// Create bounds, checking that both vectors have the same length and
    /// every `lower[i] <= upper[i]` is finite.
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> CurveResult<Self> {
        if lower.len() != upper.len() {
            return Err(CurveError::DimensionMismatch {
                expected: lower.len(),
                found: upper.len(),
            });
        }
        for (index, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(CurveError::InvalidBounds {
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// The unit hyper-cube [0, 1]^n used for position vectors.
    pub fn unit(n: usize) -> Self {
        Self {
            lower: DVector::zeros(n),
            upper: DVector::from_element(n, 1.0),
        }
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn contains(&self, position: &[f64]) -> bool {
        position.len() == self.dimension()
            && position
                .iter()
                .enumerate()
                .all(|(j, &x)| x >= self.lower[j] && x <= self.upper[j])
    }
}

/// Cuckoo Search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CuckooParameters {
    /// Number of nests
    pub population_size: usize,
    /// Fraction of worst nests abandoned each iteration (pa, 0-1)
    pub abandon_fraction: f64,
    /// Lévy step scale (alpha)
    pub step_scale: f64,
    /// Stability exponent of the Lévy distribution (beta, 0-2)
    pub levy_exponent: f64,
}

impl Default for CuckooParameters {
    fn default() -> Self {
        Self {
            population_size: 20,
            abandon_fraction: 0.25,
            step_scale: 0.01,
            levy_exponent: 1.5,
        }
    }
}

impl CuckooParameters {
    pub fn with_population_size(mut self, population_size: usize) -> Self {
        self.population_size = population_size;
        self
    }

    pub fn with_abandon_fraction(mut self, pa: f64) -> Self {
        self.abandon_fraction = pa;
        self
    }

    pub fn with_step_scale(mut self, alpha: f64) -> Self {
        self.step_scale = alpha;
        self
    }

    pub fn with_levy_exponent(mut self, beta: f64) -> Self {
        self.levy_exponent = beta;
        self
    }

    pub fn validate(&self) -> CurveResult<()> {
        if self.population_size == 0 {
            return Err(CurveError::InvalidPopulationSize(self.population_size));
        }
        if !(0.0..=1.0).contains(&self.abandon_fraction) {
            return Err(CurveError::InvalidParameter {
                name: "abandon_fraction",
                value: self.abandon_fraction,
                reason: "must lie in [0, 1]",
            });
        }
        if !self.step_scale.is_finite() || self.step_scale < 0.0 {
            return Err(CurveError::InvalidParameter {
                name: "step_scale",
                value: self.step_scale,
                reason: "must be finite and non-negative",
            });
        }
        if !(self.levy_exponent > 0.0 && self.levy_exponent < 2.0) {
            return Err(CurveError::InvalidParameter {
                name: "levy_exponent",
                value: self.levy_exponent,
                reason: "must lie in (0, 2)",
            });
        }
        Ok(())
    }
}

/// Particle Swarm parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmParameters {
    /// Number of particles
    pub population_size: usize,
    /// Inertia weight (w)
    pub inertia: f64,
    /// Attraction towards the personal best (c1)
    pub cognitive: f64,
    /// Attraction towards the global best (c2)
    pub social: f64,
}

impl Default for SwarmParameters {
    fn default() -> Self {
        Self {
            population_size: 20,
            inertia: 0.7,
            cognitive: 1.5,
            social: 1.5,
        }
    }
}

impl SwarmParameters {
    pub fn with_population_size(mut self, population_size: usize) -> Self {
        self.population_size = population_size;
        self
    }

    pub fn with_coefficients(mut self, inertia: f64, cognitive: f64, social: f64) -> Self {
        self.inertia = inertia;
        self.cognitive = cognitive;
        self.social = social;
        self
    }

    pub fn validate(&self) -> CurveResult<()> {
        if self.population_size == 0 {
            return Err(CurveError::InvalidPopulationSize(self.population_size));
        }
        for (name, value) in [
            ("inertia", self.inertia),
            ("cognitive", self.cognitive),
            ("social", self.social),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CurveError::InvalidParameter {
                    name,
                    value,
                    reason: "must be finite and non-negative",
                });
            }
        }
        Ok(())
    }
}

/// Fitness statistics over one population.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationStats {
    pub best_fitness: f64,
    pub worst_fitness: f64,
    pub average_fitness: f64,
    pub median_fitness: f64,
    pub standard_deviation: f64,
}

/// Progress update during optimization.
///
/// Iteration 0 reports the initial population.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub iteration: usize,
    /// Best score found so far (never increases).
    pub best_fitness: f64,
    /// Mean over finite fitness values of the current population.
    pub average_fitness: f64,
    /// Root-mean variance of positions, a spread measure.
    pub diversity: f64,
    /// Objective evaluations spent so far.
    pub evaluations: usize,
}

/// Outcome of one optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub best_score: f64,
    pub best_position: DVector<f64>,
    pub iterations: usize,
    pub evaluations: usize,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Evaluations: {}", self.evaluations)?;
        writeln!(f, "  Best score: {:.6}", self.best_score)?;
        writeln!(f, "  Dimension: {}", self.best_position.len())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_bounds_cover_zero_to_one() {
        let bounds = Bounds::unit(3);
        assert_eq!(bounds.dimension(), 3);
        assert!(bounds.contains(&[0.0, 0.5, 1.0]));
        assert!(!bounds.contains(&[0.0, 1.5, 1.0]));
        assert!(!bounds.contains(&[0.0, 0.5]));
    }

    #[test]
    fn bounds_reject_inverted_or_mismatched() {
        let err = Bounds::new(DVector::from_vec(vec![0.0, 2.0]), DVector::from_vec(vec![1.0, 1.0]));
        assert_eq!(
            err,
            Err(CurveError::InvalidBounds {
                index: 1,
                lower: 2.0,
                upper: 1.0
            })
        );

        let err = Bounds::new(DVector::zeros(2), DVector::zeros(3));
        assert_eq!(
            err,
            Err(CurveError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn default_parameters_are_valid() {
        assert!(CuckooParameters::default().validate().is_ok());
        assert!(SwarmParameters::default().validate().is_ok());
    }

    #[test]
    fn zero_population_is_rejected() {
        assert_eq!(
            CuckooParameters::default().with_population_size(0).validate(),
            Err(CurveError::InvalidPopulationSize(0))
        );
        assert_eq!(
            SwarmParameters::default().with_population_size(0).validate(),
            Err(CurveError::InvalidPopulationSize(0))
        );
    }

    #[test]
    fn out_of_range_coefficients_are_rejected() {
        let params = CuckooParameters::default().with_abandon_fraction(1.2);
        assert!(matches!(
            params.validate(),
            Err(CurveError::InvalidParameter { name: "abandon_fraction", .. })
        ));

        let params = CuckooParameters::default().with_levy_exponent(2.0);
        assert!(matches!(
            params.validate(),
            Err(CurveError::InvalidParameter { name: "levy_exponent", .. })
        ));

        let params = SwarmParameters::default().with_coefficients(0.7, f64::NAN, 1.5);
        assert!(matches!(
            params.validate(),
            Err(CurveError::InvalidParameter { name: "cognitive", .. })
        ));
    }

    #[test]
    fn parameters_deserialize_with_defaults() {
        let params: CuckooParameters = serde_json::from_str(r#"{"population_size": 15}"#).unwrap();
        assert_eq!(params.population_size, 15);
        assert_eq!(params.abandon_fraction, 0.25);
        assert_eq!(params.step_scale, 0.01);
    }
}
