//! Lévy-flight step generation (Mantegna's algorithm).

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use statrs::function::gamma;

use crate::error::{CurveError, CurveResult};

/// Heavy-tailed step generator with stability exponent `beta`.
///
/// Each component is `u / |v|^(1/beta)` with `u ~ N(0, sigma²)` and
/// `v ~ N(0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevyFlight {
    beta: f64,
    sigma: f64,
}

impl LevyFlight {
    pub fn new(beta: f64) -> CurveResult<Self> {
        if !(beta > 0.0 && beta < 2.0) {
            return Err(CurveError::InvalidParameter {
                name: "levy_exponent",
                value: beta,
                reason: "must lie in (0, 2)",
            });
        }
        Ok(Self {
            beta,
            sigma: mantegna_sigma(beta),
        })
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Standard deviation of the numerator draw.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Draw a step vector of length `dimension`.
    pub fn step<R>(&self, dimension: usize, rng: &mut R) -> Vec<f64>
    where
        R: Rng + ?Sized,
    {
        let exponent = 1.0 / self.beta;
        let u: Vec<f64> = (0..dimension)
            .map(|_| {
                let z: f64 = StandardNormal.sample(&mut *rng);
                self.sigma * z
            })
            .collect();
        u.into_iter()
            .map(|ui| {
                let v: f64 = StandardNormal.sample(&mut *rng);
                ui / v.abs().powf(exponent).max(f64::MIN_POSITIVE)
            })
            .collect()
    }
}

/// sigma = (Γ(1+β) sin(πβ/2) / (Γ((1+β)/2) β 2^((β-1)/2)))^(1/β)
pub fn mantegna_sigma(beta: f64) -> f64 {
    let numerator = gamma::gamma(1.0 + beta) * (std::f64::consts::PI * beta / 2.0).sin();
    let denominator = gamma::gamma((1.0 + beta) / 2.0) * beta * 2f64.powf((beta - 1.0) / 2.0);
    (numerator / denominator).powf(1.0 / beta)
}
