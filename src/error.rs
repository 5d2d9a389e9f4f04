//! Error type shared by the smoother, objective, optimizers and driver.

use thiserror::Error;

/// Crate-wide result alias.
pub type CurveResult<T> = Result<T, CurveError>;

/// Errors raised by principal-curve estimation.
///
/// Degenerate orderings are not errors: the objective scores them with a
/// penalty constant instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    /// The point cloud has no rows or no columns.
    #[error("point cloud is empty: {rows} points with {cols} coordinates")]
    EmptyPointCloud { rows: usize, cols: usize },

    /// Population size must be at least one.
    #[error("invalid population size {0} (must be at least 1)")]
    InvalidPopulationSize(usize),

    /// A tunable coefficient is outside its admissible range.
    #[error("invalid {name}: {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Candidate width does not match the bounds or the point cloud.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Lower bound exceeds upper bound (or either is not finite).
    #[error("invalid bounds at index {index}: lower {lower}, upper {upper}")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },

    /// Input contains NaN or infinity.
    #[error("non-finite value in {what} at index {index}")]
    NonFiniteValue { what: &'static str, index: usize },

    /// Smoothing spline needs more points than were provided.
    #[error("too few points for a cubic smoothing spline: got {got}, need at least {min}")]
    TooFewPoints { got: usize, min: usize },

    /// Positions passed to the smoother must be strictly increasing.
    #[error("positions must be strictly increasing (violated at index {index})")]
    NonIncreasingPositions { index: usize },

    /// Positions and values differ in length.
    #[error("length mismatch: {positions} positions but {values} values")]
    LengthMismatch { positions: usize, values: usize },

    /// The spline system lost positive definiteness in floating point,
    /// typically because two knots are nearly coincident.
    #[error("smoothing system is numerically singular (smallest knot gap {min_gap:e})")]
    IllConditioned { min_gap: f64 },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for CurveError {
    fn from(err: serde_json::Error) -> Self {
        CurveError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = CurveError::TooFewPoints { got: 2, min: 4 };
        assert_eq!(
            err.to_string(),
            "too few points for a cubic smoothing spline: got 2, need at least 4"
        );

        let err = CurveError::InvalidParameter {
            name: "abandon_fraction",
            value: 1.5,
            reason: "must lie in [0, 1]",
        };
        assert!(err.to_string().contains("abandon_fraction"));
        assert!(err.to_string().contains("1.5"));

        let err = CurveError::IllConditioned { min_gap: 1e-13 };
        assert!(err.to_string().contains("1e-13"));
    }

    #[test]
    fn json_errors_become_config_errors() {
        let err: CurveError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, CurveError::InvalidConfig(_)));
    }
}
