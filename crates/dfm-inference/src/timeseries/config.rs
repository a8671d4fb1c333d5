//! Configuration shared by the filter, smoother and E-step.
//!
//! The missing-value predicate lives here and nowhere else: every recursion
//! asks [`MissingValue::is_missing`] which cells of the observation matrix
//! to drop.

use dfm_core::{Error, Result};

/// Which observation values count as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingValue {
    /// NaN and ±infinity are missing.
    #[default]
    NonFinite,
    /// Only NaN is missing; infinite cells are rejected.
    Nan,
}

impl MissingValue {
    /// Whether `v` marks an absent observation.
    #[inline]
    pub fn is_missing(self, v: f64) -> bool {
        match self {
            MissingValue::NonFinite => !v.is_finite(),
            MissingValue::Nan => v.is_nan(),
        }
    }
}

/// What to do when a matrix that must be inverted is singular.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingularPolicy {
    /// Continue with the pseudo-inverse. The likelihood term of a singular
    /// innovation covariance is skipped by the determinant check.
    #[default]
    Propagate,
    /// Return [`Error::Computation`].
    FailFast,
}

/// Filter/smoother configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanConfig {
    /// Missing-value predicate applied to the observation matrix.
    pub missing: MissingValue,
    /// Handling of singular innovation / predicted covariances.
    pub singular: SingularPolicy,
    /// Singular values at or below this are treated as zero by the pseudo-inverse.
    pub pinv_eps: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            missing: MissingValue::NonFinite,
            singular: SingularPolicy::Propagate,
            pinv_eps: 1e-12,
        }
    }
}

impl KalmanConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.pinv_eps.is_finite() || self.pinv_eps < 0.0 {
            return Err(Error::Validation("pinv_eps must be finite and >= 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_value_predicates() {
        assert!(MissingValue::NonFinite.is_missing(f64::NAN));
        assert!(MissingValue::NonFinite.is_missing(f64::INFINITY));
        assert!(!MissingValue::NonFinite.is_missing(0.0));

        assert!(MissingValue::Nan.is_missing(f64::NAN));
        assert!(!MissingValue::Nan.is_missing(f64::NEG_INFINITY));
        assert!(!MissingValue::Nan.is_missing(-3.5));
    }

    #[test]
    fn test_validate_rejects_bad_pinv_eps() {
        let cfg = KalmanConfig { pinv_eps: -1.0, ..KalmanConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = KalmanConfig { pinv_eps: f64::NAN, ..KalmanConfig::default() };
        assert!(cfg.validate().is_err());
        assert!(KalmanConfig::default().validate().is_ok());
    }
}
