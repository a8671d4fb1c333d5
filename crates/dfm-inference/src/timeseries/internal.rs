//! Helpers shared by the filter, smoother and steady-state solvers.

use dfm_core::{Error, Result};
use nalgebra::DMatrix;

use super::config::{KalmanConfig, SingularPolicy};

/// `ln(2 pi)`, the per-channel Gaussian normalizing constant.
pub(super) const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Invert `m`, falling back according to `cfg.singular` when it is singular.
///
/// Under [`SingularPolicy::Propagate`] the Moore–Penrose pseudo-inverse is
/// returned, so the caller keeps running with whatever gain it implies.
pub(super) fn invert(m: &DMatrix<f64>, cfg: &KalmanConfig, what: &str) -> Result<DMatrix<f64>> {
    if let Some(inv) = m.clone().try_inverse() {
        return Ok(inv);
    }

    match cfg.singular {
        SingularPolicy::FailFast => Err(Error::Computation(format!("{what} is singular"))),
        SingularPolicy::Propagate => {
            log::warn!("{what} is singular; continuing with its pseudo-inverse");
            // pinv(0) = 0; skip the SVD for the exactly-degenerate case.
            if m.iter().all(|&v| v == 0.0) {
                return Ok(DMatrix::zeros(m.ncols(), m.nrows()));
            }
            m.clone()
                .pseudo_inverse(cfg.pinv_eps)
                .map_err(|e| Error::Computation(format!("{what}: pseudo-inverse failed: {e}")))
        }
    }
}
