//! Stationary and steady-state covariances.
//!
//! `stationary_covariance` solves the discrete Lyapunov equation
//! `P = A P A^T + Q` by doubling. `riccati_fixed_point` iterates the
//! fully-observed predicted-covariance recursion of the filter until it
//! stops moving.

use dfm_core::{Error, Result};
use nalgebra::DMatrix;

use super::config::KalmanConfig;
use super::internal::invert;
use super::model::StateSpaceModel;

const DOUBLING_MAX_ITER: usize = 64;
const DOUBLING_TOL: f64 = 1e-14;

fn max_abs_diff(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

/// Stationary covariance of `x_t = A x_{t-1} + w_t`, `w_t ~ N(0, Q)`.
///
/// Requires every eigenvalue of `A` strictly inside the unit circle.
pub fn stationary_covariance(a: &DMatrix<f64>, q: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if !a.is_square() || q.shape() != a.shape() {
        return Err(Error::DimensionMismatch(format!(
            "A is {}x{} but Q is {}x{}",
            a.nrows(),
            a.ncols(),
            q.nrows(),
            q.ncols()
        )));
    }

    let mut p = q.clone();
    let mut ak = a.clone();
    for _ in 0..DOUBLING_MAX_ITER {
        let next = &p + &ak * &p * ak.transpose();
        if next.iter().any(|v| !v.is_finite()) {
            break;
        }
        let scale = next.amax().max(1.0);
        let delta = max_abs_diff(&next, &p);
        p = next;
        ak = &ak * &ak;
        if delta <= DOUBLING_TOL * scale {
            return Ok(p);
        }
    }

    Err(Error::Computation(
        "stationary covariance did not converge; A is not stable".to_string(),
    ))
}

/// Fixed point of the fully-observed covariance recursion.
#[derive(Debug, Clone)]
pub struct RiccatiFixedPoint {
    /// Steady-state predicted covariance `P_{t|t-1}`.
    pub predicted: DMatrix<f64>,
    /// Steady-state filtered covariance `P_{t|t}`.
    pub filtered: DMatrix<f64>,
    /// Iterations used.
    pub iterations: usize,
}

/// Iterate `P <- A (P - K C P) A^T + Q` from `P0` until the largest entry
/// change drops below `tol`.
///
/// Uses the model's loading (unloaded states contribute nothing) and assumes
/// every channel is observed at every step.
pub fn riccati_fixed_point(
    model: &StateSpaceModel,
    max_iter: usize,
    tol: f64,
) -> Result<RiccatiFixedPoint> {
    if max_iter == 0 {
        return Err(Error::Validation("max_iter must be > 0".to_string()));
    }
    if !tol.is_finite() || tol <= 0.0 {
        return Err(Error::Validation("tol must be finite and > 0".to_string()));
    }

    let cfg = KalmanConfig::default();
    let a = model.a();
    let c = model.loading();
    let ct = c.transpose();

    let mut pp = model.p0().clone();
    for it in 1..=max_iter {
        let s = c * &pp * &ct + model.r();
        let s_inv = invert(&s, &cfg, "innovation covariance")?;
        let k = &pp * &ct * s_inv;
        let pf = &pp - &k * c * &pp;
        let next = a * &pf * a.transpose() + model.q();

        let delta = max_abs_diff(&next, &pp);
        pp = next;
        if delta <= tol {
            return Ok(RiccatiFixedPoint { predicted: pp, filtered: pf, iterations: it });
        }
    }

    Err(Error::Computation(format!("Riccati recursion did not converge in {max_iter} iterations")))
}
