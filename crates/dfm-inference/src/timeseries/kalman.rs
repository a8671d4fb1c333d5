//! Linear-Gaussian Kalman filter with per-step missing channels.
//!
//! At each step the observation equation is restricted to the channels that
//! are present; absent channels carry no information and no likelihood.
//! The covariance update is the standard `P - K C P` form.

use dfm_core::{Error, Result};
use nalgebra::{DMatrix, DVector};

use super::config::{KalmanConfig, MissingValue};
use super::history::History;
use super::internal::{LN_2PI, invert};
use super::mask::reduce_observation;
use super::model::StateSpaceModel;

/// Minimum series length accepted by the filter, smoother and E-step.
pub const MIN_TIME_STEPS: usize = 2;

/// Kalman filter output (per-time-step predicted and filtered states).
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanFilterResult {
    /// Total log-likelihood of the observed cells.
    pub log_likelihood: f64,
    /// Per-step increments; `None` where the step added nothing (all
    /// channels missing, or a non-positive innovation determinant).
    pub log_likelihood_terms: Vec<Option<f64>>,
    /// Prior means `F_{t|t-1}` (T slots of r x 1).
    pub predicted_means: History,
    /// Prior covariances `P_{t|t-1}` (T slots of r x r).
    pub predicted_covs: History,
    /// Posterior means `F_{t|t}` (T slots of r x 1).
    pub filtered_means: History,
    /// Posterior covariances `P_{t|t}` (T slots of r x r).
    pub filtered_covs: History,
    /// One-step-ahead state mean past the end of the series.
    pub forecast_mean: DVector<f64>,
    /// One-step-ahead state covariance past the end of the series.
    pub forecast_cov: DMatrix<f64>,
}

impl KalmanFilterResult {
    /// Number of filtered time steps (T).
    pub fn n_steps(&self) -> usize {
        self.filtered_means.len()
    }
}

/// Check that `x` fits `model` and is long enough.
pub(crate) fn validate_series(
    model: &StateSpaceModel,
    x: &DMatrix<f64>,
    cfg: &KalmanConfig,
) -> Result<()> {
    cfg.validate()?;
    if x.ncols() != model.n_obs() {
        return Err(Error::DimensionMismatch(format!(
            "X has {} columns but C has {} rows",
            x.ncols(),
            model.n_obs()
        )));
    }
    if x.nrows() < MIN_TIME_STEPS {
        return Err(Error::InsufficientObservations {
            required: MIN_TIME_STEPS,
            actual: x.nrows(),
        });
    }
    if cfg.missing == MissingValue::Nan {
        for t in 0..x.nrows() {
            for i in 0..x.ncols() {
                if x[(t, i)].is_infinite() {
                    return Err(Error::Validation(format!(
                        "x[{t}, {i}] is infinite (only NaN marks a missing value)"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Run Kalman filtering with the default configuration.
///
/// `x` is `T x n`; missing cells are NaN (or any non-finite value).
pub fn kalman_filter(model: &StateSpaceModel, x: &DMatrix<f64>) -> Result<KalmanFilterResult> {
    kalman_filter_with_config(model, x, &KalmanConfig::default())
}

/// Run Kalman filtering on a full observation matrix.
///
/// Returns per-step predicted and filtered state distributions, the
/// one-step-ahead forecast, and the total log-likelihood.
pub fn kalman_filter_with_config(
    model: &StateSpaceModel,
    x: &DMatrix<f64>,
    cfg: &KalmanConfig,
) -> Result<KalmanFilterResult> {
    validate_series(model, x, cfg)?;

    let t_max = x.nrows();
    let n_state = model.n_state();
    let n_obs = model.n_obs() as f64;

    let mut predicted_means = History::zeros(t_max, n_state, 1);
    let mut predicted_covs = History::zeros(t_max, n_state, n_state);
    let mut filtered_means = History::zeros(t_max, n_state, 1);
    let mut filtered_covs = History::zeros(t_max, n_state, n_state);
    let mut terms = Vec::with_capacity(t_max);

    let mut fp = model.f0().clone();
    let mut pp = model.p0().clone();
    let mut loglik = 0.0f64;

    for t in 0..t_max {
        let (ff, pf, term) = match reduce_observation(model, x, t, cfg.missing) {
            None => {
                log::debug!("t={t}: all channels missing, prediction only");
                (fp.clone(), pp.clone(), None)
            }
            Some(obs) => {
                // S^{-1} = (C P C^T + R)^{-1}
                let s = &obs.c * &pp * obs.c.transpose() + &obs.r;
                let s_inv = invert(&s, cfg, "innovation covariance")?;

                let xe = &obs.y - &obs.c * &fp;
                let k = &pp * obs.c.transpose() * &s_inv;

                let ff = &fp + &k * &xe;
                let pf = &pp - &k * &obs.c * &pp;

                // The constant uses the full channel count even when some
                // channels are missing at t.
                let det = s_inv.determinant();
                let term = if det > 0.0 {
                    let quad = xe.dot(&(&s_inv * &xe));
                    Some(-0.5 * (n_obs * LN_2PI - det.ln() + quad))
                } else {
                    log::debug!("t={t}: det(S^-1)={det} <= 0, skipping likelihood term");
                    None
                };
                (ff, pf, term)
            }
        };

        if let Some(v) = term {
            loglik += v;
        }
        terms.push(term);

        predicted_means.set_vector(t, &fp);
        predicted_covs.set(t, &pp);
        filtered_means.set_vector(t, &ff);
        filtered_covs.set(t, &pf);

        fp = model.a() * &ff;
        pp = model.a() * &pf * model.a().transpose() + model.q();
    }

    Ok(KalmanFilterResult {
        log_likelihood: loglik,
        log_likelihood_terms: terms,
        predicted_means,
        predicted_covs,
        filtered_means,
        filtered_covs,
        forecast_mean: fp,
        forecast_cov: pp,
    })
}
