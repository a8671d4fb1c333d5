//! Rauch–Tung–Striebel smoother and lag-one cross-covariances.
//!
//! The smoother consumes a [`KalmanFilterResult`]; [`kalman_filter_smoother`]
//! is just the composition of the two passes.

use dfm_core::{Error, Result};
use nalgebra::{DMatrix, DVector};

use super::config::KalmanConfig;
use super::history::History;
use super::internal::invert;
use super::kalman::{KalmanFilterResult, MIN_TIME_STEPS, kalman_filter_with_config};
use super::model::StateSpaceModel;

/// RTS smoother output.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanSmootherResult {
    /// Smoothed means `F_{t|T}` (T slots of r x 1).
    pub smoothed_means: History,
    /// Smoothed covariances `P_{t|T}` (T slots of r x r).
    pub smoothed_covs: History,
    /// Lag-one cross-covariances `Cov(x_t, x_{t-1} | Y)` (T slots of r x r).
    /// Slot 0 has no predecessor and is zero; slot 1 is zero unless T = 2.
    pub lag_one_covs: History,
}

/// Filter and smoother outputs from one fused call.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSmootherResult {
    /// Forward pass.
    pub filter: KalmanFilterResult,
    /// Backward pass.
    pub smoother: KalmanSmootherResult,
}

impl FilterSmootherResult {
    /// Total log-likelihood from the forward pass.
    pub fn log_likelihood(&self) -> f64 {
        self.filter.log_likelihood
    }
}

fn check_filter_result(model: &StateSpaceModel, fr: &KalmanFilterResult) -> Result<usize> {
    let t_max = fr.filtered_means.len();
    if t_max < MIN_TIME_STEPS {
        return Err(Error::InsufficientObservations { required: MIN_TIME_STEPS, actual: t_max });
    }
    if fr.predicted_means.len() != t_max
        || fr.predicted_covs.len() != t_max
        || fr.filtered_covs.len() != t_max
    {
        return Err(Error::DimensionMismatch(
            "filter result has inconsistent history lengths".to_string(),
        ));
    }
    let n = model.n_state();
    if fr.filtered_means.shape() != (n, 1)
        || fr.predicted_means.shape() != (n, 1)
        || fr.filtered_covs.shape() != (n, n)
        || fr.predicted_covs.shape() != (n, n)
    {
        return Err(Error::DimensionMismatch(format!(
            "filter result state dimension does not match model (r={n})"
        )));
    }
    Ok(t_max)
}

/// Run RTS smoothing with the default configuration.
pub fn rts_smoother(model: &StateSpaceModel, fr: &KalmanFilterResult) -> Result<KalmanSmootherResult> {
    rts_smoother_with_config(model, fr, &KalmanConfig::default())
}

/// Run RTS smoothing given a completed Kalman filter result.
///
/// The lag-one terms use the full loading matrix and `R`; the per-step
/// missing-channel restriction of the filter is not re-applied.
pub fn rts_smoother_with_config(
    model: &StateSpaceModel,
    fr: &KalmanFilterResult,
    cfg: &KalmanConfig,
) -> Result<KalmanSmootherResult> {
    cfg.validate()?;
    let t_max = check_filter_result(model, fr)?;
    let n = model.n_state();
    let a = model.a();
    let a_t = a.transpose();

    // J_t = P_{t|t} A^T (P_{t+1|t})^{-1}, t = 0..T-2
    let mut gains = History::zeros(t_max - 1, n, n);
    for t in 0..t_max - 1 {
        let pp_next_inv = invert(&fr.predicted_covs.matrix(t + 1), cfg, "predicted state covariance")?;
        let j = fr.filtered_covs.matrix(t) * &a_t * pp_next_inv;
        gains.set(t, &j);
    }

    // Slot T-1 already holds the filtered moments.
    let mut smoothed_means = fr.filtered_means.clone();
    let mut smoothed_covs = fr.filtered_covs.clone();

    for t in (0..t_max - 1).rev() {
        let j = gains.matrix(t);

        // F_{t|T} = F_{t|t} + J (F_{t+1|T} - F_{t+1|t})
        let dm: DVector<f64> = smoothed_means.vector(t + 1) - fr.predicted_means.vector(t + 1);
        let m = fr.filtered_means.vector(t) + &j * dm;

        // P_{t|T} = P_{t|t} + J (P_{t+1|T} - P_{t+1|t}) J^T
        let dp = smoothed_covs.matrix(t + 1) - fr.predicted_covs.matrix(t + 1);
        let p = fr.filtered_covs.matrix(t) + &j * dp * j.transpose();

        smoothed_means.set_vector(t, &m);
        smoothed_covs.set(t, &p);
    }

    let lag_one_covs = lag_one_covariances(model, fr, &gains, cfg)?;

    Ok(KalmanSmootherResult { smoothed_means, smoothed_covs, lag_one_covs })
}

fn lag_one_covariances(
    model: &StateSpaceModel,
    fr: &KalmanFilterResult,
    gains: &History,
    cfg: &KalmanConfig,
) -> Result<History> {
    let t_max = fr.filtered_means.len();
    let n = model.n_state();
    let a = model.a();
    let c = model.loading();

    let mut lag = History::zeros(t_max, n, n);

    // Seed: P_{T-1,T-2|T} = (I - K_{T-1} C) A P_{T-2|T-2}
    let pp_last = fr.predicted_covs.matrix(t_max - 1);
    let l = invert(&(c * &pp_last * c.transpose() + model.r()), cfg, "full innovation covariance")?;
    let k = &pp_last * c.transpose() * l;
    let seed = (DMatrix::<f64>::identity(n, n) - &k * c) * a * fr.filtered_covs.matrix(t_max - 2);
    lag.set(t_max - 1, &seed);

    // P_{s,s-1|T} = P_{s|s} J_{s-1}^T + J_s (P_{s+1,s|T} - A P_{s|s}) J_{s-1}^T
    // for s = T-2 down to 2. Slot 1 keeps zero unless it holds the seed (T = 2).
    for s in (2..t_max - 1).rev() {
        let pf = fr.filtered_covs.matrix(s);
        let j_prev_t = gains.matrix(s - 1).transpose();
        let v = &pf * &j_prev_t + gains.matrix(s) * (lag.matrix(s + 1) - a * &pf) * &j_prev_t;
        lag.set(s, &v);
    }

    Ok(lag)
}

/// Run the filter followed by the smoother (default configuration).
pub fn kalman_filter_smoother(model: &StateSpaceModel, x: &DMatrix<f64>) -> Result<FilterSmootherResult> {
    kalman_filter_smoother_with_config(model, x, &KalmanConfig::default())
}

/// Run the filter followed by the smoother.
pub fn kalman_filter_smoother_with_config(
    model: &StateSpaceModel,
    x: &DMatrix<f64>,
    cfg: &KalmanConfig,
) -> Result<FilterSmootherResult> {
    let filter = kalman_filter_with_config(model, x, cfg)?;
    let smoother = rts_smoother_with_config(model, &filter, cfg)?;
    Ok(FilterSmootherResult { filter, smoother })
}
