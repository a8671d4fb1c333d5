//! E-step sufficient statistics for EM on linear-Gaussian state space models.
//!
//! The statistics are the ones an external M-step consumes to rebuild
//! `C, A, Q, R, F0, P0`. Missing observation cells enter `delta` as exact
//! zeros rather than being dropped.

use dfm_core::Result;
use nalgebra::{DMatrix, DVector};

use super::config::KalmanConfig;
use super::model::StateSpaceModel;
use super::smoother::kalman_filter_smoother_with_config;

/// E-step output.
#[derive(Debug, Clone, PartialEq)]
pub struct EStepStatistics {
    /// `sum_{t=1}^{T-1} (F_t F_{t-1}^T + P_{t,t-1})` (r x r).
    pub beta: DMatrix<f64>,
    /// `sum_t (F_t F_t^T + P_t)` (r x r).
    pub gamma: DMatrix<f64>,
    /// `sum_t x_t F_t^T` with missing cells zeroed (n x r).
    pub delta: DMatrix<f64>,
    /// `gamma` without the last time step.
    pub gamma1: DMatrix<f64>,
    /// `gamma` without the first time step.
    pub gamma2: DMatrix<f64>,
    /// Smoothed mean at `t = 0`.
    pub f0: DVector<f64>,
    /// Smoothed covariance at `t = 0`.
    pub p0: DMatrix<f64>,
    /// Total log-likelihood under the current parameters.
    pub log_likelihood: f64,
}

impl EStepStatistics {
    /// `model` with its initial belief replaced by the smoothed `t = 0` moments.
    pub fn updated_model(&self, model: &StateSpaceModel) -> Result<StateSpaceModel> {
        model.with_initial_state(self.f0.clone(), self.p0.clone())
    }
}

fn e_xx(m: &DVector<f64>, p: &DMatrix<f64>) -> DMatrix<f64> {
    p + m * m.transpose()
}

/// E-step with the default configuration.
pub fn e_step(model: &StateSpaceModel, x: &DMatrix<f64>) -> Result<EStepStatistics> {
    e_step_with_config(model, x, &KalmanConfig::default())
}

/// Run filter + smoother and accumulate the EM sufficient statistics.
pub fn e_step_with_config(
    model: &StateSpaceModel,
    x: &DMatrix<f64>,
    cfg: &KalmanConfig,
) -> Result<EStepStatistics> {
    let fs = kalman_filter_smoother_with_config(model, x, cfg)?;
    let sm = &fs.smoother;

    let t_max = x.nrows();
    let n_obs = model.n_obs();
    let n = model.n_state();

    let mut delta = DMatrix::<f64>::zeros(n_obs, n);
    let mut gamma = DMatrix::<f64>::zeros(n, n);
    let mut beta = DMatrix::<f64>::zeros(n, n);

    let mut m_prev: Option<DVector<f64>> = None;
    for t in 0..t_max {
        let m = sm.smoothed_means.vector(t);
        let obs = DVector::from_iterator(
            n_obs,
            x.row(t).iter().map(|&v| if cfg.missing.is_missing(v) { 0.0 } else { v }),
        );

        delta += &obs * m.transpose();
        gamma += e_xx(&m, &sm.smoothed_covs.matrix(t));
        if let Some(prev) = &m_prev {
            beta += &m * prev.transpose() + sm.lag_one_covs.matrix(t);
        }
        m_prev = Some(m);
    }

    let f0 = sm.smoothed_means.vector(0);
    let p0 = sm.smoothed_covs.matrix(0);
    let last = e_xx(&sm.smoothed_means.vector(t_max - 1), &sm.smoothed_covs.matrix(t_max - 1));
    let first = e_xx(&f0, &p0);
    let gamma1 = &gamma - last;
    let gamma2 = &gamma - first;

    Ok(EStepStatistics {
        beta,
        gamma,
        delta,
        gamma1,
        gamma2,
        f0,
        p0,
        log_likelihood: fs.log_likelihood(),
    })
}
