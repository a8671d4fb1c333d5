//! Parallel runs over independent series.
//!
//! The recursions themselves are sequential in time; only separate series
//! (panels, bootstrap replicates) run concurrently. Each series gets its own
//! pure call, so results are identical to running them one by one.

use dfm_core::Result;
use nalgebra::DMatrix;
use rayon::prelude::*;

use super::config::KalmanConfig;
use super::estep::{EStepStatistics, e_step_with_config};
use super::kalman::{KalmanFilterResult, kalman_filter_with_config};
use super::model::StateSpaceModel;

/// Filter every series in `xs` under the same model. Output order follows `xs`.
pub fn kalman_filter_batch(
    model: &StateSpaceModel,
    xs: &[DMatrix<f64>],
    cfg: &KalmanConfig,
) -> Vec<Result<KalmanFilterResult>> {
    xs.par_iter().map(|x| kalman_filter_with_config(model, x, cfg)).collect()
}

/// E-step for every series in `xs` under the same model. Output order follows `xs`.
pub fn e_step_batch(
    model: &StateSpaceModel,
    xs: &[DMatrix<f64>],
    cfg: &KalmanConfig,
) -> Vec<Result<EStepStatistics>> {
    xs.par_iter().map(|x| e_step_with_config(model, x, cfg)).collect()
}
