//! # dfm-inference
//!
//! State estimation for linear-Gaussian state-space models.
//!
//! This crate provides:
//! - Kalman filtering with per-time-step missing-channel handling
//! - Rauch–Tung–Striebel smoothing with lag-one cross-covariances
//! - E-step sufficient statistics for an external EM M-step
//! - Simulation, steady-state helpers and rayon batch runners
//!
//! Every entry point is a pure function of its inputs.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Time series and state space models.
pub mod timeseries;

pub use timeseries::config::{KalmanConfig, MissingValue, SingularPolicy};
pub use timeseries::estep::{EStepStatistics, e_step, e_step_with_config};
pub use timeseries::history::History;
pub use timeseries::kalman::{KalmanFilterResult, kalman_filter, kalman_filter_with_config};
pub use timeseries::model::StateSpaceModel;
pub use timeseries::smoother::{
    FilterSmootherResult, KalmanSmootherResult, kalman_filter_smoother,
    kalman_filter_smoother_with_config, rts_smoother, rts_smoother_with_config,
};
pub use timeseries::simulate::{SimulationResult, simulate};
pub use timeseries::steady_state::{RiccatiFixedPoint, riccati_fixed_point, stationary_covariance};
