//! Time series and state space models.

mod internal;

/// Filter/smoother configuration (missing-value predicate, singular policy).
pub mod config;

/// Contiguous per-time-step storage for means and covariances.
pub mod history;

/// Time-invariant linear-Gaussian state-space model.
pub mod model;

/// Per-time-step observed-channel selection.
pub mod mask;

/// Forward Kalman filter.
pub mod kalman;

/// RTS smoother, lag-one cross-covariances and the fused filter+smoother.
pub mod smoother;

/// E-step sufficient statistics for EM.
pub mod estep;

/// Parallel execution over independent series.
pub mod batch;

/// Simulation of states and observations from a model.
pub mod simulate;

/// Stationary covariance and Riccati fixed point.
pub mod steady_state;
