//! Time-invariant linear-Gaussian state-space model.

use dfm_core::{Error, Result};
use nalgebra::{DMatrix, DVector};

/// Time-invariant linear Gaussian state-space model.
///
/// State:
/// `x_t = A x_{t-1} + w_t`,  `w_t ~ N(0, Q)`
///
/// Observation:
/// `y_t = C x_t + v_t`,      `v_t ~ N(0, R)`
///
/// Initial belief:
/// `x_0 ~ N(F0, P0)`
///
/// Non-finite entries in the first row of `A` mark state dimensions that the
/// observation equation does not load. Those columns are dropped from `C`
/// (see [`StateSpaceModel::loading`]) and the non-finite entries themselves
/// act as zeros in the transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpaceModel {
    a: DMatrix<f64>,
    c: DMatrix<f64>,
    q: DMatrix<f64>,
    r: DMatrix<f64>,
    f0: DVector<f64>,
    p0: DMatrix<f64>,
    loaded: Vec<usize>,
    loading: DMatrix<f64>,
}

fn check_finite(name: &str, m: &DMatrix<f64>) -> Result<()> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(Error::Validation(format!("{name} must contain only finite values")));
    }
    Ok(())
}

impl StateSpaceModel {
    /// Create a new model and validate matrix/vector dimensions.
    ///
    /// Argument order follows the E-step boundary: `C, Q, R, A, F0, P0`.
    pub fn new(
        c: DMatrix<f64>,
        q: DMatrix<f64>,
        r: DMatrix<f64>,
        a: DMatrix<f64>,
        f0: DVector<f64>,
        p0: DMatrix<f64>,
    ) -> Result<Self> {
        let n_state = a.nrows();
        if n_state == 0 || a.ncols() != n_state {
            return Err(Error::DimensionMismatch(format!(
                "A must be square with r>0, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        if q.shape() != (n_state, n_state) {
            return Err(Error::DimensionMismatch(format!(
                "Q must be {n_state}x{n_state}, got {}x{}",
                q.nrows(),
                q.ncols()
            )));
        }
        if p0.shape() != (n_state, n_state) {
            return Err(Error::DimensionMismatch(format!(
                "P0 must be {n_state}x{n_state}, got {}x{}",
                p0.nrows(),
                p0.ncols()
            )));
        }
        if f0.len() != n_state {
            return Err(Error::DimensionMismatch(format!(
                "F0 must have length {n_state}, got {}",
                f0.len()
            )));
        }
        let n_obs = c.nrows();
        if n_obs == 0 || c.ncols() != n_state {
            return Err(Error::DimensionMismatch(format!(
                "C must be n x {n_state} with n>0, got {}x{}",
                c.nrows(),
                c.ncols()
            )));
        }
        if r.shape() != (n_obs, n_obs) {
            return Err(Error::DimensionMismatch(format!(
                "R must be {n_obs}x{n_obs}, got {}x{}",
                r.nrows(),
                r.ncols()
            )));
        }

        // Only the first row of A may carry the unloaded-state marker.
        if a.rows(1, n_state - 1).iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation(
                "A must be finite outside its first row".to_string(),
            ));
        }
        let loaded: Vec<usize> = (0..n_state).filter(|&j| a[(0, j)].is_finite()).collect();
        if loaded.is_empty() {
            return Err(Error::Validation(
                "first row of A marks every state dimension as unloaded".to_string(),
            ));
        }

        check_finite("C", &c)?;
        check_finite("Q", &q)?;
        check_finite("R", &r)?;
        check_finite("P0", &p0)?;
        if f0.iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation("F0 must contain only finite values".to_string()));
        }

        let mut a = a;
        for j in 0..n_state {
            if !a[(0, j)].is_finite() {
                a[(0, j)] = 0.0;
            }
        }

        let mut loading = DMatrix::<f64>::zeros(n_obs, n_state);
        for &j in &loaded {
            loading.set_column(j, &c.column(j));
        }

        Ok(Self { a, c, q, r, f0, p0, loaded, loading })
    }

    /// AR(1) state with 1D observations.
    ///
    /// State:
    /// `x_t = phi * x_{t-1} + w_t`, `w_t ~ N(0, q)`
    ///
    /// Observation:
    /// `y_t = x_t + v_t`, `v_t ~ N(0, r)`
    pub fn ar1(phi: f64, q: f64, r: f64, f0: f64, p0: f64) -> Result<Self> {
        if !phi.is_finite() {
            return Err(Error::Validation("phi must be finite".to_string()));
        }
        if !q.is_finite() || q < 0.0 {
            return Err(Error::Validation("q must be finite and >= 0".to_string()));
        }
        if !r.is_finite() || r < 0.0 {
            return Err(Error::Validation("r must be finite and >= 0".to_string()));
        }
        if !p0.is_finite() || p0 < 0.0 {
            return Err(Error::Validation("p0 must be finite and >= 0".to_string()));
        }

        StateSpaceModel::new(
            DMatrix::from_row_slice(1, 1, &[1.0]),
            DMatrix::from_row_slice(1, 1, &[q]),
            DMatrix::from_row_slice(1, 1, &[r]),
            DMatrix::from_row_slice(1, 1, &[phi]),
            DVector::from_row_slice(&[f0]),
            DMatrix::from_row_slice(1, 1, &[p0]),
        )
    }

    /// Local level model (random walk): AR(1) with `phi = 1`.
    pub fn local_level(q: f64, r: f64, f0: f64, p0: f64) -> Result<Self> {
        Self::ar1(1.0, q, r, f0, p0)
    }

    /// Same model with a different initial belief, e.g. the smoothed `t = 0`
    /// moments from an E-step.
    pub fn with_initial_state(&self, f0: DVector<f64>, p0: DMatrix<f64>) -> Result<Self> {
        let n = self.n_state();
        if f0.len() != n || p0.shape() != (n, n) {
            return Err(Error::DimensionMismatch(format!(
                "initial state must be {n} / {n}x{n}, got {} / {}x{}",
                f0.len(),
                p0.nrows(),
                p0.ncols()
            )));
        }
        if f0.iter().any(|v| !v.is_finite()) || p0.iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation("initial state must be finite".to_string()));
        }
        Ok(Self { f0, p0, ..self.clone() })
    }

    /// Number of latent state dimensions (r).
    pub fn n_state(&self) -> usize {
        self.a.nrows()
    }

    /// Number of observation channels (n).
    pub fn n_obs(&self) -> usize {
        self.c.nrows()
    }

    /// Transition matrix `A` (unloaded-state markers replaced by zero).
    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// Observation matrix `C` as supplied.
    pub fn c(&self) -> &DMatrix<f64> {
        &self.c
    }

    /// State noise covariance `Q`.
    pub fn q(&self) -> &DMatrix<f64> {
        &self.q
    }

    /// Observation noise covariance `R`.
    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    /// Initial state mean `F0`.
    pub fn f0(&self) -> &DVector<f64> {
        &self.f0
    }

    /// Initial state covariance `P0`.
    pub fn p0(&self) -> &DMatrix<f64> {
        &self.p0
    }

    /// Indices of the state dimensions loaded by the observation equation.
    pub fn loaded_states(&self) -> &[usize] {
        &self.loaded
    }

    /// `C` restricted to the loaded state dimensions (other columns zero).
    pub fn loading(&self) -> &DMatrix<f64> {
        &self.loading
    }
}
