//! Simulation utilities for linear-Gaussian state space models.
//!
//! Generates a latent trajectory and corresponding observations:
//! - x_0 ~ N(F0, P0)
//! - x_t = A x_{t-1} + w_t, w_t ~ N(0, Q)
//! - y_t = C x_t     + v_t, v_t ~ N(0, R)

use dfm_core::{Error, Result};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

use super::model::StateSpaceModel;

/// Simulation output.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Latent states (T x r).
    pub states: DMatrix<f64>,
    /// Observations (T x n).
    pub observations: DMatrix<f64>,
}

/// Factor `L` with `L L^T = cov` for a symmetric PSD `cov`.
///
/// Cholesky when possible; otherwise an eigen factor, which also covers
/// singular and all-zero covariances.
fn noise_factor(cov: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if let Some(chol) = cov.clone().cholesky() {
        let l = chol.l();
        if l.iter().all(|v| v.is_finite()) {
            return Ok(l);
        }
    }

    let eig = SymmetricEigen::new(cov.clone());
    let scale = eig.eigenvalues.amax().max(1.0);
    let mut factor = eig.eigenvectors.clone();
    for (j, &lambda) in eig.eigenvalues.iter().enumerate() {
        if lambda < -1e-10 * scale {
            return Err(Error::Computation(format!(
                "covariance is not positive semi-definite (eigenvalue {lambda})"
            )));
        }
        let s = lambda.max(0.0).sqrt();
        factor.column_mut(j).scale_mut(s);
    }
    Ok(factor)
}

fn sample_mvn(rng: &mut StdRng, mean: &DVector<f64>, factor: &DMatrix<f64>) -> DVector<f64> {
    let z = DVector::<f64>::from_fn(factor.ncols(), |_, _| StandardNormal.sample(rng));
    mean + factor * z
}

/// Simulate `t_max` steps from the model.
pub fn simulate(model: &StateSpaceModel, t_max: usize, seed: u64) -> Result<SimulationResult> {
    if t_max == 0 {
        return Err(Error::Validation("t_max must be > 0".to_string()));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let n = model.n_state();
    let n_obs = model.n_obs();

    let l_p0 = noise_factor(model.p0())?;
    let l_q = noise_factor(model.q())?;
    let l_r = noise_factor(model.r())?;
    let zero_state = DVector::<f64>::zeros(n);

    let mut states = DMatrix::<f64>::zeros(t_max, n);
    let mut observations = DMatrix::<f64>::zeros(t_max, n_obs);

    let mut x = sample_mvn(&mut rng, model.f0(), &l_p0);
    for t in 0..t_max {
        if t > 0 {
            x = model.a() * &x + sample_mvn(&mut rng, &zero_state, &l_q);
        }
        let y = sample_mvn(&mut rng, &(model.loading() * &x), &l_r);

        states.set_row(t, &x.transpose());
        observations.set_row(t, &y.transpose());
    }

    Ok(SimulationResult { states, observations })
}
