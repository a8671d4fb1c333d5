//! Per-time-step selection of observed channels.
//!
//! The selection is an index list rebuilt from the data at each step; nothing
//! is cached between steps or calls.

use nalgebra::{DMatrix, DVector};

use super::config::MissingValue;
use super::model::StateSpaceModel;

/// Indices of the channels of row `t` of `x` that are observed.
pub fn observed_channels(x: &DMatrix<f64>, t: usize, missing: MissingValue) -> Vec<usize> {
    x.row(t)
        .iter()
        .enumerate()
        .filter(|&(_, &v)| !missing.is_missing(v))
        .map(|(i, _)| i)
        .collect()
}

/// Observation system restricted to the channels observed at one time step.
#[derive(Debug, Clone)]
pub(crate) struct ReducedObservation {
    /// Observed channel indices.
    pub obs_idx: Vec<usize>,
    /// Observed values.
    pub y: DVector<f64>,
    /// Rows `obs_idx` of the loading matrix.
    pub c: DMatrix<f64>,
    /// Rows/cols `obs_idx` of `R`.
    pub r: DMatrix<f64>,
}

/// Restrict the observation equation to the channels observed at time `t`.
///
/// Returns `None` if every channel is missing.
pub(crate) fn reduce_observation(
    model: &StateSpaceModel,
    x: &DMatrix<f64>,
    t: usize,
    missing: MissingValue,
) -> Option<ReducedObservation> {
    let obs_idx = observed_channels(x, t, missing);
    if obs_idx.is_empty() {
        return None;
    }

    let y = DVector::from_iterator(obs_idx.len(), obs_idx.iter().map(|&i| x[(t, i)]));
    let c = model.loading().select_rows(&obs_idx);
    let r = model.r().select_rows(&obs_idx).select_columns(&obs_idx);

    Some(ReducedObservation { obs_idx, y, c, r })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observed_channels_per_row() {
        let x = DMatrix::from_row_slice(
            3,
            3,
            &[1.0, f64::NAN, 3.0, f64::NAN, f64::NAN, f64::NAN, f64::INFINITY, 2.0, 0.0],
        );
        assert_eq!(observed_channels(&x, 0, MissingValue::NonFinite), vec![0, 2]);
        assert!(observed_channels(&x, 1, MissingValue::NonFinite).is_empty());
        assert_eq!(observed_channels(&x, 2, MissingValue::NonFinite), vec![1, 2]);
        assert_eq!(observed_channels(&x, 2, MissingValue::Nan), vec![0, 1, 2]);
    }

    #[test]
    fn test_reduce_observation_selects_rows_and_cols() {
        let c = DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]);
        let r = DMatrix::from_row_slice(3, 3, &[1.0, 0.1, 0.2, 0.1, 2.0, 0.3, 0.2, 0.3, 3.0]);
        let model = StateSpaceModel::new(
            c,
            DMatrix::from_row_slice(1, 1, &[0.1]),
            r,
            DMatrix::from_row_slice(1, 1, &[0.9]),
            DVector::from_row_slice(&[0.0]),
            DMatrix::from_row_slice(1, 1, &[1.0]),
        )
        .unwrap();

        let x = DMatrix::from_row_slice(2, 3, &[5.0, f64::NAN, 7.0, f64::NAN, f64::NAN, f64::NAN]);
        let red = reduce_observation(&model, &x, 0, MissingValue::NonFinite).unwrap();
        assert_eq!(red.obs_idx, vec![0, 2]);
        assert_eq!(red.y.as_slice(), &[5.0, 7.0]);
        assert_eq!(red.c.as_slice(), &[1.0, 3.0]);
        assert_eq!(red.r, DMatrix::from_row_slice(2, 2, &[1.0, 0.2, 0.2, 3.0]));

        assert!(reduce_observation(&model, &x, 1, MissingValue::NonFinite).is_none());
    }
}
