//! Contiguous per-time-step storage.
//!
//! A [`History`] holds `len` equally shaped slots (`rows x cols`) in a single
//! flat buffer, each slot column-major like nalgebra's own storage. Means
//! use `r x 1` slots and covariances `r x r` slots.

use nalgebra::{DMatrix, DMatrixView, DVector};

/// Time-indexed arena of fixed-shape matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    len: usize,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl History {
    /// Zero-filled history with `len` slots of shape `rows x cols`.
    pub fn zeros(len: usize, rows: usize, cols: usize) -> Self {
        Self { len, rows, cols, data: vec![0.0; len * rows * cols] }
    }

    /// Number of time slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the history has no slots.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot shape `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    fn stride(&self) -> usize {
        self.rows * self.cols
    }

    /// Raw column-major values of slot `t`.
    pub fn slot(&self, t: usize) -> &[f64] {
        let s = self.stride();
        &self.data[t * s..(t + 1) * s]
    }

    /// Borrowed matrix view of slot `t`.
    pub fn view(&self, t: usize) -> DMatrixView<'_, f64> {
        DMatrixView::from_slice(self.slot(t), self.rows, self.cols)
    }

    /// Owned copy of slot `t`.
    pub fn matrix(&self, t: usize) -> DMatrix<f64> {
        DMatrix::from_column_slice(self.rows, self.cols, self.slot(t))
    }

    /// Owned copy of slot `t` as a vector (for `r x 1` histories).
    pub fn vector(&self, t: usize) -> DVector<f64> {
        debug_assert_eq!(self.cols, 1);
        DVector::from_column_slice(self.slot(t))
    }

    /// Overwrite slot `t` with column-major `values`.
    pub fn set_slot(&mut self, t: usize, values: &[f64]) {
        let s = self.stride();
        assert_eq!(values.len(), s, "slot size mismatch");
        self.data[t * s..(t + 1) * s].copy_from_slice(values);
    }

    /// Overwrite slot `t` with a matrix of the slot shape.
    pub fn set(&mut self, t: usize, m: &DMatrix<f64>) {
        debug_assert_eq!(m.shape(), (self.rows, self.cols));
        self.set_slot(t, m.as_slice());
    }

    /// Overwrite slot `t` with a vector (for `r x 1` histories).
    pub fn set_vector(&mut self, t: usize, v: &DVector<f64>) {
        debug_assert_eq!((v.len(), 1), (self.rows, self.cols));
        self.set_slot(t, v.as_slice());
    }

    /// Iterate over slot views in time order.
    pub fn iter(&self) -> impl Iterator<Item = DMatrixView<'_, f64>> + '_ {
        (0..self.len).map(move |t| self.view(t))
    }

    /// The whole flat buffer (`len * rows * cols` values).
    pub fn as_flat(&self) -> &[f64] {
        &self.data
    }
}
