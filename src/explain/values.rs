//! SHAP values container.
//!
//! One attribution per (row, feature), all rows of a table sharing a single
//! baseline. Values live in the model's raw (log-odds) output space.

/// Attributions for every row of one table.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplanationValues {
    /// Flat storage: [row][feature]
    values: Vec<f64>,
    n_rows: usize,
    n_features: usize,
    base_value: f64,
}

impl ExplanationValues {
    /// Create a zeroed container.
    pub fn new(n_rows: usize, n_features: usize, base_value: f64) -> Self {
        Self {
            values: vec![0.0; n_rows * n_features],
            n_rows,
            n_features,
            base_value,
        }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Expected model output over the training population.
    #[inline]
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Attributions of one row, in feature order.
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.n_features;
        &self.values[start..start + self.n_features]
    }

    pub(crate) fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let start = row * self.n_features;
        &mut self.values[start..start + self.n_features]
    }

    /// `base_value + sum(row)`, the reconstructed raw output.
    pub fn reconstructed(&self, row: usize) -> f64 {
        self.base_value + self.row(row).iter().sum::<f64>()
    }

    /// Mean absolute attribution per feature. All zeros for an empty table.
    pub fn mean_abs(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for row in 0..self.n_rows {
            for (total, v) in totals.iter_mut().zip(self.row(row)) {
                *total += v.abs();
            }
        }
        if self.n_rows > 0 {
            let n = self.n_rows as f64;
            totals.iter_mut().for_each(|t| *t /= n);
        }
        totals
    }

    /// Largest additivity deviation against `predictions` as `(row, |error|)`.
    ///
    /// Returns `None` for an empty table or a length mismatch.
    pub fn max_deviation(&self, predictions: &[f64]) -> Option<(usize, f64)> {
        if predictions.len() != self.n_rows {
            return None;
        }
        predictions
            .iter()
            .enumerate()
            .map(|(row, pred)| (row, (self.reconstructed(row) - pred).abs()))
            .fold(None, |worst, (row, err)| match worst {
                Some((_, w)) if w >= err => worst,
                _ => Some((row, err)),
            })
    }

    /// Verify that every row satisfies the sum property within `tolerance`.
    pub fn verify(&self, predictions: &[f64], tolerance: f64) -> bool {
        if predictions.len() != self.n_rows {
            return false;
        }
        self.max_deviation(predictions)
            .map_or(true, |(_, err)| err <= tolerance)
    }
}
