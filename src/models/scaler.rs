//! Fitted numeric scaler
//!
//! The scaler is fitted at training time and persisted as JSON; here it is
//! only read and applied to the three numeric fields of a record.

use crate::error::{DashboardError, Result};
use crate::types::customer::{CustomerRecord, NUMERIC_COLUMNS};
use serde::{Deserialize, Serialize};

/// Type of scaler that produced the parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling onto `feature_range`: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
    /// Max absolute scaling: x / max(|x|)
    MaxAbs,
}

fn default_feature_range() -> [f64; 2] {
    [0.0, 1.0]
}

/// Immutable fitted scaler over [`NUMERIC_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    pub scaler_type: ScalerType,
    pub columns: Vec<String>,
    /// Mean, min, median or 0 depending on `scaler_type`.
    pub center: Vec<f64>,
    /// Std, range, IQR or max |x|.
    pub scale: Vec<f64>,
    #[serde(default = "default_feature_range")]
    pub feature_range: [f64; 2],
}

impl FittedScaler {
    /// Check that the scaler covers exactly the numeric columns, in order.
    pub fn validate(&self) -> Result<()> {
        if self.columns.len() != NUMERIC_COLUMNS.len()
            || self.columns.iter().zip(NUMERIC_COLUMNS).any(|(a, b)| a != b)
        {
            return Err(DashboardError::schema(
                "scaler",
                format!(
                    "scaler columns {:?} don't match {:?}",
                    self.columns, NUMERIC_COLUMNS
                ),
            ));
        }
        if self.center.len() != self.columns.len() || self.scale.len() != self.columns.len() {
            return Err(DashboardError::schema(
                "scaler",
                format!(
                    "{} columns but {} centers and {} scales",
                    self.columns.len(),
                    self.center.len(),
                    self.scale.len()
                ),
            ));
        }
        if let Some(i) = self.scale.iter().position(|s| !s.is_finite() || *s == 0.0) {
            return Err(DashboardError::schema(
                "scaler",
                format!("scale of '{}' is {}", self.columns[i], self.scale[i]),
            ));
        }
        if !(self.feature_range[0] < self.feature_range[1]) {
            return Err(DashboardError::schema(
                "scaler",
                format!("feature_range {:?} is empty", self.feature_range),
            ));
        }
        Ok(())
    }

    /// Scale a single value of column `idx`.
    pub fn scale_value(&self, idx: usize, value: f64) -> f64 {
        let unit = (value - self.center[idx]) / self.scale[idx];
        match self.scaler_type {
            ScalerType::MinMax => {
                let [lo, hi] = self.feature_range;
                unit * (hi - lo) + lo
            }
            _ => unit,
        }
    }

    /// Return a copy of `record` with its numeric fields scaled.
    pub fn transform_record(&self, record: &CustomerRecord) -> CustomerRecord {
        let mut scaled = record.clone();
        for (idx, column) in self.columns.iter().enumerate() {
            if let Some(value) = scaled.numeric_mut(column) {
                *value = self.scale_value(idx, *value);
            }
        }
        scaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::customer::sample_record;
    use approx::assert_relative_eq;

    fn scaler(scaler_type: ScalerType) -> FittedScaler {
        FittedScaler {
            scaler_type,
            columns: NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect(),
            center: vec![32.0, 64.0, 2280.0],
            scale: vec![24.5, 30.0, 2266.0],
            feature_range: [0.0, 1.0],
        }
    }

    #[test]
    fn test_standard_transform() {
        let s = scaler(ScalerType::Standard);
        s.validate().unwrap();
        let scaled = s.transform_record(&sample_record());
        assert_relative_eq!(scaled.tenure_months, (1.0 - 32.0) / 24.5);
        assert_relative_eq!(scaled.monthly_charges, (29.85 - 64.0) / 30.0);
        assert_eq!(scaled.customer_id, "7590-VHVEG");
    }

    #[test]
    fn test_min_max_feature_range() {
        let mut s = scaler(ScalerType::MinMax);
        s.center = vec![0.0, 0.0, 0.0];
        s.scale = vec![72.0, 120.0, 9000.0];
        s.feature_range = [-1.0, 1.0];
        assert_relative_eq!(s.scale_value(0, 36.0), 0.0);
        assert_relative_eq!(s.scale_value(0, 72.0), 1.0);
        assert_relative_eq!(s.scale_value(0, 0.0), -1.0);
    }

    #[test]
    fn test_rejects_wrong_columns() {
        let mut s = scaler(ScalerType::Robust);
        s.columns.swap(0, 1);
        assert!(matches!(s.validate(), Err(DashboardError::SchemaMismatch { .. })));

        let mut s = scaler(ScalerType::MaxAbs);
        s.scale[2] = 0.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_parse_json() {
        let s: FittedScaler = serde_json::from_str(
            r#"{"scaler_type": "min_max", "columns": ["Tenure Months", "Monthly Charges", "Total Charges"],
                "center": [0, 18.25, 0], "scale": [72, 100.5, 8684.8]}"#,
        )
        .unwrap();
        assert_eq!(s.scaler_type, ScalerType::MinMax);
        assert_eq!(s.feature_range, [0.0, 1.0]);
        assert!(s.validate().is_ok());
    }
}
