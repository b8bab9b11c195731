//! Feature extraction for churn model inference.
//!
//! Turns a typed customer record into the numeric vector the tree ensemble
//! was trained on. Yes/No fields become 0/1, multi-valued categoricals become
//! the ordinal code of their label, numerics pass through unchanged.

use crate::error::{DashboardError, Result};
use crate::types::customer::{Categorical, CustomerRecord, FEATURE_COLUMNS};
use crate::types::table::FeatureTable;

/// Feature extractor that transforms customer records into model input features.
///
/// Features are extracted in the exact order of [`FEATURE_COLUMNS`].
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract features from a record.
    pub fn extract(&self, r: &CustomerRecord) -> Vec<f64> {
        let flag = |v: crate::types::YesNo| v.binary() as f64;

        let mut features = Vec::with_capacity(FEATURE_COLUMNS.len());
        features.push(r.gender.code() as f64);
        features.push(flag(r.senior_citizen));
        features.push(flag(r.partner));
        features.push(flag(r.dependents));
        features.push(r.tenure_months);
        features.push(flag(r.phone_service));
        features.push(flag(r.multiple_lines));
        features.push(r.internet_service.code() as f64);
        features.push(flag(r.online_security));
        features.push(flag(r.online_backup));
        features.push(flag(r.device_protection));
        features.push(flag(r.tech_support));
        features.push(flag(r.streaming_tv));
        features.push(flag(r.streaming_movies));
        features.push(r.contract.code() as f64);
        features.push(flag(r.paperless_billing));
        features.push(r.payment_method.code() as f64);
        features.push(r.monthly_charges);
        features.push(r.total_charges);
        features
    }

    /// Extract every row of a table, preserving row order.
    pub fn extract_table(&self, table: &FeatureTable) -> Vec<Vec<f64>> {
        table.records().iter().map(|r| self.extract(r)).collect()
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COLUMNS.len()
    }

    /// Get feature names in extraction order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        FEATURE_COLUMNS.to_vec()
    }

    /// Check that the model was trained on exactly these columns, in this order.
    ///
    /// A model without stored feature names is only checked by width.
    pub fn verify_model_schema(&self, model_features: &[String], model_width: usize) -> Result<()> {
        if model_width != self.feature_count() {
            return Err(DashboardError::schema(
                "model",
                format!(
                    "model expects {} features, records provide {}",
                    model_width,
                    self.feature_count()
                ),
            ));
        }
        if model_features.is_empty() {
            return Ok(());
        }
        for (position, (expected, found)) in FEATURE_COLUMNS.iter().zip(model_features).enumerate() {
            if expected != found {
                return Err(DashboardError::schema(
                    "model",
                    format!(
                        "feature {} is '{}' in the model but '{}' in the record schema",
                        position, found, expected
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::customer::sample_record;

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::new();
        let record = sample_record();

        let features = extractor.extract(&record);

        assert_eq!(features.len(), extractor.feature_count());
        assert_eq!(features[0], 0.0); // Female
        assert_eq!(features[2], 1.0); // Partner: Yes
        assert_eq!(features[4], 1.0); // tenure
        assert_eq!(features[7], 1.0); // DSL
        assert_eq!(features[16], 0.0); // Electronic check
        assert_eq!(features[18], 29.85);
    }

    #[test]
    fn test_feature_count() {
        let extractor = FeatureExtractor::new();
        assert_eq!(extractor.feature_count(), 19);
        assert_eq!(extractor.feature_names().len(), 19);
    }

    #[test]
    fn test_schema_order_enforced() {
        let extractor = FeatureExtractor::new();
        let mut names: Vec<String> = FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect();
        assert!(extractor.verify_model_schema(&names, 19).is_ok());
        assert!(extractor.verify_model_schema(&[], 19).is_ok());

        names.swap(0, 1);
        assert!(matches!(
            extractor.verify_model_schema(&names, 19),
            Err(DashboardError::SchemaMismatch { .. })
        ));
        assert!(extractor.verify_model_schema(&[], 20).is_err());
    }
}
