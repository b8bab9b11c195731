//! Scoring pipeline for stored and what-if customers

use crate::error::{DashboardError, Result};
use crate::feature_extractor::FeatureExtractor;
use crate::models::forest::ChurnModel;
use crate::models::scaler::FittedScaler;
use crate::types::customer::{CustomerRecord, FEATURE_COLUMNS, ID_COLUMN};
use crate::types::table::FeatureTable;
use tracing::debug;

/// Format a probability in [0, 1] as a percentage with two decimals.
pub fn format_probability(probability: f64) -> String {
    format!("{:.2}%", probability * 100.0)
}

/// Result of model inference for one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Probability of churn (class 1)
    pub probability: f64,
    /// Argmax of the class probabilities
    pub label: u8,
}

impl Prediction {
    fn from_proba([p0, p1]: [f64; 2]) -> Self {
        Self {
            probability: p1,
            label: u8::from(p1 > p0),
        }
    }

    pub fn percent(&self) -> String {
        format_probability(self.probability)
    }
}

/// A what-if record after encoding and scaling, with its prediction.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    /// The record exactly as the model consumed it.
    pub encoded: CustomerRecord,
    pub prediction: Prediction,
}

impl ScoredRecord {
    /// `(column, value)` pairs of the encoded record, identifier first.
    pub fn encoded_pairs(&self) -> Vec<(String, String)> {
        let value = serde_json::to_value(&self.encoded).unwrap_or_default();
        std::iter::once(ID_COLUMN)
            .chain(FEATURE_COLUMNS)
            .map(|column| {
                let rendered = match value.get(column) {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                (column.to_string(), rendered)
            })
            .collect()
    }
}

/// Scores records against the loaded model
pub struct InferenceEngine<'a> {
    model: &'a ChurnModel,
    scaler: &'a FittedScaler,
    extractor: &'a FeatureExtractor,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(
        model: &'a ChurnModel,
        scaler: &'a FittedScaler,
        extractor: &'a FeatureExtractor,
    ) -> Self {
        Self {
            model,
            scaler,
            extractor,
        }
    }

    /// Predict a stored row. Table rows are already in model-ready form.
    pub fn predict_row(&self, table: &FeatureTable, position: usize) -> Option<Prediction> {
        let record = table.row(position)?;
        Some(self.predict_encoded(record))
    }

    fn predict_encoded(&self, record: &CustomerRecord) -> Prediction {
        let features = self.extractor.extract(record);
        Prediction::from_proba(self.model.predict_proba(&features))
    }

    /// Encode, scale and score a record built from user input.
    pub fn score_new(&self, record: &CustomerRecord) -> Result<ScoredRecord> {
        record.validate()?;
        self.extractor
            .verify_model_schema(self.model.feature_names(), self.model.num_features())?;

        let encoded = self.scaler.transform_record(record);
        let prediction = self.predict_encoded(&encoded);
        if !prediction.probability.is_finite() {
            return Err(DashboardError::InvalidInput(format!(
                "record {} produced a non-finite score",
                record.customer_id
            )));
        }

        debug!(
            customer_id = %record.customer_id,
            probability = prediction.probability,
            label = prediction.label,
            "What-if record scored"
        );

        Ok(ScoredRecord {
            encoded,
            prediction,
        })
    }
}
