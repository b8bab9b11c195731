//! Presentation layer
//!
//! Three mutually exclusive view modes, each built from scratch on every
//! request against the cached, read-only session. Nothing carries over
//! between modes.

pub mod charts;
pub mod form;
pub mod page;

use crate::config::AppConfig;
use crate::error::{DashboardError, Result};
use crate::explain::{FeatureImportance, ImportanceAggregator};
use crate::models::inference::{InferenceEngine, Prediction, ScoredRecord};
use crate::models::loader::ReferenceStats;
use crate::session::SessionCache;
use crate::types::customer::FEATURE_COLUMNS;
use charts::RecordAttribution;
use form::FutureCustomerForm;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dashboard view mode, selected explicitly by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViewMode {
    #[default]
    #[serde(rename = "feature-importance")]
    FeatureImportance,
    #[serde(rename = "customer")]
    CustomerExplanation,
    #[serde(rename = "future")]
    FuturePrediction,
}

impl ViewMode {
    pub const ALL: [ViewMode; 3] = [
        ViewMode::FeatureImportance,
        ViewMode::CustomerExplanation,
        ViewMode::FuturePrediction,
    ];

    /// Query-string value.
    pub fn slug(self) -> &'static str {
        match self {
            ViewMode::FeatureImportance => "feature-importance",
            ViewMode::CustomerExplanation => "customer",
            ViewMode::FuturePrediction => "future",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.slug() == slug.trim())
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::FeatureImportance => "Feature Importance",
            ViewMode::CustomerExplanation => "Current customer & user-based SHAP",
            ViewMode::FuturePrediction => "Future customer prediction",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone)]
pub struct ImportanceView {
    pub ranked: Vec<FeatureImportance>,
    pub chart: String,
}

#[derive(Debug, Clone)]
pub struct CustomerView {
    pub customer_id: String,
    pub position: usize,
    pub actual: u8,
    pub prediction: Prediction,
    pub decision_chart: String,
    pub waterfall_chart: String,
}

#[derive(Debug, Clone)]
pub struct FutureView {
    pub form: FutureCustomerForm,
    pub bounds: ReferenceStats,
    /// Present only after an explicit confirmation.
    pub result: Option<ScoredRecord>,
}

#[derive(Debug, Clone)]
pub enum View {
    Importance(ImportanceView),
    Customer(CustomerView),
    Future(FutureView),
}

/// A fully built page, ready for [`page::render`].
#[derive(Debug, Clone)]
pub struct Page {
    pub mode: ViewMode,
    /// Test table identifiers, for the customer selector.
    pub customer_ids: Vec<String>,
    pub view: View,
}

/// One user interaction.
#[derive(Debug, Clone, Default)]
pub struct ViewRequest {
    pub mode: ViewMode,
    pub customer_id: Option<String>,
    /// Confirmed form submission.
    pub confirmed: Option<FutureCustomerForm>,
}

/// Builds views against the session cache.
pub struct Dashboard<'a> {
    cache: &'a SessionCache,
    config: &'a AppConfig,
}

impl<'a> Dashboard<'a> {
    pub fn new(cache: &'a SessionCache, config: &'a AppConfig) -> Self {
        Self { cache, config }
    }

    /// Build the page for `request`. Any failure aborts the whole render pass.
    pub fn build(&self, request: &ViewRequest) -> Result<Page> {
        let session = self.cache.session(&self.config.artifacts)?;
        let customer_ids = session
            .artifacts
            .x_test
            .ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        let view = match request.mode {
            ViewMode::FeatureImportance => View::Importance(self.feature_importance()?),
            ViewMode::CustomerExplanation => {
                View::Customer(self.customer(request.customer_id.as_deref())?)
            }
            ViewMode::FuturePrediction => View::Future(self.future(request.confirmed.as_ref())?),
        };
        Ok(Page {
            mode: request.mode,
            customer_ids,
            view,
        })
    }

    /// Ranked mean |SHAP| over the training table.
    pub fn feature_importance(&self) -> Result<ImportanceView> {
        let session = self.cache.session(&self.config.artifacts)?;
        let explanations = self.cache.explanations(&session, &self.config.explanation)?;
        let ranked = ImportanceAggregator::new(feature_names()).rank(&explanations.train);
        let chart = charts::importance_bar_chart(&ranked);
        Ok(ImportanceView { ranked, chart })
    }

    /// Explanation of one test customer; the first identifier when none is given.
    pub fn customer(&self, customer_id: Option<&str>) -> Result<CustomerView> {
        let session = self.cache.session(&self.config.artifacts)?;
        let artifacts = &session.artifacts;
        let customer_id = match customer_id {
            Some(id) => id.to_string(),
            None => artifacts
                .x_test
                .row(0)
                .map(|r| r.customer_id.clone())
                .ok_or_else(|| DashboardError::UnknownCustomer("(test table is empty)".into()))?,
        };
        let position = artifacts
            .x_test
            .position_of(&customer_id)
            .ok_or_else(|| DashboardError::UnknownCustomer(customer_id.clone()))?;

        let explanations = self.cache.explanations(&session, &self.config.explanation)?;
        let engine = InferenceEngine::new(&artifacts.model, &artifacts.scaler, self.cache.extractor());
        let prediction = engine
            .predict_row(&artifacts.x_test, position)
            .ok_or_else(|| DashboardError::UnknownCustomer(customer_id.clone()))?;
        let actual = artifacts
            .y_test
            .get(position)
            .ok_or_else(|| DashboardError::schema("y_test", format!("no label at row {}", position)))?;

        let names = feature_names();
        let display_values = artifacts
            .x_test
            .row(position)
            .map(|r| r.display_values())
            .unwrap_or_default();
        let record = RecordAttribution {
            baseline: explanations.baseline,
            phi: explanations.test.row(position),
            names: &names,
            display_values: &display_values,
        };

        Ok(CustomerView {
            customer_id,
            position,
            actual,
            prediction,
            decision_chart: charts::decision_plot(&record),
            waterfall_chart: charts::waterfall_plot(
                &record,
                self.config.explanation.waterfall_max_display,
            ),
        })
    }

    /// The what-if form, scored only when `confirmed` carries a submission.
    pub fn future(&self, confirmed: Option<&FutureCustomerForm>) -> Result<FutureView> {
        let session = self.cache.session(&self.config.artifacts)?;
        let artifacts = &session.artifacts;
        let bounds = artifacts.reference;

        let Some(form) = confirmed else {
            return Ok(FutureView {
                form: FutureCustomerForm::defaults(),
                bounds,
                result: None,
            });
        };

        let record = form.to_record(&bounds, &self.config.prediction.placeholder_customer_id)?;
        let engine = InferenceEngine::new(&artifacts.model, &artifacts.scaler, self.cache.extractor());
        let scored = engine.score_new(&record)?;
        Ok(FutureView {
            form: form.clone(),
            bounds,
            result: Some(scored),
        })
    }
}

fn feature_names() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_slugs_round_trip_through_serde() {
        for mode in ViewMode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.slug()));
            let back: ViewMode = serde_json::from_str(&json).unwrap();
            assert_eq!(back, mode);
        }
        assert_eq!(ViewMode::default(), ViewMode::FeatureImportance);
        assert_eq!(ViewMode::from_slug("future"), Some(ViewMode::FuturePrediction));
        assert_eq!(ViewMode::from_slug("Feature Importance"), None);
    }
}
