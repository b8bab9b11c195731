//! Explanation engine
//!
//! Computes TreeSHAP attributions for every row of the training and test
//! tables, sharing one baseline.

pub mod importance;
pub mod tree_shap;
pub mod values;

pub use importance::{FeatureImportance, ImportanceAggregator};
pub use tree_shap::TreeExplainer;
pub use values::ExplanationValues;

use crate::config::ExplanationConfig;
use crate::error::Result;
use crate::feature_extractor::FeatureExtractor;
use crate::models::forest::ChurnModel;
use crate::types::table::FeatureTable;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Attributions for both tables.
#[derive(Debug, Clone)]
pub struct Explanations {
    pub baseline: f64,
    pub train: ExplanationValues,
    pub test: ExplanationValues,
    pub elapsed: Duration,
}

/// `Explain(model, train, test) -> (baseline, train attributions, test attributions)`.
pub fn explain(
    model: &ChurnModel,
    extractor: &FeatureExtractor,
    train: &FeatureTable,
    test: &FeatureTable,
    config: &ExplanationConfig,
) -> Result<Explanations> {
    let start = Instant::now();
    let explainer = TreeExplainer::new(model)?;

    let train_rows = extractor.extract_table(train);
    let test_rows = extractor.extract_table(test);
    let train_values = explainer.shap_values(&train_rows);
    let test_values = explainer.shap_values(&test_rows);

    if config.verify_additivity {
        for (name, rows, values) in [
            (train.name(), &train_rows, &train_values),
            (test.name(), &test_rows, &test_values),
        ] {
            check_additivity(model, name, rows, values, config.additivity_tolerance);
        }
    }

    let elapsed = start.elapsed();
    info!(
        baseline = explainer.base_value(),
        train_rows = train_values.n_rows(),
        test_rows = test_values.n_rows(),
        trees = model.num_trees(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Explanations computed"
    );

    Ok(Explanations {
        baseline: explainer.base_value(),
        train: train_values,
        test: test_values,
        elapsed,
    })
}

fn check_additivity(
    model: &ChurnModel,
    table: &str,
    rows: &[Vec<f64>],
    values: &ExplanationValues,
    tolerance: f64,
) {
    let raw: Vec<f64> = rows.iter().map(|r| model.predict_raw(r)).collect();
    if let Some((row, err)) = values.max_deviation(&raw) {
        if err > tolerance {
            warn!(
                table = table,
                row = row,
                deviation = err,
                tolerance = tolerance,
                "Attributions don't add up to the model output"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forest::tree_from_nodes;
    use crate::types::customer::{sample_record, YesNo, FEATURE_COLUMNS};
    use crate::types::CustomerRecord;

    fn model() -> ChurnModel {
        // Contract (14) then Tenure Months (4)
        let tree = tree_from_nodes(&[
            (1, 2, 14, 0.5, 0.0, 50.0),
            (3, 4, 4, 12.5, 0.0, 30.0),
            (-1, -1, 0, 0.0, 0.9, 20.0),
            (-1, -1, 0, 0.0, 0.6, 12.0),
            (-1, -1, 0, 0.0, -0.1, 18.0),
        ], FEATURE_COLUMNS.len())
        .unwrap();
        let names = FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect();
        ChurnModel::from_trees(vec![tree], 0.0, names)
    }

    fn table(name: &str, tenures: &[f64]) -> FeatureTable {
        let records = tenures
            .iter()
            .enumerate()
            .map(|(i, &t)| CustomerRecord {
                customer_id: format!("{}-{}", name, i),
                tenure_months: t,
                partner: if i % 2 == 0 { YesNo::Yes } else { YesNo::No },
                ..sample_record()
            })
            .collect();
        FeatureTable::new(name, records)
    }

    #[test]
    fn test_explain_tables() {
        let model = model();
        let train = table("X_train", &[1.0, 24.0, 60.0]);
        let test = table("X_test", &[5.0, 13.0]);
        let explanations = explain(
            &model,
            &FeatureExtractor::new(),
            &train,
            &test,
            &ExplanationConfig::default(),
        )
        .unwrap();

        assert_eq!(explanations.train.n_rows(), 3);
        assert_eq!(explanations.test.n_rows(), 2);
        assert_eq!(explanations.train.base_value(), explanations.baseline);
        let extractor = FeatureExtractor::new();
        for (i, record) in test.records().iter().enumerate() {
            let raw = model.predict_raw(&extractor.extract(record));
            assert!((explanations.test.reconstructed(i) - raw).abs() < 1e-9);
        }
        // Features the tree never splits on get nothing.
        assert_eq!(explanations.train.row(0)[2], 0.0);
    }
}
