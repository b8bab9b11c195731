//! Global feature importance from per-row attributions

use super::values::ExplanationValues;

/// One bar of the importance chart.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureImportance {
    pub feature: String,
    /// Mean |SHAP| over the table.
    pub value: f64,
}

/// Aggregates per-row attributions into a ranked global importance.
pub struct ImportanceAggregator {
    feature_names: Vec<String>,
}

impl ImportanceAggregator {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self { feature_names }
    }

    /// Mean absolute attribution per feature, highest first.
    ///
    /// Ties keep feature order, so every feature gets exactly one entry.
    pub fn rank(&self, values: &ExplanationValues) -> Vec<FeatureImportance> {
        let mut ranked: Vec<FeatureImportance> = self
            .feature_names
            .iter()
            .zip(values.mean_abs())
            .map(|(feature, value)| FeatureImportance {
                feature: feature.clone(),
                value,
            })
            .collect();
        ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_orders_by_mean_abs() {
        let mut values = ExplanationValues::new(2, 3, 0.0);
        values.row_mut(0).copy_from_slice(&[0.1, -2.0, 0.0]);
        values.row_mut(1).copy_from_slice(&[0.3, 1.0, 0.0]);

        let aggregator =
            ImportanceAggregator::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let ranked = aggregator.rank(&values);

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].feature, "b");
        assert!((ranked[0].value - 1.5).abs() < 1e-12);
        assert_eq!(ranked[1].feature, "a");
        assert_eq!(ranked[2].value, 0.0);
    }
}
