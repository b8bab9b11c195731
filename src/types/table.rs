//! Positionally indexed feature and label tables

use super::customer::CustomerRecord;
use crate::error::{DashboardError, Result};

/// An ordered, gap-free collection of customer records.
///
/// The position of a record is the join key into the label table and the
/// explanation values computed for this table.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    name: String,
    records: Vec<CustomerRecord>,
}

impl FeatureTable {
    pub fn new(name: impl Into<String>, records: Vec<CustomerRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }

    pub fn row(&self, position: usize) -> Option<&CustomerRecord> {
        self.records.get(position)
    }

    /// Identifiers in table order, duplicates included.
    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.customer_id.as_str()).collect()
    }

    /// Position of the first record carrying `customer_id`.
    pub fn position_of(&self, customer_id: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.customer_id == customer_id)
    }
}

/// One binary outcome per row of the matching feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    column: String,
    values: Vec<u8>,
}

impl LabelTable {
    pub fn new(column: impl Into<String>, values: Vec<u8>) -> Self {
        Self {
            column: column.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<u8> {
        self.values.get(position).copied()
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    /// Enforce the positional alignment with `features`.
    pub fn ensure_aligned(&self, features: &FeatureTable, artifact: &str) -> Result<()> {
        if self.len() != features.len() {
            return Err(DashboardError::schema(
                artifact,
                format!(
                    "{} '{}' labels for {} rows of {}",
                    self.len(),
                    self.column,
                    features.len(),
                    features.name()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::customer::sample_record;

    fn table(ids: &[&str]) -> FeatureTable {
        let records = ids
            .iter()
            .map(|id| CustomerRecord {
                customer_id: id.to_string(),
                ..sample_record()
            })
            .collect();
        FeatureTable::new("X_test", records)
    }

    #[test]
    fn test_position_uses_first_match() {
        let table = table(&["a", "b", "a", "c"]);
        assert_eq!(table.position_of("a"), Some(0));
        assert_eq!(table.position_of("c"), Some(3));
        assert_eq!(table.position_of("zzz"), None);
        assert_eq!(table.ids(), vec!["a", "b", "a", "c"]);
    }

    #[test]
    fn test_label_alignment() {
        let features = table(&["a", "b"]);
        assert!(LabelTable::new("Churn", vec![0, 1])
            .ensure_aligned(&features, "y_test")
            .is_ok());
        let err = LabelTable::new("Churn", vec![0])
            .ensure_aligned(&features, "y_test")
            .unwrap_err();
        assert!(matches!(err, DashboardError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("1 'Churn' labels for 2 rows"), "{}", err);
    }
}
