//! What-if customer form
//!
//! 19 fields: 16 closed choices and 3 bounded numerics. Bounds are
//! `[0, max]` with the maxima taken from the reference dataset.

use crate::error::{DashboardError, Result};
use crate::models::loader::ReferenceStats;
use crate::types::customer::{
    Categorical, Contract, CustomerRecord, Gender, InternetService, PaymentMethod, YesNo, ID_COLUMN,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// One of a fixed list of labels. Yes/No choices encode to 0/1.
    Choice(&'static [&'static str]),
    /// Whole number in `[0, max]`, step 1.
    Integer,
    /// Decimal in `[0, max]`, step 0.01.
    Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct FormField {
    /// HTML input name.
    pub name: &'static str,
    /// Record column the value lands in.
    pub column: &'static str,
    /// Prompt shown next to the input.
    pub label: &'static str,
    pub kind: FieldKind,
}

const YES_NO: FieldKind = FieldKind::Choice(&YesNo::CHOICES);

const fn field(name: &'static str, column: &'static str, label: &'static str, kind: FieldKind) -> FormField {
    FormField {
        name,
        column,
        label,
        kind,
    }
}

/// Form fields in record column order.
pub const FORM_FIELDS: [FormField; 19] = [
    field("gender", "Gender", "Gender:", FieldKind::Choice(Gender::LEVELS)),
    field("senior_citizen", "Senior Citizen", "SeniorCitizen", YES_NO),
    field("partner", "Partner", "Partner:", YES_NO),
    field("dependents", "Dependents", "Dependents:", YES_NO),
    field("tenure_months", "Tenure Months", "TenureMonths:", FieldKind::Integer),
    field("phone_service", "Phone Service", "PhoneService:", YES_NO),
    field("multiple_lines", "Multiple Lines", "MultipleLines:", YES_NO),
    field(
        "internet_service",
        "Internet Service",
        "InternetService:",
        FieldKind::Choice(InternetService::LEVELS),
    ),
    field("online_security", "Online Security", "OnlineSecurity:", YES_NO),
    field("online_backup", "Online Backup", "OnlineBackup:", YES_NO),
    field("device_protection", "Device Protection", "DeviceProtection:", YES_NO),
    field("tech_support", "Tech Support", "TechSupport:", YES_NO),
    field("streaming_tv", "Streaming TV", "StreamingTV:", YES_NO),
    field("streaming_movies", "Streaming Movies", "StreamingMovies:", YES_NO),
    field("contract", "Contract", "Contract:", FieldKind::Choice(Contract::LEVELS)),
    field("paperless_billing", "Paperless Billing", "PaperlessBilling", YES_NO),
    field(
        "payment_method",
        "Payment Method",
        "PaymentMethod:",
        FieldKind::Choice(PaymentMethod::LEVELS),
    ),
    field("monthly_charges", "Monthly Charges", "Monthly Charges", FieldKind::Decimal),
    field("total_charges", "Total Charges", "Total Charges", FieldKind::Decimal),
];

/// Upper bound of a numeric column; `None` for non-numeric columns.
pub fn upper_bound(bounds: &ReferenceStats, column: &str) -> Option<f64> {
    match column {
        "Tenure Months" => Some(bounds.max_tenure.floor()),
        "Monthly Charges" => Some(bounds.max_monthly_charges),
        "Total Charges" => Some(bounds.max_total_charges),
        _ => None,
    }
}

/// Raw submitted values keyed by input name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FutureCustomerForm {
    values: HashMap<String, String>,
}

impl FutureCustomerForm {
    /// Every choice at its first option and every numeric at 0.
    pub fn defaults() -> Self {
        let values = FORM_FIELDS
            .iter()
            .map(|f| {
                let value = match f.kind {
                    FieldKind::Choice(options) => options[0].to_string(),
                    FieldKind::Integer => "0".to_string(),
                    FieldKind::Decimal => "0.00".to_string(),
                };
                (f.name.to_string(), value)
            })
            .collect();
        Self { values }
    }

    pub fn from_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Validate every field and build the record, Yes/No choices encoded to 0/1.
    pub fn to_record(&self, bounds: &ReferenceStats, customer_id: &str) -> Result<CustomerRecord> {
        let mut row = Map::new();
        row.insert(ID_COLUMN.to_string(), Value::from(customer_id));

        for f in &FORM_FIELDS {
            let raw = self
                .value(f.name)
                .map(str::trim)
                .ok_or_else(|| DashboardError::InvalidInput(format!("missing field '{}'", f.name)))?;
            let value = match f.kind {
                FieldKind::Choice(options) => {
                    if !options.contains(&raw) {
                        return Err(DashboardError::InvalidInput(format!(
                            "{} must be one of {:?}, got '{}'",
                            f.column, options, raw
                        )));
                    }
                    if options == YesNo::CHOICES.as_slice() {
                        Value::from(YesNo::from_choice(raw).binary())
                    } else {
                        Value::from(raw)
                    }
                }
                FieldKind::Integer | FieldKind::Decimal => {
                    Value::from(parse_bounded(f, raw, bounds)?)
                }
            };
            row.insert(f.column.to_string(), value);
        }

        let record: CustomerRecord = serde_json::from_value(Value::Object(row))
            .map_err(|e| DashboardError::InvalidInput(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }
}

fn parse_bounded(f: &FormField, raw: &str, bounds: &ReferenceStats) -> Result<f64> {
    let value: f64 = raw
        .parse()
        .map_err(|_| DashboardError::InvalidInput(format!("{} is not a number: '{}'", f.column, raw)))?;
    let max = upper_bound(bounds, f.column).unwrap_or(f64::INFINITY);
    if !value.is_finite() || value < 0.0 || value > max {
        return Err(DashboardError::InvalidInput(format!(
            "{} must be within [0, {}], got {}",
            f.column, max, raw
        )));
    }
    if f.kind == FieldKind::Integer && value.fract() != 0.0 {
        return Err(DashboardError::InvalidInput(format!(
            "{} must be a whole number, got {}",
            f.column, raw
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::customer::FEATURE_COLUMNS;

    fn bounds() -> ReferenceStats {
        ReferenceStats {
            rows: 10,
            max_tenure: 72.0,
            max_monthly_charges: 118.75,
            max_total_charges: 8684.8,
        }
    }

    #[test]
    fn test_fields_follow_column_order() {
        let columns: Vec<&str> = FORM_FIELDS.iter().map(|f| f.column).collect();
        assert_eq!(columns, FEATURE_COLUMNS.to_vec());
        let choices = FORM_FIELDS
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Choice(_)))
            .count();
        assert_eq!(choices, 16);
    }

    #[test]
    fn test_defaults_build_minimum_record() {
        let record = FutureCustomerForm::defaults()
            .to_record(&bounds(), "6464-UIAEA")
            .unwrap();
        assert_eq!(record.customer_id, "6464-UIAEA");
        assert_eq!(record.gender, Gender::Female);
        assert_eq!(record.senior_citizen, YesNo::No);
        assert_eq!(record.internet_service, InternetService::No);
        assert_eq!(record.numeric_values(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut form = FutureCustomerForm::defaults();
        form.values.insert("tenure_months".into(), "73".into());
        assert!(matches!(
            form.to_record(&bounds(), "x"),
            Err(DashboardError::InvalidInput(_))
        ));

        form.values.insert("tenure_months".into(), "12.5".into());
        assert!(form.to_record(&bounds(), "x").is_err());

        form.values.insert("tenure_months".into(), "72".into());
        form.values.insert("monthly_charges".into(), "-0.01".into());
        assert!(form.to_record(&bounds(), "x").is_err());
    }

    #[test]
    fn test_closed_choices() {
        let mut form = FutureCustomerForm::defaults();
        form.values.insert("partner".into(), "Yes".into());
        form.values.insert("contract".into(), "Two year".into());
        let record = form.to_record(&bounds(), "x").unwrap();
        assert_eq!(record.partner, YesNo::Yes);
        assert_eq!(record.contract, Contract::TwoYear);

        form.values.insert("partner".into(), "Maybe".into());
        assert!(form.to_record(&bounds(), "x").is_err());

        form.values.remove("partner");
        assert!(form.to_record(&bounds(), "x").is_err());
    }
}
