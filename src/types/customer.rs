//! Customer record and its closed-choice attribute domains

use crate::error::{DashboardError, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// Identifier column present in every feature table.
pub const ID_COLUMN: &str = "CustomerID";

/// Model feature columns, in training order.
pub const FEATURE_COLUMNS: [&str; 19] = [
    "Gender",
    "Senior Citizen",
    "Partner",
    "Dependents",
    "Tenure Months",
    "Phone Service",
    "Multiple Lines",
    "Internet Service",
    "Online Security",
    "Online Backup",
    "Device Protection",
    "Tech Support",
    "Streaming TV",
    "Streaming Movies",
    "Contract",
    "Paperless Billing",
    "Payment Method",
    "Monthly Charges",
    "Total Charges",
];

/// Columns transformed by the fitted scaler, in scaler order.
pub const NUMERIC_COLUMNS: [&str; 3] = ["Tenure Months", "Monthly Charges", "Total Charges"];

/// A closed set of labelled levels. The ordinal code of a level is its position.
pub trait Categorical: Sized + Copy + 'static {
    const NAME: &'static str;
    const LEVELS: &'static [&'static str];

    fn from_code(code: u64) -> Option<Self>;

    fn code(self) -> usize;

    fn label(self) -> &'static str {
        Self::LEVELS[self.code()]
    }

    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::LEVELS
            .iter()
            .position(|l| *l == label)
            .and_then(|code| Self::from_code(code as u64))
    }
}

/// Accepts either a level label or its ordinal code.
struct LevelVisitor<T>(PhantomData<T>);

impl<'de, T: Categorical> Visitor<'de> for LevelVisitor<T> {
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} as one of {:?} or its code", T::NAME, T::LEVELS)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<T, E> {
        if let Some(level) = T::from_label(v) {
            return Ok(level);
        }
        match v.trim().parse::<f64>() {
            Ok(code) => self.visit_f64(code),
            Err(_) => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<T, E> {
        T::from_code(v).ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<T, E> {
        u64::try_from(v)
            .ok()
            .and_then(T::from_code)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<T, E> {
        if v.fract() == 0.0 && v >= 0.0 {
            self.visit_u64(v as u64)
        } else {
            Err(E::invalid_value(de::Unexpected::Float(v), &self))
        }
    }
}

macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident = $display:literal { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl Categorical for $name {
            const NAME: &'static str = $display;
            const LEVELS: &'static [&'static str] = &[$($label),+];

            fn from_code(code: u64) -> Option<Self> {
                Self::ALL.get(usize::try_from(code).ok()?).copied()
            }

            fn code(self) -> usize {
                self as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
                s.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
                d.deserialize_any(LevelVisitor::<$name>(PhantomData))
            }
        }
    };
}

categorical! {
    Gender = "Gender" { Female => "Female", Male => "Male" }
}

categorical! {
    InternetService = "Internet Service" {
        No => "No",
        Dsl => "DSL",
        FiberOptic => "Fiber optic",
    }
}

categorical! {
    Contract = "Contract" {
        MonthToMonth => "Month-to-month",
        OneYear => "One year",
        TwoYear => "Two year",
    }
}

categorical! {
    PaymentMethod = "Payment Method" {
        ElectronicCheck => "Electronic check",
        MailedCheck => "Mailed check",
        BankTransfer => "Bank transfer (automatic)",
        CreditCard => "Credit card (automatic)",
    }
}

/// A Yes/No attribute. Encoded as 0/1 everywhere the model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum YesNo {
    #[default]
    No,
    Yes,
}

impl YesNo {
    pub const CHOICES: [&'static str; 2] = ["No", "Yes"];

    /// Map a UI choice onto the binary encoding: "Yes" is 1, anything else 0.
    pub fn from_choice(choice: &str) -> Self {
        if choice.trim() == "Yes" {
            YesNo::Yes
        } else {
            YesNo::No
        }
    }

    pub fn binary(self) -> u8 {
        match self {
            YesNo::No => 0,
            YesNo::Yes => 1,
        }
    }

    pub fn choice(self) -> &'static str {
        Self::CHOICES[self.binary() as usize]
    }
}

impl Serialize for YesNo {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u8(self.binary())
    }
}

struct YesNoVisitor;

impl<'de> Visitor<'de> for YesNoVisitor {
    type Value = YesNo;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Yes/No, 1/0 or true/false")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<YesNo, E> {
        Ok(if v { YesNo::Yes } else { YesNo::No })
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<YesNo, E> {
        match v {
            0 => Ok(YesNo::No),
            1 => Ok(YesNo::Yes),
            _ => Err(E::invalid_value(de::Unexpected::Unsigned(v), &self)),
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<YesNo, E> {
        match v {
            0 => Ok(YesNo::No),
            1 => Ok(YesNo::Yes),
            _ => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<YesNo, E> {
        if v == 0.0 {
            Ok(YesNo::No)
        } else if v == 1.0 {
            Ok(YesNo::Yes)
        } else {
            Err(E::invalid_value(de::Unexpected::Float(v), &self))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<YesNo, E> {
        let t = v.trim();
        if t == "Yes" || t == "1" || t.eq_ignore_ascii_case("true") {
            return Ok(YesNo::Yes);
        }
        if t == "No" || t == "0" || t.eq_ignore_ascii_case("false") {
            return Ok(YesNo::No);
        }
        match t.parse::<f64>() {
            Ok(f) => self.visit_f64(f),
            Err(_) => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
        }
    }
}

impl<'de> Deserialize<'de> for YesNo {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        d.deserialize_any(YesNoVisitor)
    }
}

/// One customer, with fields in model training order after the identifier.
///
/// Serializes to the encoded form: Yes/No fields as 0/1, multi-valued
/// categoricals as their label, numerics as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "Gender")]
    pub gender: Gender,
    #[serde(rename = "Senior Citizen")]
    pub senior_citizen: YesNo,
    #[serde(rename = "Partner")]
    pub partner: YesNo,
    #[serde(rename = "Dependents")]
    pub dependents: YesNo,
    #[serde(rename = "Tenure Months")]
    pub tenure_months: f64,
    #[serde(rename = "Phone Service")]
    pub phone_service: YesNo,
    #[serde(rename = "Multiple Lines")]
    pub multiple_lines: YesNo,
    #[serde(rename = "Internet Service")]
    pub internet_service: InternetService,
    #[serde(rename = "Online Security")]
    pub online_security: YesNo,
    #[serde(rename = "Online Backup")]
    pub online_backup: YesNo,
    #[serde(rename = "Device Protection")]
    pub device_protection: YesNo,
    #[serde(rename = "Tech Support")]
    pub tech_support: YesNo,
    #[serde(rename = "Streaming TV")]
    pub streaming_tv: YesNo,
    #[serde(rename = "Streaming Movies")]
    pub streaming_movies: YesNo,
    #[serde(rename = "Contract")]
    pub contract: Contract,
    #[serde(rename = "Paperless Billing")]
    pub paperless_billing: YesNo,
    #[serde(rename = "Payment Method")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "Monthly Charges")]
    pub monthly_charges: f64,
    #[serde(rename = "Total Charges")]
    pub total_charges: f64,
}

impl CustomerRecord {
    /// Reject records the model cannot score.
    pub fn validate(&self) -> Result<()> {
        if self.customer_id.trim().is_empty() {
            return Err(DashboardError::InvalidInput(
                "customer identifier is empty".to_string(),
            ));
        }
        for (column, value) in NUMERIC_COLUMNS.iter().zip(self.numeric_values()) {
            if !value.is_finite() {
                return Err(DashboardError::InvalidInput(format!(
                    "{} of customer {} is not a finite number",
                    column, self.customer_id
                )));
            }
        }
        Ok(())
    }

    /// Numeric fields in [`NUMERIC_COLUMNS`] order.
    pub fn numeric_values(&self) -> [f64; 3] {
        [self.tenure_months, self.monthly_charges, self.total_charges]
    }

    pub fn numeric_mut(&mut self, column: &str) -> Option<&mut f64> {
        match column {
            "Tenure Months" => Some(&mut self.tenure_months),
            "Monthly Charges" => Some(&mut self.monthly_charges),
            "Total Charges" => Some(&mut self.total_charges),
            _ => None,
        }
    }

    /// Human-readable value per feature, in [`FEATURE_COLUMNS`] order.
    pub fn display_values(&self) -> Vec<String> {
        let flag = |v: YesNo| v.binary().to_string();
        let num = |v: f64| format!("{:.3}", v);
        vec![
            self.gender.to_string(),
            flag(self.senior_citizen),
            flag(self.partner),
            flag(self.dependents),
            num(self.tenure_months),
            flag(self.phone_service),
            flag(self.multiple_lines),
            self.internet_service.to_string(),
            flag(self.online_security),
            flag(self.online_backup),
            flag(self.device_protection),
            flag(self.tech_support),
            flag(self.streaming_tv),
            flag(self.streaming_movies),
            self.contract.to_string(),
            flag(self.paperless_billing),
            self.payment_method.to_string(),
            num(self.monthly_charges),
            num(self.total_charges),
        ]
    }
}

#[cfg(test)]
pub(crate) fn sample_record() -> CustomerRecord {
    CustomerRecord {
        customer_id: "7590-VHVEG".to_string(),
        gender: Gender::Female,
        senior_citizen: YesNo::No,
        partner: YesNo::Yes,
        dependents: YesNo::No,
        tenure_months: 1.0,
        phone_service: YesNo::No,
        multiple_lines: YesNo::No,
        internet_service: InternetService::Dsl,
        online_security: YesNo::No,
        online_backup: YesNo::Yes,
        device_protection: YesNo::No,
        tech_support: YesNo::No,
        streaming_tv: YesNo::No,
        streaming_movies: YesNo::No,
        contract: Contract::MonthToMonth,
        paperless_billing: YesNo::Yes,
        payment_method: PaymentMethod::ElectronicCheck,
        monthly_charges: 29.85,
        total_charges: 29.85,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yes_no_encoding_is_total() {
        for choice in YesNo::CHOICES {
            let bit = YesNo::from_choice(choice).binary();
            assert!(bit == 0 || bit == 1);
            // Encoding the re-decoded choice gives the same bit.
            assert_eq!(YesNo::from_choice(YesNo::from_choice(choice).choice()).binary(), bit);
        }
        assert_eq!(YesNo::from_choice("Yes").binary(), 1);
        assert_eq!(YesNo::from_choice("No").binary(), 0);
    }

    #[test]
    fn test_categorical_codes_follow_level_order() {
        assert_eq!(InternetService::No.code(), 0);
        assert_eq!(InternetService::FiberOptic.code(), 2);
        assert_eq!(Contract::from_label("Two year"), Some(Contract::TwoYear));
        assert_eq!(PaymentMethod::from_code(3), Some(PaymentMethod::CreditCard));
        assert_eq!(PaymentMethod::from_code(4), None);
        for level in PaymentMethod::LEVELS {
            let parsed = PaymentMethod::from_label(level).unwrap();
            assert_eq!(parsed.label(), *level);
        }
    }

    #[test]
    fn test_record_serializes_encoded() {
        let record = sample_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Partner"], 1);
        assert_eq!(json["Senior Citizen"], 0);
        assert_eq!(json["Internet Service"], "DSL");
        assert_eq!(json["Payment Method"], "Electronic check");
    }

    #[test]
    fn test_record_deserializes_labels_and_codes() {
        let json = serde_json::json!({
            "CustomerID": "0001",
            "Gender": "Male",
            "Senior Citizen": "Yes",
            "Partner": 0,
            "Dependents": true,
            "Tenure Months": -0.5,
            "Phone Service": "1",
            "Multiple Lines": "No",
            "Internet Service": 2,
            "Online Security": 0,
            "Online Backup": 0,
            "Device Protection": 0,
            "Tech Support": 0,
            "Streaming TV": 1,
            "Streaming Movies": 1,
            "Contract": "One year",
            "Paperless Billing": 1,
            "Payment Method": "Mailed check",
            "Monthly Charges": 0.25,
            "Total Charges": 1.5
        });
        let record: CustomerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.senior_citizen, YesNo::Yes);
        assert_eq!(record.dependents, YesNo::Yes);
        assert_eq!(record.phone_service, YesNo::Yes);
        assert_eq!(record.internet_service, InternetService::FiberOptic);
        assert_eq!(record.contract, Contract::OneYear);
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let mut record = sample_record();
        assert!(record.validate().is_ok());
        record.total_charges = f64::NAN;
        assert!(matches!(
            record.validate(),
            Err(DashboardError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_display_values_cover_every_feature() {
        assert_eq!(sample_record().display_values().len(), FEATURE_COLUMNS.len());
    }
}
