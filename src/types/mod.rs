//! Type definitions for the churn dashboard

pub mod customer;
pub mod table;

pub use customer::{
    Categorical, Contract, CustomerRecord, Gender, InternetService, PaymentMethod, YesNo,
    FEATURE_COLUMNS, ID_COLUMN, NUMERIC_COLUMNS,
};
pub use table::{FeatureTable, LabelTable};
