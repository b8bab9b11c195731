//! Churn model: parsing, scoring and artifact loading

pub mod forest;
pub mod inference;
pub mod loader;
pub mod scaler;
pub mod xgboost;

pub use forest::{sigmoid, ChurnModel};
pub use inference::{format_probability, InferenceEngine, Prediction, ScoredRecord};
pub use loader::{ArtifactLoader, Artifacts, ReferenceStats};
pub use scaler::{FittedScaler, ScalerType};
