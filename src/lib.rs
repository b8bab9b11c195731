//! Churn Prediction Dashboard Library
//!
//! Loads a pre-trained gradient-boosted churn classifier with its data
//! artifacts, explains its predictions with exact TreeSHAP, and serves an
//! interactive HTML dashboard with three views: global feature importance,
//! per-customer explanations, and what-if prediction for a new customer.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod explain;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod server;
pub mod session;
pub mod types;

pub use config::AppConfig;
pub use error::{DashboardError, Result};
pub use feature_extractor::FeatureExtractor;
pub use models::{ChurnModel, InferenceEngine};
pub use session::SessionCache;
pub use types::CustomerRecord;
