//! Error taxonomy for the churn dashboard

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Every failure that can abort a render pass.
#[derive(Error, Debug)]
pub enum DashboardError {
    /// An artifact file is absent, unreadable or malformed.
    #[error("missing artifact {}: {reason}", path.display())]
    MissingArtifact { path: PathBuf, reason: String },

    /// A loaded artifact disagrees with the schema the model expects.
    #[error("schema mismatch in {artifact}: {detail}")]
    SchemaMismatch { artifact: String, detail: String },

    /// The model cannot be decomposed by the attribution algorithm.
    #[error("explanation failed: {0}")]
    Explanation(String),

    /// The requested identifier is not in the test table.
    #[error("unknown customer: {0}")]
    UnknownCustomer(String),

    /// A form value is outside its domain.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The render task panicked or was cancelled.
    #[error("render task failed: {0}")]
    Render(String),
}

impl DashboardError {
    pub fn missing(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        DashboardError::MissingArtifact {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(artifact: impl Into<String>, detail: impl Into<String>) -> Self {
        DashboardError::SchemaMismatch {
            artifact: artifact.into(),
            detail: detail.into(),
        }
    }

    /// Short stable name used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardError::MissingArtifact { .. } => "missing_artifact",
            DashboardError::SchemaMismatch { .. } => "schema_mismatch",
            DashboardError::Explanation(_) => "explanation",
            DashboardError::UnknownCustomer(_) => "unknown_customer",
            DashboardError::InvalidInput(_) => "invalid_input",
            DashboardError::Render(_) => "render",
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
