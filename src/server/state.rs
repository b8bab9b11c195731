//! Application state management

use crate::config::AppConfig;
use crate::error::Result;
use crate::metrics::DashboardMetrics;
use crate::session::SessionCache;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state behind every handler
pub struct AppState {
    pub config: AppConfig,
    pub cache: SessionCache,
    pub metrics: Arc<DashboardMetrics>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, metrics: Arc<DashboardMetrics>) -> Self {
        Self {
            config,
            cache: SessionCache::with_metrics(Arc::clone(&metrics)),
            metrics,
            started_at: Utc::now(),
        }
    }

    /// Load the artifacts and compute explanations ahead of the first request.
    ///
    /// An explanation failure is not fatal: the what-if view still works and
    /// the other views report the error when requested.
    pub fn warm_up(&self) -> Result<()> {
        let session = self.cache.session(&self.config.artifacts)?;
        match self.cache.explanations(&session, &self.config.explanation) {
            Ok(explanations) => {
                info!(
                    session_id = %session.id,
                    baseline = explanations.baseline,
                    "Session warmed up"
                );
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Explanations unavailable");
            }
        }
        Ok(())
    }
}
