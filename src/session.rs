//! Process-scoped session cache
//!
//! Artifacts are cached per [`ArtifactsConfig`]; explanations per artifact
//! fingerprint, so a different artifact set never reuses stale attributions.
//! Failed loads are not cached and are retried on the next request.

use crate::config::{ArtifactsConfig, ExplanationConfig};
use crate::error::Result;
use crate::explain::{self, Explanations};
use crate::feature_extractor::FeatureExtractor;
use crate::metrics::DashboardMetrics;
use crate::models::loader::{ArtifactLoader, Artifacts};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// One loaded artifact set.
#[derive(Debug)]
pub struct DashboardSession {
    pub id: Uuid,
    pub loaded_at: DateTime<Utc>,
    pub artifacts: Artifacts,
}

/// Explicit memo for sessions and explanations.
#[derive(Default)]
pub struct SessionCache {
    sessions: Mutex<HashMap<ArtifactsConfig, Arc<DashboardSession>>>,
    explanations: Mutex<HashMap<u64, Arc<Explanations>>>,
    extractor: FeatureExtractor,
    metrics: Option<Arc<DashboardMetrics>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // The maps are only ever inserted into whole, so a poisoned lock still holds valid data.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that reports explanation timings to `metrics`.
    pub fn with_metrics(metrics: Arc<DashboardMetrics>) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::default()
        }
    }

    /// The session for `paths`, loading it on first use.
    pub fn session(&self, paths: &ArtifactsConfig) -> Result<Arc<DashboardSession>> {
        let mut sessions = lock(&self.sessions);
        if let Some(session) = sessions.get(paths) {
            debug!(session_id = %session.id, "Session cache hit");
            return Ok(Arc::clone(session));
        }

        let artifacts = ArtifactLoader::new(paths.clone()).load()?;
        let session = Arc::new(DashboardSession {
            id: Uuid::new_v4(),
            loaded_at: Utc::now(),
            artifacts,
        });
        info!(
            session_id = %session.id,
            loaded_at = %session.loaded_at.to_rfc3339(),
            "Session loaded"
        );
        sessions.insert(paths.clone(), Arc::clone(&session));
        Ok(session)
    }

    /// Attributions for the session's train and test tables, computed once per artifact set.
    pub fn explanations(
        &self,
        session: &DashboardSession,
        config: &ExplanationConfig,
    ) -> Result<Arc<Explanations>> {
        let fingerprint = session.artifacts.fingerprint;
        let mut explanations = lock(&self.explanations);
        if let Some(cached) = explanations.get(&fingerprint) {
            debug!(fingerprint = format!("{:016x}", fingerprint), "Explanation cache hit");
            return Ok(Arc::clone(cached));
        }

        let artifacts = &session.artifacts;
        let computed = Arc::new(explain::explain(
            &artifacts.model,
            &self.extractor,
            &artifacts.x_train,
            &artifacts.x_test,
            config,
        )?);
        if let Some(metrics) = &self.metrics {
            metrics.record_explanation_time(computed.elapsed);
        }
        explanations.insert(fingerprint, Arc::clone(&computed));
        Ok(computed)
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Whether any session is loaded.
    pub fn is_loaded(&self) -> bool {
        !lock(&self.sessions).is_empty()
    }

    /// Drop every cached session and explanation.
    pub fn clear(&self) {
        lock(&self.sessions).clear();
        lock(&self.explanations).clear();
    }
}
