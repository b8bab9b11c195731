//! Request handlers
//!
//! Every request re-runs the pipeline against the cached session and renders
//! a complete page on the blocking pool, since a cold session loads artifacts
//! and explains both tables. Failures become an error page with a non-success
//! status.

use super::state::AppState;
use crate::dashboard::form::FutureCustomerForm;
use crate::dashboard::{page, Dashboard, View, ViewMode, ViewRequest};
use crate::error::{DashboardError, Result};
use axum::{
    extract::{Form, Query, State},
    response::Html,
    Json,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub mode: Option<String>,
    pub customer_id: Option<String>,
}

fn render(state: &AppState, request: ViewRequest) -> Result<Html<String>> {
    let start = Instant::now();
    let dashboard = Dashboard::new(&state.cache, &state.config);
    let built = dashboard.build(&request).map_err(|e| {
        state.metrics.record_failure(e.kind());
        e
    })?;

    if let View::Future(view) = &built.view {
        if let Some(scored) = &view.result {
            state.metrics.record_prediction(scored.prediction.probability);
        }
    }
    let html = page::render(&built);
    state.metrics.record_render(request.mode, start.elapsed());
    debug!(
        mode = %request.mode,
        elapsed_us = start.elapsed().as_micros() as u64,
        "Page rendered"
    );
    Ok(Html(html))
}

async fn render_blocking(state: Arc<AppState>, request: ViewRequest) -> Result<Html<String>> {
    let metrics = Arc::clone(&state.metrics);
    tokio::task::spawn_blocking(move || render(&state, request))
        .await
        .map_err(|e| {
            metrics.record_failure("render");
            DashboardError::Render(e.to_string())
        })?
}

/// `GET /?mode=&customer_id=`
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    let mode = match query.mode.as_deref() {
        None | Some("") => ViewMode::default(),
        Some(slug) => ViewMode::from_slug(slug).ok_or_else(|| {
            state.metrics.record_failure("invalid_input");
            DashboardError::InvalidInput(format!("unknown mode '{}'", slug))
        })?,
    };
    let request = ViewRequest {
        mode,
        customer_id: query.customer_id.filter(|id| !id.is_empty()),
        confirmed: None,
    };
    render_blocking(state, request).await
}

/// `POST /predict`, the confirmation action of the what-if form.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Html<String>> {
    let request = ViewRequest {
        mode: ViewMode::FuturePrediction,
        customer_id: None,
        confirmed: Some(FutureCustomerForm::from_values(fields)),
    };
    render_blocking(state, request).await
}

/// `GET /health`
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let loaded = state.cache.is_loaded();
    Json(serde_json::json!({
        "status": if loaded { "ok" } else { "degraded" },
        "session_loaded": loaded,
        "started_at": state.started_at.to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
