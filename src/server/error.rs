//! HTTP mapping of dashboard errors

use crate::dashboard::page;
use crate::error::DashboardError;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

impl DashboardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DashboardError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DashboardError::UnknownCustomer(_) => StatusCode::NOT_FOUND,
            DashboardError::MissingArtifact { .. }
            | DashboardError::SchemaMismatch { .. }
            | DashboardError::Explanation(_)
            | DashboardError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), detail = %self, "Render failed");
        } else {
            tracing::warn!(kind = self.kind(), detail = %self, "Rejected request");
        }
        (status, Html(page::render_error(&self))).into_response()
    }
}
