// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic mapping from error kinds to HTTP statuses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use chronofact_core::error::ChronofactError;

/// Error payload returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

/// Gateway-side error wrapper carrying the HTTP mapping.
#[derive(Debug)]
pub struct ApiError(pub ChronofactError);

impl From<ChronofactError> for ApiError {
    fn from(err: ChronofactError) -> Self {
        Self(err)
    }
}

/// The status code and kind tag for an error.
pub fn classify(err: &ChronofactError) -> (StatusCode, &'static str) {
    match err {
        ChronofactError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        ChronofactError::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
        ChronofactError::EmbeddingUnavailable { .. } => (StatusCode::BAD_GATEWAY, "embedding_unavailable"),
        ChronofactError::RetrievalUnavailable(_) => (StatusCode::BAD_GATEWAY, "retrieval_unavailable"),
        ChronofactError::BackendBusy { .. } => (StatusCode::SERVICE_UNAVAILABLE, "backend_busy"),
        ChronofactError::SchemaViolation(_) => (StatusCode::BAD_GATEWAY, "schema_violation"),
        ChronofactError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        ChronofactError::DeadlineExceeded { .. } => (StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded"),
        ChronofactError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        ChronofactError::Store { .. } => (StatusCode::BAD_GATEWAY, "store_error"),
        ChronofactError::Provider { .. } => (StatusCode::BAD_GATEWAY, "provider_error"),
        ChronofactError::SchemaMismatch { .. }
        | ChronofactError::Config(_)
        | ChronofactError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = classify(&self.0);
        if status.is_server_error() {
            tracing::error!(kind, error = %self.0, "request failed");
        } else {
            tracing::debug!(kind, error = %self.0, "request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
                kind,
            }),
        )
            .into_response()
    }
}
