// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Chronofact timeline service.

use thiserror::Error;

/// The primary error type used across all Chronofact components.
///
/// Each variant corresponds to one error kind of the service contract and
/// maps deterministically to an HTTP status at the gateway.
#[derive(Debug, Error)]
pub enum ChronofactError {
    /// Request failed validation at the HTTP binding.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Uploaded image exceeds the configured size limit.
    #[error("payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Embedding model could not be loaded or inference failed.
    #[error("embedder unavailable: {message}")]
    EmbeddingUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Every retrieval sub-query failed.
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Vector store connection pool is saturated.
    #[error("backend busy: waited {waited_ms}ms for a connection slot")]
    BackendBusy { waited_ms: u64 },

    /// LLM output failed schema validation after all retries.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// LLM rate limiter stayed exhausted past the request deadline.
    #[error("rate limited: no token available within the deadline")]
    RateLimited,

    /// Per-request deadline expired.
    #[error("deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    /// Requested collection or point does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Collection exists with an incompatible vector or index layout.
    #[error("schema mismatch for collection '{collection}': {detail}")]
    SchemaMismatch { collection: String, detail: String },

    /// Vector store backend error (connection, bad response, serialization).
    #[error("vector store error: {message}")]
    Store {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider error (API failure, malformed response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChronofactError {
    /// Construct a store error wrapping an underlying failure.
    pub fn store(message: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Construct a provider error wrapping an underlying failure.
    pub fn provider(message: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Provider {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether a failed operation may be retried by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::BackendBusy { .. } | Self::RateLimited | Self::Store { .. } | Self::Provider { .. }
        )
    }
}
