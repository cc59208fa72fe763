// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use chronofact_core::error::ChronofactError;
use chronofact_core::traits::VectorStore;
use chronofact_generator::StructuredGenerator;
use chronofact_memory::MemoryEngine;
use chronofact_pipeline::TimelinePipeline;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Timeline request orchestrator.
    pub pipeline: Arc<TimelinePipeline>,
    /// Structured generator for the auxiliary endpoints.
    pub generator: Arc<StructuredGenerator>,
    /// Vector store handle (health checks).
    pub store: Arc<dyn VectorStore>,
    /// Memory engine (doctor statistics).
    pub memory: Arc<MemoryEngine>,
    /// Whether embedding models loaded at startup.
    pub embedder_ready: bool,
    /// Whether the LLM provider is configured.
    pub generator_ready: bool,
    /// Default credibility floor applied when a request omits one.
    pub default_min_credibility: f64,
    /// Per-request deadline for auxiliary endpoints.
    pub request_deadline_ms: u64,
    /// Redacted configuration snapshot served by /api/config.
    pub config_echo: serde_json::Value,
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Build the application router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/api/timeline", post(handlers::post_timeline))
        .route("/api/verify", post(handlers::post_verify))
        .route("/api/detect", post(handlers::post_detect))
        .route("/api/followup", post(handlers::post_followup))
        .route("/api/recommend", post(handlers::post_recommend))
        .route("/api/search", post(handlers::post_search))
        .route("/api/config", get(handlers::get_config))
        .route("/api/memory/stats", get(handlers::get_memory_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), ChronofactError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ChronofactError::store(format!("failed to bind gateway to {addr}"), e))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| ChronofactError::store("gateway server error", e))?;

    Ok(())
}
