// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the Chronofact REST API.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use chronofact_core::error::ChronofactError;
use chronofact_core::traits::VectorStore as _;
use chronofact_core::types::{
    CredibilityAssessment, FollowUpQuestion, MisinformationAnalysis, QueryPlan, ReadinessReport,
    Recommendation, TimelineRequest,
};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Request body for POST /api/timeline.
#[derive(Debug, Deserialize)]
pub struct TimelineBody {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub min_credibility: Option<f64>,
    #[serde(default)]
    pub include_media_only: Option<bool>,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub previous_questions: Option<Vec<String>>,
}

/// Request body for POST /api/verify.
#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub engagement: Option<String>,
}

/// Request body for POST /api/detect.
#[derive(Debug, Deserialize)]
pub struct DetectBody {
    pub text: String,
}

/// Request body for POST /api/followup.
#[derive(Debug, Deserialize)]
pub struct FollowUpBody {
    pub original_query: String,
    pub timeline_topic: String,
    #[serde(default)]
    pub events_summary: Vec<String>,
    #[serde(default)]
    pub avg_credibility: f64,
    #[serde(default)]
    pub total_events: usize,
    #[serde(default)]
    pub total_sources: usize,
    #[serde(default)]
    pub previous_questions: Option<Vec<String>>,
}

/// Response body for POST /api/followup.
#[derive(Debug, Serialize)]
pub struct FollowUpResponse {
    pub query: String,
    pub count: usize,
    pub questions: Vec<FollowUpQuestion>,
}

/// Request body for POST /api/recommend.
#[derive(Debug, Deserialize)]
pub struct RecommendBody {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Response body for POST /api/recommend.
#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub query: String,
    pub count: usize,
    pub recommendations: Vec<Recommendation>,
}

/// Request body for POST /api/search.
#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub min_credibility: Option<f64>,
}

/// One search hit.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: serde_json::Value,
}

/// Response body for POST /api/search.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<SearchHit>,
}

/// Validate and convert the timeline body into the pipeline request shape.
pub fn validate_timeline_body(
    body: TimelineBody,
    default_min_credibility: f64,
) -> Result<TimelineRequest, ChronofactError> {
    let topic = body.topic.unwrap_or_default();
    let has_image = body.image_base64.as_deref().is_some_and(|s| !s.is_empty());
    if topic.trim().is_empty() && !has_image {
        return Err(ChronofactError::InvalidRequest(
            "topic must be non-empty unless image_base64 is provided".to_string(),
        ));
    }

    let limit = body.limit.unwrap_or(10);
    if !(1..=50).contains(&limit) {
        return Err(ChronofactError::InvalidRequest(format!(
            "limit must be in 1..=50, got {limit}"
        )));
    }

    let min_credibility = body.min_credibility.unwrap_or(default_min_credibility);
    if !(0.0..=1.0).contains(&min_credibility) {
        return Err(ChronofactError::InvalidRequest(format!(
            "min_credibility must be in [0, 1], got {min_credibility}"
        )));
    }

    let image = match body.image_base64.as_deref().filter(|s| !s.is_empty()) {
        Some(encoded) => Some(
            base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| {
                    ChronofactError::InvalidRequest(format!("image_base64 is not valid base64: {e}"))
                })?,
        ),
        None => None,
    };

    Ok(TimelineRequest {
        topic: topic.trim().to_string(),
        limit,
        location: body.location.filter(|l| !l.trim().is_empty()),
        min_credibility,
        include_media_only: body.include_media_only.unwrap_or(false),
        image,
        session_id: body.session_id.filter(|s| !s.trim().is_empty()),
        previous_questions: body.previous_questions.unwrap_or_default(),
    })
}

fn non_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError(ChronofactError::InvalidRequest(format!(
            "{field} must not be empty"
        ))));
    }
    Ok(())
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let vector_store_ready = state.store.health_check().await.is_ok();
    let report = ReadinessReport::new(state.embedder_ready, vector_store_ready, state.generator_ready);
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

/// POST /api/timeline
pub async fn post_timeline(
    State(state): State<GatewayState>,
    Json(body): Json<TimelineBody>,
) -> Result<Json<chronofact_core::types::TimelineResponse>, ApiError> {
    let request = validate_timeline_body(body, state.default_min_credibility)?;
    let response = state.pipeline.handle(request).await?;
    Ok(Json(response))
}

/// POST /api/verify
pub async fn post_verify(
    State(state): State<GatewayState>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<CredibilityAssessment>, ApiError> {
    non_empty("text", &body.text)?;
    let assessment = state
        .generator
        .assess_credibility(
            &body.text,
            body.author.as_deref(),
            body.engagement.as_deref(),
            state.deadline(),
        )
        .await?;
    Ok(Json(assessment))
}

/// POST /api/detect
pub async fn post_detect(
    State(state): State<GatewayState>,
    Json(body): Json<DetectBody>,
) -> Result<Json<MisinformationAnalysis>, ApiError> {
    non_empty("text", &body.text)?;
    let analysis = state
        .generator
        .detect_misinformation(&body.text, state.deadline())
        .await?;
    Ok(Json(analysis))
}

/// POST /api/followup
pub async fn post_followup(
    State(state): State<GatewayState>,
    Json(body): Json<FollowUpBody>,
) -> Result<Json<FollowUpResponse>, ApiError> {
    non_empty("original_query", &body.original_query)?;

    let summary = format!(
        "topic: {}; {} events from {} sources, average credibility {:.2}; {}",
        body.timeline_topic,
        body.total_events,
        body.total_sources,
        body.avg_credibility,
        body.events_summary.join(" | "),
    );
    let questions = state
        .generator
        .generate_follow_up_questions(
            &body.original_query,
            &summary,
            body.previous_questions.as_deref().unwrap_or(&[]),
            state.deadline(),
        )
        .await?;

    Ok(Json(FollowUpResponse {
        query: body.original_query,
        count: questions.len(),
        questions,
    }))
}

/// POST /api/recommend
pub async fn post_recommend(
    State(state): State<GatewayState>,
    Json(body): Json<RecommendBody>,
) -> Result<Json<RecommendResponse>, ApiError> {
    non_empty("query", &body.query)?;
    let limit = body.limit.unwrap_or(5).clamp(1, 20);

    // Ground the prompt in whatever the store knows about the query, plus
    // the neighborhood of the best match.
    let plan = QueryPlan::fallback(&body.query, 0.0, 5);
    let mut related: Vec<String> = Vec::new();
    match state.pipeline.retriever().retrieve(&plan).await {
        Ok(outcome) => {
            if let Some(top) = outcome.posts.first() {
                match state
                    .pipeline
                    .retriever()
                    .similar_posts(top.post.post_id, 3)
                    .await
                {
                    Ok(similar) => related.extend(similar.into_iter().map(|p| p.text)),
                    Err(e) => tracing::debug!(error = %e, "similar-post lookup failed"),
                }
            }
            related.extend(outcome.posts.into_iter().map(|p| p.post.text));
            related.dedup();
        }
        Err(e) => {
            tracing::warn!(error = %e, "recommendation grounding retrieval failed");
        }
    }

    let recommendations = state
        .generator
        .generate_recommendations(&body.query, &related, limit, state.deadline())
        .await?;

    Ok(Json(RecommendResponse {
        query: body.query,
        count: recommendations.len(),
        recommendations,
    }))
}

/// POST /api/search
pub async fn post_search(
    State(state): State<GatewayState>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResponse>, ApiError> {
    non_empty("query", &body.query)?;
    let limit = body.limit.unwrap_or(10);
    if !(1..=100).contains(&limit) {
        return Err(ApiError(ChronofactError::InvalidRequest(format!(
            "limit must be in 1..=100, got {limit}"
        ))));
    }

    let mut plan = QueryPlan::fallback(&body.query, body.min_credibility.unwrap_or(0.0), limit);
    if let Some(location) = body.location.filter(|l| !l.trim().is_empty()) {
        plan.locations.push(location);
    }

    let outcome = state.pipeline.retriever().retrieve(&plan).await?;
    let results: Vec<SearchHit> = outcome
        .posts
        .into_iter()
        .map(|p| SearchHit {
            id: p.post.post_id.to_string(),
            score: p.fused_score,
            payload: serde_json::to_value(&p.post).unwrap_or(serde_json::Value::Null),
        })
        .collect();

    Ok(Json(SearchResponse {
        query: body.query,
        count: results.len(),
        results,
    }))
}

/// GET /api/config -- redacted runtime configuration echo.
pub async fn get_config(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(state.config_echo.clone())
}

/// GET /api/memory/stats -- aggregate session-memory statistics.
pub async fn get_memory_stats(
    State(state): State<GatewayState>,
) -> Result<Json<chronofact_memory::MemoryStats>, ApiError> {
    let stats = state.memory.stats().await?;
    Ok(Json(stats))
}

impl GatewayState {
    /// Deadline for one auxiliary (non-pipeline) LLM operation.
    fn deadline(&self) -> Instant {
        Instant::now() + Duration::from_millis(self.request_deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(topic: Option<&str>, image: Option<&str>) -> TimelineBody {
        TimelineBody {
            topic: topic.map(String::from),
            limit: None,
            location: None,
            min_credibility: None,
            include_media_only: None,
            image_base64: image.map(String::from),
            session_id: None,
            previous_questions: None,
        }
    }

    #[test]
    fn topic_or_image_is_required() {
        let err = validate_timeline_body(body(None, None), 0.3).unwrap_err();
        assert!(matches!(err, ChronofactError::InvalidRequest(_)));

        let err = validate_timeline_body(body(Some("   "), None), 0.3).unwrap_err();
        assert!(matches!(err, ChronofactError::InvalidRequest(_)));

        // An image alone is enough.
        let encoded = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]);
        let request = validate_timeline_body(body(None, Some(&encoded)), 0.3).unwrap();
        assert!(request.topic.is_empty());
        assert_eq!(request.image.as_deref(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn limit_bounds_are_enforced() {
        let mut b = body(Some("floods"), None);
        b.limit = Some(0);
        assert!(validate_timeline_body(b, 0.3).is_err());

        let mut b = body(Some("floods"), None);
        b.limit = Some(51);
        assert!(validate_timeline_body(b, 0.3).is_err());

        let mut b = body(Some("floods"), None);
        b.limit = Some(50);
        assert_eq!(validate_timeline_body(b, 0.3).unwrap().limit, 50);
    }

    #[test]
    fn defaults_are_applied() {
        let request = validate_timeline_body(body(Some("floods"), None), 0.3).unwrap();
        assert_eq!(request.limit, 10);
        assert_eq!(request.min_credibility, 0.3);
        assert!(!request.include_media_only);
        assert!(request.previous_questions.is_empty());
    }

    #[test]
    fn min_credibility_range_is_enforced() {
        let mut b = body(Some("floods"), None);
        b.min_credibility = Some(1.5);
        assert!(validate_timeline_body(b, 0.3).is_err());
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let err = validate_timeline_body(body(Some("floods"), Some("!!not-base64!!")), 0.3)
            .unwrap_err();
        assert!(matches!(err, ChronofactError::InvalidRequest(_)));
    }
}
