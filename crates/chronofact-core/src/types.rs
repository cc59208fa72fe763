// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared across Chronofact crates.
//!
//! Collection names, payload shapes, and the artifact types produced by the
//! structured generator all live here so that retrieval, generation, and the
//! pipeline agree on one vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Collection holding social-media posts (the unit of retrieval).
pub const COLLECTION_POSTS: &str = "x_posts";
/// Collection holding verified facts used for grounding.
pub const COLLECTION_FACTS: &str = "knowledge_facts";
/// Collection holding evolving per-session memories.
pub const COLLECTION_MEMORY: &str = "session_memory";

/// Named dense vector carrying the text embedding.
pub const TEXT_VECTOR: &str = "text";
/// Named dense vector carrying the image-only CLIP embedding.
pub const IMAGE_VECTOR: &str = "image";
/// Named dense vector carrying the fused text+image CLIP embedding.
pub const MULTIMODAL_VECTOR: &str = "multimodal";
/// Named sparse vector derived from the `text` payload field.
pub const SPARSE_TEXT_VECTOR: &str = "text_bm25";

/// Dimensions of all-MiniLM-L6-v2 text embeddings.
pub const TEXT_VECTOR_DIM: usize = 384;
/// Dimensions of CLIP ViT-B/32 embeddings (text tower and image tower).
pub const CLIP_VECTOR_DIM: usize = 512;

/// How text and image embeddings are combined into one multimodal vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionStrategy {
    /// CLIP text embedding only.
    TextOnly,
    /// CLIP image embedding only.
    ImageOnly,
    /// Element-wise mean of both embeddings.
    Mean,
    /// `alpha * text + (1 - alpha) * image`.
    TextWeighted(f32),
    /// `alpha * image + (1 - alpha) * text`.
    ImageWeighted(f32),
}

/// A social-media post as stored in the `x_posts` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Stable post identifier, doubles as the point id.
    pub post_id: Uuid,
    /// Post body text.
    pub text: String,
    /// Author handle.
    pub author: String,
    /// Publication time (UTC, RFC3339 on the wire).
    pub timestamp: DateTime<Utc>,
    /// Persisted credibility score in [0, 1]; never recomputed at query time.
    pub credibility_score: f64,
    /// Free-text location, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Whether the author account is verified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    /// Favourite count at ingestion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fave_count: Option<i64>,
    /// Retweet count at ingestion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweet_count: Option<i64>,
    /// Attached media URLs, in post order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,
    /// Caption derived from attached media, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_caption: Option<String>,
}

impl Post {
    /// Host of the first media URL, used as the post's source domain.
    ///
    /// Posts without media have no source domain and are exempt from the
    /// domain diversity cap.
    pub fn source_domain(&self) -> Option<String> {
        let url = self.media_urls.first()?;
        let rest = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://"))?;
        let host = rest.split(['/', '?', '#']).next()?;
        if host.is_empty() {
            None
        } else {
            Some(host.to_ascii_lowercase())
        }
    }
}

/// Verification state of a stored fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Disputed,
    Unverified,
}

/// A verified claim in the `knowledge_facts` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Stable fact identifier, doubles as the point id.
    pub fact_id: Uuid,
    /// The claim text.
    pub statement: String,
    /// Supporting post ids or URLs.
    pub sources: Vec<String>,
    /// Verification state of the claim.
    pub verification_status: VerificationStatus,
    /// When the claim was last verified.
    pub verified_at: DateTime<Utc>,
}

/// Inclusive time window used for payload filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// True when neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Interpreted search plan produced from a raw query.
///
/// This is the hybrid retriever's input: the refined text is embedded and
/// tokenized, the remaining fields become payload filters.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Search text after query interpretation (may include visual context).
    pub refined_text: String,
    /// Named entities extracted from the query.
    pub entities: Vec<String>,
    /// Locations to filter on (disjunctive).
    pub locations: Vec<String>,
    /// Time window to filter on.
    pub time_range: Option<TimeRange>,
    /// Minimum persisted credibility score.
    pub min_credibility: f64,
    /// Number of results the caller wants.
    pub limit: usize,
    /// Optional CLIP query vector for cross-modal expansion.
    pub image_vector: Option<Vec<f32>>,
}

impl QueryPlan {
    /// A trivial plan used when query interpretation fails: the raw query
    /// text with no extracted structure.
    pub fn fallback(raw_query: &str, min_credibility: f64, limit: usize) -> Self {
        Self {
            refined_text: raw_query.to_string(),
            entities: Vec::new(),
            locations: Vec::new(),
            time_range: None,
            min_credibility,
            limit,
            image_vector: None,
        }
    }
}

/// One event on a generated timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// When the event happened (UTC).
    pub timestamp: DateTime<Utc>,
    /// One-or-two sentence event summary.
    pub summary: String,
    /// Ids of the context posts this event cites. Every id must exist in
    /// the retrieval context passed to the generator.
    pub sources: Vec<Uuid>,
    /// Location the event is tied to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Mean credibility of the cited posts, clamped to [0, 1].
    pub credibility_score: f64,
}

/// A chronologically ordered, source-cited timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    /// Topic the timeline covers.
    pub topic: String,
    /// Events sorted ascending by timestamp.
    pub events: Vec<TimelineEvent>,
    /// Short forward-looking statements, if the generator produced any.
    #[serde(default)]
    pub predictions: Vec<String>,
}

/// Misinformation risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Result of misinformation pattern detection over a text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MisinformationAnalysis {
    /// Whether the text matches known misinformation patterns.
    pub is_suspicious: bool,
    /// The specific patterns detected.
    pub suspicious_patterns: Vec<String>,
    /// Overall risk classification.
    pub risk_level: RiskLevel,
    /// Actionable advice for the reader.
    pub recommendation: String,
}

/// Category of a generated follow-up question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FollowUpCategory {
    DeepDive,
    RelatedTopic,
    Verification,
    Prediction,
    Comparison,
}

/// A follow-up question suggested after a timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpQuestion {
    /// The question text.
    pub question: String,
    /// What kind of exploration the question supports.
    pub category: FollowUpCategory,
    /// Priority from 1 (lowest) to 5 (highest).
    pub priority: u8,
}

/// Verdict of a credibility assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CredibilityVerdict {
    Trust,
    VerifyFurther,
    Suspicious,
}

/// LLM assessment of a single claim's credibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibilityAssessment {
    /// Estimated credibility in [0, 1].
    pub credibility_score: f64,
    /// Factors that contributed to the score.
    pub factors: Vec<String>,
    /// Free-text reasoning.
    pub reasoning: String,
    /// What the reader should do with the claim.
    pub recommendation: CredibilityVerdict,
}

/// A context-aware topic recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Suggested topic or query.
    pub title: String,
    /// Why it is relevant to the user's query.
    pub reason: String,
    /// Loose grouping label (e.g. "related_event", "background").
    pub category: String,
}

/// Visual context extracted from an uploaded image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualContext {
    /// Short natural-language description of visually relevant content.
    pub visual_context: String,
    /// Entities recognizable in the image.
    #[serde(default)]
    pub entities: Vec<String>,
}

/// A timeline construction request as the pipeline consumes it.
#[derive(Debug, Clone, Default)]
pub struct TimelineRequest {
    /// Free-text topic. May be empty only when an image is attached.
    pub topic: String,
    /// Number of events wanted, 1..=50.
    pub limit: usize,
    /// Optional location filter.
    pub location: Option<String>,
    /// Minimum credibility for retrieved posts.
    pub min_credibility: f64,
    /// Restrict retrieval to posts with media.
    pub include_media_only: bool,
    /// Raw image bytes, if the request attached one.
    pub image: Option<Vec<u8>>,
    /// Session the request belongs to, for memory purposes.
    pub session_id: Option<String>,
    /// Questions already shown to the user; must not be repeated.
    pub previous_questions: Vec<String>,
}

/// The pipeline's answer to a timeline request.
///
/// Auxiliary analyses degrade gracefully: a failed misinformation or
/// follow-up call leaves its field `None` and records the reason instead of
/// failing the request.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineResponse {
    /// Topic the timeline covers.
    pub topic: String,
    /// Events sorted ascending by timestamp.
    pub events: Vec<TimelineEvent>,
    /// Forward-looking statements from the generator.
    pub predictions: Vec<String>,
    /// Number of distinct posts cited across all events.
    pub total_sources: usize,
    /// Mean of the event credibility scores (0 when there are no events).
    pub avg_credibility: f64,
    /// Misinformation analysis of the raw query, if it succeeded.
    pub misinformation: Option<MisinformationAnalysis>,
    /// Why the misinformation analysis is missing, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub misinformation_error: Option<String>,
    /// Suggested follow-up questions, if generation succeeded.
    pub follow_ups: Option<Vec<FollowUpQuestion>>,
    /// Why follow-ups are missing, if generation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_ups_error: Option<String>,
    /// True when at least one retrieval sub-query failed and results come
    /// from the surviving ones.
    pub partial_retrieval: bool,
}

/// Component readiness reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub status: String,
    pub embedder_ready: bool,
    pub vector_store_ready: bool,
    pub generator_ready: bool,
}

impl ReadinessReport {
    /// Build a report; status is "healthy" only when every component is up.
    pub fn new(embedder_ready: bool, vector_store_ready: bool, generator_ready: bool) -> Self {
        let all = embedder_ready && vector_store_ready && generator_ready;
        Self {
            status: if all { "healthy" } else { "degraded" }.to_string(),
            embedder_ready,
            vector_store_ready,
            generator_ready,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

// --- Provider types ---

/// One part of a provider message: text or an inline base64 image.
#[derive(Debug, Clone)]
pub enum ContentPart {
    Text { text: String },
    Image { media_type: String, data: String },
}

/// A single message in a provider conversation.
#[derive(Debug, Clone)]
pub struct ProviderMessage {
    /// "user" or "assistant".
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl ProviderMessage {
    /// Convenience constructor for a plain-text user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }
}

/// A tool the provider is forced to call, carrying the output schema.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool input (the structured output shape).
    pub input_schema: serde_json::Value,
}

/// A request to the LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub max_tokens: u32,
    /// When set, the provider must answer by invoking this tool.
    pub tool: Option<ToolSpec>,
    /// Wall-clock budget left on the originating request. Providers size
    /// their transport timeouts and retry back-off to fit inside it.
    pub time_budget: Option<std::time::Duration>,
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A completed provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Concatenated text blocks.
    pub text: String,
    /// Input of the forced tool call, when a tool was requested.
    pub tool_input: Option<serde_json::Value>,
    pub usage: TokenUsage,
}
