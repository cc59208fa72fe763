// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the timeline pipeline.
//!
//! Each test wires the in-process vector store, a deterministic embedder,
//! and a tool-routed scripted provider, then drives requests through the
//! full pipeline. Tests are independent and order-insensitive.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use chronofact_config::model::{LimitsConfig, MemoryConfig, RetrievalConfig};
use chronofact_core::error::ChronofactError;
use chronofact_core::traits::{TextEmbedder, VectorStore};
use chronofact_core::types::{
    ContentPart, Post, TimelineRequest, COLLECTION_MEMORY, COLLECTION_POSTS, TEXT_VECTOR,
};
use chronofact_core::vector::PointRecord;
use chronofact_generator::testing::{RoutedProvider, ScriptedResponse};
use chronofact_generator::{RateLimiter, StructuredGenerator};
use chronofact_memory::MemoryEngine;
use chronofact_pipeline::{MemoryWriter, TimelinePipeline};
use chronofact_retrieval::HybridRetriever;
use chronofact_vector::{ensure_collections, MemoryVectorStore};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Embedder mapping text to a fixed direction per topic bucket, so dense
/// scores are exactly equal within a bucket and ordering falls to the
/// documented tie-break.
struct BucketEmbedder;

#[async_trait]
impl TextEmbedder for BucketEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChronofactError> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 384];
                let bucket = if t.to_lowercase().contains("flood") { 0 } else { 1 };
                v[bucket] = 1.0;
                v
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        384
    }
}

struct Harness {
    store: Arc<MemoryVectorStore>,
    pipeline: TimelinePipeline,
    _cancel: CancellationToken,
}

async fn harness(provider: RoutedProvider, limits: LimitsConfig) -> Harness {
    let store = Arc::new(MemoryVectorStore::new());
    ensure_collections(store.as_ref()).await.unwrap();

    let embedder: Arc<dyn TextEmbedder> = Arc::new(BucketEmbedder);
    let generator = Arc::new(StructuredGenerator::new(
        Arc::new(provider),
        "test-model".to_string(),
        4096,
        Arc::new(RateLimiter::new(600)),
    ));
    let memory = Arc::new(MemoryEngine::new(
        store.clone(),
        embedder.clone(),
        MemoryConfig::default(),
    ));
    let cancel = CancellationToken::new();
    let writer = MemoryWriter::spawn(memory.clone(), 64, cancel.clone());
    let retriever = Arc::new(HybridRetriever::new(
        store.clone(),
        embedder.clone(),
        RetrievalConfig::default(),
    ));
    let pipeline = TimelinePipeline::new(generator, retriever, embedder, None, writer, limits);

    Harness {
        store,
        pipeline,
        _cancel: cancel,
    }
}

fn post_id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// Five flood posts, one per day, with the S2/S3 credibility profile.
fn flood_posts() -> Vec<Post> {
    let credibilities = [0.9, 0.8, 0.5, 0.4, 0.95];
    (1..=5u128)
        .map(|n| Post {
            post_id: post_id(n),
            text: format!("floods reported in ward {n}"),
            author: format!("reporter_{n}"),
            timestamp: format!("2024-07-{:02}T08:00:00Z", n).parse().unwrap(),
            credibility_score: credibilities[(n - 1) as usize],
            location: Some("Mumbai".to_string()),
            is_verified: Some(n % 2 == 1),
            fave_count: Some(10 * n as i64),
            retweet_count: Some(3 * n as i64),
            media_urls: Vec::new(),
            image_caption: None,
        })
        .collect()
}

async fn seed_posts(store: &MemoryVectorStore, posts: &[Post]) {
    let embedder = BucketEmbedder;
    let texts: Vec<String> = posts.iter().map(|p| p.text.clone()).collect();
    let vectors = embedder.embed(&texts).await.unwrap();
    let records: Vec<PointRecord> = posts
        .iter()
        .zip(vectors)
        .map(|(post, vector)| {
            let mut vectors = HashMap::new();
            vectors.insert(TEXT_VECTOR.to_string(), vector);
            PointRecord {
                id: post.post_id,
                vectors,
                payload: serde_json::to_value(post).unwrap(),
            }
        })
        .collect();
    store.upsert(COLLECTION_POSTS, records).await.unwrap();
}

fn plan_response(refined: &str) -> serde_json::Value {
    json!({"refined_text": refined, "entities": [], "locations": []})
}

fn misinfo_response() -> serde_json::Value {
    json!({
        "is_suspicious": false,
        "suspicious_patterns": [],
        "risk_level": "low",
        "recommendation": "No action needed."
    })
}

fn followup_response(questions: &[(&str, &str, u8)]) -> serde_json::Value {
    json!({
        "questions": questions
            .iter()
            .map(|(q, c, p)| json!({"question": q, "category": c, "priority": p}))
            .collect::<Vec<_>>()
    })
}

fn timeline_event(ts: &str, summary: &str, sources: &[Uuid]) -> serde_json::Value {
    json!({
        "timestamp": ts,
        "summary": summary,
        "sources": sources.iter().map(|s| s.to_string()).collect::<Vec<_>>()
    })
}

fn request(topic: &str, limit: usize, min_credibility: f64) -> TimelineRequest {
    TimelineRequest {
        topic: topic.to_string(),
        limit,
        min_credibility,
        ..TimelineRequest::default()
    }
}

// ---- S1: empty collection degrades to an empty timeline ----

#[tokio::test]
async fn empty_store_returns_empty_timeline() {
    let provider = RoutedProvider::new()
        .route_tool_inputs("emit_query_plan", vec![plan_response("anything at all")]);
    let harness = harness(provider, LimitsConfig::default()).await;

    let response = harness
        .pipeline
        .handle(request("anything", 10, 0.3))
        .await
        .unwrap();

    assert_eq!(response.topic, "anything");
    assert!(response.events.is_empty());
    assert_eq!(response.total_sources, 0);
    assert_eq!(response.avg_credibility, 0.0);
    assert!(response.misinformation.is_none());
    assert_eq!(response.follow_ups.map(|q| q.len()), Some(0));
}

// ---- S2: basic timeline over five posts ----

#[tokio::test]
async fn basic_timeline_is_chronological_grounded_and_averaged() {
    // Dense and sparse scores tie within the flood bucket, so fused order
    // falls to rank plus the credibility term: limit 3 retrieves P5, P1, P2.
    let provider = RoutedProvider::new()
        .route_tool_inputs("emit_query_plan", vec![plan_response("Mumbai floods")])
        .route_tool_inputs(
            "emit_timeline",
            vec![json!({
                "topic": "Mumbai floods",
                "events": [
                    timeline_event("2024-07-05T09:00:00Z", "Warning extended", &[post_id(5)]),
                    timeline_event("2024-07-01T09:00:00Z", "First reports", &[post_id(1)]),
                    timeline_event("2024-07-02T09:00:00Z", "Rescue under way", &[post_id(2)]),
                ]
            })],
        )
        .route_tool_inputs("emit_misinformation_analysis", vec![misinfo_response()])
        .route_tool_inputs(
            "emit_follow_up_questions",
            vec![followup_response(&[("What caused it?", "deep_dive", 4)])],
        );
    let harness = harness(provider, LimitsConfig::default()).await;
    seed_posts(&harness.store, &flood_posts()).await;

    let response = harness
        .pipeline
        .handle(request("Mumbai floods", 3, 0.3))
        .await
        .unwrap();

    assert_eq!(response.events.len(), 3);
    // Chronology: ascending timestamps regardless of model order.
    for pair in response.events.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
    // Groundedness: every cited id is one of the seeded posts.
    let known: Vec<Uuid> = (1..=5).map(post_id).collect();
    for event in &response.events {
        assert!(!event.sources.is_empty());
        assert!(event.sources.iter().all(|s| known.contains(s)));
    }
    // Credibility derivation: event scores are the cited posts' persisted
    // scores, and the average matches their mean.
    let scores: Vec<f64> = response.events.iter().map(|e| e.credibility_score).collect();
    assert!(scores.contains(&0.9) && scores.contains(&0.8) && scores.contains(&0.95));
    let expected_avg = scores.iter().sum::<f64>() / scores.len() as f64;
    assert!((response.avg_credibility - expected_avg).abs() < 1e-9);
    assert_eq!(response.total_sources, 3);
    assert!(response.misinformation.is_some());
}

// ---- S3: credibility filter rejects citations of filtered posts ----

#[tokio::test]
async fn citing_a_filtered_post_is_a_schema_violation() {
    // With min_credibility 0.85 only P1 and P5 are retrievable. The model
    // insists on citing P3 every attempt, so validation exhausts retries.
    let bad_timeline = json!({
        "topic": "Mumbai floods",
        "events": [
            timeline_event("2024-07-03T09:00:00Z", "Fabricated citation", &[post_id(3)]),
        ]
    });
    let provider = RoutedProvider::new()
        .route_tool_inputs("emit_query_plan", vec![plan_response("Mumbai floods")])
        .route_tool_inputs(
            "emit_timeline",
            vec![bad_timeline.clone(), bad_timeline.clone(), bad_timeline],
        );
    let harness = harness(provider, LimitsConfig::default()).await;
    seed_posts(&harness.store, &flood_posts()).await;

    let err = harness
        .pipeline
        .handle(request("Mumbai floods", 10, 0.85))
        .await
        .unwrap_err();
    assert!(matches!(err, ChronofactError::SchemaViolation(_)));
}

// ---- S4: image context flows into the refined query ----

#[tokio::test]
async fn visual_context_reaches_retrieval_and_synthesis() {
    // No emit_query_plan route: interpretation fails and the pipeline falls
    // back to the combined query, so the visual context must survive into
    // the synthesis prompt verbatim.
    let provider = RoutedProvider::new()
        .route_tool_inputs(
            "emit_visual_context",
            vec![json!({
                "visual_context": "flood waters, damaged roads, rescue boats",
                "entities": ["rescue boats"]
            })],
        )
        .route_tool_inputs(
            "emit_timeline",
            vec![json!({
                "topic": "Mumbai floods",
                "events": [
                    timeline_event("2024-07-05T09:00:00Z", "Warning extended", &[post_id(5)]),
                ]
            })],
        )
        .route_tool_inputs("emit_misinformation_analysis", vec![misinfo_response()])
        .route_tool_inputs(
            "emit_follow_up_questions",
            vec![followup_response(&[("Which wards flooded?", "deep_dive", 3)])],
        );
    let recorder = provider.recorder();
    let harness = harness(provider, LimitsConfig::default()).await;
    seed_posts(&harness.store, &flood_posts()).await;

    let mut req = request("Mumbai floods", 3, 0.3);
    // A small JPEG-ish payload, well under the size limit.
    req.image = Some(vec![0xff, 0xd8, 0xff, 0xe0, 1, 2, 3, 4]);

    let response = harness.pipeline.handle(req).await.unwrap();
    assert!(!response.events.is_empty());

    let recorded = recorder.lock().unwrap();
    let synthesis = recorded
        .iter()
        .find(|r| r.tool.as_ref().is_some_and(|t| t.name == "emit_timeline"))
        .expect("timeline synthesis was called");
    let prompt = synthesis
        .messages
        .iter()
        .flat_map(|m| m.content.iter())
        .find_map(|part| match part {
            ContentPart::Text { text } => Some(text.clone()),
            _ => None,
        })
        .expect("synthesis prompt has text");
    assert!(
        prompt.contains("rescue boats"),
        "visual context missing from refined query: {prompt}"
    );
}

// ---- oversized image is rejected up front ----

#[tokio::test]
async fn oversized_image_fails_with_payload_too_large() {
    let provider = RoutedProvider::new();
    let limits = LimitsConfig {
        image_max_bytes: 1024,
        ..LimitsConfig::default()
    };
    let harness = harness(provider, limits).await;

    let mut req = request("floods", 10, 0.3);
    req.image = Some(vec![0u8; 4096]);

    let err = harness.pipeline.handle(req).await.unwrap_err();
    assert!(matches!(err, ChronofactError::PayloadTooLarge { .. }));
}

// ---- S5: follow-up uniqueness against prior questions ----

#[tokio::test]
async fn follow_ups_never_repeat_prior_questions() {
    let provider = RoutedProvider::new()
        .route_tool_inputs("emit_query_plan", vec![plan_response("Mumbai floods")])
        .route_tool_inputs(
            "emit_timeline",
            vec![json!({
                "topic": "Mumbai floods",
                "events": [
                    timeline_event("2024-07-01T09:00:00Z", "First reports", &[post_id(1)]),
                ]
            })],
        )
        .route_tool_inputs("emit_misinformation_analysis", vec![misinfo_response()])
        .route_tool_inputs(
            "emit_follow_up_questions",
            vec![
                // First attempt repeats a prior question and is rejected.
                followup_response(&[("  q1 ", "verification", 2)]),
                followup_response(&[("How deep was the water?", "deep_dive", 4)]),
            ],
        );
    let harness = harness(provider, LimitsConfig::default()).await;
    seed_posts(&harness.store, &flood_posts()).await;

    let mut req = request("Mumbai floods", 3, 0.3);
    req.previous_questions = vec!["Q1".to_string(), "Q2".to_string()];

    let response = harness.pipeline.handle(req).await.unwrap();
    let questions = response.follow_ups.expect("follow-ups present");
    assert!(!questions.is_empty());
    for q in &questions {
        let key = q.question.trim().to_lowercase();
        assert_ne!(key, "q1");
        assert_ne!(key, "q2");
    }
}

// ---- auxiliary failures degrade, never fail the request ----

#[tokio::test]
async fn failed_misinformation_analysis_degrades_to_null() {
    let provider = RoutedProvider::new()
        .route_tool_inputs("emit_query_plan", vec![plan_response("Mumbai floods")])
        .route_tool_inputs(
            "emit_timeline",
            vec![json!({
                "topic": "Mumbai floods",
                "events": [
                    timeline_event("2024-07-01T09:00:00Z", "First reports", &[post_id(1)]),
                ]
            })],
        )
        .route(
            "emit_misinformation_analysis",
            vec![ScriptedResponse::Error("provider melted".to_string())],
        )
        .route_tool_inputs(
            "emit_follow_up_questions",
            vec![followup_response(&[("What next?", "prediction", 3)])],
        );
    let harness = harness(provider, LimitsConfig::default()).await;
    seed_posts(&harness.store, &flood_posts()).await;

    let response = harness
        .pipeline
        .handle(request("Mumbai floods", 3, 0.3))
        .await
        .unwrap();

    assert!(!response.events.is_empty());
    assert!(response.misinformation.is_none());
    assert!(response.misinformation_error.is_some());
    assert!(response.follow_ups.is_some());
}

// ---- empty retrieval with a credibility floor retries at zero ----

#[tokio::test]
async fn credibility_floor_relaxes_when_nothing_matches() {
    // Every post sits below the requested floor; the recovery retry at
    // min_credibility 0 must surface them.
    let provider = RoutedProvider::new()
        .route_tool_inputs("emit_query_plan", vec![plan_response("Mumbai floods")])
        .route_tool_inputs(
            "emit_timeline",
            vec![json!({
                "topic": "Mumbai floods",
                "events": [
                    timeline_event("2024-07-03T09:00:00Z", "Shops damaged", &[post_id(3)]),
                ]
            })],
        )
        .route_tool_inputs("emit_misinformation_analysis", vec![misinfo_response()])
        .route_tool_inputs(
            "emit_follow_up_questions",
            vec![followup_response(&[("More?", "related_topic", 1)])],
        );
    let harness = harness(provider, LimitsConfig::default()).await;

    let mut posts = flood_posts();
    for post in &mut posts {
        post.credibility_score = 0.1;
    }
    seed_posts(&harness.store, &posts).await;

    let response = harness
        .pipeline
        .handle(request("Mumbai floods", 3, 0.9))
        .await
        .unwrap();
    assert_eq!(response.events.len(), 1);
}

// ---- P10: deadline propagation leaves no memory writes ----

#[tokio::test]
async fn deadline_failure_persists_no_memory() {
    let provider = RoutedProvider::new()
        .route_tool_inputs("emit_query_plan", vec![plan_response("slow")])
        .with_delay(Duration::from_millis(500));
    let limits = LimitsConfig {
        request_deadline_ms: 100,
        ..LimitsConfig::default()
    };
    let harness = harness(provider, limits).await;
    seed_posts(&harness.store, &flood_posts()).await;

    let mut req = request("Mumbai floods", 3, 0.3);
    req.session_id = Some("session-deadline".to_string());

    let started = std::time::Instant::now();
    let err = harness.pipeline.handle(req).await.unwrap_err();
    assert!(matches!(err, ChronofactError::DeadlineExceeded { .. }));
    assert!(
        started.elapsed() < Duration::from_millis(150),
        "deadline failure took {:?}",
        started.elapsed()
    );

    harness.pipeline.memory_writer().settle().await;
    assert_eq!(
        harness.store.count(COLLECTION_MEMORY, None).await.unwrap(),
        0,
        "no memory write may survive a deadline failure"
    );
}

// ---- successful requests leave an interaction memory ----

#[tokio::test]
async fn successful_request_stores_interaction_memory() {
    let provider = RoutedProvider::new()
        .route_tool_inputs("emit_query_plan", vec![plan_response("Mumbai floods")])
        .route_tool_inputs(
            "emit_timeline",
            vec![json!({
                "topic": "Mumbai floods",
                "events": [
                    timeline_event("2024-07-01T09:00:00Z", "First reports", &[post_id(1)]),
                ]
            })],
        )
        .route_tool_inputs("emit_misinformation_analysis", vec![misinfo_response()])
        .route_tool_inputs(
            "emit_follow_up_questions",
            vec![followup_response(&[("More?", "related_topic", 1)])],
        );
    let harness = harness(provider, LimitsConfig::default()).await;
    seed_posts(&harness.store, &flood_posts()).await;

    let mut req = request("Mumbai floods", 3, 0.3);
    req.session_id = Some("session-s".to_string());

    harness.pipeline.handle(req).await.unwrap();
    harness.pipeline.memory_writer().settle().await;

    assert_eq!(
        harness.store.count(COLLECTION_MEMORY, None).await.unwrap(),
        1,
        "interaction memory stored after response"
    );
    let page = harness
        .store
        .scroll(COLLECTION_MEMORY, None, None, 10)
        .await
        .unwrap();
    let payload = &page.points[0].payload;
    assert_eq!(payload["session_id"], "session-s");
    assert_eq!(payload["memory_type"], "interaction");
    assert_eq!(payload["relevance_score"], 1.0);
    let content = payload["content"].as_str().unwrap();
    assert!(content.contains("Mumbai floods"));
    assert!(content.contains("First reports"));
}
