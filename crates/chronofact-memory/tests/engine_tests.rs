// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the memory evolution engine over the in-process
//! store, with explicit clocks so elapsed time is controlled.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use chronofact_config::model::MemoryConfig;
use chronofact_core::error::ChronofactError;
use chronofact_core::traits::{TextEmbedder, VectorStore};
use chronofact_core::types::{COLLECTION_MEMORY, TEXT_VECTOR};
use chronofact_core::vector::PointRecord;
use chronofact_memory::{MemoryEngine, MemoryRecord, MemoryType};
use chronofact_vector::setup::memory_collection;
use chronofact_vector::MemoryVectorStore;

/// Embedder that buckets content by leading keyword so similarity is
/// controlled by the test.
struct StubEmbedder;

#[async_trait]
impl TextEmbedder for StubEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChronofactError> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 384];
                let bucket = if t.starts_with("flood") {
                    0
                } else if t.starts_with("election") {
                    1
                } else {
                    2
                };
                v[bucket] = 1.0;
                v
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        384
    }
}

async fn engine() -> (MemoryEngine, Arc<MemoryVectorStore>) {
    let store = Arc::new(MemoryVectorStore::new());
    store.ensure_collection(&memory_collection()).await.unwrap();
    let engine = MemoryEngine::new(store.clone(), Arc::new(StubEmbedder), MemoryConfig::default());
    (engine, store)
}

fn t0() -> DateTime<Utc> {
    "2024-07-01T00:00:00Z".parse().unwrap()
}

fn flood_query() -> Vec<f32> {
    let mut v = vec![0.0f32; 384];
    v[0] = 1.0;
    v
}

async fn payload_of(store: &MemoryVectorStore, id: Uuid) -> MemoryRecord {
    let records = store.retrieve(COLLECTION_MEMORY, &[id]).await.unwrap();
    serde_json::from_value(records[0].payload.clone()).unwrap()
}

#[tokio::test]
async fn store_initializes_evolution_metadata() {
    let (engine, store) = engine().await;
    let id = engine
        .store_at("session-1", "flood query about Mumbai", MemoryType::Interaction, t0())
        .await
        .unwrap();

    let record = payload_of(&store, id).await;
    assert_eq!(record.session_id, "session-1");
    assert_eq!(record.relevance_score, 1.0);
    assert_eq!(record.access_count, 0);
    assert_eq!(record.decay_rate, 0.02);
    assert!(!record.is_consolidated);
    assert!(record.parent_memories.is_empty());
    assert_eq!(record.created_at, t0());
}

#[tokio::test]
async fn decay_rates_follow_memory_type() {
    let (engine, store) = engine().await;
    let fact = engine
        .store_at("s", "flood fact", MemoryType::Fact, t0())
        .await
        .unwrap();
    let pref = engine
        .store_at("s", "flood preference", MemoryType::Preference, t0())
        .await
        .unwrap();
    assert_eq!(payload_of(&store, fact).await.decay_rate, 0.005);
    assert_eq!(payload_of(&store, pref).await.decay_rate, 0.01);
}

#[tokio::test]
async fn reinforcement_never_decreases_relevance_or_access_count() {
    let (engine, store) = engine().await;
    let id = engine
        .store_at("s", "flood memory", MemoryType::Interaction, t0())
        .await
        .unwrap();

    let mut previous_relevance = 0.0;
    let mut previous_count = 0;
    for round in 1..=5 {
        let hits = engine
            .retrieve_and_reinforce_at("s", &flood_query(), 10, 0.0, t0() + Duration::hours(round))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        let record = payload_of(&store, id).await;
        assert!(record.relevance_score >= previous_relevance);
        assert!(record.access_count > previous_count);
        assert!(record.relevance_score <= 1.0);
        previous_relevance = record.relevance_score;
        previous_count = record.access_count;
    }
}

#[tokio::test]
async fn session_filter_isolates_memories() {
    let (engine, _store) = engine().await;
    engine
        .store_at("session-a", "flood in a", MemoryType::Interaction, t0())
        .await
        .unwrap();
    engine
        .store_at("session-b", "flood in b", MemoryType::Interaction, t0())
        .await
        .unwrap();

    let hits = engine
        .retrieve_and_reinforce_at("session-a", &flood_query(), 10, 0.0, t0())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.session_id, "session-a");
}

#[tokio::test]
async fn decay_then_reinforce_matches_expected_values() {
    let (engine, store) = engine().await;
    let id = engine
        .store_at("s", "flood memory", MemoryType::Interaction, t0())
        .await
        .unwrap();

    // Ten days later, one global decay: 1.0 * e^(-0.02 * 10) ~ 0.8187.
    let after_ten_days = t0() + Duration::days(10);
    let (updated, deleted) = engine.apply_global_decay_at(after_ten_days).await.unwrap();
    assert_eq!(updated, 1);
    assert_eq!(deleted, 0);

    let decayed = payload_of(&store, id).await.relevance_score;
    assert!((decayed - 0.818_730_75).abs() < 1e-6, "decayed to {decayed}");

    // A retrieval hit then reinforces: 0.8187 + 0.1 * (1 - 0.8187) ~ 0.8368.
    engine
        .retrieve_and_reinforce_at("s", &flood_query(), 10, 0.0, after_ten_days)
        .await
        .unwrap();
    let reinforced = payload_of(&store, id).await.relevance_score;
    assert!((reinforced - 0.836_857_68).abs() < 1e-6, "reinforced to {reinforced}");
}

#[tokio::test]
async fn decay_at_zero_elapsed_is_a_no_op() {
    let (engine, store) = engine().await;
    let id = engine
        .store_at("s", "flood memory", MemoryType::Interaction, t0())
        .await
        .unwrap();

    let now = t0() + Duration::days(3);
    engine.apply_global_decay_at(now).await.unwrap();
    let first = payload_of(&store, id).await.relevance_score;

    // Same instant again: no time advanced, nothing changes.
    let (updated, deleted) = engine.apply_global_decay_at(now).await.unwrap();
    let second = payload_of(&store, id).await.relevance_score;
    assert_eq!(deleted, 0);
    assert_eq!(updated, 0, "zero-elapsed sweep should write nothing");
    assert!((first - second).abs() < f64::EPSILON);
}

#[tokio::test]
async fn decayed_below_threshold_is_deleted_and_unreachable() {
    let (engine, store) = engine().await;
    engine
        .store_at("s", "flood memory", MemoryType::Interaction, t0())
        .await
        .unwrap();

    // e^(-0.02 * d) < 0.2 needs d > ~80.5 days.
    let (_, deleted) = engine
        .apply_global_decay_at(t0() + Duration::days(120))
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(store.count(COLLECTION_MEMORY, None).await.unwrap(), 0);
}

#[tokio::test]
async fn sub_threshold_memory_is_unreachable_even_without_decay() {
    let (engine, store) = engine().await;

    // Write a below-threshold record directly; retrieval must never see it.
    let record = MemoryRecord {
        memory_id: Uuid::new_v4(),
        session_id: "s".to_string(),
        content: "flood faded memory".to_string(),
        memory_type: MemoryType::Interaction,
        created_at: t0(),
        last_accessed: t0(),
        access_count: 3,
        relevance_score: 0.1,
        decay_rate: 0.02,
        is_consolidated: false,
        parent_memories: Vec::new(),
    };
    let mut vectors = HashMap::new();
    vectors.insert(TEXT_VECTOR.to_string(), flood_query());
    store
        .upsert(
            COLLECTION_MEMORY,
            vec![PointRecord {
                id: record.memory_id,
                vectors,
                payload: serde_json::to_value(&record).unwrap(),
            }],
        )
        .await
        .unwrap();

    let hits = engine
        .retrieve_and_reinforce_at("s", &flood_query(), 10, 0.0, t0())
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn similar_memories_consolidate_into_one() {
    let (engine, store) = engine().await;
    let a = engine
        .store_at("s", "flood waters rising in Kurla East today", MemoryType::Fact, t0())
        .await
        .unwrap();
    let b = engine
        .store_at("s", "flood waters rising", MemoryType::Fact, t0())
        .await
        .unwrap();
    // Different bucket: must not join the cluster.
    let unrelated = engine
        .store_at("s", "election results announced", MemoryType::Fact, t0())
        .await
        .unwrap();

    let consolidated = engine
        .consolidate_similar_at(0.85, t0() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(consolidated, 1);

    // Children gone, unrelated memory intact.
    assert!(store.retrieve(COLLECTION_MEMORY, &[a, b]).await.unwrap().is_empty());
    assert_eq!(store.retrieve(COLLECTION_MEMORY, &[unrelated]).await.unwrap().len(), 1);

    // The merged memory keeps the longest content and records its parents.
    let page = store.scroll(COLLECTION_MEMORY, None, None, 10).await.unwrap();
    let merged = page
        .points
        .iter()
        .filter_map(|p| serde_json::from_value::<MemoryRecord>(p.payload.clone()).ok())
        .find(|r| r.is_consolidated)
        .expect("consolidated memory exists");
    assert_eq!(merged.content, "flood waters rising in Kurla East today");
    assert_eq!(merged.relevance_score, 1.0);
    assert_eq!(merged.parent_memories.len(), 2);
    assert!(merged.parent_memories.contains(&a));
    assert!(merged.parent_memories.contains(&b));
}

#[tokio::test]
async fn consolidation_ignores_cross_session_twins() {
    let (engine, _store) = engine().await;
    engine
        .store_at("session-a", "flood report", MemoryType::Fact, t0())
        .await
        .unwrap();
    engine
        .store_at("session-b", "flood report", MemoryType::Fact, t0())
        .await
        .unwrap();

    let consolidated = engine.consolidate_similar_at(0.85, t0()).await.unwrap();
    assert_eq!(consolidated, 0);
}

#[tokio::test]
async fn stats_reflect_collection() {
    let (engine, _store) = engine().await;
    engine
        .store_at("s", "flood one", MemoryType::Interaction, t0())
        .await
        .unwrap();
    engine
        .store_at("s", "flood two", MemoryType::Fact, t0())
        .await
        .unwrap();

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.total_memories, 2);
    assert!((stats.avg_relevance - 1.0).abs() < f64::EPSILON);
    assert_eq!(stats.by_type.get("interaction"), Some(&1));
    assert_eq!(stats.by_type.get("fact"), Some(&1));
    assert_eq!(stats.below_threshold, 0);
}
