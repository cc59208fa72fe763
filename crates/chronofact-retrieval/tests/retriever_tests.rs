// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the hybrid retriever over the in-process store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use chronofact_config::model::RetrievalConfig;
use chronofact_core::error::ChronofactError;
use chronofact_core::traits::{TextEmbedder, VectorStore};
use chronofact_core::types::{Post, QueryPlan, COLLECTION_POSTS, TEXT_VECTOR};
use chronofact_core::vector::{PointRecord, QueryRequest, ScoredPoint, SparseQueryRequest};
use chronofact_retrieval::HybridRetriever;
use chronofact_vector::setup::posts_collection;
use chronofact_vector::MemoryVectorStore;

/// Deterministic embedder: buckets text by keyword into fixed directions so
/// tests control which posts are semantically "close".
struct StubEmbedder;

fn direction(text: &str) -> usize {
    let lower = text.to_lowercase();
    if lower.contains("flood") {
        0
    } else if lower.contains("election") {
        1
    } else {
        2
    }
}

#[async_trait]
impl TextEmbedder for StubEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChronofactError> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 384];
                v[direction(t)] = 1.0;
                // Small text-length component for stable intra-bucket order.
                v[3] = (t.len() % 7) as f32 / 100.0;
                v
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        384
    }
}

fn post(id: u128, text: &str, author: &str, ts: &str, credibility: f64) -> Post {
    Post {
        post_id: Uuid::from_u128(id),
        text: text.to_string(),
        author: author.to_string(),
        timestamp: ts.parse().unwrap(),
        credibility_score: credibility,
        location: Some("Mumbai".to_string()),
        is_verified: None,
        fave_count: None,
        retweet_count: None,
        media_urls: Vec::new(),
        image_caption: None,
    }
}

async fn seeded_store(embedder: &StubEmbedder, posts: &[Post]) -> Arc<MemoryVectorStore> {
    let store = Arc::new(MemoryVectorStore::new());
    store.ensure_collection(&posts_collection()).await.unwrap();

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
    store
}

fn plan(text: &str, min_credibility: f64, limit: usize) -> QueryPlan {
    QueryPlan {
        refined_text: text.to_string(),
        entities: Vec::new(),
        locations: Vec::new(),
        time_range: None,
        min_credibility,
        limit,
        image_vector: None,
    }
}

fn sample_posts() -> Vec<Post> {
    vec![
        post(1, "flood waters rising in Kurla", "rep_a", "2024-07-01T08:00:00Z", 0.9),
        post(2, "flood rescue boats deployed", "rep_b", "2024-07-02T08:00:00Z", 0.8),
        post(3, "flood damage to local shops", "rep_c", "2024-07-03T08:00:00Z", 0.5),
        post(4, "election rally draws crowds", "rep_d", "2024-07-03T09:00:00Z", 0.7),
        post(5, "flood warning extended", "rep_e", "2024-07-04T08:00:00Z", 0.95),
    ]
}

#[tokio::test]
async fn retrieval_is_deterministic_under_fixed_embeddings() {
    let embedder = Arc::new(StubEmbedder);
    let store = seeded_store(&embedder, &sample_posts()).await;
    let retriever = HybridRetriever::new(store, embedder, RetrievalConfig::default());

    let first = retriever.retrieve(&plan("flood Mumbai", 0.0, 5)).await.unwrap();
    let second = retriever.retrieve(&plan("flood Mumbai", 0.0, 5)).await.unwrap();

    let ids = |outcome: &chronofact_retrieval::RetrievalOutcome| {
        outcome.posts.iter().map(|p| p.post.post_id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert!(!first.partial);
}

#[tokio::test]
async fn min_credibility_filters_sub_queries() {
    let embedder = Arc::new(StubEmbedder);
    let store = seeded_store(&embedder, &sample_posts()).await;
    let retriever = HybridRetriever::new(store, embedder, RetrievalConfig::default());

    let outcome = retriever.retrieve(&plan("flood Mumbai", 0.85, 10)).await.unwrap();
    let ids: Vec<Uuid> = outcome.posts.iter().map(|p| p.post.post_id).collect();
    assert!(ids.contains(&Uuid::from_u128(1)));
    assert!(ids.contains(&Uuid::from_u128(5)));
    assert!(
        outcome.posts.iter().all(|p| p.post.credibility_score >= 0.85),
        "credibility filter leaked: {ids:?}"
    );
}

#[tokio::test]
async fn keyword_and_semantic_agreement_ranks_first() {
    let embedder = Arc::new(StubEmbedder);
    let store = seeded_store(&embedder, &sample_posts()).await;
    let retriever = HybridRetriever::new(store, embedder, RetrievalConfig::default());

    // "flood" posts hit both the dense bucket and the sparse term; the
    // election post can only surface via dense residual similarity.
    let outcome = retriever.retrieve(&plan("flood", 0.0, 5)).await.unwrap();
    assert!(!outcome.posts.is_empty());
    assert!(
        outcome.posts[0].post.text.contains("flood"),
        "expected a flood post first, got '{}'",
        outcome.posts[0].post.text
    );
    let top = &outcome.posts[0];
    assert!(top.component_scores.dense > 0.0);
    assert!(top.component_scores.sparse > 0.0);
}

#[tokio::test]
async fn empty_collection_returns_empty_not_error() {
    let embedder = Arc::new(StubEmbedder);
    let store = seeded_store(&embedder, &[]).await;
    let retriever = HybridRetriever::new(store, embedder, RetrievalConfig::default());

    let outcome = retriever.retrieve(&plan("anything", 0.3, 10)).await.unwrap();
    assert!(outcome.posts.is_empty());
    assert!(!outcome.partial);
}

#[tokio::test]
async fn limit_truncates_results() {
    let embedder = Arc::new(StubEmbedder);
    let store = seeded_store(&embedder, &sample_posts()).await;
    let retriever = HybridRetriever::new(store, embedder, RetrievalConfig::default());

    let outcome = retriever.retrieve(&plan("flood", 0.0, 2)).await.unwrap();
    assert_eq!(outcome.posts.len(), 2);
}

/// Store wrapper that fails selected sub-queries.
struct FlakyStore {
    inner: Arc<MemoryVectorStore>,
    fail_dense: bool,
    fail_sparse: bool,
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn ensure_collection(
        &self,
        spec: &chronofact_core::vector::CollectionSpec,
    ) -> Result<(), ChronofactError> {
        self.inner.ensure_collection(spec).await
    }

    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<(), ChronofactError> {
        self.inner.upsert(collection, points).await
    }

    async fn query(&self, request: QueryRequest) -> Result<Vec<ScoredPoint>, ChronofactError> {
        if self.fail_dense {
            return Err(ChronofactError::Store {
                message: "dense backend down".into(),
                source: None,
            });
        }
        self.inner.query(request).await
    }

    async fn sparse_query(
        &self,
        request: SparseQueryRequest,
    ) -> Result<Vec<ScoredPoint>, ChronofactError> {
        if self.fail_sparse {
            return Err(ChronofactError::Store {
                message: "sparse backend down".into(),
                source: None,
            });
        }
        self.inner.sparse_query(request).await
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&chronofact_core::vector::Filter>,
        cursor: Option<chronofact_core::vector::ScrollCursor>,
        batch: usize,
    ) -> Result<chronofact_core::vector::ScrollPage, ChronofactError> {
        self.inner.scroll(collection, filter, cursor, batch).await
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<Vec<PointRecord>, ChronofactError> {
        self.inner.retrieve(collection, ids).await
    }

    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<(), ChronofactError> {
        self.inner.delete(collection, ids).await
    }

    async fn set_payload(
        &self,
        collection: &str,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<(), ChronofactError> {
        self.inner.set_payload(collection, id, patch).await
    }

    async fn count(
        &self,
        collection: &str,
        filter: Option<&chronofact_core::vector::Filter>,
    ) -> Result<usize, ChronofactError> {
        self.inner.count(collection, filter).await
    }

    async fn health_check(&self) -> Result<(), ChronofactError> {
        self.inner.health_check().await
    }
}

#[tokio::test]
async fn one_failed_sub_query_degrades_to_partial() {
    let embedder = Arc::new(StubEmbedder);
    let inner = seeded_store(&embedder, &sample_posts()).await;
    let store = Arc::new(FlakyStore {
        inner,
        fail_dense: false,
        fail_sparse: true,
    });
    let retriever = HybridRetriever::new(store, embedder, RetrievalConfig::default());

    let outcome = retriever.retrieve(&plan("flood", 0.0, 5)).await.unwrap();
    assert!(outcome.partial);
    assert!(!outcome.posts.is_empty(), "dense survivors should be returned");
}

#[tokio::test]
async fn all_failed_sub_queries_is_retrieval_unavailable() {
    let embedder = Arc::new(StubEmbedder);
    let inner = seeded_store(&embedder, &sample_posts()).await;
    let store = Arc::new(FlakyStore {
        inner,
        fail_dense: true,
        fail_sparse: true,
    });
    let retriever = HybridRetriever::new(store, embedder, RetrievalConfig::default());

    let err = retriever.retrieve(&plan("flood", 0.0, 5)).await.unwrap_err();
    assert!(matches!(err, ChronofactError::RetrievalUnavailable(_)));
}
