// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process vector store engine.
//!
//! Backs the `memory` and `local` deployment modes and every test. Points
//! live in a `BTreeMap` per collection so scans and scrolls are
//! deterministic; dense queries are exact cosine scans, sparse queries score
//! BM25 over an index built at upsert from the declared payload text field.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use chronofact_core::error::ChronofactError;
use chronofact_core::traits::VectorStore;
use chronofact_core::vector::{
    CollectionSpec, Filter, PointRecord, QueryRequest, ScoredPoint, ScrollCursor, ScrollPage,
    SparseQueryRequest,
};

use crate::filter::matches;
use crate::tokenize::tokenize;

/// BM25 term-frequency saturation parameter.
const BM25_K1: f32 = 1.2;
/// BM25 length-normalization parameter.
const BM25_B: f32 = 0.75;

/// Term frequencies of one document under one sparse vector name.
#[derive(Debug, Clone, Default)]
struct SparseDoc {
    tf: HashMap<String, u32>,
    len: u32,
}

impl SparseDoc {
    fn from_text(text: &str) -> Self {
        let mut tf: HashMap<String, u32> = HashMap::new();
        let terms = tokenize(text);
        let len = terms.len() as u32;
        for term in terms {
            *tf.entry(term).or_insert(0) += 1;
        }
        Self { tf, len }
    }
}

#[derive(Debug, Clone)]
struct StoredPoint {
    vectors: HashMap<String, Vec<f32>>,
    payload: serde_json::Value,
    sparse: HashMap<String, SparseDoc>,
}

#[derive(Debug)]
struct Collection {
    spec: CollectionSpec,
    points: BTreeMap<Uuid, StoredPoint>,
}

impl Collection {
    fn build_sparse(&self, payload: &serde_json::Value) -> HashMap<String, SparseDoc> {
        self.spec
            .sparse
            .iter()
            .map(|s| {
                let text = payload.get(&s.source_field).and_then(|v| v.as_str()).unwrap_or("");
                (s.name.clone(), SparseDoc::from_text(text))
            })
            .collect()
    }
}

/// In-process, concurrency-safe vector store.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }
    dot / (na * nb)
}

/// Sort scored points descending, breaking ties by ascending id so results
/// are stable across runs.
fn sort_scored(results: &mut [ScoredPoint]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn merge_payload(target: &mut serde_json::Value, patch: &serde_json::Value) {
    if let (Some(target_map), Some(patch_map)) = (target.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_map {
            target_map.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), ChronofactError> {
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(&spec.name) {
            for vector in &spec.vectors {
                match existing.spec.vector_dimensions(&vector.name) {
                    Some(dims) if dims == vector.dimensions => {}
                    Some(dims) => {
                        return Err(ChronofactError::SchemaMismatch {
                            collection: spec.name.clone(),
                            detail: format!(
                                "vector '{}' has {dims} dimensions, declared {}",
                                vector.name, vector.dimensions
                            ),
                        })
                    }
                    None => {
                        return Err(ChronofactError::SchemaMismatch {
                            collection: spec.name.clone(),
                            detail: format!("vector '{}' missing from existing collection", vector.name),
                        })
                    }
                }
            }
            return Ok(());
        }
        collections.insert(
            spec.name.clone(),
            Collection {
                spec: spec.clone(),
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<(), ChronofactError> {
        let mut collections = self.collections.write().await;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| ChronofactError::NotFound(format!("collection '{collection}'")))?;

        for point in points {
            for (name, vector) in &point.vectors {
                match coll.spec.vector_dimensions(name) {
                    Some(dims) if dims == vector.len() => {}
                    Some(dims) => {
                        return Err(ChronofactError::SchemaMismatch {
                            collection: collection.to_string(),
                            detail: format!(
                                "vector '{name}' has {} values, collection expects {dims}",
                                vector.len()
                            ),
                        })
                    }
                    None => {
                        return Err(ChronofactError::SchemaMismatch {
                            collection: collection.to_string(),
                            detail: format!("vector '{name}' not declared on collection"),
                        })
                    }
                }
            }
            let sparse = coll.build_sparse(&point.payload);
            coll.points.insert(
                point.id,
                StoredPoint {
                    vectors: point.vectors,
                    payload: point.payload,
                    sparse,
                },
            );
        }
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<Vec<ScoredPoint>, ChronofactError> {
        let collections = self.collections.read().await;
        let coll = collections
            .get(&request.collection)
            .ok_or_else(|| ChronofactError::NotFound(format!("collection '{}'", request.collection)))?;

        if coll.spec.vector_dimensions(&request.using).is_none() {
            return Err(ChronofactError::SchemaMismatch {
                collection: request.collection.clone(),
                detail: format!("named vector '{}' not declared", request.using),
            });
        }

        let mut results: Vec<ScoredPoint> = coll
            .points
            .iter()
            .filter_map(|(id, point)| {
                let vector = point.vectors.get(&request.using)?;
                if let Some(filter) = &request.filter {
                    if !matches(filter, &point.payload) {
                        return None;
                    }
                }
                let score = cosine(&request.vector, vector);
                if let Some(threshold) = request.score_threshold {
                    if score < threshold {
                        return None;
                    }
                }
                Some(ScoredPoint {
                    id: *id,
                    score,
                    payload: if request.with_payload {
                        point.payload.clone()
                    } else {
                        serde_json::Value::Null
                    },
                })
            })
            .collect();

        sort_scored(&mut results);
        results.truncate(request.limit);
        Ok(results)
    }

    async fn sparse_query(
        &self,
        request: SparseQueryRequest,
    ) -> Result<Vec<ScoredPoint>, ChronofactError> {
        let collections = self.collections.read().await;
        let coll = collections
            .get(&request.collection)
            .ok_or_else(|| ChronofactError::NotFound(format!("collection '{}'", request.collection)))?;

        if !coll.spec.sparse.iter().any(|s| s.name == request.using) {
            return Err(ChronofactError::SchemaMismatch {
                collection: request.collection.clone(),
                detail: format!("sparse vector '{}' not declared", request.using),
            });
        }

        // Corpus statistics over documents carrying this sparse vector.
        let docs: Vec<(&Uuid, &StoredPoint, &SparseDoc)> = coll
            .points
            .iter()
            .filter_map(|(id, p)| p.sparse.get(&request.using).map(|d| (id, p, d)))
            .collect();
        let total_docs = docs.len();
        if total_docs == 0 {
            return Ok(Vec::new());
        }
        let avg_len: f32 =
            docs.iter().map(|(_, _, d)| d.len as f32).sum::<f32>() / total_docs as f32;

        // Deduplicate query terms; BM25 scores each distinct term once.
        let mut terms: Vec<&String> = request.terms.iter().collect();
        terms.sort();
        terms.dedup();

        let idf: HashMap<&String, f32> = terms
            .iter()
            .map(|term| {
                let df = docs.iter().filter(|(_, _, d)| d.tf.contains_key(*term)).count() as f32;
                let n = total_docs as f32;
                (*term, ((n - df + 0.5) / (df + 0.5) + 1.0).ln())
            })
            .collect();

        let mut results: Vec<ScoredPoint> = docs
            .into_iter()
            .filter_map(|(id, point, doc)| {
                if let Some(filter) = &request.filter {
                    if !matches(filter, &point.payload) {
                        return None;
                    }
                }
                let mut score = 0.0f32;
                for term in &terms {
                    let Some(&tf) = doc.tf.get(*term) else { continue };
                    let tf = tf as f32;
                    let norm = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc.len as f32 / avg_len.max(1.0));
                    score += idf[*term] * tf * (BM25_K1 + 1.0) / norm;
                }
                if score <= 0.0 {
                    return None;
                }
                Some(ScoredPoint {
                    id: *id,
                    score,
                    payload: point.payload.clone(),
                })
            })
            .collect();

        sort_scored(&mut results);
        results.truncate(request.limit);
        Ok(results)
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        cursor: Option<ScrollCursor>,
        batch: usize,
    ) -> Result<ScrollPage, ChronofactError> {
        let collections = self.collections.read().await;
        let coll = collections
            .get(collection)
            .ok_or_else(|| ChronofactError::NotFound(format!("collection '{collection}'")))?;

        let after: Option<Uuid> = match cursor {
            Some(ScrollCursor(value)) => Some(
                value
                    .as_str()
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| ChronofactError::Internal("malformed scroll cursor".to_string()))?,
            ),
            None => None,
        };

        let mut points = Vec::with_capacity(batch);
        let mut next = None;
        let iter = coll.points.iter().filter(|(id, point)| {
            after.is_none_or(|a| **id > a)
                && filter.is_none_or(|f| matches(f, &point.payload))
        });
        for (id, point) in iter {
            if points.len() == batch {
                next = Some(ScrollCursor(serde_json::Value::String(
                    points
                        .last()
                        .map(|p: &PointRecord| p.id.to_string())
                        .unwrap_or_default(),
                )));
                break;
            }
            points.push(PointRecord {
                id: *id,
                vectors: point.vectors.clone(),
                payload: point.payload.clone(),
            });
        }
        Ok(ScrollPage { points, next })
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<Vec<PointRecord>, ChronofactError> {
        let collections = self.collections.read().await;
        let coll = collections
            .get(collection)
            .ok_or_else(|| ChronofactError::NotFound(format!("collection '{collection}'")))?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                coll.points.get(id).map(|p| PointRecord {
                    id: *id,
                    vectors: p.vectors.clone(),
                    payload: p.payload.clone(),
                })
            })
            .collect())
    }

    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<(), ChronofactError> {
        let mut collections = self.collections.write().await;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| ChronofactError::NotFound(format!("collection '{collection}'")))?;
        for id in ids {
            coll.points.remove(id);
        }
        Ok(())
    }

    async fn set_payload(
        &self,
        collection: &str,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<(), ChronofactError> {
        let mut collections = self.collections.write().await;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| ChronofactError::NotFound(format!("collection '{collection}'")))?;
        let spec_sparse: Vec<(String, String)> = coll
            .spec
            .sparse
            .iter()
            .map(|s| (s.name.clone(), s.source_field.clone()))
            .collect();
        let point = coll
            .points
            .get_mut(&id)
            .ok_or_else(|| ChronofactError::NotFound(format!("point '{id}' in '{collection}'")))?;
        merge_payload(&mut point.payload, &patch);
        // Re-tokenize any sparse vector whose source field the patch touched.
        if let Some(patched) = patch.as_object() {
            for (name, source_field) in spec_sparse {
                if patched.contains_key(&source_field) {
                    let text = point
                        .payload
                        .get(&source_field)
                        .and_then(|v| v.as_str())
                        .unwrap_or("");
                    point.sparse.insert(name, SparseDoc::from_text(text));
                }
            }
        }
        Ok(())
    }

    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<usize, ChronofactError> {
        let collections = self.collections.read().await;
        let coll = collections
            .get(collection)
            .ok_or_else(|| ChronofactError::NotFound(format!("collection '{collection}'")))?;
        Ok(coll
            .points
            .values()
            .filter(|p| filter.is_none_or(|f| matches(f, &p.payload)))
            .count())
    }

    async fn health_check(&self) -> Result<(), ChronofactError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronofact_core::vector::{Condition, SparseVectorSpec, VectorSpec};
    use serde_json::json;

    fn posts_spec() -> CollectionSpec {
        CollectionSpec {
            name: "x_posts".into(),
            vectors: vec![VectorSpec {
                name: "text".into(),
                dimensions: 3,
            }],
            sparse: vec![SparseVectorSpec {
                name: "text_bm25".into(),
                source_field: "text".into(),
            }],
            payload_indexes: vec![],
        }
    }

    fn point(id: u128, vector: Vec<f32>, payload: serde_json::Value) -> PointRecord {
        let mut vectors = HashMap::new();
        vectors.insert("text".to_string(), vector);
        PointRecord {
            id: Uuid::from_u128(id),
            vectors,
            payload,
        }
    }

    async fn store_with_points() -> MemoryVectorStore {
        let store = MemoryVectorStore::new();
        store.ensure_collection(&posts_spec()).await.unwrap();
        store
            .upsert(
                "x_posts",
                vec![
                    point(
                        1,
                        vec![1.0, 0.0, 0.0],
                        json!({"text": "flood waters rising", "credibility_score": 0.9, "location": "Mumbai"}),
                    ),
                    point(
                        2,
                        vec![0.0, 1.0, 0.0],
                        json!({"text": "rescue boats deployed downtown", "credibility_score": 0.5, "location": "Mumbai"}),
                    ),
                    point(
                        3,
                        vec![0.9, 0.1, 0.0],
                        json!({"text": "flood warning issued", "credibility_score": 0.7, "location": "Pune"}),
                    ),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let store = MemoryVectorStore::new();
        store.ensure_collection(&posts_spec()).await.unwrap();
        store.ensure_collection(&posts_spec()).await.unwrap();
        assert_eq!(store.count("x_posts", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ensure_collection_rejects_dimension_change() {
        let store = MemoryVectorStore::new();
        store.ensure_collection(&posts_spec()).await.unwrap();
        let mut changed = posts_spec();
        changed.vectors[0].dimensions = 4;
        let err = store.ensure_collection(&changed).await.unwrap_err();
        assert!(matches!(err, ChronofactError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn dense_query_orders_by_similarity() {
        let store = store_with_points().await;
        let results = store
            .query(QueryRequest {
                collection: "x_posts".into(),
                using: "text".into(),
                vector: vec![1.0, 0.0, 0.0],
                filter: None,
                limit: 10,
                with_payload: true,
                score_threshold: None,
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, Uuid::from_u128(1));
        assert_eq!(results[1].id, Uuid::from_u128(3));
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn dense_query_applies_filter() {
        let store = store_with_points().await;
        let filter = Filter::default().must(Condition::Range {
            key: "credibility_score".into(),
            gte: Some(0.7),
            lte: None,
        });
        let results = store
            .query(QueryRequest {
                collection: "x_posts".into(),
                using: "text".into(),
                vector: vec![1.0, 0.0, 0.0],
                filter: Some(filter),
                limit: 10,
                with_payload: true,
                score_threshold: None,
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.payload["credibility_score"].as_f64().unwrap() >= 0.7));
    }

    #[tokio::test]
    async fn dense_query_unknown_vector_is_schema_mismatch() {
        let store = store_with_points().await;
        let err = store
            .query(QueryRequest {
                collection: "x_posts".into(),
                using: "image".into(),
                vector: vec![1.0, 0.0, 0.0],
                filter: None,
                limit: 10,
                with_payload: true,
                score_threshold: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ChronofactError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn query_unknown_collection_is_not_found() {
        let store = MemoryVectorStore::new();
        let err = store
            .query(QueryRequest {
                collection: "missing".into(),
                using: "text".into(),
                vector: vec![1.0],
                filter: None,
                limit: 1,
                with_payload: false,
                score_threshold: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ChronofactError::NotFound(_)));
    }

    #[tokio::test]
    async fn sparse_query_matches_keyword_documents() {
        let store = store_with_points().await;
        let results = store
            .sparse_query(SparseQueryRequest {
                collection: "x_posts".into(),
                using: "text_bm25".into(),
                terms: vec!["flood".into()],
                filter: None,
                limit: 10,
            })
            .await
            .unwrap();
        // Points 1 and 3 contain "flood"; point 2 does not.
        assert_eq!(results.len(), 2);
        let ids: Vec<Uuid> = results.iter().map(|r| r.id).collect();
        assert!(ids.contains(&Uuid::from_u128(1)));
        assert!(ids.contains(&Uuid::from_u128(3)));
    }

    #[tokio::test]
    async fn sparse_query_respects_filter() {
        let store = store_with_points().await;
        let filter = Filter::default().must(Condition::MatchText {
            key: "location".into(),
            value: "Pune".into(),
        });
        let results = store
            .sparse_query(SparseQueryRequest {
                collection: "x_posts".into(),
                using: "text_bm25".into(),
                terms: vec!["flood".into()],
                filter: Some(filter),
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, Uuid::from_u128(3));
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let store = store_with_points().await;
        store
            .upsert(
                "x_posts",
                vec![point(
                    1,
                    vec![0.0, 0.0, 1.0],
                    json!({"text": "updated text", "credibility_score": 0.1}),
                )],
            )
            .await
            .unwrap();
        let records = store.retrieve("x_posts", &[Uuid::from_u128(1)]).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["text"], "updated text");
        assert_eq!(store.count("x_posts", None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimensions() {
        let store = store_with_points().await;
        let err = store
            .upsert("x_posts", vec![point(9, vec![1.0, 0.0], json!({"text": "short"}))])
            .await
            .unwrap_err();
        assert!(matches!(err, ChronofactError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn scroll_pages_through_collection() {
        let store = store_with_points().await;
        let first = store.scroll("x_posts", None, None, 2).await.unwrap();
        assert_eq!(first.points.len(), 2);
        let next = first.next.expect("more points remain");
        let second = store.scroll("x_posts", None, Some(next), 2).await.unwrap();
        assert_eq!(second.points.len(), 1);
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn delete_removes_points() {
        let store = store_with_points().await;
        store.delete("x_posts", &[Uuid::from_u128(2)]).await.unwrap();
        assert_eq!(store.count("x_posts", None).await.unwrap(), 2);
        // Deleting an unknown id is a no-op.
        store.delete("x_posts", &[Uuid::from_u128(42)]).await.unwrap();
        assert_eq!(store.count("x_posts", None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn set_payload_merges_and_reindexes_sparse() {
        let store = store_with_points().await;
        store
            .set_payload(
                "x_posts",
                Uuid::from_u128(2),
                json!({"text": "flood damage assessment", "relevance_score": 0.8}),
            )
            .await
            .unwrap();

        let records = store.retrieve("x_posts", &[Uuid::from_u128(2)]).await.unwrap();
        assert_eq!(records[0].payload["relevance_score"], 0.8);
        // Untouched fields survive the merge.
        assert_eq!(records[0].payload["location"], "Mumbai");

        // The sparse index now matches the new text.
        let results = store
            .sparse_query(SparseQueryRequest {
                collection: "x_posts".into(),
                using: "text_bm25".into(),
                terms: vec!["damage".into()],
                filter: None,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, Uuid::from_u128(2));
    }

    #[tokio::test]
    async fn count_with_filter() {
        let store = store_with_points().await;
        let filter = Filter::default().must(Condition::MatchText {
            key: "location".into(),
            value: "Mumbai".into(),
        });
        assert_eq!(store.count("x_posts", Some(&filter)).await.unwrap(), 2);
    }
}
