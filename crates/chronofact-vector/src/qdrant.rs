// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Qdrant REST backend for the docker and cloud deployment modes.
//!
//! Speaks the universal query API (`/points/query`) over HTTP with an
//! optional `api-key` header. Sparse vectors are computed client-side from
//! the declared payload text field and stored under a sparse named vector
//! configured with the IDF modifier, so BM25-style scoring happens
//! server-side.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use chronofact_core::error::ChronofactError;
use chronofact_core::traits::VectorStore;
use chronofact_core::vector::{
    CollectionSpec, Condition, Filter, PayloadFieldKind, PointRecord, QueryRequest, ScoredPoint,
    ScrollCursor, ScrollPage, SparseQueryRequest, SparseVectorSpec,
};

use crate::tokenize::{term_index, tokenize};

/// HTTP client for a Qdrant instance.
#[derive(Debug, Clone)]
pub struct QdrantVectorStore {
    client: reqwest::Client,
    base_url: String,
    /// Sparse vector declarations per collection, captured at ensure time so
    /// upserts know which payload fields to tokenize.
    sparse_specs: std::sync::Arc<std::sync::RwLock<HashMap<String, Vec<SparseVectorSpec>>>>,
}

impl QdrantVectorStore {
    /// Create a client for the given base URL, with an optional API key sent
    /// on every request.
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ChronofactError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key)
                    .map_err(|e| ChronofactError::Config(format!("invalid vector store api key: {e}")))?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ChronofactError::store("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            sparse_specs: Default::default(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Issue one request with a single retry on transient status codes.
    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ChronofactError> {
        let mut last_error = None;

        for attempt in 0..=1u32 {
            if attempt > 0 {
                warn!(attempt, path, "retrying vector store request after transient error");
                tokio::time::sleep(Duration::from_millis(250)).await;
            }

            let mut request = self.client.request(method.clone(), self.url(path));
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request
                .send()
                .await
                .map_err(|e| ChronofactError::store(format!("request to {path} failed"), e))?;

            let status = response.status();
            debug!(status = %status, path, attempt, "vector store response");

            if status.is_success() {
                return response
                    .json::<Value>()
                    .await
                    .map_err(|e| ChronofactError::store("malformed vector store response", e));
            }

            let text = response.text().await.unwrap_or_default();
            if status.as_u16() == 404 {
                return Err(ChronofactError::NotFound(format!("{path}: {text}")));
            }
            let err = ChronofactError::Store {
                message: format!("vector store returned {status} for {path}: {text}"),
                source: None,
            };
            if matches!(status.as_u16(), 429 | 500 | 502 | 503) && attempt == 0 {
                last_error = Some(err);
                continue;
            }
            return Err(err);
        }

        Err(last_error.unwrap_or_else(|| ChronofactError::Store {
            message: "vector store request failed after retry".to_string(),
            source: None,
        }))
    }

    fn sparse_for(&self, collection: &str) -> Vec<SparseVectorSpec> {
        self.sparse_specs
            .read()
            .map(|specs| specs.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

/// Convert a filter tree to Qdrant's JSON filter shape.
fn filter_to_json(filter: &Filter) -> Value {
    let must: Vec<Value> = filter.must.iter().map(condition_to_json).collect();
    let should: Vec<Value> = filter.should.iter().map(condition_to_json).collect();
    let mut out = serde_json::Map::new();
    if !must.is_empty() {
        out.insert("must".to_string(), Value::Array(must));
    }
    if !should.is_empty() {
        out.insert("should".to_string(), Value::Array(should));
    }
    Value::Object(out)
}

fn condition_to_json(condition: &Condition) -> Value {
    match condition {
        Condition::MatchText { key, value } => json!({"key": key, "match": {"value": value}}),
        Condition::MatchBool { key, value } => json!({"key": key, "match": {"value": value}}),
        Condition::Range { key, gte, lte } => {
            let mut range = serde_json::Map::new();
            if let Some(lo) = gte {
                range.insert("gte".to_string(), json!(lo));
            }
            if let Some(hi) = lte {
                range.insert("lte".to_string(), json!(hi));
            }
            json!({"key": key, "range": range})
        }
        Condition::DatetimeRange { key, gte, lte } => {
            let mut range = serde_json::Map::new();
            if let Some(lo) = gte {
                range.insert("gte".to_string(), json!(lo.to_rfc3339()));
            }
            if let Some(hi) = lte {
                range.insert("lte".to_string(), json!(hi.to_rfc3339()));
            }
            json!({"key": key, "range": range})
        }
        Condition::AnyOf { key, values } => json!({"key": key, "match": {"any": values}}),
        Condition::Nested(inner) => filter_to_json(inner),
    }
}

fn field_schema(kind: PayloadFieldKind) -> &'static str {
    match kind {
        PayloadFieldKind::Keyword => "keyword",
        PayloadFieldKind::Float => "float",
        PayloadFieldKind::Integer => "integer",
        PayloadFieldKind::Bool => "bool",
        PayloadFieldKind::Datetime => "datetime",
    }
}

/// Tokenize a payload text field into a tf-weighted sparse vector.
fn sparse_vector_json(text: &str) -> Value {
    let mut tf: HashMap<u32, f32> = HashMap::new();
    for term in tokenize(text) {
        *tf.entry(term_index(&term)).or_insert(0.0) += 1.0;
    }
    let mut entries: Vec<(u32, f32)> = tf.into_iter().collect();
    entries.sort_by_key(|(i, _)| *i);
    let indices: Vec<u32> = entries.iter().map(|(i, _)| *i).collect();
    let values: Vec<f32> = entries.iter().map(|(_, v)| *v).collect();
    json!({"indices": indices, "values": values})
}

fn parse_point_id(value: &Value) -> Option<Uuid> {
    value.as_str().and_then(|s| Uuid::parse_str(s).ok())
}

fn parse_named_vectors(value: Option<&Value>) -> HashMap<String, Vec<f32>> {
    let mut out = HashMap::new();
    let Some(map) = value.and_then(|v| v.as_object()) else {
        return out;
    };
    for (name, vector) in map {
        // Sparse vectors come back as objects; only dense arrays are kept.
        if let Some(array) = vector.as_array() {
            let values: Vec<f32> = array
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            if values.len() == array.len() {
                out.insert(name.clone(), values);
            }
        }
    }
    out
}

fn parse_scored_points(result: &Value) -> Vec<ScoredPoint> {
    result["points"]
        .as_array()
        .map(|points| {
            points
                .iter()
                .filter_map(|p| {
                    Some(ScoredPoint {
                        id: parse_point_id(&p["id"])?,
                        score: p["score"].as_f64().unwrap_or(0.0) as f32,
                        payload: p.get("payload").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), ChronofactError> {
        // Remember sparse declarations for upsert-side tokenization.
        if let Ok(mut specs) = self.sparse_specs.write() {
            specs.insert(spec.name.clone(), spec.sparse.clone());
        }

        let path = format!("/collections/{}", spec.name);
        match self.send(reqwest::Method::GET, &path, None).await {
            Ok(info) => {
                // Verify declared dimensions against the live collection.
                let params = &info["result"]["config"]["params"]["vectors"];
                for vector in &spec.vectors {
                    let size = params[&vector.name]["size"].as_u64();
                    if let Some(size) = size {
                        if size as usize != vector.dimensions {
                            return Err(ChronofactError::SchemaMismatch {
                                collection: spec.name.clone(),
                                detail: format!(
                                    "vector '{}' has {size} dimensions, declared {}",
                                    vector.name, vector.dimensions
                                ),
                            });
                        }
                    }
                }
                return Ok(());
            }
            Err(ChronofactError::NotFound(_)) => {}
            Err(other) => return Err(other),
        }

        let vectors: serde_json::Map<String, Value> = spec
            .vectors
            .iter()
            .map(|v| {
                (
                    v.name.clone(),
                    json!({"size": v.dimensions, "distance": "Cosine"}),
                )
            })
            .collect();
        let sparse: serde_json::Map<String, Value> = spec
            .sparse
            .iter()
            .map(|s| (s.name.clone(), json!({"modifier": "idf"})))
            .collect();

        let mut body = json!({"vectors": vectors});
        if !sparse.is_empty() {
            body["sparse_vectors"] = Value::Object(sparse);
        }
        self.send(reqwest::Method::PUT, &path, Some(&body)).await?;

        for index in &spec.payload_indexes {
            let body = json!({
                "field_name": index.field,
                "field_schema": field_schema(index.kind),
            });
            // Index creation races are harmless; the collection was just made.
            if let Err(e) = self
                .send(
                    reqwest::Method::PUT,
                    &format!("/collections/{}/index", spec.name),
                    Some(&body),
                )
                .await
            {
                warn!(field = index.field.as_str(), error = %e, "payload index creation failed");
            }
        }

        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<(), ChronofactError> {
        if points.is_empty() {
            return Ok(());
        }
        let sparse_specs = self.sparse_for(collection);

        let body_points: Vec<Value> = points
            .into_iter()
            .map(|point| {
                let mut vector = serde_json::Map::new();
                for (name, values) in &point.vectors {
                    vector.insert(name.clone(), json!(values));
                }
                for spec in &sparse_specs {
                    let text = point
                        .payload
                        .get(&spec.source_field)
                        .and_then(|v| v.as_str())
                        .unwrap_or("");
                    vector.insert(spec.name.clone(), sparse_vector_json(text));
                }
                json!({
                    "id": point.id.to_string(),
                    "vector": vector,
                    "payload": point.payload,
                })
            })
            .collect();

        let body = json!({"points": body_points});
        self.send(
            reqwest::Method::PUT,
            &format!("/collections/{collection}/points?wait=true"),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<Vec<ScoredPoint>, ChronofactError> {
        let mut body = json!({
            "query": request.vector,
            "using": request.using,
            "limit": request.limit,
            "with_payload": request.with_payload,
        });
        if let Some(filter) = &request.filter {
            if !filter.is_empty() {
                body["filter"] = filter_to_json(filter);
            }
        }
        if let Some(threshold) = request.score_threshold {
            body["score_threshold"] = json!(threshold);
        }
        let response = self
            .send(
                reqwest::Method::POST,
                &format!("/collections/{}/points/query", request.collection),
                Some(&body),
            )
            .await?;
        Ok(parse_scored_points(&response["result"]))
    }

    async fn sparse_query(
        &self,
        request: SparseQueryRequest,
    ) -> Result<Vec<ScoredPoint>, ChronofactError> {
        let mut tf: HashMap<u32, f32> = HashMap::new();
        for term in &request.terms {
            *tf.entry(term_index(term)).or_insert(0.0) += 1.0;
        }
        let mut entries: Vec<(u32, f32)> = tf.into_iter().collect();
        entries.sort_by_key(|(i, _)| *i);
        let indices: Vec<u32> = entries.iter().map(|(i, _)| *i).collect();
        let values: Vec<f32> = entries.iter().map(|(_, v)| *v).collect();

        let mut body = json!({
            "query": {"indices": indices, "values": values},
            "using": request.using,
            "limit": request.limit,
            "with_payload": true,
        });
        if let Some(filter) = &request.filter {
            if !filter.is_empty() {
                body["filter"] = filter_to_json(filter);
            }
        }
        let response = self
            .send(
                reqwest::Method::POST,
                &format!("/collections/{}/points/query", request.collection),
                Some(&body),
            )
            .await?;
        Ok(parse_scored_points(&response["result"]))
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        cursor: Option<ScrollCursor>,
        batch: usize,
    ) -> Result<ScrollPage, ChronofactError> {
        let mut body = json!({
            "limit": batch,
            "with_payload": true,
            "with_vector": true,
        });
        if let Some(ScrollCursor(offset)) = cursor {
            body["offset"] = offset;
        }
        if let Some(filter) = filter {
            if !filter.is_empty() {
                body["filter"] = filter_to_json(filter);
            }
        }
        let response = self
            .send(
                reqwest::Method::POST,
                &format!("/collections/{collection}/points/scroll"),
                Some(&body),
            )
            .await?;

        let result = &response["result"];
        let points = result["points"]
            .as_array()
            .map(|points| {
                points
                    .iter()
                    .filter_map(|p| {
                        Some(PointRecord {
                            id: parse_point_id(&p["id"])?,
                            vectors: parse_named_vectors(p.get("vector")),
                            payload: p.get("payload").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        let next = match &result["next_page_offset"] {
            Value::Null => None,
            offset => Some(ScrollCursor(offset.clone())),
        };
        Ok(ScrollPage { points, next })
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<Vec<PointRecord>, ChronofactError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "ids": ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
            "with_payload": true,
            "with_vector": true,
        });
        let response = self
            .send(
                reqwest::Method::POST,
                &format!("/collections/{collection}/points"),
                Some(&body),
            )
            .await?;
        Ok(response["result"]
            .as_array()
            .map(|points| {
                points
                    .iter()
                    .filter_map(|p| {
                        Some(PointRecord {
                            id: parse_point_id(&p["id"])?,
                            vectors: parse_named_vectors(p.get("vector")),
                            payload: p.get("payload").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<(), ChronofactError> {
        if ids.is_empty() {
            return Ok(());
        }
        let body = json!({
            "points": ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        });
        self.send(
            reqwest::Method::POST,
            &format!("/collections/{collection}/points/delete?wait=true"),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn set_payload(
        &self,
        collection: &str,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<(), ChronofactError> {
        let body = json!({
            "payload": patch,
            "points": [id.to_string()],
        });
        self.send(
            reqwest::Method::POST,
            &format!("/collections/{collection}/points/payload?wait=true"),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<usize, ChronofactError> {
        let mut body = json!({"exact": true});
        if let Some(filter) = filter {
            if !filter.is_empty() {
                body["filter"] = filter_to_json(filter);
            }
        }
        let response = self
            .send(
                reqwest::Method::POST,
                &format!("/collections/{collection}/points/count"),
                Some(&body),
            )
            .await?;
        Ok(response["result"]["count"].as_u64().unwrap_or(0) as usize)
    }

    async fn health_check(&self) -> Result<(), ChronofactError> {
        self.send(reqwest::Method::GET, "/collections", None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronofact_core::vector::{PayloadIndexSpec, VectorSpec};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_store(base_url: &str) -> QdrantVectorStore {
        QdrantVectorStore::new(base_url, Some("qd-key"), Duration::from_secs(5)).unwrap()
    }

    fn posts_spec() -> CollectionSpec {
        CollectionSpec {
            name: "x_posts".into(),
            vectors: vec![VectorSpec {
                name: "text".into(),
                dimensions: 384,
            }],
            sparse: vec![SparseVectorSpec {
                name: "text_bm25".into(),
                source_field: "text".into(),
            }],
            payload_indexes: vec![PayloadIndexSpec {
                field: "credibility_score".into(),
                kind: PayloadFieldKind::Float,
            }],
        }
    }

    #[tokio::test]
    async fn ensure_collection_creates_when_missing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/collections/x_posts"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"status": {"error": "not found"}})))
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/collections/x_posts"))
            .and(body_partial_json(json!({
                "vectors": {"text": {"size": 384, "distance": "Cosine"}},
                "sparse_vectors": {"text_bm25": {"modifier": "idf"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/collections/x_posts/index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let store = test_store(&server.uri());
        store.ensure_collection(&posts_spec()).await.unwrap();
    }

    #[tokio::test]
    async fn ensure_collection_detects_dimension_mismatch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/collections/x_posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"config": {"params": {"vectors": {"text": {"size": 512}}}}}
            })))
            .mount(&server)
            .await;

        let store = test_store(&server.uri());
        let err = store.ensure_collection(&posts_spec()).await.unwrap_err();
        assert!(matches!(err, ChronofactError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn query_parses_scored_points() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/collections/x_posts/points/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"points": [
                    {"id": id.to_string(), "score": 0.87, "payload": {"text": "flood"}}
                ]}
            })))
            .mount(&server)
            .await;

        let store = test_store(&server.uri());
        let results = store
            .query(QueryRequest {
                collection: "x_posts".into(),
                using: "text".into(),
                vector: vec![0.0; 384],
                filter: None,
                limit: 5,
                with_payload: true,
                score_threshold: None,
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert!((results[0].score - 0.87).abs() < 1e-6);
        assert_eq!(results[0].payload["text"], "flood");
    }

    #[tokio::test]
    async fn transient_error_is_retried_once() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/collections"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({"status": "overloaded"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/collections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"collections": []}})))
            .mount(&server)
            .await;

        let store = test_store(&server.uri());
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn count_reads_result() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/collections/x_posts/points/count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"count": 7}})))
            .mount(&server)
            .await;

        let store = test_store(&server.uri());
        assert_eq!(store.count("x_posts", None).await.unwrap(), 7);
    }

    #[test]
    fn filter_json_shapes() {
        let filter = Filter::default()
            .must(Condition::Range {
                key: "credibility_score".into(),
                gte: Some(0.3),
                lte: None,
            })
            .must(Condition::AnyOf {
                key: "location".into(),
                values: vec!["Mumbai".into(), "Pune".into()],
            });
        let value = filter_to_json(&filter);
        assert_eq!(value["must"][0]["range"]["gte"], 0.3);
        assert_eq!(value["must"][1]["match"]["any"][0], "Mumbai");
        assert!(value.get("should").is_none());
    }

    #[test]
    fn sparse_vector_counts_term_frequency() {
        let vector = sparse_vector_json("flood flood warning");
        let indices = vector["indices"].as_array().unwrap();
        let values = vector["values"].as_array().unwrap();
        assert_eq!(indices.len(), 2);
        let flood_idx = term_index("flood");
        let pos = indices
            .iter()
            .position(|i| i.as_u64() == Some(u64::from(flood_idx)))
            .unwrap();
        assert_eq!(values[pos].as_f64(), Some(2.0));
    }
}
