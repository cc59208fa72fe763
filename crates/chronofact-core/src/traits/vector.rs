// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store capability trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ChronofactError;
use crate::vector::{
    CollectionSpec, Filter, PointRecord, QueryRequest, ScoredPoint, ScrollCursor, ScrollPage,
    SparseQueryRequest,
};

/// Typed CRUD and query surface over named-vector collections.
///
/// Errors are reported by kind (`Store`, `NotFound`, `SchemaMismatch`,
/// `BackendBusy`), never as opaque strings. Handles are shared and
/// concurrency-safe.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotently create a collection with the declared vector layout and
    /// payload indexes. Succeeds silently when a compatible collection
    /// already exists; fails with `SchemaMismatch` on an incompatible one.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), ChronofactError>;

    /// Upsert points, overwriting by id.
    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<(), ChronofactError>;

    /// Dense query by descending cosine similarity over one named vector.
    async fn query(&self, request: QueryRequest) -> Result<Vec<ScoredPoint>, ChronofactError>;

    /// BM25-style query over one named sparse vector.
    async fn sparse_query(
        &self,
        request: SparseQueryRequest,
    ) -> Result<Vec<ScoredPoint>, ChronofactError>;

    /// Cursor pagination over a collection, for sweeps.
    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        cursor: Option<ScrollCursor>,
        batch: usize,
    ) -> Result<ScrollPage, ChronofactError>;

    /// Fetch points by id, including stored vectors.
    async fn retrieve(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<Vec<PointRecord>, ChronofactError>;

    /// Delete points by id. Unknown ids are ignored.
    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<(), ChronofactError>;

    /// Merge a JSON patch into one point's payload.
    async fn set_payload(
        &self,
        collection: &str,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<(), ChronofactError>;

    /// Count points in a collection, optionally restricted by a filter.
    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<usize, ChronofactError>;

    /// Cheap connectivity probe.
    async fn health_check(&self) -> Result<(), ChronofactError>;
}
