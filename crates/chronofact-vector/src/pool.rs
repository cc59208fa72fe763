// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-concurrency wrapper around a vector store handle.
//!
//! Every operation acquires a semaphore permit first; callers queue up to a
//! configured wait and then fail with `BackendBusy` instead of piling onto a
//! saturated backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use uuid::Uuid;

use chronofact_core::error::ChronofactError;
use chronofact_core::traits::VectorStore;
use chronofact_core::vector::{
    CollectionSpec, Filter, PointRecord, QueryRequest, ScoredPoint, ScrollCursor, ScrollPage,
    SparseQueryRequest,
};

/// A `VectorStore` with a bounded number of in-flight operations.
pub struct PooledStore {
    inner: Arc<dyn VectorStore>,
    permits: Arc<Semaphore>,
    wait: Duration,
}

impl PooledStore {
    pub fn new(inner: Arc<dyn VectorStore>, pool_size: usize, wait: Duration) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
            wait,
        }
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, ChronofactError> {
        match tokio::time::timeout(self.wait, self.permits.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(ChronofactError::Internal("store pool closed".to_string())),
            Err(_) => Err(ChronofactError::BackendBusy {
                waited_ms: self.wait.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl VectorStore for PooledStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), ChronofactError> {
        let _permit = self.acquire().await?;
        self.inner.ensure_collection(spec).await
    }

    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<(), ChronofactError> {
        let _permit = self.acquire().await?;
        self.inner.upsert(collection, points).await
    }

    async fn query(&self, request: QueryRequest) -> Result<Vec<ScoredPoint>, ChronofactError> {
        let _permit = self.acquire().await?;
        self.inner.query(request).await
    }

    async fn sparse_query(
        &self,
        request: SparseQueryRequest,
    ) -> Result<Vec<ScoredPoint>, ChronofactError> {
        let _permit = self.acquire().await?;
        self.inner.sparse_query(request).await
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        cursor: Option<ScrollCursor>,
        batch: usize,
    ) -> Result<ScrollPage, ChronofactError> {
        let _permit = self.acquire().await?;
        self.inner.scroll(collection, filter, cursor, batch).await
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<Vec<PointRecord>, ChronofactError> {
        let _permit = self.acquire().await?;
        self.inner.retrieve(collection, ids).await
    }

    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<(), ChronofactError> {
        let _permit = self.acquire().await?;
        self.inner.delete(collection, ids).await
    }

    async fn set_payload(
        &self,
        collection: &str,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<(), ChronofactError> {
        let _permit = self.acquire().await?;
        self.inner.set_payload(collection, id, patch).await
    }

    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<usize, ChronofactError> {
        let _permit = self.acquire().await?;
        self.inner.count(collection, filter).await
    }

    async fn health_check(&self) -> Result<(), ChronofactError> {
        let _permit = self.acquire().await?;
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryVectorStore;

    #[tokio::test]
    async fn operations_pass_through() {
        let inner = Arc::new(MemoryVectorStore::new());
        let pooled = PooledStore::new(inner, 4, Duration::from_millis(100));
        pooled.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn saturated_pool_fails_with_backend_busy() {
        let inner = Arc::new(MemoryVectorStore::new());
        let pooled = Arc::new(PooledStore::new(inner, 1, Duration::from_millis(20)));

        // Hold the only permit.
        let permit = pooled.permits.clone().acquire_owned().await.unwrap();

        let err = pooled.health_check().await.unwrap_err();
        assert!(matches!(err, ChronofactError::BackendBusy { .. }));

        drop(permit);
        pooled.health_check().await.unwrap();
    }
}
