// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid retriever over the posts collection.
//!
//! Fans out dense, sparse, and (when an image vector is present) multimodal
//! sub-queries in parallel, fuses them with weighted RRF, and re-ranks for
//! author and source-domain diversity. A single failed sub-query degrades
//! the result to `partial`; only the loss of every sub-query is an error.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use chronofact_config::model::RetrievalConfig;
use chronofact_core::error::ChronofactError;
use chronofact_core::traits::{TextEmbedder, VectorStore};
use chronofact_core::types::{
    Post, QueryPlan, COLLECTION_POSTS, MULTIMODAL_VECTOR, SPARSE_TEXT_VECTOR, TEXT_VECTOR,
};
use chronofact_core::vector::{
    Condition, Filter, QueryRequest, ScoredPoint, SparseQueryRequest,
};
use chronofact_vector::tokenize::tokenize;

use crate::diversity::diversity_pass;
use crate::fusion::weighted_rrf;
use crate::{RetrievalOutcome, RetrievedPost};

/// Sub-queries over-fetch by this factor to give fusion and the diversity
/// pass room to work.
const FETCH_FACTOR: usize = 3;

/// Hybrid retriever combining semantic, keyword, and cross-modal search.
pub struct HybridRetriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn TextEmbedder>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn TextEmbedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Execute a query plan against the posts collection.
    pub async fn retrieve(&self, plan: &QueryPlan) -> Result<RetrievalOutcome, ChronofactError> {
        let q_dense = self.embedder.embed_one(&plan.refined_text).await?;
        let terms = tokenize(&plan.refined_text);
        let filter = build_filter(plan);
        let fetch_limit = plan.limit.max(1) * FETCH_FACTOR;

        let dense_request = QueryRequest {
            collection: COLLECTION_POSTS.to_string(),
            using: TEXT_VECTOR.to_string(),
            vector: q_dense,
            filter: Some(filter.clone()),
            limit: fetch_limit,
            with_payload: true,
            score_threshold: None,
        };
        let sparse_request = SparseQueryRequest {
            collection: COLLECTION_POSTS.to_string(),
            using: SPARSE_TEXT_VECTOR.to_string(),
            terms,
            filter: Some(filter.clone()),
            limit: fetch_limit,
        };

        let (dense_result, sparse_result, multimodal_result) = tokio::join!(
            self.store.query(dense_request),
            self.store.sparse_query(sparse_request),
            self.multimodal_query(plan, &filter, fetch_limit),
        );

        let mut failed = 0usize;
        let dense = match &dense_result {
            Ok(points) => points.as_slice(),
            Err(e) => {
                warn!(sub_query = "dense", error = %e, "retrieval sub-query failed");
                failed += 1;
                &[]
            }
        };
        let sparse = match &sparse_result {
            Ok(points) => points.as_slice(),
            Err(e) => {
                warn!(sub_query = "sparse", error = %e, "retrieval sub-query failed");
                failed += 1;
                &[]
            }
        };
        let multimodal = match &multimodal_result {
            Some(Ok(points)) => points.as_slice(),
            Some(Err(e)) => {
                warn!(sub_query = "multimodal", error = %e, "retrieval sub-query failed");
                failed += 1;
                &[]
            }
            None => &[],
        };

        // Every attempted sub-query failing is an outage, not an empty result.
        let attempted = 2 + usize::from(multimodal_result.is_some());
        if failed == attempted {
            return Err(ChronofactError::RetrievalUnavailable(
                "all retrieval sub-queries failed".to_string(),
            ));
        }

        let candidates = weighted_rrf(
            dense,
            sparse,
            multimodal,
            &self.config.weights,
            self.config.rrf_k,
        );

        let mut retrieved: Vec<RetrievedPost> = candidates
            .into_iter()
            .filter_map(|candidate| {
                match serde_json::from_value::<Post>(candidate.payload.clone()) {
                    Ok(post) => Some(RetrievedPost {
                        post,
                        fused_score: candidate.components.total(),
                        component_scores: candidate.components,
                    }),
                    Err(e) => {
                        warn!(id = %candidate.id, error = %e, "skipping point with malformed post payload");
                        None
                    }
                }
            })
            .collect();

        // Descending score; ties break to the newer post, then the smaller id.
        retrieved.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.post.timestamp.cmp(&a.post.timestamp))
                .then_with(|| a.post.post_id.cmp(&b.post.post_id))
        });

        let posts = if self.config.diversity {
            diversity_pass(retrieved, plan.limit)
        } else {
            retrieved.truncate(plan.limit);
            retrieved
        };

        debug!(
            returned = posts.len(),
            partial = failed > 0,
            "hybrid retrieval complete"
        );
        Ok(RetrievalOutcome {
            posts,
            partial: failed > 0,
        })
    }

    /// Find posts similar to a reference post, by its stored text vector.
    /// Used to ground recommendation prompts.
    pub async fn similar_posts(
        &self,
        post_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Post>, ChronofactError> {
        let records = self.store.retrieve(COLLECTION_POSTS, &[post_id]).await?;
        let Some(record) = records.into_iter().next() else {
            return Err(ChronofactError::NotFound(format!("post '{post_id}'")));
        };
        let Some(vector) = record.vectors.get(TEXT_VECTOR).cloned() else {
            return Err(ChronofactError::Internal(format!(
                "post '{post_id}' has no text vector"
            )));
        };

        let results = self
            .store
            .query(QueryRequest {
                collection: COLLECTION_POSTS.to_string(),
                using: TEXT_VECTOR.to_string(),
                vector,
                filter: None,
                limit: limit + 1,
                with_payload: true,
                score_threshold: None,
            })
            .await?;

        Ok(results
            .into_iter()
            .filter(|p| p.id != post_id)
            .take(limit)
            .filter_map(|p| serde_json::from_value::<Post>(p.payload).ok())
            .collect())
    }

    async fn multimodal_query(
        &self,
        plan: &QueryPlan,
        filter: &Filter,
        fetch_limit: usize,
    ) -> Option<Result<Vec<ScoredPoint>, ChronofactError>> {
        let image_vector = plan.image_vector.clone()?;
        Some(
            self.store
                .query(QueryRequest {
                    collection: COLLECTION_POSTS.to_string(),
                    using: MULTIMODAL_VECTOR.to_string(),
                    vector: image_vector,
                    filter: Some(filter.clone()),
                    limit: fetch_limit,
                    with_payload: true,
                    score_threshold: None,
                })
                .await,
        )
    }
}

/// Conjunction of the plan's payload constraints.
fn build_filter(plan: &QueryPlan) -> Filter {
    let mut filter = Filter::default();
    if plan.min_credibility > 0.0 {
        filter = filter.must(Condition::Range {
            key: "credibility_score".to_string(),
            gte: Some(plan.min_credibility),
            lte: None,
        });
    }
    if !plan.locations.is_empty() {
        filter = filter.must(Condition::AnyOf {
            key: "location".to_string(),
            values: plan.locations.clone(),
        });
    }
    if let Some(range) = &plan.time_range {
        if !range.is_unbounded() {
            filter = filter.must(Condition::DatetimeRange {
                key: "timestamp".to_string(),
                gte: range.start,
                lte: range.end,
            });
        }
    }
    filter
}
