// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid retrieval for Chronofact.
//!
//! Dense semantic search, sparse BM25 keyword search, and optional
//! cross-modal image search fan out in parallel and merge through weighted
//! reciprocal-rank fusion, followed by a diversity re-ranking pass.

pub mod diversity;
pub mod fusion;
pub mod retriever;

pub use fusion::ComponentScores;
pub use retriever::HybridRetriever;

use chronofact_core::types::Post;

/// One retrieved post with its fused score and component breakdown.
#[derive(Debug, Clone)]
pub struct RetrievedPost {
    pub post: Post,
    pub fused_score: f32,
    pub component_scores: ComponentScores,
}

/// An ordered retrieval result.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    /// Posts in descending fused-score order, already diversity-ranked.
    pub posts: Vec<RetrievedPost>,
    /// True when at least one sub-query failed and results come from the
    /// survivors.
    pub partial: bool,
}

impl RetrievalOutcome {
    /// The bare posts, dropping score metadata.
    pub fn into_posts(self) -> Vec<Post> {
        self.posts.into_iter().map(|p| p.post).collect()
    }
}
