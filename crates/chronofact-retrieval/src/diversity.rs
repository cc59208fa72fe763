// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diversity re-ranking over fused retrieval results.
//!
//! Greedily caps any single author at 30% and any single source domain at
//! 40% of the output. A candidate that would breach a cap is skipped only
//! when a non-breaching replacement scoring at least 0.85 of it still
//! remains; otherwise the cap yields and the candidate is kept.

use std::collections::HashMap;

use crate::RetrievedPost;

/// Share of the output one author may occupy.
const AUTHOR_SHARE: f32 = 0.30;
/// Share of the output one source domain may occupy.
const DOMAIN_SHARE: f32 = 0.40;
/// A replacement must score at least this fraction of the skipped candidate.
const REPLACEMENT_RATIO: f32 = 0.85;

fn cap(share: f32, limit: usize) -> usize {
    ((share * limit as f32).floor() as usize).max(1)
}

/// Apply the diversity constraints to score-ordered candidates.
pub fn diversity_pass(candidates: Vec<RetrievedPost>, limit: usize) -> Vec<RetrievedPost> {
    let author_cap = cap(AUTHOR_SHARE, limit);
    let domain_cap = cap(DOMAIN_SHARE, limit);

    let mut selected: Vec<RetrievedPost> = Vec::with_capacity(limit);
    let mut author_counts: HashMap<String, usize> = HashMap::new();
    let mut domain_counts: HashMap<String, usize> = HashMap::new();
    let mut used = vec![false; candidates.len()];

    let violates = |candidate: &RetrievedPost,
                    author_counts: &HashMap<String, usize>,
                    domain_counts: &HashMap<String, usize>| {
        if author_counts.get(&candidate.post.author).copied().unwrap_or(0) + 1 > author_cap {
            return true;
        }
        if let Some(domain) = candidate.post.source_domain() {
            if domain_counts.get(&domain).copied().unwrap_or(0) + 1 > domain_cap {
                return true;
            }
        }
        false
    };

    for i in 0..candidates.len() {
        if selected.len() == limit {
            break;
        }
        if used[i] {
            continue;
        }
        let candidate = &candidates[i];

        if violates(candidate, &author_counts, &domain_counts) {
            // Skip only when a good-enough non-violating replacement remains.
            let replacement_exists = candidates
                .iter()
                .enumerate()
                .skip(i + 1)
                .any(|(j, other)| {
                    !used[j]
                        && other.fused_score >= REPLACEMENT_RATIO * candidate.fused_score
                        && !violates(other, &author_counts, &domain_counts)
                });
            if replacement_exists {
                continue;
            }
        }

        used[i] = true;
        *author_counts.entry(candidate.post.author.clone()).or_insert(0) += 1;
        if let Some(domain) = candidate.post.source_domain() {
            *domain_counts.entry(domain).or_insert(0) += 1;
        }
        selected.push(candidate.clone());
    }

    selected
}
