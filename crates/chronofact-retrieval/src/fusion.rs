// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weighted reciprocal-rank fusion.
//!
//! RRF score for a document is `1 / (k + rank)` per list it appears in
//! (rank is 1-based, k = 60 per the fusion literature), weighted per
//! component, plus a small credibility term read from the persisted payload
//! score. Robust to score-scale mismatch between dense cosine and BM25.

use std::collections::HashMap;

use chronofact_config::model::RetrievalWeights;
use chronofact_core::vector::ScoredPoint;
use uuid::Uuid;

/// Per-component contributions to a fused score.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentScores {
    pub dense: f32,
    pub sparse: f32,
    pub multimodal: f32,
    pub credibility: f32,
}

impl ComponentScores {
    pub fn total(&self) -> f32 {
        self.dense + self.sparse + self.multimodal + self.credibility
    }
}

/// A fused candidate carrying its payload from whichever list returned it.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub id: Uuid,
    pub components: ComponentScores,
    pub payload: serde_json::Value,
}

/// Fuse ranked sub-query results into per-id scores.
///
/// Missing ranks contribute 0; a document's payload is taken from the first
/// list that carried it. The credibility term reads the persisted
/// `credibility_score` payload field.
pub fn weighted_rrf(
    dense: &[ScoredPoint],
    sparse: &[ScoredPoint],
    multimodal: &[ScoredPoint],
    weights: &RetrievalWeights,
    rrf_k: f32,
) -> Vec<FusedCandidate> {
    let mut fused: HashMap<Uuid, FusedCandidate> = HashMap::new();

    let mut absorb = |list: &[ScoredPoint], component: usize, weight: f32| {
        for (rank, point) in list.iter().enumerate() {
            let contribution = weight / (rrf_k + rank as f32 + 1.0);
            let entry = fused.entry(point.id).or_insert_with(|| FusedCandidate {
                id: point.id,
                components: ComponentScores::default(),
                payload: point.payload.clone(),
            });
            match component {
                0 => entry.components.dense += contribution,
                1 => entry.components.sparse += contribution,
                _ => entry.components.multimodal += contribution,
            }
            if entry.payload.is_null() && !point.payload.is_null() {
                entry.payload = point.payload.clone();
            }
        }
    };

    absorb(dense, 0, weights.w_d);
    absorb(sparse, 1, weights.w_s);
    absorb(multimodal, 2, weights.w_m);

    let mut candidates: Vec<FusedCandidate> = fused.into_values().collect();
    for candidate in &mut candidates {
        let persisted = candidate
            .payload
            .get("credibility_score")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as f32;
        candidate.components.credibility = weights.w_c * persisted;
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(id: u128, credibility: f64) -> ScoredPoint {
        ScoredPoint {
            id: Uuid::from_u128(id),
            score: 0.0,
            payload: json!({"credibility_score": credibility}),
        }
    }

    fn weights() -> RetrievalWeights {
        RetrievalWeights {
            w_d: 0.55,
            w_s: 0.25,
            w_m: 0.15,
            w_c: 0.05,
        }
    }

    #[test]
    fn document_in_both_lists_outranks_single_list() {
        let dense = vec![point(1, 0.5), point(2, 0.5)];
        let sparse = vec![point(1, 0.5)];
        let fused = weighted_rrf(&dense, &sparse, &[], &weights(), 60.0);

        let score = |id: u128| {
            fused
                .iter()
                .find(|c| c.id == Uuid::from_u128(id))
                .unwrap()
                .components
                .total()
        };
        assert!(score(1) > score(2));
    }

    #[test]
    fn rank_contribution_is_one_over_k_plus_rank() {
        let dense = vec![point(1, 0.0)];
        let fused = weighted_rrf(&dense, &[], &[], &weights(), 60.0);
        let expected = 0.55 / 61.0;
        assert!((fused[0].components.dense - expected).abs() < 1e-6);
        assert_eq!(fused[0].components.sparse, 0.0);
    }

    #[test]
    fn credibility_term_uses_persisted_score() {
        let dense = vec![point(1, 0.8)];
        let fused = weighted_rrf(&dense, &[], &[], &weights(), 60.0);
        assert!((fused[0].components.credibility - 0.05 * 0.8).abs() < 1e-6);
    }

    #[test]
    fn missing_lists_contribute_nothing() {
        let sparse = vec![point(3, 0.2)];
        let fused = weighted_rrf(&[], &sparse, &[], &weights(), 60.0);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].components.dense, 0.0);
        assert!(fused[0].components.sparse > 0.0);
    }

    #[test]
    fn multimodal_component_weighted_separately() {
        let multimodal = vec![point(4, 0.0)];
        let fused = weighted_rrf(&[], &[], &multimodal, &weights(), 60.0);
        let expected = 0.15 / 61.0;
        assert!((fused[0].components.multimodal - expected).abs() < 1e-6);
    }
}
