// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory evolution engine over the `session_memory` collection.
//!
//! Memories strengthen on retrieval (Ebbinghaus-style reinforcement toward
//! 1.0), decay exponentially with time since last access, are deleted below
//! the relevance threshold, and near-duplicates consolidate into a single
//! representative. All state lives in the vector store; the engine holds no
//! caches.
//!
//! The `*_at` variants take an explicit `now` so the sweep scheduler and
//! tests control elapsed time; the plain methods use the wall clock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use chronofact_config::model::MemoryConfig;
use chronofact_core::error::ChronofactError;
use chronofact_core::traits::{TextEmbedder, VectorStore};
use chronofact_core::types::{COLLECTION_MEMORY, TEXT_VECTOR};
use chronofact_core::vector::{Condition, Filter, PointRecord, QueryRequest};

use crate::types::{MemoryRecord, MemoryStats, MemoryType, ScoredMemory};

/// Session memory engine.
pub struct MemoryEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn TextEmbedder>,
    config: MemoryConfig,
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }
    dot / (na * nb)
}

impl MemoryEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn TextEmbedder>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    fn decay_rate_for(&self, memory_type: MemoryType) -> f64 {
        match memory_type {
            MemoryType::Interaction => self.config.decay_rates.interaction,
            MemoryType::Fact => self.config.decay_rates.fact,
            MemoryType::Preference => self.config.decay_rates.preference,
        }
    }

    /// Store a new memory with full relevance.
    pub async fn store(
        &self,
        session_id: &str,
        content: &str,
        memory_type: MemoryType,
    ) -> Result<Uuid, ChronofactError> {
        self.store_at(session_id, content, memory_type, Utc::now()).await
    }

    /// Store a new memory with an explicit creation time.
    pub async fn store_at(
        &self,
        session_id: &str,
        content: &str,
        memory_type: MemoryType,
        now: DateTime<Utc>,
    ) -> Result<Uuid, ChronofactError> {
        let vector = self.embedder.embed_one(content).await?;
        let record = MemoryRecord {
            memory_id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            content: content.to_string(),
            memory_type,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            relevance_score: 1.0,
            decay_rate: self.decay_rate_for(memory_type),
            is_consolidated: false,
            parent_memories: Vec::new(),
        };
        let id = record.memory_id;

        let mut vectors = HashMap::new();
        vectors.insert(TEXT_VECTOR.to_string(), vector);
        self.store
            .upsert(
                COLLECTION_MEMORY,
                vec![PointRecord {
                    id,
                    vectors,
                    payload: serde_json::to_value(&record)
                        .map_err(|e| ChronofactError::Internal(format!("memory serialization: {e}")))?,
                }],
            )
            .await?;

        debug!(memory_id = %id, session_id, "memory stored");
        Ok(id)
    }

    /// Retrieve relevant memories and reinforce every hit.
    ///
    /// Memories below the deletion threshold are never reachable here,
    /// whatever `min_relevance` the caller passes.
    pub async fn retrieve_and_reinforce(
        &self,
        session_id: &str,
        query_vector: &[f32],
        limit: usize,
        min_relevance: f64,
    ) -> Result<Vec<ScoredMemory>, ChronofactError> {
        self.retrieve_and_reinforce_at(session_id, query_vector, limit, min_relevance, Utc::now())
            .await
    }

    /// Retrieve and reinforce with an explicit access time.
    pub async fn retrieve_and_reinforce_at(
        &self,
        session_id: &str,
        query_vector: &[f32],
        limit: usize,
        min_relevance: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredMemory>, ChronofactError> {
        let threshold = min_relevance.max(self.config.tau_delete);
        let filter = Filter::default()
            .must(Condition::MatchText {
                key: "session_id".to_string(),
                value: session_id.to_string(),
            })
            .must(Condition::Range {
                key: "relevance_score".to_string(),
                gte: Some(threshold),
                lte: None,
            });

        let results = self
            .store
            .query(QueryRequest {
                collection: COLLECTION_MEMORY.to_string(),
                using: TEXT_VECTOR.to_string(),
                vector: query_vector.to_vec(),
                filter: Some(filter),
                limit: limit.max(1) * 2,
                with_payload: true,
                score_threshold: None,
            })
            .await?;

        let beta = self.config.reinforce_beta;
        let mut memories = Vec::with_capacity(results.len());
        for point in results {
            let mut record: MemoryRecord = match serde_json::from_value(point.payload) {
                Ok(record) => record,
                Err(e) => {
                    warn!(id = %point.id, error = %e, "skipping malformed memory payload");
                    continue;
                }
            };

            record.relevance_score =
                (record.relevance_score + beta * (1.0 - record.relevance_score)).min(1.0);
            record.last_accessed = now;
            record.access_count += 1;

            self.store
                .set_payload(
                    COLLECTION_MEMORY,
                    record.memory_id,
                    serde_json::json!({
                        "relevance_score": record.relevance_score,
                        "last_accessed": record.last_accessed,
                        "access_count": record.access_count,
                    }),
                )
                .await?;

            memories.push(ScoredMemory {
                record,
                similarity: point.score,
            });
        }

        // Rank by combined strength: how relevant the memory is times how
        // well it matches the query.
        memories.sort_by(|a, b| {
            let ka = a.record.relevance_score * f64::from(a.similarity);
            let kb = b.record.relevance_score * f64::from(b.similarity);
            kb.partial_cmp(&ka).unwrap_or(std::cmp::Ordering::Equal)
        });
        memories.truncate(limit);
        Ok(memories)
    }

    /// Apply temporal decay to every memory; delete those falling below the
    /// threshold. Returns (updated, deleted).
    pub async fn apply_global_decay(&self) -> Result<(usize, usize), ChronofactError> {
        self.apply_global_decay_at(Utc::now()).await
    }

    /// Apply global decay with an explicit current time.
    ///
    /// Relevance decays as `r * exp(-rate * days_since_last_access)` and the
    /// write advances `last_accessed` to `now`, anchoring the decay already
    /// applied. An immediate re-run sees zero elapsed time and writes
    /// nothing; re-runs after a gap decay only the gap.
    pub async fn apply_global_decay_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize), ChronofactError> {
        let mut updated = 0usize;
        let mut deleted = 0usize;
        let mut cursor = None;

        loop {
            let page = self
                .store
                .scroll(COLLECTION_MEMORY, None, cursor, self.config.sweep_batch)
                .await?;

            let mut to_delete = Vec::new();
            for point in &page.points {
                let record: MemoryRecord = match serde_json::from_value(point.payload.clone()) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(id = %point.id, error = %e, "skipping malformed memory payload");
                        continue;
                    }
                };

                let elapsed_days =
                    (now - record.last_accessed).num_seconds().max(0) as f64 / 86_400.0;
                let decayed =
                    (record.relevance_score * (-record.decay_rate * elapsed_days).exp()).clamp(0.0, 1.0);

                if decayed < self.config.tau_delete {
                    to_delete.push(record.memory_id);
                } else if (decayed - record.relevance_score).abs() > f64::EPSILON {
                    self.store
                        .set_payload(
                            COLLECTION_MEMORY,
                            record.memory_id,
                            serde_json::json!({
                                "relevance_score": decayed,
                                "last_accessed": now,
                            }),
                        )
                        .await?;
                    updated += 1;
                }
            }

            if !to_delete.is_empty() {
                deleted += to_delete.len();
                self.store.delete(COLLECTION_MEMORY, &to_delete).await?;
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(updated, deleted, "global memory decay applied");
        Ok((updated, deleted))
    }

    /// Consolidate clusters of near-duplicate same-session memories.
    /// Returns the number of clusters consolidated.
    pub async fn consolidate_similar(&self, threshold: f32) -> Result<usize, ChronofactError> {
        self.consolidate_similar_at(threshold, Utc::now()).await
    }

    /// Consolidate with an explicit current time.
    pub async fn consolidate_similar_at(
        &self,
        threshold: f32,
        now: DateTime<Utc>,
    ) -> Result<usize, ChronofactError> {
        // Snapshot the collection: records plus their text vectors.
        let mut snapshot: Vec<(MemoryRecord, Vec<f32>)> = Vec::new();
        let mut cursor = None;
        loop {
            let page = self
                .store
                .scroll(COLLECTION_MEMORY, None, cursor, self.config.sweep_batch)
                .await?;
            for point in page.points {
                let Some(vector) = point.vectors.get(TEXT_VECTOR).cloned() else {
                    continue;
                };
                match serde_json::from_value::<MemoryRecord>(point.payload) {
                    Ok(record) => snapshot.push((record, vector)),
                    Err(e) => warn!(id = %point.id, error = %e, "skipping malformed memory payload"),
                }
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        // Group indices by session; clusters never span sessions.
        let mut by_session: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, (record, _)) in snapshot.iter().enumerate() {
            by_session.entry(record.session_id.as_str()).or_default().push(i);
        }

        let mut consolidated = 0usize;
        let mut assigned = vec![false; snapshot.len()];

        for indices in by_session.values() {
            for &i in indices {
                if assigned[i] {
                    continue;
                }
                let mut cluster = vec![i];
                for &j in indices {
                    if j != i && !assigned[j] && cosine(&snapshot[i].1, &snapshot[j].1) > threshold
                    {
                        cluster.push(j);
                    }
                }
                if cluster.len() < 2 {
                    continue;
                }
                for &member in &cluster {
                    assigned[member] = true;
                }

                if self.consolidate_cluster(&snapshot, &cluster, now).await? {
                    consolidated += 1;
                }
            }
        }

        if consolidated > 0 {
            info!(consolidated, "memory clusters consolidated");
        }
        Ok(consolidated)
    }

    /// Merge one cluster into a consolidated memory and delete the members.
    ///
    /// Skips the cluster when any member was accessed since the snapshot:
    /// reinforcement racing with consolidation must not be lost.
    async fn consolidate_cluster(
        &self,
        snapshot: &[(MemoryRecord, Vec<f32>)],
        cluster: &[usize],
        now: DateTime<Utc>,
    ) -> Result<bool, ChronofactError> {
        let member_ids: Vec<Uuid> = cluster.iter().map(|&i| snapshot[i].0.memory_id).collect();

        let current = self.store.retrieve(COLLECTION_MEMORY, &member_ids).await?;
        if current.len() != member_ids.len() {
            debug!("cluster member vanished since snapshot, skipping");
            return Ok(false);
        }
        for point in &current {
            let live: MemoryRecord = match serde_json::from_value(point.payload.clone()) {
                Ok(record) => record,
                Err(_) => return Ok(false),
            };
            let Some(snapshot_index) = cluster
                .iter()
                .copied()
                .find(|&i| snapshot[i].0.memory_id == live.memory_id)
            else {
                return Ok(false);
            };
            let snapshot_record = &snapshot[snapshot_index].0;
            if live.last_accessed != snapshot_record.last_accessed {
                debug!(memory_id = %live.memory_id, "cluster member accessed since snapshot, skipping");
                return Ok(false);
            }
        }

        // Representative content is the longest member's; relevance is the
        // cluster maximum.
        let Some(basis) = cluster
            .iter()
            .copied()
            .max_by_key(|&i| snapshot[i].0.content.len())
        else {
            return Ok(false);
        };
        let basis_record = &snapshot[basis].0;
        let max_relevance = cluster
            .iter()
            .map(|&i| snapshot[i].0.relevance_score)
            .fold(0.0f64, f64::max);

        let dims = snapshot[basis].1.len();
        let mut mean_vector = vec![0.0f32; dims];
        for &i in cluster {
            for (slot, value) in mean_vector.iter_mut().zip(&snapshot[i].1) {
                *slot += value;
            }
        }
        for value in &mut mean_vector {
            *value /= cluster.len() as f32;
        }

        let merged = MemoryRecord {
            memory_id: Uuid::new_v4(),
            session_id: basis_record.session_id.clone(),
            content: basis_record.content.clone(),
            memory_type: basis_record.memory_type,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            relevance_score: max_relevance,
            decay_rate: basis_record.decay_rate,
            is_consolidated: true,
            parent_memories: member_ids.clone(),
        };

        let mut vectors = HashMap::new();
        vectors.insert(TEXT_VECTOR.to_string(), mean_vector);
        self.store
            .upsert(
                COLLECTION_MEMORY,
                vec![PointRecord {
                    id: merged.memory_id,
                    vectors,
                    payload: serde_json::to_value(&merged)
                        .map_err(|e| ChronofactError::Internal(format!("memory serialization: {e}")))?,
                }],
            )
            .await?;

        // Children go only after the consolidated memory exists.
        self.store.delete(COLLECTION_MEMORY, &member_ids).await?;
        Ok(true)
    }

    /// Aggregate statistics over (a sample of) the collection.
    pub async fn stats(&self) -> Result<MemoryStats, ChronofactError> {
        let page = self.store.scroll(COLLECTION_MEMORY, None, None, 1_000).await?;
        let mut stats = MemoryStats {
            total_memories: self.store.count(COLLECTION_MEMORY, None).await?,
            ..MemoryStats::default()
        };

        let mut relevance_sum = 0.0;
        let mut access_sum = 0u64;
        let mut sampled = 0usize;
        for point in &page.points {
            let Ok(record) = serde_json::from_value::<MemoryRecord>(point.payload.clone()) else {
                continue;
            };
            sampled += 1;
            relevance_sum += record.relevance_score;
            access_sum += record.access_count;
            if record.relevance_score < self.config.tau_delete {
                stats.below_threshold += 1;
            }
            *stats.by_type.entry(record.memory_type.to_string()).or_insert(0) += 1;
        }
        if sampled > 0 {
            stats.avg_relevance = relevance_sum / sampled as f64;
            stats.avg_access_count = access_sum as f64 / sampled as f64;
        }
        Ok(stats)
    }
}
