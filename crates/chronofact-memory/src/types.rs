// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory domain types for the session memory system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Kind of session memory, selecting its decay rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MemoryType {
    /// A query/answer interaction.
    Interaction,
    /// A fact the session established.
    Fact,
    /// A user preference.
    Preference,
}

/// One evolving memory as stored in the `session_memory` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Stable memory identifier, doubles as the point id.
    pub memory_id: Uuid,
    /// Session the memory belongs to.
    pub session_id: String,
    /// Memory content text.
    pub content: String,
    /// Kind of memory.
    pub memory_type: MemoryType,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last retrieval-hit time; the decay anchor.
    pub last_accessed: DateTime<Utc>,
    /// Number of retrieval hits; monotone non-decreasing.
    pub access_count: u64,
    /// Current relevance in [0, 1].
    pub relevance_score: f64,
    /// Daily exponential decay rate in (0, 1].
    pub decay_rate: f64,
    /// Whether this memory subsumed others.
    pub is_consolidated: bool,
    /// Ids of subsumed memories; empty unless consolidated.
    #[serde(default)]
    pub parent_memories: Vec<Uuid>,
}

/// A retrieved memory with its query similarity.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub record: MemoryRecord,
    /// Cosine similarity to the query vector.
    pub similarity: f32,
}

/// Aggregate statistics over the memory collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryStats {
    pub total_memories: usize,
    pub avg_relevance: f64,
    pub avg_access_count: f64,
    pub below_threshold: usize,
    pub by_type: std::collections::HashMap<String, usize>,
}
