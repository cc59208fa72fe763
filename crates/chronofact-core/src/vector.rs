// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data types for the vector store capability surface.
//!
//! Points carry named dense vectors plus a JSON payload; collections declare
//! their vector layout up front so backends can create them idempotently.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declaration of one named dense vector on a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSpec {
    pub name: String,
    pub dimensions: usize,
}

/// Declaration of one named sparse vector, derived at upsert time from a
/// payload text field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseVectorSpec {
    pub name: String,
    /// Payload field whose tokenized text feeds the sparse vector.
    pub source_field: String,
}

/// Payload field types that can carry an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFieldKind {
    Keyword,
    Float,
    Integer,
    Bool,
    Datetime,
}

/// Declaration of one indexed payload field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadIndexSpec {
    pub field: String,
    pub kind: PayloadFieldKind,
}

/// Full declaration of a collection's layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub vectors: Vec<VectorSpec>,
    #[serde(default)]
    pub sparse: Vec<SparseVectorSpec>,
    #[serde(default)]
    pub payload_indexes: Vec<PayloadIndexSpec>,
}

impl CollectionSpec {
    /// Dimensions of a named dense vector, if declared.
    pub fn vector_dimensions(&self, name: &str) -> Option<usize> {
        self.vectors.iter().find(|v| v.name == name).map(|v| v.dimensions)
    }
}

/// A point to be written: id, named dense vectors, JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: Uuid,
    #[serde(default)]
    pub vectors: HashMap<String, Vec<f32>>,
    pub payload: serde_json::Value,
}

/// A point returned from a similarity query.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub score: f32,
    pub payload: serde_json::Value,
}

/// One leaf or subtree of a payload filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Condition {
    /// Exact keyword equality.
    MatchText { key: String, value: String },
    /// Boolean equality.
    MatchBool { key: String, value: bool },
    /// Numeric range, inclusive on both bounds.
    Range {
        key: String,
        gte: Option<f64>,
        lte: Option<f64>,
    },
    /// Datetime range, inclusive on both bounds.
    DatetimeRange {
        key: String,
        gte: Option<DateTime<Utc>>,
        lte: Option<DateTime<Utc>>,
    },
    /// Set membership over keyword values.
    AnyOf { key: String, values: Vec<String> },
    /// Nested conjunction/disjunction subtree.
    Nested(Filter),
}

/// Conjunction of `must` conditions and disjunction of `should` conditions.
///
/// A point matches when every `must` condition holds and, if `should` is
/// non-empty, at least one `should` condition holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub must: Vec<Condition>,
    #[serde(default)]
    pub should: Vec<Condition>,
}

impl Filter {
    /// True when the filter constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty()
    }

    /// Add a `must` condition, builder-style.
    pub fn must(mut self, condition: Condition) -> Self {
        self.must.push(condition);
        self
    }

    /// Add a `should` condition, builder-style.
    pub fn should(mut self, condition: Condition) -> Self {
        self.should.push(condition);
        self
    }
}

/// A dense similarity query against one named vector.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub collection: String,
    /// Named vector to search (`using` in store terms).
    pub using: String,
    pub vector: Vec<f32>,
    pub filter: Option<Filter>,
    pub limit: usize,
    pub with_payload: bool,
    /// Drop results scoring below this cosine similarity.
    pub score_threshold: Option<f32>,
}

/// A sparse BM25-style query against one named sparse vector.
#[derive(Debug, Clone)]
pub struct SparseQueryRequest {
    pub collection: String,
    pub using: String,
    /// Pre-tokenized query terms (lowercased, stopwords removed).
    pub terms: Vec<String>,
    pub filter: Option<Filter>,
    pub limit: usize,
}

/// Opaque scroll position. Backends interpret the inner value themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollCursor(pub serde_json::Value);

/// One page of a scroll over a collection.
#[derive(Debug, Clone)]
pub struct ScrollPage {
    pub points: Vec<PointRecord>,
    /// Cursor for the next page; `None` when the scroll is exhausted.
    pub next: Option<ScrollCursor>,
}
