// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query interpretation: raw topic text into a structured search plan.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use chronofact_core::error::ChronofactError;
use chronofact_core::types::{ProviderMessage, QueryPlan, TimeRange};

use crate::generate::{GenerationTask, StructuredGenerator};

const SYSTEM: &str = "You interpret search queries about news events. Extract the entities, \
    locations, and time window the user is asking about, and rewrite the query into a form \
    suited to semantic search over social media posts. Do not invent constraints the user \
    did not state.";

#[derive(Debug, Deserialize)]
struct QueryPlanWire {
    refined_text: String,
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default)]
    locations: Vec<String>,
    #[serde(default)]
    time_start: Option<DateTime<Utc>>,
    #[serde(default)]
    time_end: Option<DateTime<Utc>>,
}

impl StructuredGenerator {
    /// Interpret a raw query into a [`QueryPlan`].
    ///
    /// `min_credibility` and `limit` come from the request, not the model.
    /// Interpretation failures are the caller's to soften (the pipeline
    /// falls back to a trivial plan).
    pub async fn process_query(
        &self,
        raw_query: &str,
        min_credibility: f64,
        limit: usize,
        deadline: Instant,
    ) -> Result<QueryPlan, ChronofactError> {
        let task = GenerationTask {
            name: "emit_query_plan".to_string(),
            description: "Return the interpreted search plan for the user's query.".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "refined_text": {
                        "type": "string",
                        "description": "Query rewritten for semantic search"
                    },
                    "entities": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Named entities mentioned in the query"
                    },
                    "locations": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Locations the query is scoped to"
                    },
                    "time_start": {
                        "type": "string",
                        "format": "date-time",
                        "description": "RFC3339 start of the asked time window, if any"
                    },
                    "time_end": {
                        "type": "string",
                        "format": "date-time",
                        "description": "RFC3339 end of the asked time window, if any"
                    }
                },
                "required": ["refined_text"]
            }),
            system: Some(SYSTEM.to_string()),
            messages: vec![ProviderMessage::user(format!("Query: {raw_query}"))],
        };

        let wire: QueryPlanWire = self
            .generate(
                &task,
                |plan: &QueryPlanWire| {
                    if plan.refined_text.trim().is_empty() {
                        Err("refined_text must not be empty".to_string())
                    } else {
                        Ok(())
                    }
                },
                deadline,
            )
            .await?;

        let time_range = if wire.time_start.is_some() || wire.time_end.is_some() {
            Some(TimeRange {
                start: wire.time_start,
                end: wire.time_end,
            })
        } else {
            None
        };

        Ok(QueryPlan {
            refined_text: wire.refined_text,
            entities: wire.entities,
            locations: wire.locations,
            time_range,
            min_credibility,
            limit,
            image_vector: None,
        })
    }
}
