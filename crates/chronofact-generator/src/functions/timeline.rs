// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timeline synthesis from retrieved posts.
//!
//! The model receives the retrieved context as a JSON block and must cite
//! post ids from it; any event citing an unknown id is rejected so
//! hallucinated sources never reach a response. Event credibility is derived
//! from the persisted scores of the cited posts, not taken from the model.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use uuid::Uuid;

use chronofact_core::error::ChronofactError;
use chronofact_core::types::{Post, ProviderMessage, Timeline, TimelineEvent};

use crate::generate::{GenerationTask, StructuredGenerator};

const SYSTEM: &str = "You construct chronological timelines of real events from social media \
    posts. Every event must cite the ids of the posts it is based on. Use ONLY the provided \
    context; never invent events, sources, or details that are not in it.";

#[derive(Debug, Deserialize)]
struct TimelineWire {
    topic: String,
    events: Vec<EventWire>,
    #[serde(default)]
    predictions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EventWire {
    timestamp: DateTime<Utc>,
    summary: String,
    #[serde(default)]
    sources: Vec<Uuid>,
    #[serde(default)]
    location: Option<String>,
}

/// Serialize retrieved posts into the context block shown to the model.
pub fn format_context(posts: &[Post]) -> String {
    let entries: Vec<serde_json::Value> = posts
        .iter()
        .map(|p| {
            json!({
                "post_id": p.post_id,
                "text": p.text,
                "author": p.author,
                "timestamp": p.timestamp.to_rfc3339(),
                "credibility_score": p.credibility_score,
                "location": p.location,
                "image_caption": p.image_caption,
            })
        })
        .collect();
    serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
}

impl StructuredGenerator {
    /// Synthesize a timeline of roughly `n` events from the retrieved posts.
    ///
    /// Shortfall below `n` is accepted; overage beyond
    /// `max(n, context len)` is truncated after chronological sorting.
    pub async fn generate_timeline(
        &self,
        query: &str,
        context_posts: &[Post],
        n: usize,
        deadline: Instant,
    ) -> Result<Timeline, ChronofactError> {
        let known_ids: HashSet<Uuid> = context_posts.iter().map(|p| p.post_id).collect();
        let credibility: HashMap<Uuid, f64> = context_posts
            .iter()
            .map(|p| (p.post_id, p.credibility_score))
            .collect();

        let context_block = format_context(context_posts);
        let prompt = format!(
            "Topic: {query}\n\nRetrieved context (the ONLY admissible sources):\n{context_block}\n\n\
             Build a timeline of about {n} chronologically ordered events. Cite post ids in each \
             event's sources. Only use the provided context."
        );

        let task = GenerationTask {
            name: "emit_timeline".to_string(),
            description: "Return the chronological, source-cited timeline.".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "topic": {"type": "string"},
                    "events": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "timestamp": {"type": "string", "format": "date-time"},
                                "summary": {"type": "string"},
                                "sources": {
                                    "type": "array",
                                    "items": {"type": "string", "format": "uuid"},
                                    "description": "Ids of cited context posts"
                                },
                                "location": {"type": "string"}
                            },
                            "required": ["timestamp", "summary", "sources"]
                        }
                    },
                    "predictions": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Short forward-looking statements grounded in the events"
                    }
                },
                "required": ["topic", "events"]
            }),
            system: Some(SYSTEM.to_string()),
            messages: vec![ProviderMessage::user(prompt)],
        };

        let wire: TimelineWire = self
            .generate(
                &task,
                |timeline: &TimelineWire| {
                    let unknown: Vec<String> = timeline
                        .events
                        .iter()
                        .flat_map(|e| e.sources.iter())
                        .filter(|id| !known_ids.contains(id))
                        .map(|id| id.to_string())
                        .collect();
                    if !unknown.is_empty() {
                        return Err(format!(
                            "events cite ids that are not in the provided context: {}",
                            unknown.join(", ")
                        ));
                    }
                    Ok(())
                },
                deadline,
            )
            .await?;

        let mut events: Vec<TimelineEvent> = wire
            .events
            .into_iter()
            .map(|e| {
                let score = derive_credibility(&e.sources, &credibility);
                TimelineEvent {
                    timestamp: e.timestamp,
                    summary: e.summary,
                    sources: e.sources,
                    location: e.location,
                    credibility_score: score,
                }
            })
            .collect();
        events.sort_by_key(|e| e.timestamp);
        events.truncate(n.max(context_posts.len()));

        Ok(Timeline {
            topic: wire.topic,
            events,
            predictions: wire.predictions,
        })
    }
}

/// Mean persisted credibility of the cited posts, clamped to [0, 1].
/// Events citing nothing score 0.
fn derive_credibility(sources: &[Uuid], credibility: &HashMap<Uuid, f64>) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }
    let sum: f64 = sources
        .iter()
        .map(|id| credibility.get(id).copied().unwrap_or(0.0))
        .sum();
    (sum / sources.len() as f64).clamp(0.0, 1.0)
}
