// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up question and recommendation generation.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use chronofact_core::error::ChronofactError;
use chronofact_core::types::{FollowUpQuestion, ProviderMessage, Recommendation};

use crate::functions::question_key;
use crate::generate::{GenerationTask, StructuredGenerator};

const FOLLOWUP_SYSTEM: &str = "You suggest follow-up questions a reader might ask after seeing \
    an event timeline. Cover different angles: digging deeper, adjacent topics, verification, \
    what happens next, and comparisons to similar events. Never repeat a question the reader \
    has already seen.";

const RECOMMEND_SYSTEM: &str = "You recommend related topics and queries worth exploring, \
    grounded in the user's query and the related material provided.";

#[derive(Debug, Deserialize)]
struct FollowUpWire {
    questions: Vec<FollowUpQuestion>,
}

#[derive(Debug, Deserialize)]
struct RecommendationWire {
    recommendations: Vec<Recommendation>,
}

impl StructuredGenerator {
    /// Generate follow-up questions for a completed timeline.
    ///
    /// No returned question may repeat an entry of `prior_questions`
    /// (case-insensitive, trimmed); the validator rejects repeats so the
    /// retry prompt can steer the model away from them.
    pub async fn generate_follow_up_questions(
        &self,
        original_query: &str,
        timeline_summary: &str,
        prior_questions: &[String],
        deadline: Instant,
    ) -> Result<Vec<FollowUpQuestion>, ChronofactError> {
        let seen: HashSet<String> = prior_questions.iter().map(|q| question_key(q)).collect();

        let mut prompt = format!(
            "Original query: {original_query}\n\nTimeline summary:\n{timeline_summary}\n\n\
             Suggest 3 to 5 follow-up questions."
        );
        if !prior_questions.is_empty() {
            prompt.push_str(&format!(
                "\n\nAlready asked (do not repeat): {}",
                prior_questions.join("; ")
            ));
        }

        let task = GenerationTask {
            name: "emit_follow_up_questions".to_string(),
            description: "Return follow-up questions for the timeline.".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "questions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "question": {"type": "string"},
                                "category": {
                                    "type": "string",
                                    "enum": [
                                        "deep_dive",
                                        "related_topic",
                                        "verification",
                                        "prediction",
                                        "comparison"
                                    ]
                                },
                                "priority": {"type": "integer", "minimum": 1, "maximum": 5}
                            },
                            "required": ["question", "category", "priority"]
                        }
                    }
                },
                "required": ["questions"]
            }),
            system: Some(FOLLOWUP_SYSTEM.to_string()),
            messages: vec![ProviderMessage::user(prompt)],
        };

        let wire: FollowUpWire = self
            .generate(
                &task,
                |wire: &FollowUpWire| {
                    for q in &wire.questions {
                        if q.question.trim().is_empty() {
                            return Err("questions must not be empty".to_string());
                        }
                        if !(1..=5).contains(&q.priority) {
                            return Err(format!(
                                "priority must be 1..=5, got {} for '{}'",
                                q.priority, q.question
                            ));
                        }
                        if seen.contains(&question_key(&q.question)) {
                            return Err(format!(
                                "'{}' repeats a question the reader already saw",
                                q.question
                            ));
                        }
                    }
                    Ok(())
                },
                deadline,
            )
            .await?;

        Ok(wire.questions)
    }

    /// Generate context-aware topic recommendations.
    pub async fn generate_recommendations(
        &self,
        query: &str,
        related_texts: &[String],
        limit: usize,
        deadline: Instant,
    ) -> Result<Vec<Recommendation>, ChronofactError> {
        let mut prompt = format!("Query: {query}\n\nSuggest up to {limit} related topics to explore.");
        if !related_texts.is_empty() {
            prompt.push_str(&format!(
                "\n\nRelated material:\n- {}",
                related_texts.join("\n- ")
            ));
        }

        let task = GenerationTask {
            name: "emit_recommendations".to_string(),
            description: "Return related topic recommendations.".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "recommendations": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "title": {"type": "string"},
                                "reason": {"type": "string"},
                                "category": {"type": "string"}
                            },
                            "required": ["title", "reason", "category"]
                        }
                    }
                },
                "required": ["recommendations"]
            }),
            system: Some(RECOMMEND_SYSTEM.to_string()),
            messages: vec![ProviderMessage::user(prompt)],
        };

        let wire: RecommendationWire = self
            .generate(
                &task,
                |wire: &RecommendationWire| {
                    if wire.recommendations.iter().any(|r| r.title.trim().is_empty()) {
                        Err("recommendation titles must not be empty".to_string())
                    } else {
                        Ok(())
                    }
                },
                deadline,
            )
            .await?;

        let mut recommendations = wire.recommendations;
        recommendations.truncate(limit);
        Ok(recommendations)
    }
}
