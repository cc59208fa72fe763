// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The timeline request orchestrator.
//!
//! Drives a request through image analysis, query interpretation, hybrid
//! retrieval, timeline synthesis, and the parallel analysis stage, under one
//! deadline. Auxiliary failures (misinformation, follow-ups, memory writes)
//! degrade to nullable fields; essential failures abort the request.
//!
//! Memory effects are deferred: retrieval-hit reinforcement and the
//! interaction memory are queued only after the response exists, so a
//! request that dies on the deadline persists nothing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use chronofact_config::model::LimitsConfig;
use chronofact_core::error::ChronofactError;
use chronofact_core::traits::{MultimodalEmbedder, TextEmbedder};
use chronofact_core::types::{
    FusionStrategy, QueryPlan, TimelineRequest, TimelineResponse,
};
use chronofact_generator::StructuredGenerator;
use chronofact_retrieval::HybridRetriever;

use crate::memory_writer::{MemoryTask, MemoryWriter};

/// How many event summaries feed the interaction memory.
const MEMORY_SUMMARY_EVENTS: usize = 3;

/// Orchestrates timeline requests end to end.
pub struct TimelinePipeline {
    generator: Arc<StructuredGenerator>,
    retriever: Arc<HybridRetriever>,
    embedder: Arc<dyn TextEmbedder>,
    multimodal: Option<Arc<dyn MultimodalEmbedder>>,
    writer: MemoryWriter,
    limits: LimitsConfig,
}

struct RequestArtifacts {
    response: TimelineResponse,
    /// Embedding of the refined query, for deferred memory reinforcement.
    memory_query: Option<Vec<f32>>,
}

impl TimelinePipeline {
    pub fn new(
        generator: Arc<StructuredGenerator>,
        retriever: Arc<HybridRetriever>,
        embedder: Arc<dyn TextEmbedder>,
        multimodal: Option<Arc<dyn MultimodalEmbedder>>,
        writer: MemoryWriter,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            generator,
            retriever,
            embedder,
            multimodal,
            writer,
            limits,
        }
    }

    /// Handle one timeline request within the configured deadline.
    pub async fn handle(&self, request: TimelineRequest) -> Result<TimelineResponse, ChronofactError> {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.limits.request_deadline_ms);

        let artifacts = match tokio::time::timeout_at(deadline, self.run(&request, deadline)).await {
            Ok(Ok(artifacts)) => artifacts,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(ChronofactError::DeadlineExceeded {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        };

        // The request is now RESPONDED; queue its memory effects.
        if let Some(session_id) = &request.session_id {
            if let Some(query_vector) = artifacts.memory_query.clone() {
                self.writer.enqueue(MemoryTask::Reinforce {
                    session_id: session_id.clone(),
                    query_vector,
                });
            }
            self.writer.enqueue(MemoryTask::StoreInteraction {
                session_id: session_id.clone(),
                content: interaction_summary(&request.topic, &artifacts.response),
            });
        }

        info!(
            topic = request.topic.as_str(),
            events = artifacts.response.events.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "timeline request complete"
        );
        Ok(artifacts.response)
    }

    async fn run(
        &self,
        request: &TimelineRequest,
        deadline: Instant,
    ) -> Result<RequestArtifacts, ChronofactError> {
        if request.topic.trim().is_empty() && request.image.is_none() {
            return Err(ChronofactError::InvalidRequest(
                "topic is required when no image is attached".to_string(),
            ));
        }

        // Image analysis first: its output joins the query before anything
        // is embedded.
        let visual_context = match &request.image {
            Some(image) => self.analyze_image(image, &request.topic, deadline).await?,
            None => None,
        };
        let combined_query = match &visual_context {
            Some(context) => format!("{} {}", request.topic.trim(), context.trim()),
            None => request.topic.trim().to_string(),
        };

        // Query interpretation, with the trivial-plan fallback on failure.
        let mut plan = match self
            .generator
            .process_query(&combined_query, request.min_credibility, request.limit, deadline)
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "query interpretation failed, using fallback plan");
                QueryPlan::fallback(&combined_query, request.min_credibility, request.limit)
            }
        };
        if let Some(location) = &request.location {
            if !plan.locations.iter().any(|l| l == location) {
                plan.locations.push(location.clone());
            }
        }
        plan.image_vector = self.image_query_vector(request, &combined_query).await;

        // Retrieval, with one zero-credibility recovery retry.
        let mut outcome = self.retriever.retrieve(&plan).await?;
        if outcome.posts.is_empty() && plan.min_credibility > 0.0 {
            debug!("empty retrieval, retrying without credibility floor");
            plan.min_credibility = 0.0;
            outcome = self.retriever.retrieve(&plan).await?;
        }
        if request.include_media_only {
            outcome.posts.retain(|p| !p.post.media_urls.is_empty());
        }

        let memory_query = match &request.session_id {
            Some(_) => Some(self.embedder.embed_one(&combined_query).await?),
            None => None,
        };

        if outcome.posts.is_empty() {
            // An empty store is an empty timeline, not an error.
            return Ok(RequestArtifacts {
                response: empty_response(&request.topic, outcome.partial),
                memory_query,
            });
        }

        let partial = outcome.partial;
        let posts: Vec<_> = outcome.posts.into_iter().map(|p| p.post).collect();
        let timeline = self
            .generator
            .generate_timeline(&combined_query, &posts, request.limit, deadline)
            .await?;

        // Analysis stage: misinformation and follow-ups run in parallel and
        // fail independently.
        let summary = timeline
            .events
            .iter()
            .map(|e| e.summary.as_str())
            .collect::<Vec<_>>()
            .join(" | ");
        let (misinformation_result, follow_ups_result) = tokio::join!(
            self.generator.detect_misinformation(&request.topic, deadline),
            self.generator.generate_follow_up_questions(
                &request.topic,
                &summary,
                &request.previous_questions,
                deadline,
            ),
        );

        let (misinformation, misinformation_error) = match misinformation_result {
            Ok(analysis) => (Some(analysis), None),
            Err(e) => {
                warn!(error = %e, "misinformation detection degraded");
                (None, Some(e.to_string()))
            }
        };
        let (follow_ups, follow_ups_error) = match follow_ups_result {
            Ok(questions) => (Some(questions), None),
            Err(e) => {
                warn!(error = %e, "follow-up generation degraded");
                (None, Some(e.to_string()))
            }
        };

        let cited: HashSet<_> = timeline
            .events
            .iter()
            .flat_map(|e| e.sources.iter())
            .collect();
        let total_sources = cited.len();
        let avg_credibility = if timeline.events.is_empty() {
            0.0
        } else {
            timeline.events.iter().map(|e| e.credibility_score).sum::<f64>()
                / timeline.events.len() as f64
        };

        Ok(RequestArtifacts {
            response: TimelineResponse {
                topic: timeline.topic,
                events: timeline.events,
                predictions: timeline.predictions,
                total_sources,
                avg_credibility,
                misinformation,
                misinformation_error,
                follow_ups,
                follow_ups_error,
                partial_retrieval: partial,
            },
            memory_query,
        })
    }

    /// Extract visual context from the attached image.
    ///
    /// Size violations and deadline/rate failures abort the request; other
    /// vision failures degrade to a text-only query.
    async fn analyze_image(
        &self,
        image: &[u8],
        topic: &str,
        deadline: Instant,
    ) -> Result<Option<String>, ChronofactError> {
        match self
            .generator
            .analyze_image(image, topic, self.limits.image_max_bytes, deadline)
            .await
        {
            Ok(context) => Ok(Some(context.visual_context)),
            Err(
                e @ (ChronofactError::PayloadTooLarge { .. }
                | ChronofactError::DeadlineExceeded { .. }
                | ChronofactError::RateLimited),
            ) => Err(e),
            Err(e) => {
                warn!(error = %e, "image analysis degraded, continuing without visual context");
                Ok(None)
            }
        }
    }

    /// Build the cross-modal query vector when an image is attached and a
    /// multimodal embedder is configured.
    async fn image_query_vector(
        &self,
        request: &TimelineRequest,
        combined_query: &str,
    ) -> Option<Vec<f32>> {
        let image = request.image.as_deref()?;
        let embedder = self.multimodal.as_ref()?;
        match embedder
            .embed_multimodal(Some(combined_query), Some(image), FusionStrategy::Mean)
            .await
        {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, "multimodal query embedding degraded");
                None
            }
        }
    }

    /// The retriever handle, shared with the search endpoint.
    pub fn retriever(&self) -> &Arc<HybridRetriever> {
        &self.retriever
    }

    /// The memory writer handle (drop metrics, test settling).
    pub fn memory_writer(&self) -> &MemoryWriter {
        &self.writer
    }
}

fn empty_response(topic: &str, partial: bool) -> TimelineResponse {
    TimelineResponse {
        topic: topic.to_string(),
        events: Vec::new(),
        predictions: Vec::new(),
        total_sources: 0,
        avg_credibility: 0.0,
        misinformation: None,
        misinformation_error: None,
        follow_ups: Some(Vec::new()),
        follow_ups_error: None,
        partial_retrieval: partial,
    }
}

/// Content of the interaction memory: the query plus the top event summaries.
fn interaction_summary(raw_query: &str, response: &TimelineResponse) -> String {
    let mut parts = vec![format!("query: {raw_query}")];
    for event in response.events.iter().take(MEMORY_SUMMARY_EVENTS) {
        parts.push(event.summary.clone());
    }
    parts.join("; ")
}
