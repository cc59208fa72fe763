// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Component wiring shared by `serve` and the one-shot subcommands.
//!
//! Builds the vector store, embedders, provider, generator, memory engine,
//! and pipeline from configuration. Construction order matters: collections
//! must exist before anything queries them, and the memory writer wants a
//! cancellation token that outlives every request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chronofact_anthropic::{AnthropicClient, AnthropicProvider};
use chronofact_config::ChronofactConfig;
use chronofact_core::error::ChronofactError;
use chronofact_core::traits::{MultimodalEmbedder, TextEmbedder, VectorStore};
use chronofact_embeddings::{ClipEmbedder, MiniLmEmbedder, ModelManager};
use chronofact_generator::{RateLimiter, StructuredGenerator};
use chronofact_memory::MemoryEngine;
use chronofact_pipeline::{MemoryWriter, TimelinePipeline};
use chronofact_retrieval::HybridRetriever;
use chronofact_vector::{create_store, ensure_collections};

/// Capacity of the fire-and-forget memory write queue.
const MEMORY_QUEUE_CAPACITY: usize = 256;

/// Fully wired application components.
pub struct App {
    pub config: ChronofactConfig,
    pub store: Arc<dyn VectorStore>,
    pub generator: Arc<StructuredGenerator>,
    pub memory: Arc<MemoryEngine>,
    pub pipeline: Arc<TimelinePipeline>,
    pub cancel: CancellationToken,
    pub embedder_ready: bool,
    pub generator_ready: bool,
}

impl App {
    /// Build every component from configuration.
    pub async fn build(config: ChronofactConfig) -> Result<Self, ChronofactError> {
        let cancel = CancellationToken::new();

        let store = create_store(&config.vector_store)?;
        ensure_collections(store.as_ref()).await?;

        // Embedding models download on first run.
        let models = ModelManager::new(PathBuf::from(&config.embedder.data_dir));
        let text_model_dir = models.ensure_text_model().await?;
        let text_embedder: Arc<dyn TextEmbedder> = Arc::new(MiniLmEmbedder::new(&text_model_dir)?);
        info!(model = config.embedder.text_model.as_str(), "text embedder ready");

        // The CLIP towers are optional: without them, image requests lose
        // cross-modal retrieval but everything else works.
        let multimodal: Option<Arc<dyn MultimodalEmbedder>> =
            match models.ensure_clip_model().await.and_then(|dir| ClipEmbedder::new(&dir)) {
                Ok(clip) => {
                    info!(model = config.embedder.multimodal_model.as_str(), "multimodal embedder ready");
                    Some(Arc::new(clip))
                }
                Err(e) => {
                    warn!(error = %e, "multimodal embedder unavailable, continuing text-only");
                    None
                }
            };

        let api_key = config
            .generator
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                ChronofactError::Config(
                    "generator.api_key or ANTHROPIC_API_KEY is required".to_string(),
                )
            })?;
        let client = AnthropicClient::new(
            &api_key,
            &config.generator.api_version,
            &config.generator.model,
        )?;
        let limiter = Arc::new(RateLimiter::new(config.limits.llm_rate_per_min));
        let generator = Arc::new(StructuredGenerator::new(
            Arc::new(AnthropicProvider::new(client)),
            config.generator.model.clone(),
            config.generator.max_tokens,
            limiter,
        ));

        let memory = Arc::new(MemoryEngine::new(
            store.clone(),
            text_embedder.clone(),
            config.memory.clone(),
        ));
        let writer = MemoryWriter::spawn(memory.clone(), MEMORY_QUEUE_CAPACITY, cancel.clone());
        chronofact_memory::spawn_sweeper(
            memory.clone(),
            Duration::from_secs(config.memory.sweep_interval_secs),
            config.memory.consolidation_threshold,
            cancel.clone(),
        );

        let retriever = Arc::new(HybridRetriever::new(
            store.clone(),
            text_embedder.clone(),
            config.retrieval.clone(),
        ));

        let pipeline = Arc::new(TimelinePipeline::new(
            generator.clone(),
            retriever,
            text_embedder,
            multimodal,
            writer,
            config.limits.clone(),
        ));

        Ok(Self {
            config,
            store,
            generator,
            memory,
            pipeline,
            cancel,
            embedder_ready: true,
            generator_ready: true,
        })
    }

    /// Redacted configuration snapshot for `/api/config`.
    pub fn config_echo(&self) -> serde_json::Value {
        serde_json::json!({
            "collections": {
                "posts": chronofact_core::types::COLLECTION_POSTS,
                "knowledge": chronofact_core::types::COLLECTION_FACTS,
                "memory": chronofact_core::types::COLLECTION_MEMORY,
            },
            "search": {
                "default_limit": 10,
                "min_credibility": self.config.retrieval.min_credibility,
            },
            "vector_store": {
                "mode": self.config.vector_store.mode,
            },
            "generator": {
                "provider": self.config.generator.provider,
                "model": self.config.generator.model,
            },
        })
    }
}
