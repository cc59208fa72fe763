// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Chronofact service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, producing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Chronofact configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChronofactConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Vector store connection settings.
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Embedding model settings.
    #[serde(default)]
    pub embedder: EmbedderConfig,

    /// Structured generator (LLM) settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Process-wide limits and deadlines.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Hybrid retrieval tuning.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Memory evolution tuning.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Deployment mode of the vector store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreMode {
    /// In-process engine, no persistence. Default for tests and development.
    Memory,
    /// In-process engine; `storage_path` is accepted but persistence is not
    /// implemented behind this mode.
    Local,
    /// Qdrant reachable over HTTP on the local network (no API key needed).
    Docker,
    /// Managed Qdrant with URL and API key.
    Cloud,
}

/// Vector store connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VectorStoreConfig {
    /// Backend mode.
    #[serde(default = "default_store_mode")]
    pub mode: VectorStoreMode,

    /// Base URL for docker/cloud modes (e.g. "http://localhost:6333").
    #[serde(default)]
    pub url: Option<String>,

    /// API key for cloud mode.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Storage path accepted for local mode.
    #[serde(default)]
    pub storage_path: Option<String>,

    /// Request timeout for remote backends.
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent in-flight store operations.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long a caller waits for a pool slot before `BackendBusy`.
    #[serde(default = "default_pool_wait")]
    pub pool_wait_ms: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            mode: default_store_mode(),
            url: None,
            api_key: None,
            storage_path: None,
            timeout_secs: default_store_timeout(),
            pool_size: default_pool_size(),
            pool_wait_ms: default_pool_wait(),
        }
    }
}

fn default_store_mode() -> VectorStoreMode {
    VectorStoreMode::Memory
}

fn default_store_timeout() -> u64 {
    30
}

fn default_pool_size() -> usize {
    16
}

fn default_pool_wait() -> u64 {
    2_000
}

/// Embedding model configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbedderConfig {
    /// Text embedding model identifier.
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Cross-modal (CLIP) embedding model identifier.
    #[serde(default = "default_multimodal_model")]
    pub multimodal_model: String,

    /// Directory where model files are cached.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            text_model: default_text_model(),
            multimodal_model: default_multimodal_model(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_text_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_multimodal_model() -> String {
    "clip-ViT-B-32".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

/// Structured generator (LLM provider) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Provider name. Only "anthropic" is compiled in.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier for generation calls.
    #[serde(default = "default_model")]
    pub model: String,

    /// Provider API key. `None` requires the environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Provider API version header.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Maximum tokens per generation call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

/// Process-wide limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Per-request deadline in milliseconds.
    #[serde(default = "default_request_deadline")]
    pub request_deadline_ms: u64,

    /// LLM calls allowed per minute, shared process-wide.
    #[serde(default = "default_llm_rate")]
    pub llm_rate_per_min: u32,

    /// Maximum accepted image size in bytes.
    #[serde(default = "default_image_max_bytes")]
    pub image_max_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            request_deadline_ms: default_request_deadline(),
            llm_rate_per_min: default_llm_rate(),
            image_max_bytes: default_image_max_bytes(),
        }
    }
}

fn default_request_deadline() -> u64 {
    30_000
}

fn default_llm_rate() -> u32 {
    60
}

fn default_image_max_bytes() -> usize {
    8 * 1024 * 1024
}

/// Rank-fusion weights for the hybrid retriever.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalWeights {
    /// Dense (semantic) component weight.
    #[serde(default = "default_w_dense")]
    pub w_d: f32,
    /// Sparse (keyword) component weight.
    #[serde(default = "default_w_sparse")]
    pub w_s: f32,
    /// Multimodal component weight.
    #[serde(default = "default_w_multimodal")]
    pub w_m: f32,
    /// Persisted-credibility component weight.
    #[serde(default = "default_w_credibility")]
    pub w_c: f32,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            w_d: default_w_dense(),
            w_s: default_w_sparse(),
            w_m: default_w_multimodal(),
            w_c: default_w_credibility(),
        }
    }
}

fn default_w_dense() -> f32 {
    0.55
}

fn default_w_sparse() -> f32 {
    0.25
}

fn default_w_multimodal() -> f32 {
    0.15
}

fn default_w_credibility() -> f32 {
    0.05
}

/// Hybrid retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Fusion weights.
    #[serde(default)]
    pub weights: RetrievalWeights,

    /// Reciprocal-rank fusion constant.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Whether the diversity pass runs on timeline retrieval.
    #[serde(default = "default_diversity")]
    pub diversity: bool,

    /// Default minimum credibility when a request does not set one.
    #[serde(default = "default_min_credibility")]
    pub min_credibility: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            weights: RetrievalWeights::default(),
            rrf_k: default_rrf_k(),
            diversity: default_diversity(),
            min_credibility: default_min_credibility(),
        }
    }
}

fn default_rrf_k() -> f32 {
    60.0
}

fn default_diversity() -> bool {
    true
}

fn default_min_credibility() -> f64 {
    0.3
}

/// Per-type daily decay rates for session memories.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DecayRates {
    #[serde(default = "default_decay_interaction")]
    pub interaction: f64,
    #[serde(default = "default_decay_fact")]
    pub fact: f64,
    #[serde(default = "default_decay_preference")]
    pub preference: f64,
}

impl Default for DecayRates {
    fn default() -> Self {
        Self {
            interaction: default_decay_interaction(),
            fact: default_decay_fact(),
            preference: default_decay_preference(),
        }
    }
}

fn default_decay_interaction() -> f64 {
    0.02
}

fn default_decay_fact() -> f64 {
    0.005
}

fn default_decay_preference() -> f64 {
    0.01
}

/// Memory evolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Per-type decay rates (per day).
    #[serde(default)]
    pub decay_rates: DecayRates,

    /// Relevance threshold below which memories are deleted.
    #[serde(default = "default_tau_delete")]
    pub tau_delete: f64,

    /// Reinforcement pull toward 1.0 on access.
    #[serde(default = "default_reinforce_beta")]
    pub reinforce_beta: f64,

    /// Cosine similarity threshold for consolidation.
    #[serde(default = "default_consolidation_threshold")]
    pub consolidation_threshold: f32,

    /// Interval between decay/consolidation sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Scroll batch size used by the sweep.
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            decay_rates: DecayRates::default(),
            tau_delete: default_tau_delete(),
            reinforce_beta: default_reinforce_beta(),
            consolidation_threshold: default_consolidation_threshold(),
            sweep_interval_secs: default_sweep_interval(),
            sweep_batch: default_sweep_batch(),
        }
    }
}

fn default_tau_delete() -> f64 {
    0.2
}

fn default_reinforce_beta() -> f64 {
    0.1
}

fn default_consolidation_threshold() -> f32 {
    0.85
}

fn default_sweep_interval() -> u64 {
    3_600
}

fn default_sweep_batch() -> usize {
    100
}
