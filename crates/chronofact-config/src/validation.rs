// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints that serde cannot express, such as weight
//! ranges, rate bounds, and mode/url consistency.

use thiserror::Error;

use crate::model::{ChronofactConfig, VectorStoreMode};

/// A single configuration validation failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of failing fast.
pub fn validate_config(config: &ChronofactConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::new("server.host must not be empty"));
    }

    match config.vector_store.mode {
        VectorStoreMode::Docker | VectorStoreMode::Cloud => {
            if config.vector_store.url.as_deref().map(str::trim).unwrap_or("").is_empty() {
                errors.push(ConfigError::new(format!(
                    "vector_store.url is required for mode `{}`",
                    mode_name(config.vector_store.mode)
                )));
            }
        }
        VectorStoreMode::Memory | VectorStoreMode::Local => {}
    }

    if config.vector_store.mode == VectorStoreMode::Cloud
        && config.vector_store.api_key.as_deref().map(str::trim).unwrap_or("").is_empty()
    {
        errors.push(ConfigError::new("vector_store.api_key is required for cloud mode"));
    }

    if config.vector_store.pool_size == 0 {
        errors.push(ConfigError::new("vector_store.pool_size must be at least 1"));
    }

    if config.limits.request_deadline_ms == 0 {
        errors.push(ConfigError::new("limits.request_deadline_ms must be positive"));
    }

    if config.limits.llm_rate_per_min == 0 {
        errors.push(ConfigError::new("limits.llm_rate_per_min must be at least 1"));
    }

    let w = &config.retrieval.weights;
    for (name, value) in [("w_d", w.w_d), ("w_s", w.w_s), ("w_m", w.w_m), ("w_c", w.w_c)] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::new(format!(
                "retrieval.weights.{name} must be in [0, 1], got {value}"
            )));
        }
    }

    if config.retrieval.rrf_k <= 0.0 {
        errors.push(ConfigError::new(format!(
            "retrieval.rrf_k must be positive, got {}",
            config.retrieval.rrf_k
        )));
    }

    if !(0.0..=1.0).contains(&config.retrieval.min_credibility) {
        errors.push(ConfigError::new(format!(
            "retrieval.min_credibility must be in [0, 1], got {}",
            config.retrieval.min_credibility
        )));
    }

    if !(0.0..=1.0).contains(&config.memory.tau_delete) {
        errors.push(ConfigError::new(format!(
            "memory.tau_delete must be in [0, 1], got {}",
            config.memory.tau_delete
        )));
    }

    if !(0.0..=1.0).contains(&config.memory.reinforce_beta) {
        errors.push(ConfigError::new(format!(
            "memory.reinforce_beta must be in [0, 1], got {}",
            config.memory.reinforce_beta
        )));
    }

    let rates = &config.memory.decay_rates;
    for (name, rate) in [
        ("interaction", rates.interaction),
        ("fact", rates.fact),
        ("preference", rates.preference),
    ] {
        if rate <= 0.0 || rate > 1.0 {
            errors.push(ConfigError::new(format!(
                "memory.decay_rates.{name} must be in (0, 1], got {rate}"
            )));
        }
    }

    if !(0.0..=1.0).contains(&config.memory.consolidation_threshold) {
        errors.push(ConfigError::new(format!(
            "memory.consolidation_threshold must be in [0, 1], got {}",
            config.memory.consolidation_threshold
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn mode_name(mode: VectorStoreMode) -> &'static str {
    match mode {
        VectorStoreMode::Memory => "memory",
        VectorStoreMode::Local => "local",
        VectorStoreMode::Docker => "docker",
        VectorStoreMode::Cloud => "cloud",
    }
}
