// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./chronofact.toml` > `~/.config/chronofact/chronofact.toml`
//! > `/etc/chronofact/chronofact.toml` with environment variable overrides via
//! the `CHRONOFACT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ChronofactConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chronofact/chronofact.toml` (system-wide)
/// 3. `~/.config/chronofact/chronofact.toml` (user XDG config)
/// 4. `./chronofact.toml` (local directory)
/// 5. `CHRONOFACT_*` environment variables
pub fn load_config() -> Result<ChronofactConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChronofactConfig::default()))
        .merge(Toml::file("/etc/chronofact/chronofact.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chronofact/chronofact.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chronofact.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ChronofactConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChronofactConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChronofactConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChronofactConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CHRONOFACT_VECTOR_STORE_API_KEY` must
/// map to `vector_store.api_key`, not `vector.store.api.key`.
fn env_provider() -> Env {
    Env::prefixed("CHRONOFACT_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("vector_store_", "vector_store.", 1)
            .replacen("embedder_", "embedder.", 1)
            .replacen("generator_", "generator.", 1)
            .replacen("limits_", "limits.", 1)
            .replacen("retrieval_weights_", "retrieval.weights.", 1)
            .replacen("retrieval_", "retrieval.", 1)
            .replacen("memory_decay_rates_", "memory.decay_rates.", 1)
            .replacen("memory_", "memory.", 1);
        mapped.into()
    })
}
