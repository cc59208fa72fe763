// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the Chronofact service.
//!
//! TOML files merged across the XDG hierarchy, overridden by `CHRONOFACT_*`
//! environment variables, validated after extraction.

#![allow(clippy::result_large_err)]

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::ChronofactConfig;
pub use validation::{validate_config, ConfigError};

/// Load from a TOML string and validate in one step.
pub fn load_and_validate_str(toml_content: &str) -> Result<ChronofactConfig, String> {
    let config = load_config_from_str(toml_content).map_err(|e| e.to_string())?;
    validate_config(&config).map_err(|errors| {
        errors
            .iter()
            .map(|e| e.message.clone())
            .collect::<Vec<_>>()
            .join("; ")
    })?;
    Ok(config)
}
