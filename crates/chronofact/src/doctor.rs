// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chronofact doctor` command implementation.
//!
//! Runs diagnostic checks against the environment: configuration,
//! vector store connectivity, embedding model availability, and provider
//! credentials.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use colored::Colorize;

use chronofact_config::ChronofactConfig;
use chronofact_core::error::ChronofactError;
use chronofact_core::traits::VectorStore as _;
use chronofact_embeddings::ModelManager;
use chronofact_vector::create_store;

/// Status of a diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    message: String,
    duration: Duration,
}

fn check(name: &'static str, started: Instant, status: CheckStatus, message: String) -> CheckResult {
    CheckResult {
        name,
        status,
        message,
        duration: started.elapsed(),
    }
}

/// Run the `chronofact doctor` command.
pub async fn run_doctor(config: &ChronofactConfig) -> Result<(), ChronofactError> {
    let use_color = std::io::stdout().is_terminal();
    let mut results = Vec::new();

    results.push(check_vector_store(config).await);
    results.push(check_models(config));
    results.push(check_provider_key(config));
    results.push(check_memory_settings(config));

    println!();
    println!("  chronofact doctor");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    for result in &results {
        let duration_ms = result.duration.as_millis();
        let line = match (result.status, use_color) {
            (CheckStatus::Pass, true) => format!(
                "    {} {:<18} {} ({duration_ms}ms)",
                "✓".green(),
                result.name,
                result.message
            ),
            (CheckStatus::Pass, false) => format!(
                "    [OK]   {:<18} {} ({duration_ms}ms)",
                result.name, result.message
            ),
            (CheckStatus::Warn, true) => format!(
                "    {} {:<18} {} ({duration_ms}ms)",
                "!".yellow(),
                result.name,
                result.message.yellow()
            ),
            (CheckStatus::Warn, false) => format!(
                "    [WARN] {:<18} {} ({duration_ms}ms)",
                result.name, result.message
            ),
            (CheckStatus::Fail, true) => {
                fail_count += 1;
                format!(
                    "    {} {:<18} {} ({duration_ms}ms)",
                    "✗".red(),
                    result.name,
                    result.message.red()
                )
            }
            (CheckStatus::Fail, false) => {
                fail_count += 1;
                format!(
                    "    [FAIL] {:<18} {} ({duration_ms}ms)",
                    result.name, result.message
                )
            }
        };
        println!("{line}");
    }

    println!("  {}", "-".repeat(50));
    if fail_count == 0 {
        println!("  all checks passed");
        println!();
        Ok(())
    } else {
        println!("  {fail_count} check(s) failed");
        println!();
        Err(ChronofactError::Internal(format!(
            "{fail_count} doctor check(s) failed"
        )))
    }
}

async fn check_vector_store(config: &ChronofactConfig) -> CheckResult {
    let started = Instant::now();
    match create_store(&config.vector_store) {
        Ok(store) => match store.health_check().await {
            Ok(()) => check(
                "vector store",
                started,
                CheckStatus::Pass,
                format!("reachable ({:?} mode)", config.vector_store.mode),
            ),
            Err(e) => check(
                "vector store",
                started,
                CheckStatus::Fail,
                format!("unreachable: {e}"),
            ),
        },
        Err(e) => check(
            "vector store",
            started,
            CheckStatus::Fail,
            format!("cannot construct client: {e}"),
        ),
    }
}

fn check_models(config: &ChronofactConfig) -> CheckResult {
    let started = Instant::now();
    let models = ModelManager::new(PathBuf::from(&config.embedder.data_dir));
    let text = models.text_model_available();
    let clip = models.clip_model_available();
    match (text, clip) {
        (true, true) => check("embedding models", started, CheckStatus::Pass, "text and CLIP models cached".to_string()),
        (true, false) => check(
            "embedding models",
            started,
            CheckStatus::Warn,
            "text model cached, CLIP missing (downloads on first serve)".to_string(),
        ),
        _ => check(
            "embedding models",
            started,
            CheckStatus::Warn,
            "models not cached yet (download on first serve)".to_string(),
        ),
    }
}

fn check_provider_key(config: &ChronofactConfig) -> CheckResult {
    let started = Instant::now();
    let configured = config.generator.api_key.as_deref().is_some_and(|k| !k.is_empty())
        || std::env::var("ANTHROPIC_API_KEY").map(|k| !k.is_empty()).unwrap_or(false);
    if configured {
        check(
            "provider key",
            started,
            CheckStatus::Pass,
            format!("{} configured", config.generator.provider),
        )
    } else {
        check(
            "provider key",
            started,
            CheckStatus::Fail,
            "generator.api_key or ANTHROPIC_API_KEY not set".to_string(),
        )
    }
}

fn check_memory_settings(config: &ChronofactConfig) -> CheckResult {
    let started = Instant::now();
    let memory = &config.memory;
    check(
        "memory tuning",
        started,
        CheckStatus::Pass,
        format!(
            "tau_delete={}, beta={}, sweep every {}s",
            memory.tau_delete, memory.reinforce_beta, memory.sweep_interval_secs
        ),
    )
}
