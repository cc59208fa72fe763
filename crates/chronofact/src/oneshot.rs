// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands: build a timeline, run a search, or run a memory
//! sweep from the command line, printing JSON to stdout.

use chronofact_config::ChronofactConfig;
use chronofact_core::error::ChronofactError;
use chronofact_core::types::{QueryPlan, TimelineRequest};

use crate::app::App;
use crate::serve::init_tracing;

/// Run `chronofact timeline <topic>`.
pub async fn run_timeline(
    config: ChronofactConfig,
    topic: &str,
    limit: usize,
) -> Result<(), ChronofactError> {
    init_tracing("warn");
    let app = App::build(config).await?;

    let request = TimelineRequest {
        topic: topic.to_string(),
        limit: limit.clamp(1, 50),
        min_credibility: app.config.retrieval.min_credibility,
        ..TimelineRequest::default()
    };
    let response = app.pipeline.handle(request).await?;

    print_json(&response)?;
    app.cancel.cancel();
    Ok(())
}

/// Run `chronofact search <query>`.
pub async fn run_search(
    config: ChronofactConfig,
    query: &str,
    limit: usize,
) -> Result<(), ChronofactError> {
    init_tracing("warn");
    let app = App::build(config).await?;

    let plan = QueryPlan::fallback(query, 0.0, limit.clamp(1, 100));
    let outcome = app.pipeline.retriever().retrieve(&plan).await?;

    let hits: Vec<serde_json::Value> = outcome
        .posts
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.post.post_id,
                "score": p.fused_score,
                "text": p.post.text,
                "author": p.post.author,
                "timestamp": p.post.timestamp,
                "credibility_score": p.post.credibility_score,
            })
        })
        .collect();
    print_json(&serde_json::json!({
        "query": query,
        "count": hits.len(),
        "results": hits,
    }))?;
    app.cancel.cancel();
    Ok(())
}

/// Run `chronofact sweep`.
pub async fn run_sweep(config: ChronofactConfig) -> Result<(), ChronofactError> {
    init_tracing("info");
    let threshold = config.memory.consolidation_threshold;
    let app = App::build(config).await?;

    let report = chronofact_memory::run_sweep(&app.memory, threshold).await?;
    print_json(&serde_json::json!({
        "decayed": report.decayed,
        "deleted": report.deleted,
        "consolidated": report.consolidated,
        "elapsed_ms": report.elapsed_ms,
    }))?;
    app.cancel.cancel();
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ChronofactError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| ChronofactError::Internal(format!("response serialization: {e}")))?;
    println!("{rendered}");
    Ok(())
}
