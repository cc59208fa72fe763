// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic decay and consolidation sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chronofact_core::error::ChronofactError;

use crate::engine::MemoryEngine;

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub decayed: usize,
    pub deleted: usize,
    pub consolidated: usize,
    pub elapsed_ms: u64,
}

/// Run one decay-then-consolidate cycle.
pub async fn run_sweep(
    engine: &MemoryEngine,
    consolidation_threshold: f32,
) -> Result<SweepReport, ChronofactError> {
    let start = std::time::Instant::now();

    let (decayed, deleted) = engine.apply_global_decay().await?;
    let consolidated = engine.consolidate_similar(consolidation_threshold).await?;

    let report = SweepReport {
        decayed,
        deleted,
        consolidated,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        decayed = report.decayed,
        deleted = report.deleted,
        consolidated = report.consolidated,
        elapsed_ms = report.elapsed_ms,
        "memory sweep complete"
    );
    Ok(report)
}

/// Spawn the background sweep loop.
///
/// Runs every `interval` until the token is cancelled. Sweep failures are
/// logged and the loop continues; a broken sweep must not take the service
/// down.
pub fn spawn_sweeper(
    engine: Arc<MemoryEngine>,
    interval: Duration,
    consolidation_threshold: f32,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick; collections are empty at startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = run_sweep(&engine, consolidation_threshold).await {
                        warn!(error = %e, "memory sweep failed (non-fatal)");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("memory sweeper shutting down");
                    break;
                }
            }
        }
    })
}
