// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chronofact serve` command implementation.
//!
//! Wires the full stack and runs the gateway until SIGTERM or Ctrl+C.

use chronofact_config::ChronofactConfig;
use chronofact_core::error::ChronofactError;
use chronofact_gateway::{start_server, GatewayState, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::App;

/// Run the `chronofact serve` command.
pub async fn run_serve(config: ChronofactConfig) -> Result<(), ChronofactError> {
    init_tracing(&config.server.log_level);
    info!("starting chronofact serve");

    let app = App::build(config).await?;
    install_signal_handler(app.cancel.clone());

    let state = GatewayState {
        pipeline: app.pipeline.clone(),
        generator: app.generator.clone(),
        store: app.store.clone(),
        memory: app.memory.clone(),
        embedder_ready: app.embedder_ready,
        generator_ready: app.generator_ready,
        default_min_credibility: app.config.retrieval.min_credibility,
        request_deadline_ms: app.config.limits.request_deadline_ms,
        config_echo: app.config_echo(),
    };
    let server_config = ServerConfig {
        host: app.config.server.host.clone(),
        port: app.config.server.port,
    };

    tokio::select! {
        result = start_server(&server_config, state) => result?,
        _ = app.cancel.cancelled() => {
            info!("shutdown signal received");
        }
    }

    info!("chronofact serve shutdown complete");
    Ok(())
}

/// Install handlers for SIGTERM and SIGINT that cancel the given token.
fn install_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        cancel.cancel();
    });
}

/// Initialize the tracing subscriber with the configured log level.
pub(crate) fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chronofact={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
