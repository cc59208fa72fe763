// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store client for Chronofact.
//!
//! Two backends behind the [`VectorStore`] trait: an in-process engine for
//! the `memory`/`local` modes and tests, and a Qdrant REST client for the
//! `docker`/`cloud` modes. Both are wrapped in a bounded connection pool.

use std::sync::Arc;
use std::time::Duration;

use chronofact_config::model::{VectorStoreConfig, VectorStoreMode};
use chronofact_core::error::ChronofactError;
use chronofact_core::traits::VectorStore;
use tracing::{info, warn};

pub mod filter;
pub mod memory;
pub mod pool;
pub mod qdrant;
pub mod setup;
pub mod tokenize;

pub use memory::MemoryVectorStore;
pub use pool::PooledStore;
pub use qdrant::QdrantVectorStore;
pub use setup::ensure_collections;

/// Build the configured vector store backend, wrapped in the connection pool.
pub fn create_store(config: &VectorStoreConfig) -> Result<Arc<dyn VectorStore>, ChronofactError> {
    let inner: Arc<dyn VectorStore> = match config.mode {
        VectorStoreMode::Memory => {
            info!("using in-process vector store (data will not persist)");
            Arc::new(MemoryVectorStore::new())
        }
        VectorStoreMode::Local => {
            if let Some(path) = &config.storage_path {
                warn!(
                    storage_path = path.as_str(),
                    "local mode runs the in-process engine; persistence is not available"
                );
            }
            Arc::new(MemoryVectorStore::new())
        }
        VectorStoreMode::Docker | VectorStoreMode::Cloud => {
            let url = config.url.as_deref().ok_or_else(|| {
                ChronofactError::Config("vector_store.url is required for remote modes".to_string())
            })?;
            let api_key = match config.mode {
                VectorStoreMode::Cloud => config.api_key.as_deref(),
                // Docker instances on the local network usually run without
                // auth; an explicitly configured key is still honored.
                _ => config.api_key.as_deref().filter(|k| !k.is_empty()),
            };
            info!(url, "using Qdrant vector store");
            Arc::new(QdrantVectorStore::new(
                url,
                api_key,
                Duration::from_secs(config.timeout_secs),
            )?)
        }
    };

    Ok(Arc::new(PooledStore::new(
        inner,
        config.pool_size,
        Duration::from_millis(config.pool_wait_ms),
    )))
}
