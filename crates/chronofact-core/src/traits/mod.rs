// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits at the component seams.
//!
//! Embedders, the vector store, and the LLM provider are consumed through
//! these traits so tests can substitute deterministic implementations.

pub mod embedding;
pub mod provider;
pub mod vector;

pub use embedding::{MultimodalEmbedder, TextEmbedder};
pub use provider::Provider;
pub use vector::VectorStore;
