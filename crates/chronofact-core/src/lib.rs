// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types and traits for the Chronofact timeline service.
//!
//! This crate defines the shared error type, the domain vocabulary
//! (posts, facts, timeline artifacts), the vector store data model, and the
//! adapter traits that the embedding, storage, and generation crates
//! implement.

pub mod error;
pub mod traits;
pub mod types;
pub mod vector;

pub use error::ChronofactError;
pub use traits::{MultimodalEmbedder, Provider, TextEmbedder, VectorStore};
