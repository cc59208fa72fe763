// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding providers for Chronofact.
//!
//! A MiniLM text embedder (384 dimensions) and a CLIP ViT-B/32 multimodal
//! embedder (512 dimensions), both running locally through ONNX Runtime.
//! Model files are downloaded from HuggingFace on first run.

mod onnx;

pub mod clip;
pub mod models;
pub mod text;

pub use clip::{fuse, ClipEmbedder};
pub use models::ModelManager;
pub use text::MiniLmEmbedder;
