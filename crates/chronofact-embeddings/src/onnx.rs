// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared ONNX Runtime plumbing for the embedding providers.

use std::path::Path;
use std::sync::Mutex;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

use chronofact_core::error::ChronofactError;

/// Build a single-threaded CPU inference session from a model file.
///
/// A missing or unloadable model surfaces as `EmbeddingUnavailable` so the
/// caller can distinguish model problems from inference bugs.
pub(crate) fn load_session(model_path: &Path) -> Result<Mutex<Session>, ChronofactError> {
    let session = Session::builder()
        .map_err(|e| unavailable("failed to create ONNX session builder", e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| unavailable("failed to set optimization level", e))?
        .with_intra_threads(1)
        .map_err(|e| unavailable("failed to set thread count", e))?
        .commit_from_file(model_path)
        .map_err(|e| {
            unavailable(
                format!("failed to load ONNX model from {}", model_path.display()),
                e,
            )
        })?;
    Ok(Mutex::new(session))
}

/// Load a HuggingFace tokenizer file.
pub(crate) fn load_tokenizer(path: &Path) -> Result<tokenizers::Tokenizer, ChronofactError> {
    tokenizers::Tokenizer::from_file(path).map_err(|e| ChronofactError::EmbeddingUnavailable {
        message: format!("failed to load tokenizer from {}: {e}", path.display()),
        source: None,
    })
}

pub(crate) fn unavailable(
    message: impl Into<String>,
    source: impl std::error::Error + Send + Sync + 'static,
) -> ChronofactError {
    ChronofactError::EmbeddingUnavailable {
        message: message.into(),
        source: Some(Box::new(source)),
    }
}

pub(crate) fn inference_error(message: impl Into<String>) -> ChronofactError {
    ChronofactError::EmbeddingUnavailable {
        message: message.into(),
        source: None,
    }
}

/// Attention-masked mean pooling over token embeddings.
pub(crate) fn mean_pool_with_attention(
    embeddings: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for i in 0..seq_len {
        if attention_mask[i] > 0 {
            for j in 0..hidden_size {
                sum[j] += embeddings[i * hidden_size + j];
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for val in &mut sum {
            *val /= count;
        }
    }

    sum
}

/// L2-normalize a vector in place-by-copy; zero vectors pass through.
pub(crate) fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vec.iter().map(|v| v / norm).collect()
    } else {
        vec.to_vec()
    }
}
