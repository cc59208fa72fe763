// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text embedding provider backed by all-MiniLM-L6-v2.
//!
//! Produces 384-dimensional, L2-normalized sentence embeddings on CPU with
//! no external API calls.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::Session;
use ort::value::TensorRef;

use chronofact_core::error::ChronofactError;
use chronofact_core::traits::TextEmbedder;
use chronofact_core::types::TEXT_VECTOR_DIM;

use crate::onnx::{
    inference_error, l2_normalize, load_session, load_tokenizer, mean_pool_with_attention,
    unavailable,
};

/// MiniLM sentence embedder.
///
/// The ONNX session is not `Send`, so it sits behind a `Mutex`; encoding is
/// cheap enough that serialization is not a bottleneck for this service.
pub struct MiniLmEmbedder {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
}

// Safety: the session is only touched through the Mutex, and the tokenizer
// is thread-safe for encoding.
unsafe impl Send for MiniLmEmbedder {}
unsafe impl Sync for MiniLmEmbedder {}

impl MiniLmEmbedder {
    /// Load the model and tokenizer from a model directory containing
    /// `model.onnx` and `tokenizer.json`.
    pub fn new(model_dir: &Path) -> Result<Self, ChronofactError> {
        let session = load_session(&model_dir.join("model.onnx"))?;
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"))?;
        Ok(Self { session, tokenizer })
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, ChronofactError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| inference_error(format!("tokenization failed: {e}")))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> =
            encoding.get_attention_mask().iter().map(|&m| m as i64).collect();
        let token_type_ids: Vec<i64> =
            encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        let seq_len = input_ids.len();

        let input_ids_array = Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| unavailable("failed to shape input_ids", e))?;
        let attention_mask_array = Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| unavailable("failed to shape attention_mask", e))?;
        let token_type_ids_array = Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| unavailable("failed to shape token_type_ids", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| inference_error(format!("embedding session poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => TensorRef::from_array_view(&input_ids_array)
                    .map_err(|e| unavailable("input_ids tensor", e))?,
                "attention_mask" => TensorRef::from_array_view(&attention_mask_array)
                    .map_err(|e| unavailable("attention_mask tensor", e))?,
                "token_type_ids" => TensorRef::from_array_view(&token_type_ids_array)
                    .map_err(|e| unavailable("token_type_ids tensor", e))?,
            ])
            .map_err(|e| unavailable("text embedding inference failed", e))?;

        // Output shape [1, seq_len, hidden]; pool over real tokens.
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| unavailable("failed to extract output tensor", e))?;
        let hidden_size = shape[shape.len() - 1] as usize;
        let pooled = mean_pool_with_attention(data, &attention_mask, seq_len, hidden_size);

        Ok(l2_normalize(&pooled))
    }
}

#[async_trait]
impl TextEmbedder for MiniLmEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChronofactError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.encode(text)?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        TEXT_VECTOR_DIM
    }
}

// MiniLmEmbedder::new needs real model files; inference is covered by the
// integration environment. The pooling and normalization math is unit-tested
// in the onnx module.
