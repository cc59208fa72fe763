// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-modal embedding provider backed by CLIP ViT-B/32.
//!
//! Runs the text and vision towers as separate ONNX sessions and fuses the
//! two 512-dimensional embeddings according to the requested strategy. Both
//! towers project into the same space, which is what makes text-to-image
//! retrieval work.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::{Array2, Array4};
use ort::session::Session;
use ort::value::TensorRef;

use chronofact_core::error::ChronofactError;
use chronofact_core::traits::MultimodalEmbedder;
use chronofact_core::types::{FusionStrategy, CLIP_VECTOR_DIM};

use crate::onnx::{
    inference_error, l2_normalize, load_session, load_tokenizer, mean_pool_with_attention,
    unavailable,
};

/// CLIP input resolution.
const CLIP_IMAGE_SIZE: u32 = 224;
/// CLIP pixel normalization mean, RGB.
const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
/// CLIP pixel normalization standard deviation, RGB.
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// CLIP embedder with separate text and vision towers.
pub struct ClipEmbedder {
    text_session: Mutex<Session>,
    vision_session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
}

// Safety: sessions are only touched through their Mutexes; the tokenizer is
// thread-safe for encoding.
unsafe impl Send for ClipEmbedder {}
unsafe impl Sync for ClipEmbedder {}

impl ClipEmbedder {
    /// Load both towers from a model directory containing
    /// `text_model.onnx`, `vision_model.onnx`, and `tokenizer.json`.
    pub fn new(model_dir: &Path) -> Result<Self, ChronofactError> {
        let text_session = load_session(&model_dir.join("text_model.onnx"))?;
        let vision_session = load_session(&model_dir.join("vision_model.onnx"))?;
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"))?;
        Ok(Self {
            text_session,
            vision_session,
            tokenizer,
        })
    }

    /// Embed text through the CLIP text tower.
    pub fn encode_text(&self, text: &str) -> Result<Vec<f32>, ChronofactError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| inference_error(format!("CLIP tokenization failed: {e}")))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> =
            encoding.get_attention_mask().iter().map(|&m| m as i64).collect();
        let seq_len = input_ids.len();

        let input_ids_array = Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| unavailable("failed to shape input_ids", e))?;
        let attention_mask_array = Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| unavailable("failed to shape attention_mask", e))?;

        let mut session = self
            .text_session
            .lock()
            .map_err(|e| inference_error(format!("CLIP text session poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => TensorRef::from_array_view(&input_ids_array)
                    .map_err(|e| unavailable("input_ids tensor", e))?,
                "attention_mask" => TensorRef::from_array_view(&attention_mask_array)
                    .map_err(|e| unavailable("attention_mask tensor", e))?,
            ])
            .map_err(|e| unavailable("CLIP text inference failed", e))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| unavailable("failed to extract CLIP text tensor", e))?;

        // Projected exports give [1, 512]; unprojected give [1, seq, hidden]
        // and need pooling over real tokens.
        let embedding = if shape.len() == 2 {
            data.to_vec()
        } else {
            let hidden_size = shape[shape.len() - 1] as usize;
            mean_pool_with_attention(data, &attention_mask, seq_len, hidden_size)
        };
        Ok(l2_normalize(&embedding))
    }

    /// Embed image bytes through the CLIP vision tower.
    pub fn encode_image(&self, image_bytes: &[u8]) -> Result<Vec<f32>, ChronofactError> {
        let pixels = preprocess_image(image_bytes)?;

        let mut session = self
            .vision_session
            .lock()
            .map_err(|e| inference_error(format!("CLIP vision session poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![
                "pixel_values" => TensorRef::from_array_view(&pixels)
                    .map_err(|e| unavailable("pixel_values tensor", e))?,
            ])
            .map_err(|e| unavailable("CLIP vision inference failed", e))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| unavailable("failed to extract CLIP vision tensor", e))?;

        let embedding = if shape.len() == 2 {
            data.to_vec()
        } else {
            // Unprojected [1, patches, hidden]: the class token leads.
            let hidden_size = shape[shape.len() - 1] as usize;
            data[..hidden_size].to_vec()
        };
        Ok(l2_normalize(&embedding))
    }
}

/// Decode, resize, and normalize image bytes into CLIP's [1, 3, 224, 224]
/// pixel tensor.
fn preprocess_image(image_bytes: &[u8]) -> Result<Array4<f32>, ChronofactError> {
    let decoded = image::load_from_memory(image_bytes)
        .map_err(|e| ChronofactError::InvalidRequest(format!("cannot decode image: {e}")))?;
    let resized = image::imageops::resize(
        &decoded.to_rgb8(),
        CLIP_IMAGE_SIZE,
        CLIP_IMAGE_SIZE,
        image::imageops::FilterType::CatmullRom,
    );

    let size = CLIP_IMAGE_SIZE as usize;
    let mut pixels = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..3 {
            let value = pixel.0[channel] as f32 / 255.0;
            pixels[[0, channel, y as usize, x as usize]] =
                (value - CLIP_MEAN[channel]) / CLIP_STD[channel];
        }
    }
    Ok(pixels)
}

/// Fuse text and image embeddings per the requested strategy, then
/// re-normalize.
pub fn fuse(
    text: Option<&[f32]>,
    image: Option<&[f32]>,
    fusion: FusionStrategy,
) -> Result<Vec<f32>, ChronofactError> {
    let combined = match (text, image, fusion) {
        (Some(t), _, FusionStrategy::TextOnly) => t.to_vec(),
        (_, Some(i), FusionStrategy::ImageOnly) => i.to_vec(),
        (Some(t), Some(i), FusionStrategy::Mean) => {
            t.iter().zip(i).map(|(a, b)| (a + b) / 2.0).collect()
        }
        (Some(t), Some(i), FusionStrategy::TextWeighted(alpha)) => {
            t.iter().zip(i).map(|(a, b)| alpha * a + (1.0 - alpha) * b).collect()
        }
        (Some(t), Some(i), FusionStrategy::ImageWeighted(alpha)) => {
            t.iter().zip(i).map(|(a, b)| (1.0 - alpha) * a + alpha * b).collect()
        }
        // Only one modality present: fusion degenerates to it.
        (Some(t), None, _) => t.to_vec(),
        (None, Some(i), _) => i.to_vec(),
        (None, None, _) => {
            return Err(ChronofactError::InvalidRequest(
                "multimodal embedding requires at least one modality".to_string(),
            ))
        }
    };
    Ok(l2_normalize(&combined))
}

#[async_trait]
impl MultimodalEmbedder for ClipEmbedder {
    async fn embed_multimodal(
        &self,
        text: Option<&str>,
        image: Option<&[u8]>,
        fusion: FusionStrategy,
    ) -> Result<Vec<f32>, ChronofactError> {
        if text.is_none() && image.is_none() {
            return Err(ChronofactError::InvalidRequest(
                "multimodal embedding requires at least one modality".to_string(),
            ));
        }
        let text_embedding = match text {
            Some(t) => Some(self.encode_text(t)?),
            None => None,
        };
        let image_embedding = match image {
            Some(bytes) => Some(self.encode_image(bytes)?),
            None => None,
        };
        fuse(
            text_embedding.as_deref(),
            image_embedding.as_deref(),
            fusion,
        )
    }

    fn dimensions(&self) -> usize {
        CLIP_VECTOR_DIM
    }
}
