// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding capability traits.

use async_trait::async_trait;

use crate::error::ChronofactError;
use crate::types::FusionStrategy;

/// Produces dense text embeddings of a fixed dimension.
///
/// Implementations must be deterministic and side-effect free; callers treat
/// the vectors as opaque. A failing model load surfaces as
/// [`ChronofactError::EmbeddingUnavailable`].
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChronofactError>;

    /// Dimensionality of the produced vectors.
    fn dimensions(&self) -> usize;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ChronofactError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed(&texts).await?;
        vectors.pop().ok_or_else(|| {
            ChronofactError::EmbeddingUnavailable {
                message: "embedder returned no vectors".to_string(),
                source: None,
            }
        })
    }
}

/// Produces cross-modal embeddings from text, an image, or both.
///
/// At least one modality must be supplied; passing neither is an
/// [`ChronofactError::InvalidRequest`].
#[async_trait]
pub trait MultimodalEmbedder: Send + Sync {
    /// Embed the supplied modalities into one fused vector.
    async fn embed_multimodal(
        &self,
        text: Option<&str>,
        image: Option<&[u8]>,
        fusion: FusionStrategy,
    ) -> Result<Vec<f32>, ChronofactError>;

    /// Dimensionality of the produced vectors.
    fn dimensions(&self) -> usize;
}
