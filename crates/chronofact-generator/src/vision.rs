// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image context analysis.
//!
//! Sends the uploaded image through the provider's multimodal path with a
//! fixed schema and returns a short textual description of visually
//! relevant context, which the pipeline concatenates into the refined query
//! before embedding.

use base64::Engine;
use serde_json::json;
use tokio::time::Instant;

use chronofact_core::error::ChronofactError;
use chronofact_core::types::{ContentPart, ProviderMessage, VisualContext};

use crate::generate::{GenerationTask, StructuredGenerator};

const SYSTEM: &str = "You describe what an image shows that is relevant to a news topic: \
    scene, conditions, visible damage, vehicles, crowds, signage. Two sentences at most. \
    Mention only what is actually visible.";

/// Sniff the image MIME type from magic bytes; defaults to JPEG.
fn media_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, 0x50, 0x4e, 0x47]) {
        "image/png"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(&[0x47, 0x49, 0x46]) {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

impl StructuredGenerator {
    /// Extract visual context from image bytes.
    ///
    /// Fails with `PayloadTooLarge` when the image exceeds `max_bytes`.
    pub async fn analyze_image(
        &self,
        image_bytes: &[u8],
        topic: &str,
        max_bytes: usize,
        deadline: Instant,
    ) -> Result<VisualContext, ChronofactError> {
        if image_bytes.len() > max_bytes {
            return Err(ChronofactError::PayloadTooLarge {
                size: image_bytes.len(),
                limit: max_bytes,
            });
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let message = ProviderMessage {
            role: "user".to_string(),
            content: vec![
                ContentPart::Image {
                    media_type: media_type(image_bytes).to_string(),
                    data: encoded,
                },
                ContentPart::Text {
                    text: format!("Describe the visual context relevant to: {topic}"),
                },
            ],
        };

        let task = GenerationTask {
            name: "emit_visual_context".to_string(),
            description: "Return the visual context extracted from the image.".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "visual_context": {
                        "type": "string",
                        "description": "Short description of visually relevant content"
                    },
                    "entities": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Entities recognizable in the image"
                    }
                },
                "required": ["visual_context"]
            }),
            system: Some(SYSTEM.to_string()),
            messages: vec![message],
        };

        self.generate(
            &task,
            |context: &VisualContext| {
                if context.visual_context.trim().is_empty() {
                    Err("visual_context must not be empty".to_string())
                } else {
                    Ok(())
                }
            },
            deadline,
        )
        .await
    }
}
