// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model download manager for first-run embedding model setup.
//!
//! Fetches the MiniLM text model and the two CLIP towers from HuggingFace on
//! first run and caches them under the configured data directory.

use std::path::{Path, PathBuf};

use tracing::info;

use chronofact_core::error::ChronofactError;

/// MiniLM text model files.
const MINILM_FILES: &[(&str, &str)] = &[
    (
        "model.onnx",
        "https://huggingface.co/onnx-community/all-MiniLM-L6-v2-ONNX/resolve/main/onnx/model_quantized.onnx",
    ),
    (
        "tokenizer.json",
        "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json",
    ),
];

/// CLIP ViT-B/32 model files (text and vision towers).
const CLIP_FILES: &[(&str, &str)] = &[
    (
        "text_model.onnx",
        "https://huggingface.co/Xenova/clip-vit-base-patch32/resolve/main/onnx/text_model_quantized.onnx",
    ),
    (
        "vision_model.onnx",
        "https://huggingface.co/Xenova/clip-vit-base-patch32/resolve/main/onnx/vision_model_quantized.onnx",
    ),
    (
        "tokenizer.json",
        "https://huggingface.co/Xenova/clip-vit-base-patch32/resolve/main/tokenizer.json",
    ),
];

/// Manages embedding model download and path resolution.
pub struct ModelManager {
    data_dir: PathBuf,
}

impl ModelManager {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Directory holding the MiniLM text model files.
    pub fn text_model_dir(&self) -> PathBuf {
        self.data_dir.join("models").join("all-MiniLM-L6-v2")
    }

    /// Directory holding the CLIP model files.
    pub fn clip_model_dir(&self) -> PathBuf {
        self.data_dir.join("models").join("clip-ViT-B-32")
    }

    /// True when every MiniLM file is present.
    pub fn text_model_available(&self) -> bool {
        MINILM_FILES
            .iter()
            .all(|(name, _)| self.text_model_dir().join(name).exists())
    }

    /// True when every CLIP file is present.
    pub fn clip_model_available(&self) -> bool {
        CLIP_FILES
            .iter()
            .all(|(name, _)| self.clip_model_dir().join(name).exists())
    }

    /// Ensure the MiniLM model is on disk, downloading on first run.
    pub async fn ensure_text_model(&self) -> Result<PathBuf, ChronofactError> {
        let dir = self.text_model_dir();
        ensure_files(&dir, MINILM_FILES).await?;
        Ok(dir)
    }

    /// Ensure the CLIP model is on disk, downloading on first run.
    pub async fn ensure_clip_model(&self) -> Result<PathBuf, ChronofactError> {
        let dir = self.clip_model_dir();
        ensure_files(&dir, CLIP_FILES).await?;
        Ok(dir)
    }
}

async fn ensure_files(dir: &Path, files: &[(&str, &str)]) -> Result<(), ChronofactError> {
    if files.iter().all(|(name, _)| dir.join(name).exists()) {
        return Ok(());
    }

    info!(dir = %dir.display(), "embedding model not found, downloading from HuggingFace");
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        ChronofactError::EmbeddingUnavailable {
            message: format!("failed to create model directory {}", dir.display()),
            source: Some(Box::new(e)),
        }
    })?;

    for (name, url) in files {
        let dest = dir.join(name);
        if dest.exists() {
            continue;
        }
        info!("downloading {name}...");
        match download_file(url, &dest).await {
            Ok(size) => info!("downloaded {name} ({size} bytes)"),
            Err(e) => {
                // Clean up a partial download so the next run retries.
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(e);
            }
        }
    }

    Ok(())
}

async fn download_file(url: &str, dest: &Path) -> Result<usize, ChronofactError> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| ChronofactError::EmbeddingUnavailable {
            message: format!("failed to download {url}"),
            source: Some(Box::new(e)),
        })?;

    if !response.status().is_success() {
        return Err(ChronofactError::EmbeddingUnavailable {
            message: format!("download failed with status {}: {url}", response.status()),
            source: None,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ChronofactError::EmbeddingUnavailable {
            message: format!("failed to read response body from {url}"),
            source: Some(Box::new(e)),
        })?;

    let size = bytes.len();
    tokio::fs::write(dest, &bytes)
        .await
        .map_err(|e| ChronofactError::EmbeddingUnavailable {
            message: format!("failed to write {}", dest.display()),
            source: Some(Box::new(e)),
        })?;

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_dirs_under_data_dir() {
        let mgr = ModelManager::new(PathBuf::from("/var/lib/chronofact"));
        assert_eq!(
            mgr.text_model_dir(),
            PathBuf::from("/var/lib/chronofact/models/all-MiniLM-L6-v2")
        );
        assert_eq!(
            mgr.clip_model_dir(),
            PathBuf::from("/var/lib/chronofact/models/clip-ViT-B-32")
        );
    }

    #[test]
    fn models_not_available_when_missing() {
        let mgr = ModelManager::new(PathBuf::from("/nonexistent/path"));
        assert!(!mgr.text_model_available());
        assert!(!mgr.clip_model_available());
    }

    #[tokio::test]
    async fn ensure_files_short_circuits_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let files: &[(&str, &str)] = &[("present.bin", "https://example.invalid/never-fetched")];
        std::fs::write(dir.path().join("present.bin"), b"data").unwrap();
        // Would fail if it tried the bogus URL.
        ensure_files(dir.path(), files).await.unwrap();
    }
}
