// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM provider trait.

use async_trait::async_trait;

use crate::error::ChronofactError;
use crate::types::{ProviderRequest, ProviderResponse};

/// A completion-capable LLM provider.
///
/// The structured generator drives this trait; when `request.tool` is set the
/// provider must force the model to answer through that tool so the response
/// carries a JSON `tool_input`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Run one completion request to the underlying model.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ChronofactError>;
}
