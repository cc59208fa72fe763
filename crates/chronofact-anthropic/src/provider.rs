// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Provider`] implementation over the Anthropic client.
//!
//! Translates the provider-neutral request into a Messages API call: the
//! structured-output tool is offered and forced, image parts become base64
//! blocks, and the caller's time budget becomes the client's deadline.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use chronofact_core::error::ChronofactError;
use chronofact_core::traits::Provider;
use chronofact_core::types::{ContentPart, ProviderRequest, ProviderResponse, TokenUsage};

use crate::client::AnthropicClient;
use crate::types::{ContentBlock, ImageSource, Message, MessagesRequest, ToolDefinition};

/// Budget applied when a request arrives without one (direct API endpoints
/// outside the pipeline's deadline machinery).
const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(120);

/// Anthropic-backed LLM provider.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: AnthropicClient,
}

impl AnthropicProvider {
    pub fn new(client: AnthropicClient) -> Self {
        Self { client }
    }
}

fn convert_message(message: &chronofact_core::types::ProviderMessage) -> Message {
    // A single text part collapses to the compact plain-string form.
    if let [ContentPart::Text { text }] = message.content.as_slice() {
        return Message::text(&message.role, text);
    }
    let blocks = message
        .content
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => ContentBlock::Text { text: text.clone() },
            ContentPart::Image { media_type, data } => ContentBlock::Image {
                source: ImageSource::base64(media_type, data.clone()),
            },
        })
        .collect();
    Message::blocks(&message.role, blocks)
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ChronofactError> {
        let model = if request.model.is_empty() {
            self.client.default_model().to_string()
        } else {
            request.model.clone()
        };
        let deadline = Instant::now() + request.time_budget.unwrap_or(DEFAULT_TIME_BUDGET);

        let api_request = MessagesRequest::new(
            model,
            request.system.clone(),
            request.messages.iter().map(convert_message).collect(),
            request.max_tokens,
            request.tool.as_ref().map(|tool| ToolDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.input_schema.clone(),
            }),
        );

        let response = self.client.complete_message(&api_request, deadline).await?;
        let (text, tool_input, usage) = response.into_parts();

        Ok(ProviderResponse {
            text,
            tool_input,
            usage: TokenUsage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            },
        })
    }
}
