// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the Anthropic Messages API.
//!
//! Field names and `type` tags follow the Messages API JSON schema exactly;
//! only the subset Chronofact drives is modeled: non-streaming calls, plain
//! or image-bearing user messages, and at most one tool, which the model is
//! forced to answer through when present. No prompt caching, no multi-turn
//! tool loops.

use serde::{Deserialize, Serialize};

/// A tool offered to the model. For Chronofact this is always the single
/// structured-output tool carrying the generation schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool input, i.e. the structured output shape.
    pub input_schema: serde_json::Value,
}

/// Forces the model to answer by calling a specific tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolChoice {
    #[serde(rename = "type")]
    pub choice_type: String,
    pub name: String,
}

impl ToolChoice {
    /// Require the named tool on every response.
    pub fn tool(name: &str) -> Self {
        Self {
            choice_type: "tool".to_string(),
            name: name.to_string(),
        }
    }
}

/// Body of a `POST /v1/messages` call.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl MessagesRequest {
    /// Build a request. A supplied tool is both offered and forced, so the
    /// response must carry a `tool_use` block with schema-shaped input.
    pub fn new(
        model: String,
        system: Option<String>,
        messages: Vec<Message>,
        max_tokens: u32,
        tool: Option<ToolDefinition>,
    ) -> Self {
        let tool_choice = tool.as_ref().map(|t| ToolChoice::tool(&t.name));
        Self {
            model,
            messages,
            system,
            max_tokens,
            tools: tool.map(|t| vec![t]),
            tool_choice,
        }
    }
}

/// One conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "user" or "assistant".
    pub role: String,
    pub content: MessageContent,
}

impl Message {
    /// A message whose content is a single plain string (the compact wire
    /// form the API accepts for text-only messages).
    pub fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            content: MessageContent::Text(text.to_string()),
        }
    }

    /// A message built from typed content blocks (text plus images).
    pub fn blocks(role: &str, blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: role.to_string(),
            content: MessageContent::Blocks(blocks),
        }
    }
}

/// Message content: the API accepts either a bare string or a block array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A typed request content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: ImageSource },
}

/// Inline image data for an image block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    /// MIME type, e.g. "image/jpeg".
    pub media_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

impl ImageSource {
    pub fn base64(media_type: &str, data: String) -> Self {
        Self {
            source_type: "base64".to_string(),
            media_type: media_type.to_string(),
            data,
        }
    }
}

/// A completed (non-streaming) Messages API response.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub role: String,
    pub content: Vec<OutputBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl MessagesResponse {
    /// Split the response into what Chronofact's generator consumes: the
    /// concatenated text blocks, the first tool invocation's input (when
    /// the model answered through the forced tool), and token usage.
    pub fn into_parts(self) -> (String, Option<serde_json::Value>, Usage) {
        let mut text = String::new();
        let mut tool_input = None;
        for block in self.content {
            match block {
                OutputBlock::Text { text: t } => text.push_str(&t),
                OutputBlock::ToolUse { input, .. } => {
                    if tool_input.is_none() {
                        tool_input = Some(input);
                    }
                }
            }
        }
        (text, tool_input, self.usage)
    }
}

/// A response content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

/// Token accounting attached to every response.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The API's structured error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

impl ErrorEnvelope {
    /// Render an error body as "type: message", when the payload is one.
    pub fn summarize(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .map(|envelope| format!("{}: {}", envelope.error.type_, envelope.error.message))
    }
}

/// Error detail inside an [`ErrorEnvelope`].
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
}
