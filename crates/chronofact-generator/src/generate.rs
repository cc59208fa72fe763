// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema-first structured generation with validation and retry.
//!
//! Every named function declares its output shape as a tool schema; the
//! model is forced to answer through the tool, the JSON is deserialized into
//! a typed record, and a semantic validator runs on top. Validation failures
//! feed the validator's message back into the prompt and retry, up to two
//! times, all bounded by the caller's deadline.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, warn};

use chronofact_core::error::ChronofactError;
use chronofact_core::traits::Provider;
use chronofact_core::types::{ProviderMessage, ProviderRequest, ToolSpec};

use crate::ratelimit::RateLimiter;

/// Validation-failure retries after the initial attempt.
const MAX_RETRIES: u32 = 2;

/// One structured-generation task: the tool contract plus the prompt.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    /// Tool name the model must call.
    pub name: String,
    /// Tool description shown to the model.
    pub description: String,
    /// JSON Schema of the tool input (the output shape).
    pub schema: serde_json::Value,
    /// System prompt.
    pub system: Option<String>,
    /// Conversation messages.
    pub messages: Vec<ProviderMessage>,
}

/// Structured generator over an LLM provider.
///
/// Holds the provider handle, the configured model, and the process-wide
/// rate limiter.
pub struct StructuredGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: u32,
    limiter: Arc<RateLimiter>,
}

impl StructuredGenerator {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: String,
        max_tokens: u32,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            provider,
            model,
            max_tokens,
            limiter,
        }
    }

    /// Run a schema-constrained generation.
    ///
    /// Returns a value of type `T` that deserialized from the forced tool
    /// call and passed `validate`. On schema or validation failure the
    /// validator's message is appended to the conversation and the call
    /// retried; after the retry budget the last message surfaces as
    /// `SchemaViolation`. The deadline bounds the whole loop, including
    /// rate-limiter waits.
    pub async fn generate<T, V>(
        &self,
        task: &GenerationTask,
        validate: V,
        deadline: Instant,
    ) -> Result<T, ChronofactError>
    where
        T: DeserializeOwned,
        V: Fn(&T) -> Result<(), String>,
    {
        let started = Instant::now();
        let mut messages = task.messages.clone();
        let mut last_violation: Option<String> = None;

        for attempt in 0..=MAX_RETRIES {
            let now = Instant::now();
            if now >= deadline {
                return Err(ChronofactError::DeadlineExceeded {
                    elapsed_ms: now.duration_since(started).as_millis() as u64,
                });
            }

            self.limiter.acquire(deadline).await?;

            let request = ProviderRequest {
                model: self.model.clone(),
                system: task.system.clone(),
                messages: messages.clone(),
                max_tokens: self.max_tokens,
                tool: Some(ToolSpec {
                    name: task.name.clone(),
                    description: task.description.clone(),
                    input_schema: task.schema.clone(),
                }),
                time_budget: Some(deadline.duration_since(Instant::now())),
            };

            let response = match tokio::time::timeout_at(deadline, self.provider.complete(request)).await
            {
                Ok(Ok(response)) => response,
                Ok(Err(e)) if e.is_transient() && attempt < MAX_RETRIES => {
                    warn!(task = task.name.as_str(), attempt, error = %e, "transient provider error, retrying");
                    continue;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    let elapsed = Instant::now().duration_since(started);
                    return Err(ChronofactError::DeadlineExceeded {
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }
            };

            // Prefer the forced tool input; tolerate models that answer with
            // JSON in a plain text block.
            let value = match response.tool_input {
                Some(value) => value,
                None => match extract_json(&response.text) {
                    Some(value) => value,
                    None => {
                        last_violation = Some("response contained no tool call or JSON".to_string());
                        messages = with_feedback(&messages, task, last_violation.as_deref().unwrap_or(""));
                        continue;
                    }
                },
            };

            match serde_json::from_value::<T>(value.clone()) {
                Ok(parsed) => match validate(&parsed) {
                    Ok(()) => {
                        debug!(task = task.name.as_str(), attempt, "structured generation validated");
                        return Ok(parsed);
                    }
                    Err(violation) => {
                        warn!(task = task.name.as_str(), attempt, violation = violation.as_str(), "semantic validation failed");
                        messages = with_feedback(&messages, task, &violation);
                        last_violation = Some(violation);
                    }
                },
                Err(e) => {
                    let violation = format!("output did not match the declared schema: {e}");
                    warn!(task = task.name.as_str(), attempt, violation = violation.as_str(), "schema validation failed");
                    messages = with_feedback(&messages, task, &violation);
                    last_violation = Some(violation);
                }
            }
        }

        Err(ChronofactError::SchemaViolation(
            last_violation.unwrap_or_else(|| "generation failed after retries".to_string()),
        ))
    }
}

/// Append the validator's complaint to the conversation for the next attempt.
fn with_feedback(
    messages: &[ProviderMessage],
    task: &GenerationTask,
    violation: &str,
) -> Vec<ProviderMessage> {
    let mut next = messages.to_vec();
    next.push(ProviderMessage::user(format!(
        "Your previous `{}` answer was rejected: {violation}. \
         Correct the problem and answer again through the tool.",
        task.name
    )));
    next
}

/// Pull a JSON object or array out of free text, tolerating markdown fences.
fn extract_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    let start = trimmed.find(['{', '['])?;
    let end = trimmed.rfind(['}', ']'])? + 1;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..end]).ok()
}
