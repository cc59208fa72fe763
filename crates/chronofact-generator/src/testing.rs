// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted provider for tests.
//!
//! Returns a queued sequence of responses, optionally after a fixed delay,
//! and records every request it receives. Used by the generator's own tests
//! and by pipeline end-to-end tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use chronofact_core::error::ChronofactError;
use chronofact_core::traits::Provider;
use chronofact_core::types::{ProviderRequest, ProviderResponse, TokenUsage};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// A forced tool call carrying this JSON input.
    ToolInput(serde_json::Value),
    /// A plain text completion.
    Text(String),
    /// A provider-side failure.
    Error(String),
}

/// Provider that replays a scripted sequence of responses.
///
/// When the script runs dry, the last response repeats.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ScriptedResponse>>,
    last: Mutex<Option<ScriptedResponse>>,
    delay: Duration,
    recorded: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            last: Mutex::new(None),
            delay: Duration::ZERO,
            recorded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script of forced tool calls.
    pub fn with_tool_inputs(inputs: Vec<serde_json::Value>) -> Self {
        Self::new(inputs.into_iter().map(ScriptedResponse::ToolInput).collect())
    }

    /// Script of plain text completions.
    pub fn with_texts(texts: Vec<String>) -> Self {
        Self::new(texts.into_iter().map(ScriptedResponse::Text).collect())
    }

    /// Script of tool calls, each delivered after `delay`.
    pub fn with_delay(inputs: Vec<serde_json::Value>, delay: Duration) -> Self {
        let mut provider = Self::with_tool_inputs(inputs);
        provider.delay = delay;
        provider
    }

    /// Handle to the request log; clone before handing the provider off.
    pub fn recorder(&self) -> Arc<Mutex<Vec<ProviderRequest>>> {
        self.recorded.clone()
    }

    fn next_response(&self) -> ScriptedResponse {
        let mut script = self.script.lock().expect("script lock");
        if let Some(response) = script.pop_front() {
            *self.last.lock().expect("last lock") = Some(response.clone());
            return response;
        }
        self.last
            .lock()
            .expect("last lock")
            .clone()
            .unwrap_or(ScriptedResponse::Error("script exhausted".to_string()))
    }
}

/// Provider that routes scripted responses by forced-tool name.
///
/// Needed when concurrent generator calls would otherwise race for a
/// positional script. Each tool name holds its own queue; when a queue runs
/// dry its last response repeats, and an unrouted tool fails.
pub struct RoutedProvider {
    routes: Mutex<std::collections::HashMap<String, VecDeque<ScriptedResponse>>>,
    last: Mutex<std::collections::HashMap<String, ScriptedResponse>>,
    delay: Duration,
    recorded: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl RoutedProvider {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(std::collections::HashMap::new()),
            last: Mutex::new(std::collections::HashMap::new()),
            delay: Duration::ZERO,
            recorded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue responses for one tool name.
    pub fn route(self, tool: &str, responses: Vec<ScriptedResponse>) -> Self {
        self.routes
            .lock()
            .expect("routes lock")
            .entry(tool.to_string())
            .or_default()
            .extend(responses);
        self
    }

    /// Queue tool-input responses for one tool name.
    pub fn route_tool_inputs(self, tool: &str, inputs: Vec<serde_json::Value>) -> Self {
        self.route(
            tool,
            inputs.into_iter().map(ScriptedResponse::ToolInput).collect(),
        )
    }

    /// Deliver every response after this delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Handle to the request log; clone before handing the provider off.
    pub fn recorder(&self) -> Arc<Mutex<Vec<ProviderRequest>>> {
        self.recorded.clone()
    }
}

impl Default for RoutedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for RoutedProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ChronofactError> {
        let tool = request
            .tool
            .as_ref()
            .map(|t| t.name.clone())
            .unwrap_or_default();
        self.recorded.lock().expect("record lock").push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let response = {
            let mut routes = self.routes.lock().expect("routes lock");
            match routes.get_mut(&tool).and_then(|queue| queue.pop_front()) {
                Some(response) => {
                    self.last
                        .lock()
                        .expect("last lock")
                        .insert(tool.clone(), response.clone());
                    response
                }
                None => self
                    .last
                    .lock()
                    .expect("last lock")
                    .get(&tool)
                    .cloned()
                    .unwrap_or(ScriptedResponse::Error(format!("no route for tool '{tool}'"))),
            }
        };

        match response {
            ScriptedResponse::ToolInput(value) => Ok(ProviderResponse {
                text: String::new(),
                tool_input: Some(value),
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 10,
                },
            }),
            ScriptedResponse::Text(text) => Ok(ProviderResponse {
                text,
                tool_input: None,
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 10,
                },
            }),
            ScriptedResponse::Error(message) => Err(ChronofactError::Provider {
                message,
                source: None,
            }),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ChronofactError> {
        self.recorded.lock().expect("record lock").push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.next_response() {
            ScriptedResponse::ToolInput(value) => Ok(ProviderResponse {
                text: String::new(),
                tool_input: Some(value),
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 10,
                },
            }),
            ScriptedResponse::Text(text) => Ok(ProviderResponse {
                text,
                tool_input: None,
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 10,
                },
            }),
            ScriptedResponse::Error(message) => Err(ChronofactError::Provider {
                message,
                source: None,
            }),
        }
    }
}
