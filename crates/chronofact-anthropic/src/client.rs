// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! One concern: bring back a complete (non-streaming) response inside the
//! caller's time budget. Each attempt's transport timeout is whatever
//! remains of the deadline, and overload responses back off no further than
//! the deadline allows -- honoring the server's Retry-After hint when it
//! sends one. Anything non-retryable surfaces as a typed provider error for
//! the structured generator's own validation loop to deal with.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use tokio::time::Instant;
use tracing::{debug, warn};

use chronofact_core::error::ChronofactError;

use crate::types::{ErrorEnvelope, MessagesRequest, MessagesResponse};

/// Base URL for the Anthropic Messages API.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Transport-level retries after the first attempt. Validation retries are
/// the generator's job; this only covers overload and server hiccups.
const MAX_TRANSPORT_RETRIES: u32 = 2;

/// Back-off used when the API overloads without a Retry-After hint.
const FALLBACK_BACKOFF: Duration = Duration::from_millis(750);

/// Deadline-aware HTTP client for the Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    default_model: String,
    base_url: String,
}

/// What one wire attempt produced.
enum Attempt {
    /// A parsed response.
    Complete(MessagesResponse),
    /// A retryable condition and how long the server wants us to wait.
    Overloaded { error: ChronofactError, wait: Duration },
}

impl AnthropicClient {
    /// Create a client sending `x-api-key` and `anthropic-version` on every
    /// request. No global request timeout is installed; each call is
    /// bounded by its own deadline instead.
    pub fn new(api_key: &str, api_version: &str, model: &str) -> Result<Self, ChronofactError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| ChronofactError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(api_version)
                .map_err(|e| ChronofactError::Config(format!("invalid API version header value: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ChronofactError::provider("failed to build HTTP client", e))?;

        Ok(Self {
            http,
            default_model: model.to_string(),
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Returns the default model identifier.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Request one completion, retrying overload and server errors only as
    /// long as the deadline leaves room for the back-off.
    ///
    /// An already-expired deadline fails with `DeadlineExceeded` before any
    /// request goes out; a deadline that cannot absorb the server's
    /// requested wait surfaces the overload error immediately instead of
    /// sleeping past it.
    pub async fn complete_message(
        &self,
        request: &MessagesRequest,
        deadline: Instant,
    ) -> Result<MessagesResponse, ChronofactError> {
        let started = Instant::now();
        let mut retries_left = MAX_TRANSPORT_RETRIES;

        loop {
            let remaining = deadline.duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ChronofactError::DeadlineExceeded {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }

            match self.attempt(request, remaining).await? {
                Attempt::Complete(response) => return Ok(response),
                Attempt::Overloaded { error, wait } => {
                    if retries_left == 0 || Instant::now() + wait >= deadline {
                        return Err(error);
                    }
                    retries_left -= 1;
                    warn!(
                        wait_ms = wait.as_millis() as u64,
                        retries_left,
                        "Messages API overloaded, backing off within the request budget"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Issue one wire attempt bounded by the remaining budget.
    async fn attempt(
        &self,
        request: &MessagesRequest,
        remaining: Duration,
    ) -> Result<Attempt, ChronofactError> {
        let sent = self
            .http
            .post(&self.base_url)
            .timeout(remaining)
            .json(request)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                // The budget ran out mid-flight; the caller's next loop
                // iteration converts this into a deadline failure.
                return Ok(Attempt::Overloaded {
                    error: ChronofactError::provider(
                        "Messages API call exhausted the request time budget",
                        e,
                    ),
                    wait: Duration::ZERO,
                });
            }
            Err(e) => return Err(ChronofactError::provider("Messages API request failed", e)),
        };

        let status = response.status();
        debug!(status = %status, "Messages API responded");

        if status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| ChronofactError::provider("failed to read Messages API body", e))?;
            let parsed: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
                ChronofactError::provider("Messages API returned an unparseable success body", e)
            })?;
            return Ok(Attempt::Complete(parsed));
        }

        // Capture the server's back-off hint before consuming the body.
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|seconds| seconds.parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.unwrap_or_default();
        let detail = ErrorEnvelope::summarize(&body)
            .unwrap_or_else(|| format!("Messages API returned {status}"));

        match status.as_u16() {
            // Rate limiting, overload, and server faults are worth waiting
            // out when the deadline can absorb the back-off.
            429 | 500 | 502 | 503 | 529 => Ok(Attempt::Overloaded {
                error: ChronofactError::Provider {
                    message: detail,
                    source: None,
                },
                wait: retry_after.unwrap_or(FALLBACK_BACKOFF),
            }),
            // Anything else (bad request, auth, oversized prompt) will not
            // improve on retry.
            _ => Err(ChronofactError::Provider {
                message: detail,
                source: None,
            }),
        }
    }
}
