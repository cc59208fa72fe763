// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API client and [`Provider`] implementation.
//!
//! The client is deadline-driven: every call carries the originating
//! request's remaining time budget, which bounds the transport timeout and
//! decides whether an overload back-off (Retry-After aware) is worth
//! waiting out. The provider layer forces the structured-output tool and
//! splits responses into the text/tool-input pair the generator consumes.
//!
//! [`Provider`]: chronofact_core::traits::Provider

pub mod client;
pub mod provider;
pub mod types;

pub use client::AnthropicClient;
pub use provider::AnthropicProvider;
