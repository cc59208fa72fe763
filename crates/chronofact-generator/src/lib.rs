// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured LLM generation for Chronofact.
//!
//! One core capability -- schema-constrained [`generate`] with validation,
//! retry, and deadline enforcement -- and the named functions built on it:
//! query interpretation, timeline synthesis, misinformation detection,
//! credibility assessment, follow-up questions, recommendations, and image
//! context analysis. LLM call rate is protected by a process-wide token
//! bucket.
//!
//! [`generate`]: StructuredGenerator::generate

pub mod functions;
pub mod generate;
pub mod ratelimit;
pub mod testing;
pub mod vision;

pub use functions::format_context;
pub use generate::{GenerationTask, StructuredGenerator};
pub use ratelimit::RateLimiter;
