// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timeline request orchestration.
//!
//! Sequences image analysis, query interpretation, hybrid retrieval,
//! timeline synthesis, and the parallel analysis stage under a per-request
//! deadline, with deferred fire-and-forget memory writes.

pub mod memory_writer;
pub mod pipeline;

pub use memory_writer::{MemoryTask, MemoryWriter};
pub use pipeline::TimelinePipeline;
