// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evolving session memory for Chronofact.
//!
//! Temporal decay, reinforcement on access, threshold deletion, and
//! similar-memory consolidation over the `session_memory` collection, plus
//! the periodic background sweep that drives decay and consolidation.

pub mod engine;
pub mod sweep;
pub mod types;

pub use engine::MemoryEngine;
pub use sweep::{run_sweep, spawn_sweeper, SweepReport};
pub use types::{MemoryRecord, MemoryStats, MemoryType, ScoredMemory};
