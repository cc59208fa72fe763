// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface for the Chronofact timeline service.
//!
//! Thin request/response glue over the pipeline and generator: body
//! validation, base64 image decoding, and the deterministic error-kind to
//! status-code mapping.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, start_server, GatewayState, ServerConfig};
