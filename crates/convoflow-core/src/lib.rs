// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Convoflow relay agent.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Convoflow workspace. The transport,
//! completion, and memory adapters all implement traits defined here, which
//! keeps the conversation pipeline independent of any concrete service.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ConvoflowError;
pub use types::{
    AdapterType, CompletionRequest, Exchange, HealthStatus, InboundPayload, MemoryRecord,
    OutboundPayload, PromptContext, RetrievalTier, TransportEvent,
};

pub use traits::{CompletionAdapter, MemoryAdapter, PluginAdapter, TransportAdapter};
