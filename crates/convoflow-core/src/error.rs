// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Convoflow relay agent.

use thiserror::Error;

/// The primary error type used across all Convoflow adapter traits and core operations.
///
/// Only [`ConvoflowError::Config`] is fatal, and only at startup. Every other
/// variant is recovered at the conversation boundary.
#[derive(Debug, Error)]
pub enum ConvoflowError {
    /// Configuration errors (missing credentials, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Room transport errors (connect failure, undecodable frame, publish failure).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The room transport has closed and will not yield further events.
    #[error("transport closed")]
    TransportClosed,

    /// Memory service errors (network failure, rate limiting, malformed body).
    #[error("memory service error: {message}")]
    MemoryService {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Completion service errors (network failure, rate limiting, refused or empty output).
    #[error("completion service error: {message}")]
    CompletionService {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An adapter call exceeded its own deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConvoflowError {
    /// Builds a memory service error without an underlying source.
    pub fn memory(message: impl Into<String>) -> Self {
        Self::MemoryService {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a completion service error without an underlying source.
    pub fn completion(message: impl Into<String>) -> Self {
        Self::CompletionService {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }
}
