// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Convoflow pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of external collaborator an adapter wraps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Completion,
    Memory,
}

// --- Memory types ---

/// A persisted fact or exchange associated with a user identity.
///
/// Owned by the external memory store. `relevance_score` is only populated
/// for records returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl MemoryRecord {
    /// A record is usable for prompt context when it carries non-blank content.
    pub fn is_usable(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// One completed user/agent turn, queued for write-back after the reply is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub user_id: String,
    pub user_text: String,
    pub agent_text: String,
    pub timestamp: DateTime<Utc>,
}

impl Exchange {
    pub fn new(
        user_id: impl Into<String>,
        user_text: impl Into<String>,
        agent_text: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_text: user_text.into(),
            agent_text: agent_text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Which retrieval tier produced a [`PromptContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum RetrievalTier {
    /// Utterance-as-query search scoped to the user.
    Contextual,
    /// Fixed identity and preference queries scoped to the user.
    Identity,
    /// Most-recent slice of everything stored for the user.
    Comprehensive,
    /// No tier produced a usable record.
    Empty,
}

/// Ephemeral prompt context: ranked memories plus the utterance they were retrieved for.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub records: Vec<MemoryRecord>,
    pub tier: RetrievalTier,
    pub utterance: String,
}

impl PromptContext {
    /// A context with no memories.
    pub fn empty(utterance: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            tier: RetrievalTier::Empty,
            utterance: utterance.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Renders the memory block injected ahead of the utterance.
    ///
    /// Returns an empty string when there are no memories, so callers can
    /// skip the block entirely.
    pub fn memory_text(&self) -> String {
        if self.records.is_empty() {
            return String::new();
        }

        let mut text = String::from("## What you remember about this user\n");
        for record in &self.records {
            text.push_str("- ");
            text.push_str(record.content.trim());
            text.push('\n');
        }
        text
    }
}

// --- Transport types ---

/// A raw data packet received from the room.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundPayload {
    /// Identity of the participant that published the packet.
    pub sender_identity: String,
    pub payload: Vec<u8>,
    pub topic: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// A data packet to publish into the room.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPayload {
    pub payload: Vec<u8>,
    /// Request reliable (ordered, retransmitted) delivery.
    pub reliable: bool,
    /// Restrict delivery to these identities. Empty means the whole room.
    pub destination_identities: Vec<String>,
}

/// Events surfaced by a [`TransportAdapter`](crate::TransportAdapter).
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    ParticipantJoined { identity: String },
    ParticipantLeft { identity: String },
    Data(InboundPayload),
}

// --- Completion types ---

/// A single completion call: system framing, rendered memory block, and the utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Rendered memory block; empty when no memories were retrieved.
    pub context_text: String,
    pub user_text: String,
}
