// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the memory service REST API.

use chrono::{DateTime, NaiveDateTime, Utc};
use convoflow_core::MemoryRecord;
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/memories/search/`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub user_id: String,
    pub limit: usize,
}

/// A chat message submitted for memory extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

/// Body of `POST /v1/memories/`.
#[derive(Debug, Clone, Serialize)]
pub struct AddRequest {
    pub messages: Vec<ApiMessage>,
    pub user_id: String,
}

/// A memory as returned by the search and list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMemory {
    pub id: String,
    #[serde(default, alias = "content")]
    pub memory: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ApiMemory {
    /// Converts into a domain record, attributing it to `user_id` when the
    /// service omits the owner.
    pub fn into_record(self, user_id: &str) -> MemoryRecord {
        let created_at = self
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        MemoryRecord {
            id: self.id,
            user_id: self.user_id.unwrap_or_else(|| user_id.to_string()),
            content: self.memory,
            created_at,
            relevance_score: self.score,
        }
    }
}

/// The service returns lists either bare or wrapped in `{"results": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MemoryList {
    Bare(Vec<ApiMemory>),
    Wrapped { results: Vec<ApiMemory> },
}

impl MemoryList {
    pub fn into_vec(self) -> Vec<ApiMemory> {
        match self {
            MemoryList::Bare(v) => v,
            MemoryList::Wrapped { results } => results,
        }
    }
}

/// One event produced by an add call.
#[derive(Debug, Clone, Deserialize)]
pub struct AddEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
}

/// Response of `POST /v1/memories/`; asynchronous mode returns only a status message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AddResponse {
    Bare(Vec<AddEvent>),
    Wrapped { results: Vec<AddEvent> },
    Queued {
        #[serde(default)]
        message: Option<String>,
    },
}

impl AddResponse {
    /// Id of the first memory the service created, if it reported one.
    pub fn first_id(&self) -> Option<String> {
        let events = match self {
            AddResponse::Bare(v) => v.as_slice(),
            AddResponse::Wrapped { results } => results.as_slice(),
            AddResponse::Queued { .. } => return None,
        };
        events.iter().find_map(|e| e.id.clone())
    }
}

/// Error body returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(alias = "error", alias = "message")]
    pub detail: String,
}

/// Parses RFC 3339 timestamps, treating offset-less timestamps as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
