// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session FSM that turns one participant's messages into replies.
//!
//! Each session goes through states: Idle -> AwaitingReply -> Idle. The
//! first message of a session is preceded by a welcome. A turn never
//! fails: every dependency error becomes a fixed degraded reply.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use convoflow_core::traits::{CompletionAdapter, MemoryAdapter};
use convoflow_core::types::{CompletionRequest, Exchange, MemoryRecord};
use convoflow_memory::TieredRetriever;
use tracing::{debug, info, warn};

use crate::classifier::{Command, classify};

/// Greeting sent to a participant with no stored memories.
pub const FIRST_TIME_GREETING: &str = "Hi there, nice to meet you! I'm the room assistant. \
I remember what you tell me between visits. Say \"dump memories\" to see what I know, \
or \"clear memory\" to make me forget.";

/// Reply sent when the completion service cannot answer.
pub const DEGRADED_REPLY: &str =
    "Sorry, I'm having trouble thinking right now. Please try again in a moment.";

pub const CLEAR_CONFIRMATION: &str = "Done. I've forgotten everything I knew about you.";

pub const CLEAR_FAILED: &str =
    "Sorry, I couldn't clear your memories right now. Please try again later.";

pub const DUMP_EMPTY: &str = "I don't have any memories about you yet.";

pub const DUMP_FAILED: &str =
    "Sorry, I couldn't load your memories right now. Please try again later.";

/// Reply to a packet that could not be decoded as text.
pub const UNREADABLE_MESSAGE: &str = "Sorry, I couldn't read that message.";

/// System framing used when `agent.system_prompt` is not configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant in a real-time chat room. \
Keep replies concise, two or three sentences, and friendly. When you are given facts you \
remember about the user, use them naturally without listing them back.";

/// States in the session FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next message.
    Idle,
    /// Building and obtaining the reply to the current message.
    AwaitingReply,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::AwaitingReply => write!(f, "awaiting_reply"),
        }
    }
}

/// Collaborators shared by every session.
pub struct SessionServices {
    pub memory: Arc<dyn MemoryAdapter + Send + Sync>,
    pub completion: Arc<dyn CompletionAdapter + Send + Sync>,
    pub retriever: Arc<TieredRetriever>,
    pub system_prompt: String,
}

/// Input delivered to a session worker.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Text(String),
    /// A packet that failed to decode, with the decode error.
    Unreadable(String),
}

/// Result of one turn: replies to send in order, then an optional write-back.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub replies: Vec<String>,
    pub write_back: Option<Exchange>,
}

impl Turn {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            replies: vec![text.into()],
            write_back: None,
        }
    }
}

/// Conversation state for one participant.
pub struct SessionActor {
    session_id: String,
    user_id: String,
    room_id: String,
    created_at: DateTime<Utc>,
    state: SessionState,
    greeted: bool,
    is_returning_user: bool,
    services: Arc<SessionServices>,
}

impl SessionActor {
    pub fn new(
        session_id: String,
        user_id: String,
        room_id: String,
        services: Arc<SessionServices>,
    ) -> Self {
        Self {
            session_id,
            user_id,
            room_id,
            created_at: Utc::now(),
            state: SessionState::Idle,
            greeted: false,
            is_returning_user: false,
            services,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_returning_user(&self) -> bool {
        self.is_returning_user
    }

    pub fn services(&self) -> &Arc<SessionServices> {
        &self.services
    }

    /// Determines whether the participant already has stored memories.
    ///
    /// A memory-service failure counts as a new user.
    pub async fn resolve_returning_user(&mut self) {
        self.is_returning_user = match self.services.retriever.has_memories(&self.user_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    session_id = self.session_id.as_str(),
                    error = %e,
                    "could not check for existing memories, treating as new user"
                );
                false
            }
        };
        debug!(
            session_id = self.session_id.as_str(),
            returning = self.is_returning_user,
            "returning-user status resolved"
        );
    }

    /// Handles one input and produces the turn to deliver.
    pub async fn handle_input(&mut self, input: SessionInput) -> Turn {
        match input {
            SessionInput::Text(text) => self.handle_message(&text).await,
            SessionInput::Unreadable(error) => {
                warn!(
                    session_id = self.session_id.as_str(),
                    error = error.as_str(),
                    "unreadable payload"
                );
                Turn::reply(UNREADABLE_MESSAGE)
            }
        }
    }

    /// Handles one text message.
    ///
    /// The first message of a session yields two replies, the welcome and
    /// then the answer to the message itself. Later messages yield one.
    pub async fn handle_message(&mut self, text: &str) -> Turn {
        self.state = SessionState::AwaitingReply;
        debug!(
            session_id = self.session_id.as_str(),
            session_state = %self.state,
            "handling message"
        );

        let mut replies = Vec::new();
        if !self.greeted {
            self.greeted = true;
            replies.push(self.welcome().await);
        }

        let turn = match classify(text) {
            Command::DumpMemories => self.dump_memories().await,
            Command::ClearMemory => self.clear_memory().await,
            Command::NormalMessage(utterance) => self.converse(utterance).await,
        };
        replies.extend(turn.replies);

        self.state = SessionState::Idle;
        Turn {
            replies,
            write_back: turn.write_back,
        }
    }

    async fn welcome(&self) -> String {
        if !self.is_returning_user {
            return FIRST_TIME_GREETING.to_string();
        }
        let memories = self.services.retriever.welcome_memories(&self.user_id).await;
        compose_welcome(&self.user_id, &memories)
    }

    async fn dump_memories(&self) -> Turn {
        match self.services.retriever.list_all(&self.user_id).await {
            Ok(records) if records.is_empty() => Turn::reply(DUMP_EMPTY),
            Ok(records) => {
                info!(
                    session_id = self.session_id.as_str(),
                    count = records.len(),
                    "memories dumped"
                );
                Turn::reply(format_dump(&records))
            }
            Err(e) => {
                warn!(session_id = self.session_id.as_str(), error = %e, "memory dump failed");
                Turn::reply(DUMP_FAILED)
            }
        }
    }

    async fn clear_memory(&mut self) -> Turn {
        match self.services.memory.delete_all(&self.user_id).await {
            Ok(()) => {
                self.is_returning_user = false;
                Turn::reply(CLEAR_CONFIRMATION)
            }
            Err(e) => {
                warn!(session_id = self.session_id.as_str(), error = %e, "memory clear failed");
                Turn::reply(CLEAR_FAILED)
            }
        }
    }

    async fn converse(&self, utterance: String) -> Turn {
        let retrieval = self
            .services
            .retriever
            .retrieve(&self.user_id, &utterance)
            .await;
        debug!(
            session_id = self.session_id.as_str(),
            tier = %retrieval.context.tier,
            records = retrieval.context.records.len(),
            "context retrieved"
        );

        let request = CompletionRequest {
            system_prompt: self.services.system_prompt.clone(),
            context_text: retrieval.context.memory_text(),
            user_text: utterance.clone(),
        };

        match self.services.completion.complete(request).await {
            Ok(reply) => Turn {
                write_back: Some(Exchange::new(&self.user_id, utterance, &reply)),
                replies: vec![reply],
            },
            Err(e) => {
                warn!(
                    session_id = self.session_id.as_str(),
                    error = %e,
                    "completion failed, sending degraded reply"
                );
                Turn::reply(DEGRADED_REPLY)
            }
        }
    }
}

/// Builds the returning-user greeting from identity memories.
pub fn compose_welcome(user_id: &str, memories: &[MemoryRecord]) -> String {
    let facts: Vec<&str> = memories
        .iter()
        .map(|m| m.content.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if facts.is_empty() {
        format!("Welcome back, {user_id}! Good to see you again.")
    } else {
        format!(
            "Welcome back, {user_id}! Here's what I remember: {}.",
            facts
                .iter()
                .map(|f| f.trim_end_matches('.'))
                .collect::<Vec<_>>()
                .join("; ")
        )
    }
}

/// Renders the full memory listing as a numbered list.
pub fn format_dump(records: &[MemoryRecord]) -> String {
    let mut text = format!("Here's everything I remember about you ({}):", records.len());
    for (i, record) in records.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, record.content.trim()));
    }
    text
}
