// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation orchestration for the Convoflow relay agent.
//!
//! The [`AgentLoop`] is the central coordinator that:
//! - Receives room events from a transport adapter
//! - Filters out its own packets and other agents
//! - Routes each participant's messages to a per-session worker
//! - Runs memory write-backs in the background
//! - Handles graceful shutdown

pub mod bridge;
pub mod classifier;
pub mod session;
pub mod shutdown;
pub mod worker;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use convoflow_config::model::ConvoflowConfig;
use convoflow_core::ConvoflowError;
use convoflow_core::traits::{CompletionAdapter, MemoryAdapter, TransportAdapter};
use convoflow_core::types::{InboundPayload, TransportEvent};
use convoflow_memory::TieredRetriever;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::bridge::{SenderFilter, decode_payload, encode_reply};
use crate::session::{DEFAULT_SYSTEM_PROMPT, DEGRADED_REPLY, SessionInput, SessionServices};
use crate::worker::{SessionHandle, Undelivered, WorkerContext, spawn_session};

pub use classifier::{Command, classify};
pub use session::{SessionActor, SessionState, Turn};
pub use shutdown::install_signal_handler;

/// The main agent loop that coordinates message flow between the room,
/// the memory service and the completion service.
pub struct AgentLoop {
    transport: Arc<dyn TransportAdapter + Send + Sync>,
    services: Arc<SessionServices>,
    filter: SenderFilter,
    room: String,
    direct_replies: bool,
    heartbeat: Duration,
    drain_timeout: Duration,
    queue_depth: usize,
    sessions: HashMap<String, SessionHandle>,
    write_backs: TaskTracker,
}

impl AgentLoop {
    /// Creates a new agent loop over connected adapters.
    pub fn new(
        transport: Arc<dyn TransportAdapter + Send + Sync>,
        memory: Arc<dyn MemoryAdapter + Send + Sync>,
        completion: Arc<dyn CompletionAdapter + Send + Sync>,
        config: &ConvoflowConfig,
    ) -> Self {
        let retriever = Arc::new(TieredRetriever::new(memory.clone(), &config.retrieval));
        let system_prompt = config
            .agent
            .system_prompt
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        info!(
            agent_name = config.agent.name.as_str(),
            identity = config.agent.identity.as_str(),
            room = config.transport.room.as_str(),
            "agent loop initialized"
        );

        Self {
            transport,
            services: Arc::new(SessionServices {
                memory,
                completion,
                retriever,
                system_prompt,
            }),
            filter: SenderFilter::new(
                &config.agent.identity,
                &config.agent.ignored_identity_markers,
            ),
            room: config.transport.room.clone(),
            direct_replies: config.transport.direct_replies,
            heartbeat: Duration::from_secs(config.agent.heartbeat_secs),
            drain_timeout: Duration::from_secs(config.agent.drain_timeout_secs),
            queue_depth: config.agent.session_queue_depth,
            sessions: HashMap::new(),
            write_backs: TaskTracker::new(),
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Runs the agent loop until the room closes or the token is cancelled.
    ///
    /// On exit, session workers finish their queued turns and pending
    /// write-backs are flushed, each bounded by `agent.drain_timeout_secs`.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), ConvoflowError> {
        info!("agent loop running");

        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = self.transport.receive() => {
                    match event {
                        Ok(event) => self.handle_event(event),
                        Err(ConvoflowError::TransportClosed) => {
                            info!("room connection closed, stopping agent loop");
                            break;
                        }
                        Err(e) => {
                            error!(error = %e, "transport receive error");
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    debug!(sessions = self.sessions.len(), "heartbeat");
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping agent loop");
                    break;
                }
            }
        }

        let sessions: Vec<SessionHandle> = self.sessions.drain().map(|(_, h)| h).collect();
        shutdown::drain_sessions(sessions, self.drain_timeout).await;
        shutdown::drain_write_backs(&self.write_backs, self.drain_timeout).await;

        if let Err(e) = self.transport.shutdown().await {
            warn!(error = %e, "transport shutdown failed");
        }

        info!("agent loop stopped");
        Ok(())
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ParticipantJoined { identity } => {
                if self.filter.should_ignore(&identity) {
                    debug!(identity = identity.as_str(), "ignoring participant");
                    return;
                }
                self.ensure_session(&identity);
            }
            TransportEvent::ParticipantLeft { identity } => {
                if let Some(handle) = self.sessions.remove(&identity) {
                    info!(
                        session_id = handle.session_id(),
                        user_id = identity.as_str(),
                        "participant left, session closed"
                    );
                    handle.close();
                }
            }
            TransportEvent::Data(payload) => self.handle_data(payload),
        }
    }

    fn handle_data(&mut self, payload: InboundPayload) {
        let sender = payload.sender_identity.clone();
        if self.filter.should_ignore(&sender) {
            debug!(sender = sender.as_str(), "ignoring packet from filtered sender");
            return;
        }

        let input = match decode_payload(&payload) {
            Ok(text) => SessionInput::Text(text),
            Err(e) => {
                warn!(sender = sender.as_str(), error = %e, "undecodable payload");
                SessionInput::Unreadable(e.to_string())
            }
        };

        match self.ensure_session(&sender).deliver(input) {
            Ok(()) => {}
            Err(Undelivered::Busy(_)) => {
                warn!(
                    sender = sender.as_str(),
                    queue_depth = self.queue_depth,
                    "session queue full, message dropped"
                );
                self.reply_busy(&sender);
            }
            Err(Undelivered::Stopped(input)) => {
                warn!(sender = sender.as_str(), "session worker gone, restarting session");
                self.sessions.remove(&sender);
                if self.ensure_session(&sender).deliver(input).is_err() {
                    error!(sender = sender.as_str(), "failed to deliver message to new session");
                }
            }
        }
    }

    /// Tells `sender` their message was dropped, without waiting on the room.
    fn reply_busy(&self, sender: &str) {
        let transport = self.transport.clone();
        let payload = encode_reply(DEGRADED_REPLY, self.direct_replies.then_some(sender));
        let sender = sender.to_string();
        tokio::spawn(async move {
            if let Err(e) = transport.publish(payload).await {
                warn!(sender = sender.as_str(), error = %e, "failed to publish busy reply");
            }
        });
    }

    /// Returns the live session for `identity`, creating it when absent.
    fn ensure_session(&mut self, identity: &str) -> &SessionHandle {
        if !self.sessions.contains_key(identity) {
            let handle = self.spawn_session(identity);
            self.sessions.insert(identity.to_string(), handle);
        }
        &self.sessions[identity]
    }

    fn spawn_session(&self, identity: &str) -> SessionHandle {
        let session_id = uuid::Uuid::new_v4().to_string();
        info!(
            session_id = session_id.as_str(),
            user_id = identity,
            room = self.room.as_str(),
            "created new session"
        );

        spawn_session(
            session_id,
            identity.to_string(),
            self.room.clone(),
            self.services.clone(),
            WorkerContext {
                transport: self.transport.clone(),
                recipient: self.direct_replies.then(|| identity.to_string()),
                write_backs: self.write_backs.clone(),
                queue_depth: self.queue_depth,
            },
        )
    }
}
