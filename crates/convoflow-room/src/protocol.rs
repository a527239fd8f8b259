// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON frames exchanged with the room server.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use convoflow_core::ConvoflowError;
use convoflow_core::types::{InboundPayload, OutboundPayload, TransportEvent};
use serde::{Deserialize, Serialize};

/// Frames sent by the room server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    ParticipantJoined {
        identity: String,
    },
    ParticipantLeft {
        identity: String,
    },
    Data {
        sender: String,
        /// Base64-encoded packet bytes.
        payload: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
    },
}

/// Frames sent by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    PublishData {
        payload: String,
        reliable: bool,
        destination_identities: Vec<String>,
    },
}

/// Parses one text frame from the server.
pub fn parse_frame(text: &str) -> Result<ServerFrame, ConvoflowError> {
    serde_json::from_str(text).map_err(|e| ConvoflowError::Transport {
        message: format!("unrecognized room frame: {e}"),
        source: Some(Box::new(e)),
    })
}

impl ServerFrame {
    /// Converts the frame into a transport event, decoding data payloads.
    pub fn into_event(self) -> Result<TransportEvent, ConvoflowError> {
        Ok(match self {
            ServerFrame::ParticipantJoined { identity } => {
                TransportEvent::ParticipantJoined { identity }
            }
            ServerFrame::ParticipantLeft { identity } => TransportEvent::ParticipantLeft { identity },
            ServerFrame::Data {
                sender,
                payload,
                topic,
            } => {
                let bytes = STANDARD.decode(payload).map_err(|e| ConvoflowError::Transport {
                    message: format!("data packet from {sender} is not valid base64"),
                    source: Some(Box::new(e)),
                })?;
                TransportEvent::Data(InboundPayload {
                    sender_identity: sender,
                    payload: bytes,
                    topic,
                    received_at: Utc::now(),
                })
            }
        })
    }
}

impl ClientFrame {
    pub fn publish(payload: &OutboundPayload) -> Self {
        ClientFrame::PublishData {
            payload: STANDARD.encode(&payload.payload),
            reliable: payload.reliable,
            destination_identities: payload.destination_identities.clone(),
        }
    }
}
