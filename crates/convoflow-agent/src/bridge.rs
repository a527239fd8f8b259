// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion between room data packets and conversation text.
//!
//! Inbound payloads are decoded as UTF-8; replies are encoded as UTF-8 and
//! always published with reliable delivery. [`SenderFilter`] decides which
//! senders the agent should never answer.

use convoflow_core::ConvoflowError;
use convoflow_core::types::{InboundPayload, OutboundPayload};

/// Decodes an inbound packet as UTF-8 text.
pub fn decode_payload(payload: &InboundPayload) -> Result<String, ConvoflowError> {
    String::from_utf8(payload.payload.clone()).map_err(|e| ConvoflowError::Transport {
        message: format!(
            "payload from {} is not valid UTF-8",
            payload.sender_identity
        ),
        source: Some(Box::new(e)),
    })
}

/// Encodes reply text as a reliable outbound packet.
///
/// With a `recipient`, delivery is restricted to that participant; without
/// one, the reply goes to the whole room.
pub fn encode_reply(text: &str, recipient: Option<&str>) -> OutboundPayload {
    OutboundPayload {
        payload: text.as_bytes().to_vec(),
        reliable: true,
        destination_identities: recipient.map(|r| vec![r.to_string()]).unwrap_or_default(),
    }
}

/// Filters out the agent's own packets and packets from other agents.
#[derive(Debug, Clone)]
pub struct SenderFilter {
    own_identity: String,
    markers: Vec<String>,
}

impl SenderFilter {
    pub fn new(own_identity: &str, markers: &[String]) -> Self {
        Self {
            own_identity: own_identity.to_string(),
            markers: markers
                .iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Returns true when packets from `identity` must be ignored.
    pub fn should_ignore(&self, identity: &str) -> bool {
        if identity == self.own_identity {
            return true;
        }
        let lowered = identity.to_lowercase();
        self.markers.iter().any(|m| lowered.contains(m.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn inbound(bytes: &[u8]) -> InboundPayload {
        InboundPayload {
            sender_identity: "alice".into(),
            payload: bytes.to_vec(),
            topic: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn decodes_utf8_text() {
        assert_eq!(decode_payload(&inbound("héllo 👋".as_bytes())).unwrap(), "héllo 👋");
    }

    #[test]
    fn invalid_utf8_is_a_transport_error() {
        let err = decode_payload(&inbound(&[0xff, 0xfe, 0x00])).unwrap_err();
        assert!(matches!(err, ConvoflowError::Transport { .. }));
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn replies_are_reliable() {
        let broadcast = encode_reply("hi", None);
        assert!(broadcast.reliable);
        assert_eq!(broadcast.payload, b"hi");
        assert!(broadcast.destination_identities.is_empty());

        let direct = encode_reply("hi", Some("alice"));
        assert_eq!(direct.destination_identities, vec!["alice".to_string()]);
    }

    #[test]
    fn filter_ignores_self_and_marked_identities() {
        let filter = SenderFilter::new("gemini-agent", &["agent".into(), "Bot".into()]);
        assert!(filter.should_ignore("gemini-agent"));
        assert!(filter.should_ignore("support-AGENT-2"));
        assert!(filter.should_ignore("chatbot"));
        assert!(!filter.should_ignore("alice"));
    }

    #[test]
    fn blank_markers_match_nothing() {
        let filter = SenderFilter::new("me", &["  ".into()]);
        assert!(!filter.should_ignore("alice"));
    }
}
