// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter trait for the real-time room the agent relays through.

use async_trait::async_trait;

use crate::error::ConvoflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{OutboundPayload, TransportEvent};

/// Adapter for a bidirectional real-time room.
///
/// The transport only moves byte payloads and participant presence events.
/// Decoding and routing belong to the agent.
#[async_trait]
pub trait TransportAdapter: PluginAdapter {
    /// Joins the room.
    async fn connect(&mut self) -> Result<(), ConvoflowError>;

    /// Receives the next room event.
    ///
    /// Returns [`ConvoflowError::TransportClosed`] once the room connection has ended.
    async fn receive(&self) -> Result<TransportEvent, ConvoflowError>;

    /// Publishes a payload into the room.
    async fn publish(&self, payload: OutboundPayload) -> Result<(), ConvoflowError>;
}
