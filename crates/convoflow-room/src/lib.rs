// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket room transport for the Convoflow relay agent.
//!
//! [`RoomTransport`] joins one room with a self-minted access token and
//! runs a background pump that turns server frames into
//! [`TransportEvent`]s and queued publishes into client frames. The
//! connection is never re-established: once the socket ends, `receive()`
//! reports [`ConvoflowError::TransportClosed`].

pub mod protocol;
pub mod token;

use std::time::Duration;

use async_trait::async_trait;
use convoflow_config::Credentials;
use convoflow_config::model::TransportConfig;
use convoflow_core::ConvoflowError;
use convoflow_core::traits::{PluginAdapter, TransportAdapter};
use convoflow_core::types::{AdapterType, HealthStatus, OutboundPayload, TransportEvent};
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::{ClientFrame, parse_frame};
use crate::token::mint_access_token;

const CHANNEL_CAPACITY: usize = 256;

type RoomSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport adapter for a WebSocket room server.
pub struct RoomTransport {
    url: String,
    api_key: SecretString,
    api_secret: SecretString,
    identity: String,
    room: String,
    token_ttl: Duration,
    inbound: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
    outbound: Option<mpsc::Sender<String>>,
    cancel: CancellationToken,
}

impl RoomTransport {
    /// Creates an unconnected transport for `identity`.
    pub fn new(
        config: &TransportConfig,
        identity: &str,
        credentials: &Credentials,
    ) -> Result<Self, ConvoflowError> {
        let url = credentials.transport_url.trim().trim_end_matches('/').to_string();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConvoflowError::Config(format!(
                "room URL must start with ws:// or wss://, got {url}"
            )));
        }

        Ok(Self {
            url,
            api_key: credentials.transport_api_key.clone(),
            api_secret: credentials.transport_api_secret.clone(),
            identity: identity.to_string(),
            room: config.room.clone(),
            token_ttl: Duration::from_secs(config.token_ttl_secs),
            inbound: Mutex::new(None),
            outbound: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Mints a fresh room-join token for this agent.
    pub fn access_token(&self) -> Result<String, ConvoflowError> {
        mint_access_token(
            self.api_key.expose_secret(),
            self.api_secret.expose_secret(),
            &self.identity,
            &self.room,
            self.token_ttl,
        )
    }

    fn connect_url(&self, token: &str) -> String {
        format!("{}/agent?access_token={token}", self.url)
    }

    /// Whether `connect()` succeeded and the socket is still open.
    pub fn is_connected(&self) -> bool {
        self.outbound.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

async fn pump(
    socket: RoomSocket,
    events: mpsc::Sender<TransportEvent>,
    mut outgoing: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            frame = outgoing.recv() => {
                let Some(text) = frame else { break };
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    warn!(error = %e, "room socket write failed");
                    break;
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match parse_frame(text.as_str()).and_then(|f| f.into_event()) {
                            Ok(event) => {
                                if events.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "skipping room frame"),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(frame = ?frame, "room server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => debug!("ignoring non-text frame"),
                    Some(Err(e)) => {
                        warn!(error = %e, "room socket error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    info!("room connection ended");
}

#[async_trait]
impl PluginAdapter for RoomTransport {
    fn name(&self) -> &str {
        "room"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, ConvoflowError> {
        if self.is_connected() {
            return Ok(HealthStatus::Healthy);
        }
        if self.outbound.is_some() {
            return Ok(HealthStatus::Unhealthy("room connection ended".into()));
        }
        match self.access_token() {
            Ok(_) => Ok(HealthStatus::Degraded("not connected".into())),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), ConvoflowError> {
        self.cancel.cancel();
        Ok(())
    }
}

#[async_trait]
impl TransportAdapter for RoomTransport {
    async fn connect(&mut self) -> Result<(), ConvoflowError> {
        let token = self.access_token()?;
        let (socket, response) = tokio_tungstenite::connect_async(self.connect_url(&token))
            .await
            .map_err(|e| ConvoflowError::Transport {
                message: format!("failed to connect to room server at {}: {e}", self.url),
                source: Some(Box::new(e)),
            })?;

        info!(
            room = self.room.as_str(),
            identity = self.identity.as_str(),
            status = %response.status(),
            "joined room"
        );

        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(pump(socket, event_tx, out_rx, self.cancel.clone()));

        *self.inbound.lock().await = Some(event_rx);
        self.outbound = Some(out_tx);
        Ok(())
    }

    async fn receive(&self) -> Result<TransportEvent, ConvoflowError> {
        let mut guard = self.inbound.lock().await;
        let rx = guard
            .as_mut()
            .ok_or_else(|| ConvoflowError::transport("room transport is not connected"))?;
        rx.recv().await.ok_or(ConvoflowError::TransportClosed)
    }

    async fn publish(&self, payload: OutboundPayload) -> Result<(), ConvoflowError> {
        let tx = self
            .outbound
            .as_ref()
            .ok_or_else(|| ConvoflowError::transport("room transport is not connected"))?;
        let frame = serde_json::to_string(&ClientFrame::publish(&payload)).map_err(|e| {
            ConvoflowError::Transport {
                message: format!("failed to encode publish frame: {e}"),
                source: Some(Box::new(e)),
            }
        })?;
        tx.send(frame)
            .await
            .map_err(|_| ConvoflowError::transport("room connection closed, reply not sent"))
    }
}
