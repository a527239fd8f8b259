// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock room transport for deterministic testing.
//!
//! `MockTransport` implements `TransportAdapter` with injectable room events
//! and captured outbound payloads for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};

use convoflow_core::ConvoflowError;
use convoflow_core::traits::{PluginAdapter, TransportAdapter};
use convoflow_core::types::{
    AdapterType, HealthStatus, InboundPayload, OutboundPayload, TransportEvent,
};

/// A mock room for testing.
///
/// Provides two queues:
/// - **events**: Events injected via `join()`, `say()` or `inject()` are returned by `receive()`
/// - **published**: Payloads passed to `publish()` are captured and retrievable via `published()`
pub struct MockTransport {
    events: Arc<Mutex<VecDeque<TransportEvent>>>,
    published: Arc<Mutex<Vec<OutboundPayload>>>,
    notify: Arc<Notify>,
    closed: AtomicBool,
    fail_publish: AtomicBool,
}

impl MockTransport {
    /// Create a new mock transport with empty queues.
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            published: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
            fail_publish: AtomicBool::new(false),
        }
    }

    /// Inject a raw room event.
    pub async fn inject(&self, event: TransportEvent) {
        self.events.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// Inject a participant-joined event.
    pub async fn join(&self, identity: &str) {
        self.inject(TransportEvent::ParticipantJoined {
            identity: identity.to_string(),
        })
        .await;
    }

    /// Inject a participant-left event.
    pub async fn leave(&self, identity: &str) {
        self.inject(TransportEvent::ParticipantLeft {
            identity: identity.to_string(),
        })
        .await;
    }

    /// Inject a UTF-8 data packet from `identity`.
    pub async fn say(&self, identity: &str, text: &str) {
        self.say_bytes(identity, text.as_bytes().to_vec()).await;
    }

    /// Inject a data packet with arbitrary bytes.
    pub async fn say_bytes(&self, identity: &str, payload: Vec<u8>) {
        self.inject(TransportEvent::Data(InboundPayload {
            sender_identity: identity.to_string(),
            payload,
            topic: None,
            received_at: Utc::now(),
        }))
        .await;
    }

    /// End the room: once queued events are drained, `receive()` reports closed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Make every subsequent `publish()` fail.
    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Get all payloads that were published.
    pub async fn published(&self) -> Vec<OutboundPayload> {
        self.published.lock().await.clone()
    }

    /// Get the published payloads decoded as text.
    pub async fn published_texts(&self) -> Vec<String> {
        self.published
            .lock()
            .await
            .iter()
            .map(|p| String::from_utf8_lossy(&p.payload).into_owned())
            .collect()
    }

    /// Wait until at least `count` payloads were published, or `timeout` elapses.
    ///
    /// Returns the published texts at that point either way.
    pub async fn wait_for_published(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let texts = self.published_texts().await;
            if texts.len() >= count || tokio::time::Instant::now() >= deadline {
                return texts;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Clear all published payloads.
    pub async fn clear_published(&self) {
        self.published.lock().await.clear();
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, ConvoflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConvoflowError> {
        self.close();
        Ok(())
    }
}

#[async_trait]
impl TransportAdapter for MockTransport {
    async fn connect(&mut self) -> Result<(), ConvoflowError> {
        Ok(())
    }

    async fn receive(&self) -> Result<TransportEvent, ConvoflowError> {
        loop {
            {
                let mut queue = self.events.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Ok(event);
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(ConvoflowError::TransportClosed);
            }
            self.notify.notified().await;
        }
    }

    async fn publish(&self, payload: OutboundPayload) -> Result<(), ConvoflowError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(ConvoflowError::transport("mock publish failure"));
        }
        self.published.lock().await.push(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receive_returns_injected_events_in_order() {
        let transport = MockTransport::new();
        transport.join("alice").await;
        transport.say("alice", "hello").await;

        assert_eq!(
            transport.receive().await.unwrap(),
            TransportEvent::ParticipantJoined {
                identity: "alice".into()
            }
        );
        match transport.receive().await.unwrap() {
            TransportEvent::Data(p) => {
                assert_eq!(p.sender_identity, "alice");
                assert_eq!(p.payload, b"hello");
            }
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn receive_waits_for_injection() {
        let transport = Arc::new(MockTransport::new());
        let clone = transport.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            clone.say("bob", "delayed").await;
        });

        let event = tokio::time::timeout(Duration::from_secs(2), transport.receive())
            .await
            .expect("receive timed out")
            .unwrap();
        assert!(matches!(event, TransportEvent::Data(_)));
    }

    #[tokio::test]
    async fn close_drains_queue_then_reports_closed() {
        let transport = MockTransport::new();
        transport.say("alice", "last words").await;
        transport.close();

        assert!(transport.receive().await.is_ok());
        assert!(matches!(
            transport.receive().await,
            Err(ConvoflowError::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn publish_captures_and_can_fail() {
        let transport = MockTransport::new();
        let payload = OutboundPayload {
            payload: b"reply".to_vec(),
            reliable: true,
            destination_identities: vec![],
        };
        transport.publish(payload.clone()).await.unwrap();
        assert_eq!(transport.published_texts().await, vec!["reply"]);

        transport.fail_publish(true);
        assert!(transport.publish(payload).await.is_err());
        assert_eq!(transport.published().await.len(), 1);

        transport.clear_published().await;
        assert!(transport.published().await.is_empty());
    }
}
