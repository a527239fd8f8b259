// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` runs a complete [`AgentLoop`] in a background task over
//! mock transport, memory and completion adapters. Tests drive it through
//! the room (`join`, `say`, `leave`) and observe what was published.

use std::sync::Arc;
use std::time::Duration;

use convoflow_agent::AgentLoop;
use convoflow_config::model::ConvoflowConfig;
use convoflow_core::ConvoflowError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::mock_completion::MockCompletion;
use crate::mock_memory::MockMemory;
use crate::mock_transport::MockTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: ConvoflowConfig,
    responses: Vec<String>,
    memory: Option<Arc<MockMemory>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = ConvoflowConfig::default();
        config.agent.heartbeat_secs = 1;
        config.agent.drain_timeout_secs = 2;
        Self {
            config,
            responses: Vec::new(),
            memory: None,
        }
    }

    /// Set mock completion replies.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Use a pre-seeded memory store.
    pub fn with_memory(mut self, memory: Arc<MockMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: ConvoflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Send replies only to the participant that asked.
    pub fn with_direct_replies(mut self) -> Self {
        self.config.transport.direct_replies = true;
        self
    }

    /// Start the agent loop in the background.
    pub fn build(self) -> TestHarness {
        let transport = Arc::new(MockTransport::new());
        let memory = self.memory.unwrap_or_else(|| Arc::new(MockMemory::new()));
        let completion = Arc::new(MockCompletion::with_responses(self.responses));

        let mut agent = AgentLoop::new(
            transport.clone(),
            memory.clone(),
            completion.clone(),
            &self.config,
        );
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { agent.run(token).await });

        TestHarness {
            transport,
            memory,
            completion,
            config: self.config,
            cancel,
            task,
        }
    }
}

/// A running agent loop over mock adapters.
pub struct TestHarness {
    pub transport: Arc<MockTransport>,
    pub memory: Arc<MockMemory>,
    pub completion: Arc<MockCompletion>,
    pub config: ConvoflowConfig,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), ConvoflowError>>,
}

impl TestHarness {
    /// Create a new test harness builder.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn join(&self, identity: &str) {
        self.transport.join(identity).await;
    }

    pub async fn say(&self, identity: &str, text: &str) {
        self.transport.say(identity, text).await;
    }

    pub async fn leave(&self, identity: &str) {
        self.transport.leave(identity).await;
    }

    /// Wait for at least `count` published replies (two-second deadline).
    pub async fn replies(&self, count: usize) -> Vec<String> {
        self.transport
            .wait_for_published(count, Duration::from_secs(2))
            .await
    }

    /// Cancel the loop and wait for it to drain.
    pub async fn shutdown(self) -> Result<(), ConvoflowError> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| ConvoflowError::Internal(format!("agent loop task failed: {e}")))?
    }

    /// Close the room and wait for the loop to stop on its own.
    pub async fn close_room(self) -> Result<(), ConvoflowError> {
        self.transport.close();
        self.task
            .await
            .map_err(|e| ConvoflowError::Internal(format!("agent loop task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_replies_to_a_message() {
        let harness = TestHarness::builder()
            .with_mock_responses(vec!["pong".into()])
            .build();

        harness.say("alice", "ping").await;
        let replies = harness.replies(2).await;

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1], "pong");
        harness.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn harness_stops_when_room_closes() {
        let harness = TestHarness::builder().build();
        tokio::time::timeout(Duration::from_secs(5), harness.close_room())
            .await
            .expect("loop should stop")
            .unwrap();
    }
}
