// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One task per session: messages of a session are handled strictly in
//! arrival order while different sessions run concurrently.

use std::sync::Arc;

use convoflow_core::traits::TransportAdapter;
use convoflow_core::types::Exchange;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::bridge::encode_reply;
use crate::session::{SessionActor, SessionInput, SessionServices};

/// The agent loop's handle on a running session worker.
pub struct SessionHandle {
    pub(crate) session_id: String,
    pub(crate) inbox: mpsc::Sender<SessionInput>,
    /// Cancelled when the participant leaves; in-flight results are then discarded.
    pub(crate) cancel: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Queues input for the worker without waiting.
    pub(crate) fn deliver(&self, input: SessionInput) -> Result<(), Undelivered> {
        self.inbox.try_send(input).map_err(|e| match e {
            TrySendError::Full(input) => Undelivered::Busy(input),
            TrySendError::Closed(input) => Undelivered::Stopped(input),
        })
    }

    /// Marks the session dead and stops its worker.
    pub(crate) fn close(self) {
        self.cancel.cancel();
    }
}

/// Input a session could not accept.
#[derive(Debug)]
pub(crate) enum Undelivered {
    /// The session already has `agent.session_queue_depth` messages queued.
    Busy(SessionInput),
    /// The worker has stopped.
    Stopped(SessionInput),
}

/// Everything a worker needs besides its actor.
pub(crate) struct WorkerContext {
    pub transport: Arc<dyn TransportAdapter + Send + Sync>,
    /// Set when replies go only to the session's participant.
    pub recipient: Option<String>,
    pub write_backs: TaskTracker,
    pub queue_depth: usize,
}

/// Spawns the worker task for a new session.
pub(crate) fn spawn_session(
    session_id: String,
    user_id: String,
    room_id: String,
    services: Arc<SessionServices>,
    context: WorkerContext,
) -> SessionHandle {
    let (inbox, rx) = mpsc::channel(context.queue_depth.max(1));
    let cancel = CancellationToken::new();
    let actor = SessionActor::new(session_id.clone(), user_id, room_id, services);
    let task = tokio::spawn(run_worker(actor, rx, context, cancel.clone()));

    SessionHandle {
        session_id,
        inbox,
        cancel,
        task,
    }
}

async fn run_worker(
    mut actor: SessionActor,
    mut inbox: mpsc::Receiver<SessionInput>,
    context: WorkerContext,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = actor.resolve_returning_user() => {}
        _ = cancel.cancelled() => return,
    }

    loop {
        let input = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            input = inbox.recv() => match input {
                Some(input) => input,
                None => break,
            },
        };

        let turn = tokio::select! {
            turn = actor.handle_input(input) => turn,
            _ = cancel.cancelled() => {
                debug!(session_id = actor.session_id(), "session closed mid-turn, result discarded");
                break;
            }
        };

        let mut delivered = false;
        for reply in &turn.replies {
            if cancel.is_cancelled() {
                debug!(session_id = actor.session_id(), "session closed, reply discarded");
                delivered = false;
                break;
            }
            let payload = encode_reply(reply, context.recipient.as_deref());
            delivered = match context.transport.publish(payload).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(session_id = actor.session_id(), error = %e, "failed to publish reply");
                    false
                }
            };
        }

        match turn.write_back {
            Some(exchange) if delivered => {
                enqueue_write_back(&context.write_backs, actor.services(), exchange);
            }
            Some(_) => {
                debug!(session_id = actor.session_id(), "reply not delivered, skipping write-back");
            }
            None => {}
        }
    }

    info!(
        session_id = actor.session_id(),
        user_id = actor.user_id(),
        "session worker stopped"
    );
}

/// Persists an exchange in the background; failures are logged and dropped.
fn enqueue_write_back(tracker: &TaskTracker, services: &Arc<SessionServices>, exchange: Exchange) {
    let memory = services.memory.clone();
    tracker.spawn(async move {
        match memory.store(&exchange.user_id, &exchange).await {
            Ok(id) => debug!(user_id = exchange.user_id.as_str(), memory_id = ?id, "write-back stored"),
            Err(e) => warn!(
                user_id = exchange.user_id.as_str(),
                error = %e,
                "memory write-back failed"
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DEFAULT_SYSTEM_PROMPT, FIRST_TIME_GREETING};
    use convoflow_config::model::RetrievalConfig;
    use convoflow_core::traits::MemoryAdapter;
    use convoflow_memory::TieredRetriever;
    use convoflow_test_utils::{MockCompletion, MockMemory, MockTransport};
    use std::time::Duration;

    struct Fixture {
        transport: Arc<MockTransport>,
        memory: Arc<MockMemory>,
        completion: Arc<MockCompletion>,
        tracker: TaskTracker,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                transport: Arc::new(MockTransport::new()),
                memory: Arc::new(MockMemory::new()),
                completion: Arc::new(MockCompletion::new()),
                tracker: TaskTracker::new(),
            }
        }

        fn spawn(&self, user_id: &str) -> SessionHandle {
            self.spawn_with_depth(user_id, 16)
        }

        fn spawn_with_depth(&self, user_id: &str, queue_depth: usize) -> SessionHandle {
            let memory: Arc<dyn MemoryAdapter + Send + Sync> = self.memory.clone();
            let services = Arc::new(SessionServices {
                retriever: Arc::new(TieredRetriever::new(
                    memory.clone(),
                    &RetrievalConfig::default(),
                )),
                memory,
                completion: self.completion.clone(),
                system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            });
            spawn_session(
                "sess-1".into(),
                user_id.into(),
                "chat-room".into(),
                services,
                WorkerContext {
                    transport: self.transport.clone(),
                    recipient: None,
                    write_backs: self.tracker.clone(),
                    queue_depth,
                },
            )
        }
    }

    #[tokio::test]
    async fn replies_are_published_in_order() {
        let fx = Fixture::new();
        fx.completion.add_response("first answer").await;
        fx.completion.add_response("second answer").await;
        let handle = fx.spawn("alice");

        handle.deliver(SessionInput::Text("one".into())).unwrap();
        handle.deliver(SessionInput::Text("two".into())).unwrap();

        let texts = fx.transport.wait_for_published(3, Duration::from_secs(2)).await;
        assert_eq!(
            texts,
            vec![FIRST_TIME_GREETING, "first answer", "second answer"]
        );
    }

    #[tokio::test]
    async fn write_back_does_not_block_reply() {
        let fx = Fixture::new();
        fx.memory.hold_stores();
        fx.completion.add_response("noted").await;
        let handle = fx.spawn("alice");

        handle.deliver(SessionInput::Text("I love sushi".into())).unwrap();

        let texts = fx.transport.wait_for_published(2, Duration::from_secs(2)).await;
        assert_eq!(texts.last().map(String::as_str), Some("noted"));
        assert_eq!(fx.memory.completed_stores(), 0);

        fx.memory.release_stores();
        assert!(fx.memory.wait_for_stores(1, Duration::from_secs(2)).await);
        assert_eq!(fx.memory.stored("alice").await[0].content, "I love sushi");
    }

    #[tokio::test]
    async fn failed_publish_skips_write_back() {
        let fx = Fixture::new();
        fx.transport.fail_publish(true);
        let handle = fx.spawn("alice");

        handle.deliver(SessionInput::Text("remember this".into())).unwrap();
        drop(handle.inbox);
        handle.task.await.unwrap();

        fx.tracker.close();
        fx.tracker.wait().await;
        assert_eq!(fx.completion.call_count().await, 1);
        assert_eq!(fx.memory.completed_stores(), 0);
    }

    #[tokio::test]
    async fn cancelled_session_discards_in_flight_result() {
        let fx = Fixture::new();
        fx.completion.set_delay(Duration::from_millis(200));
        let handle = fx.spawn("alice");

        handle.deliver(SessionInput::Text("slow question".into())).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel.cancel();
        handle.task.await.unwrap();

        assert!(fx.transport.published().await.is_empty());
        fx.tracker.close();
        fx.tracker.wait().await;
        assert_eq!(fx.memory.completed_stores(), 0);
    }

    #[tokio::test]
    async fn full_queue_hands_input_back() {
        let fx = Fixture::new();
        fx.completion.add_response("only answer").await;
        let handle = fx.spawn_with_depth("alice", 1);

        handle.deliver(SessionInput::Text("one".into())).unwrap();
        match handle.deliver(SessionInput::Text("two".into())) {
            Err(Undelivered::Busy(SessionInput::Text(text))) => assert_eq!(text, "two"),
            other => panic!("expected Busy, got {other:?}"),
        }

        let texts = fx.transport.wait_for_published(2, Duration::from_secs(2)).await;
        assert_eq!(texts, vec![FIRST_TIME_GREETING, "only answer"]);
        assert_eq!(fx.completion.call_count().await, 1);
    }

    #[tokio::test]
    async fn stopped_worker_reports_stopped() {
        let fx = Fixture::new();
        let mut handle = fx.spawn("alice");
        handle.cancel.cancel();
        (&mut handle.task).await.unwrap();

        assert!(matches!(
            handle.deliver(SessionInput::Text("late".into())),
            Err(Undelivered::Stopped(_))
        ));
    }

    #[tokio::test]
    async fn closed_inbox_stops_worker() {
        let fx = Fixture::new();
        let handle = fx.spawn("alice");
        let SessionHandle { inbox, task, .. } = handle;
        drop(inbox);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("worker should stop")
            .unwrap();
    }
}
