// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that the agent loop monitors. Session workers and
//! pending memory write-backs are drained before the process exits.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::worker::SessionHandle;

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
/// The signal handler task runs in the background until the token is cancelled.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                        _ = token_clone.cancelled() => return,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, only Ctrl+C will stop the agent");
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = token_clone.cancelled() => return,
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = ctrl_c => {
                    info!("received Ctrl+C, initiating shutdown");
                }
                _ = token_clone.cancelled() => return,
            }
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Drains session workers, waiting up to `timeout` for queued turns to finish.
///
/// Each worker's inbox is closed so it exits after its queued input. Workers
/// still running at the deadline are cancelled and their results discarded.
pub async fn drain_sessions(sessions: Vec<SessionHandle>, timeout: Duration) {
    if sessions.is_empty() {
        info!("no active sessions to drain");
        return;
    }

    info!(count = sessions.len(), "waiting for active sessions to complete");

    let mut cancels = Vec::with_capacity(sessions.len());
    let mut tasks = Vec::with_capacity(sessions.len());
    for handle in sessions {
        let SessionHandle {
            inbox, cancel, task, ..
        } = handle;
        drop(inbox);
        cancels.push(cancel);
        tasks.push(task);
    }

    match tokio::time::timeout(timeout, futures::future::join_all(tasks)).await {
        Ok(_) => info!("all sessions drained successfully"),
        Err(_) => {
            warn!(
                remaining = cancels.len(),
                "timeout reached, some sessions interrupted"
            );
            for cancel in cancels {
                cancel.cancel();
            }
        }
    }
}

/// Waits up to `timeout` for pending memory write-backs.
pub async fn drain_write_backs(tracker: &TaskTracker, timeout: Duration) {
    tracker.close();
    if tracker.is_empty() {
        return;
    }

    info!(pending = tracker.len(), "waiting for memory write-backs");
    if tokio::time::timeout(timeout, tracker.wait()).await.is_err() {
        warn!(
            remaining = tracker.len(),
            "timeout reached, some memory write-backs abandoned"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn drain_empty_sessions() {
        drain_sessions(Vec::new(), Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn drain_write_backs_waits_for_tasks() {
        let tracker = TaskTracker::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tracker.spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(());
        });

        drain_write_backs(&tracker, Duration::from_secs(2)).await;
        assert!(rx.await.is_ok());
        assert!(tracker.is_closed());
    }

    #[tokio::test]
    async fn drain_write_backs_gives_up_after_timeout() {
        let tracker = TaskTracker::new();
        tracker.spawn(std::future::pending::<()>());

        let started = std::time::Instant::now();
        drain_write_backs(&tracker, Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(tracker.len(), 1);
    }
}
