// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory memory adapter for deterministic testing.
//!
//! `MockMemory` keeps records per user in a map, scores searches by keyword
//! overlap, records every call, and can be told to fail any operation or to
//! hold writes until the test releases them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};

use convoflow_core::ConvoflowError;
use convoflow_core::traits::{MemoryAdapter, PluginAdapter};
use convoflow_core::types::{AdapterType, Exchange, HealthStatus, MemoryRecord};

/// One call made against [`MockMemory`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryCall {
    Search {
        user_id: String,
        query: String,
        limit: usize,
    },
    ListRecent {
        user_id: String,
        limit: usize,
    },
    Store {
        user_id: String,
        user_text: String,
        agent_text: String,
    },
    DeleteAll {
        user_id: String,
    },
}

const STOPWORDS: &[&str] = &["and", "the", "for", "you", "are", "was", "with", "what", "that"];

/// An in-memory memory store for testing.
pub struct MockMemory {
    records: Mutex<HashMap<String, Vec<MemoryRecord>>>,
    calls: Mutex<Vec<MemoryCall>>,
    next_id: AtomicUsize,
    stored: AtomicUsize,
    fail_search: AtomicBool,
    fail_list: AtomicBool,
    fail_store: AtomicBool,
    fail_delete: AtomicBool,
    store_gate: watch::Sender<bool>,
}

impl MockMemory {
    /// Create an empty store with every operation succeeding.
    pub fn new() -> Self {
        let (store_gate, _) = watch::channel(false);
        Self {
            records: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            stored: AtomicUsize::new(0),
            fail_search: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_store: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            store_gate,
        }
    }

    /// Add a record for `user_id` without logging a call.
    ///
    /// Each seeded record is newer than the previous one.
    pub async fn seed(&self, user_id: &str, content: &str) {
        self.insert(user_id, content).await;
    }

    async fn insert(&self, user_id: &str, content: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("mem-{n}");
        let created_at: DateTime<Utc> =
            DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(n as i64);
        self.records
            .lock()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(MemoryRecord {
                id: id.clone(),
                user_id: user_id.to_string(),
                content: content.to_string(),
                created_at,
                relevance_score: None,
            });
        id
    }

    pub fn fail_search(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_store(&self, fail: bool) {
        self.fail_store.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Block every `store()` until [`release_stores`](Self::release_stores) is called.
    pub fn hold_stores(&self) {
        self.store_gate.send_replace(true);
    }

    /// Let held and future `store()` calls proceed.
    pub fn release_stores(&self) {
        self.store_gate.send_replace(false);
    }

    /// Every call made so far.
    pub async fn calls(&self) -> Vec<MemoryCall> {
        self.calls.lock().await.clone()
    }

    /// Records currently held for `user_id`, oldest first.
    pub async fn stored(&self, user_id: &str) -> Vec<MemoryRecord> {
        self.records
            .lock()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `store()` calls that completed successfully.
    pub fn completed_stores(&self) -> usize {
        self.stored.load(Ordering::SeqCst)
    }

    /// Wait until `count` stores have completed, or `timeout` elapses.
    pub async fn wait_for_stores(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.completed_stores() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }

    async fn log(&self, call: MemoryCall) {
        self.calls.lock().await.push(call);
    }
}

impl Default for MockMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased words of three or more characters, punctuation stripped.
fn keywords(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

#[async_trait]
impl PluginAdapter for MockMemory {
    fn name(&self) -> &str {
        "mock-memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Memory
    }

    async fn health_check(&self) -> Result<HealthStatus, ConvoflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConvoflowError> {
        Ok(())
    }
}

#[async_trait]
impl MemoryAdapter for MockMemory {
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, ConvoflowError> {
        self.log(MemoryCall::Search {
            user_id: user_id.to_string(),
            query: query.to_string(),
            limit,
        })
        .await;
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(ConvoflowError::memory("mock search failure"));
        }

        let wanted = keywords(query);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.records.lock().await;
        let mut hits: Vec<MemoryRecord> = records
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|record| {
                let have = keywords(&record.content);
                let matched = wanted.intersection(&have).count();
                (matched > 0).then(|| MemoryRecord {
                    relevance_score: Some(matched as f64 / wanted.len() as f64),
                    ..record.clone()
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn list_recent(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, ConvoflowError> {
        self.log(MemoryCall::ListRecent {
            user_id: user_id.to_string(),
            limit,
        })
        .await;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ConvoflowError::memory("mock list failure"));
        }

        let records = self.records.lock().await;
        Ok(records
            .get(user_id)
            .into_iter()
            .flatten()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn store(
        &self,
        user_id: &str,
        exchange: &Exchange,
    ) -> Result<Option<String>, ConvoflowError> {
        self.log(MemoryCall::Store {
            user_id: user_id.to_string(),
            user_text: exchange.user_text.clone(),
            agent_text: exchange.agent_text.clone(),
        })
        .await;

        let mut gate = self.store_gate.subscribe();
        if gate.wait_for(|held| !*held).await.is_err() {
            return Err(ConvoflowError::memory("mock store gate dropped"));
        }

        if self.fail_store.load(Ordering::SeqCst) {
            return Err(ConvoflowError::memory("mock store failure"));
        }

        let id = self.insert(user_id, &exchange.user_text).await;
        self.stored.fetch_add(1, Ordering::SeqCst);
        Ok(Some(id))
    }

    async fn delete_all(&self, user_id: &str) -> Result<(), ConvoflowError> {
        self.log(MemoryCall::DeleteAll {
            user_id: user_id.to_string(),
        })
        .await;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ConvoflowError::memory("mock delete failure"));
        }
        self.records.lock().await.remove(user_id);
        Ok(())
    }
}
