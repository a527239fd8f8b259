// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tiered memory retrieval.
//!
//! Retrieval walks an ordered list of [`RetrievalStrategy`] tiers and stops at
//! the first one that yields a usable record:
//!
//! 1. **Contextual** -- the utterance itself as the search query, top-K.
//! 2. **Identity** -- fixed identity/preference queries.
//! 3. **Comprehensive** -- the most recent slice of everything stored.
//!
//! A tier that fails is logged and skipped. When every tier misses or fails
//! the result is an empty context; retrieval itself never returns an error.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use convoflow_config::model::RetrievalConfig;
use convoflow_core::{ConvoflowError, MemoryAdapter, MemoryRecord, PromptContext, RetrievalTier};
use tracing::{debug, info, warn};

/// One retrieval tier.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// The tier this strategy implements.
    fn tier(&self) -> RetrievalTier;

    /// Fetches candidate records for the user. Unusable records are filtered by the caller.
    async fn fetch(
        &self,
        memory: &dyn MemoryAdapter,
        user_id: &str,
        utterance: &str,
    ) -> Result<Vec<MemoryRecord>, ConvoflowError>;
}

/// Tier 1: search with the utterance as the query.
pub struct ContextualSearch {
    pub top_k: usize,
}

#[async_trait]
impl RetrievalStrategy for ContextualSearch {
    fn tier(&self) -> RetrievalTier {
        RetrievalTier::Contextual
    }

    async fn fetch(
        &self,
        memory: &dyn MemoryAdapter,
        user_id: &str,
        utterance: &str,
    ) -> Result<Vec<MemoryRecord>, ConvoflowError> {
        let query = utterance.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        memory.search(user_id, query, self.top_k).await
    }
}

/// Tier 2: identity and preference queries, merged by record id.
pub struct IdentitySearch {
    pub queries: Vec<String>,
    pub limit: usize,
}

#[async_trait]
impl RetrievalStrategy for IdentitySearch {
    fn tier(&self) -> RetrievalTier {
        RetrievalTier::Identity
    }

    /// Fails only when every query fails; partial failures are logged.
    async fn fetch(
        &self,
        memory: &dyn MemoryAdapter,
        user_id: &str,
        _utterance: &str,
    ) -> Result<Vec<MemoryRecord>, ConvoflowError> {
        let mut merged: HashMap<String, MemoryRecord> = HashMap::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for query in self.queries.iter().filter(|q| !q.trim().is_empty()) {
            match memory.search(user_id, query, self.limit).await {
                Ok(records) => {
                    succeeded += 1;
                    for record in records {
                        match merged.get(&record.id) {
                            Some(existing) if score_of(existing) >= score_of(&record) => {}
                            _ => {
                                merged.insert(record.id.clone(), record);
                            }
                        }
                    }
                }
                Err(e) => {
                    debug!(user_id, query = query.as_str(), error = %e, "identity query failed");
                    last_error = Some(e);
                }
            }
        }

        if succeeded == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let mut records: Vec<MemoryRecord> = merged.into_values().collect();
        rank_records(&mut records);
        records.truncate(self.limit);
        Ok(records)
    }
}

/// Tier 3: the most recent memories, unfiltered by query.
pub struct ComprehensiveListing {
    pub limit: usize,
}

#[async_trait]
impl RetrievalStrategy for ComprehensiveListing {
    fn tier(&self) -> RetrievalTier {
        RetrievalTier::Comprehensive
    }

    async fn fetch(
        &self,
        memory: &dyn MemoryAdapter,
        user_id: &str,
        _utterance: &str,
    ) -> Result<Vec<MemoryRecord>, ConvoflowError> {
        memory.list_recent(user_id, self.limit).await
    }
}

/// Observable outcome of a single tier.
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    /// The tier produced this many usable records.
    Hit(usize),
    /// The tier succeeded but produced nothing usable.
    Miss,
    /// The tier failed; the message is the adapter error.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierReport {
    pub tier: RetrievalTier,
    pub outcome: TierOutcome,
}

/// Result of a retrieval: the context plus the outcome of every tier attempted.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub context: PromptContext,
    pub reports: Vec<TierReport>,
}

/// Multi-tier memory retrieval engine.
pub struct TieredRetriever {
    memory: Arc<dyn MemoryAdapter + Send + Sync>,
    strategies: Vec<Box<dyn RetrievalStrategy>>,
    welcome: IdentitySearch,
    dump_limit: usize,
}

impl TieredRetriever {
    /// Creates the standard contextual -> identity -> comprehensive chain.
    pub fn new(memory: Arc<dyn MemoryAdapter + Send + Sync>, config: &RetrievalConfig) -> Self {
        let strategies: Vec<Box<dyn RetrievalStrategy>> = vec![
            Box::new(ContextualSearch { top_k: config.top_k }),
            Box::new(IdentitySearch {
                queries: config.identity_queries.clone(),
                limit: config.identity_limit,
            }),
            Box::new(ComprehensiveListing {
                limit: config.comprehensive_limit,
            }),
        ];
        Self::with_strategies(memory, strategies, config)
    }

    /// Creates a retriever with a custom tier chain.
    pub fn with_strategies(
        memory: Arc<dyn MemoryAdapter + Send + Sync>,
        strategies: Vec<Box<dyn RetrievalStrategy>>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            memory,
            strategies,
            welcome: IdentitySearch {
                queries: config.identity_queries.clone(),
                limit: config.welcome_limit,
            },
            dump_limit: config.dump_limit,
        }
    }

    /// Retrieves ranked memory context for an utterance.
    pub async fn retrieve(&self, user_id: &str, utterance: &str) -> Retrieval {
        let mut reports = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let tier = strategy.tier();
            match strategy.fetch(self.memory.as_ref(), user_id, utterance).await {
                Ok(records) => {
                    let mut usable: Vec<MemoryRecord> =
                        records.into_iter().filter(MemoryRecord::is_usable).collect();
                    if usable.is_empty() {
                        debug!(user_id, tier = %tier, "memory tier miss");
                        reports.push(TierReport {
                            tier,
                            outcome: TierOutcome::Miss,
                        });
                        continue;
                    }

                    rank_records(&mut usable);
                    info!(user_id, tier = %tier, count = usable.len(), "memory context retrieved");
                    reports.push(TierReport {
                        tier,
                        outcome: TierOutcome::Hit(usable.len()),
                    });
                    return Retrieval {
                        context: PromptContext {
                            records: usable,
                            tier,
                            utterance: utterance.to_string(),
                        },
                        reports,
                    };
                }
                Err(e) => {
                    warn!(user_id, tier = %tier, error = %e, "memory tier failed, falling back");
                    reports.push(TierReport {
                        tier,
                        outcome: TierOutcome::Error(e.to_string()),
                    });
                }
            }
        }

        debug!(user_id, "no memory context available");
        Retrieval {
            context: PromptContext::empty(utterance),
            reports,
        }
    }

    /// Identity-keyed memories used to greet a returning user.
    ///
    /// Failures degrade to an empty list.
    pub async fn welcome_memories(&self, user_id: &str) -> Vec<MemoryRecord> {
        match self.welcome.fetch(self.memory.as_ref(), user_id, "").await {
            Ok(records) => records.into_iter().filter(MemoryRecord::is_usable).collect(),
            Err(e) => {
                warn!(user_id, error = %e, "welcome memory lookup failed");
                Vec::new()
            }
        }
    }

    /// Whether the user has at least one stored memory.
    pub async fn has_memories(&self, user_id: &str) -> Result<bool, ConvoflowError> {
        let recent = self.memory.list_recent(user_id, 1).await?;
        Ok(!recent.is_empty())
    }

    /// Everything stored for the user, newest first and unranked, capped at the dump limit.
    pub async fn list_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>, ConvoflowError> {
        let records = self.memory.list_recent(user_id, self.dump_limit).await?;
        Ok(records.into_iter().filter(MemoryRecord::is_usable).collect())
    }
}

fn score_of(record: &MemoryRecord) -> f64 {
    record.relevance_score.unwrap_or(f64::NEG_INFINITY)
}

/// Sorts by relevance descending, breaking ties by most recent `created_at`.
///
/// Records without a score rank below any scored record.
pub fn rank_records(records: &mut [MemoryRecord]) {
    records.sort_by(|a, b| {
        score_of(b)
            .partial_cmp(&score_of(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use convoflow_test_utils::{MemoryCall, MockMemory};

    fn record(id: &str, content: &str, score: Option<f64>, age_days: i64) -> MemoryRecord {
        MemoryRecord {
            id: id.into(),
            user_id: "alice".into(),
            content: content.into(),
            created_at: Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
                - Duration::days(age_days),
            relevance_score: score,
        }
    }

    fn retriever(memory: Arc<MockMemory>) -> TieredRetriever {
        TieredRetriever::new(memory, &RetrievalConfig::default())
    }

    #[test]
    fn rank_orders_by_score_then_recency() {
        let mut records = vec![
            record("old-high", "a", Some(0.9), 10),
            record("low", "b", Some(0.2), 0),
            record("new-high", "c", Some(0.9), 1),
            record("unscored", "d", None, 0),
        ];
        rank_records(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new-high", "old-high", "low", "unscored"]);
    }

    #[test]
    fn rank_unscored_records_newest_first() {
        let mut records = vec![
            record("a", "x", None, 5),
            record("b", "y", None, 1),
            record("c", "z", None, 3),
        ];
        rank_records(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn contextual_hit_short_circuits() {
        let memory = Arc::new(MockMemory::new());
        memory.seed("alice", "Alice drinks green tea every morning").await;

        let result = retriever(memory.clone()).retrieve("alice", "what tea do I drink").await;

        assert_eq!(result.context.tier, RetrievalTier::Contextual);
        assert_eq!(result.context.records.len(), 1);
        assert_eq!(result.reports.len(), 1);
        assert_eq!(result.reports[0].outcome, TierOutcome::Hit(1));

        let calls = memory.calls().await;
        assert_eq!(calls.len(), 1, "later tiers must not run: {calls:?}");
    }

    #[tokio::test]
    async fn zero_memories_walks_every_tier_then_returns_empty() {
        let memory = Arc::new(MockMemory::new());

        let result = retriever(memory.clone()).retrieve("nobody", "hello there").await;

        assert!(result.context.is_empty());
        assert_eq!(result.context.tier, RetrievalTier::Empty);
        let tiers: Vec<RetrievalTier> = result.reports.iter().map(|r| r.tier).collect();
        assert_eq!(
            tiers,
            vec![
                RetrievalTier::Contextual,
                RetrievalTier::Identity,
                RetrievalTier::Comprehensive
            ]
        );
        assert!(result.reports.iter().all(|r| r.outcome == TierOutcome::Miss));

        let calls = memory.calls().await;
        assert!(
            matches!(calls.last(), Some(MemoryCall::ListRecent { .. })),
            "comprehensive listing must be attempted last: {calls:?}"
        );
    }

    #[tokio::test]
    async fn comprehensive_tier_catches_unmatched_memories() {
        let memory = Arc::new(MockMemory::new());
        memory.seed("alice", "Owns a cat called Miso").await;

        let result = retriever(memory).retrieve("alice", "weather forecast").await;

        assert_eq!(result.context.tier, RetrievalTier::Comprehensive);
        assert_eq!(result.context.records[0].content, "Owns a cat called Miso");
    }

    #[tokio::test]
    async fn identity_tier_matches_name_details() {
        let memory = Arc::new(MockMemory::new());
        memory.seed("alice", "User name is Alice").await;

        let result = retriever(memory).retrieve("alice", "recommend a film").await;

        assert_eq!(result.context.tier, RetrievalTier::Identity);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn search_failure_falls_back_and_is_logged() {
        let memory = Arc::new(MockMemory::new());
        memory.seed("alice", "Owns a cat called Miso").await;
        memory.fail_search(true);

        let result = retriever(memory).retrieve("alice", "cat").await;

        assert_eq!(result.context.tier, RetrievalTier::Comprehensive);
        assert!(matches!(result.reports[0].outcome, TierOutcome::Error(_)));
        assert!(matches!(result.reports[1].outcome, TierOutcome::Error(_)));
        assert!(logs_contain("memory tier failed, falling back"));
    }

    #[tokio::test]
    async fn total_outage_yields_empty_context() {
        let memory = Arc::new(MockMemory::new());
        memory.fail_search(true);
        memory.fail_list(true);

        let result = retriever(memory).retrieve("alice", "anything").await;

        assert!(result.context.is_empty());
        assert_eq!(result.reports.len(), 3);
    }

    #[tokio::test]
    async fn blank_records_are_not_usable() {
        let memory = Arc::new(MockMemory::new());
        memory.seed("alice", "   ").await;

        let result = retriever(memory).retrieve("alice", "hello").await;
        assert!(result.context.is_empty());
    }

    #[tokio::test]
    async fn list_all_and_has_memories() {
        let memory = Arc::new(MockMemory::new());
        let retriever = retriever(memory.clone());
        assert!(!retriever.has_memories("alice").await.unwrap());

        memory.seed("alice", "first").await;
        memory.seed("alice", "second").await;

        assert!(retriever.has_memories("alice").await.unwrap());
        let all = retriever.list_all("alice").await.unwrap();
        let contents: Vec<&str> = all.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn welcome_memories_degrade_on_failure() {
        let memory = Arc::new(MockMemory::new());
        memory.seed("alice", "User name is Alice").await;
        memory.fail_search(true);

        assert!(retriever(memory).welcome_memories("alice").await.is_empty());
    }
}
