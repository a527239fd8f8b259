// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent memory for the Convoflow relay agent.
//!
//! This crate implements [`MemoryAdapter`] for a hosted memory service and
//! provides the [`TieredRetriever`] that turns a user id and an utterance
//! into ranked prompt context.

pub mod client;
pub mod retriever;
pub mod types;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use convoflow_config::model::MemoryConfig;
use convoflow_core::traits::{MemoryAdapter, PluginAdapter};
use convoflow_core::types::{AdapterType, Exchange, HealthStatus, MemoryRecord};
use convoflow_core::ConvoflowError;
use tracing::{debug, info};

use crate::client::MemoryClient;
use crate::types::{AddRequest, ApiMessage, SearchRequest};

pub use retriever::{
    ComprehensiveListing, ContextualSearch, IdentitySearch, Retrieval, RetrievalStrategy,
    TierOutcome, TierReport, TieredRetriever, rank_records,
};

/// Memory adapter backed by the hosted memory REST service.
///
/// Every call is bounded by `memory.timeout_secs`, retries included.
pub struct RemoteMemory {
    client: MemoryClient,
    timeout: Duration,
}

impl RemoteMemory {
    /// Creates the adapter from config and a resolved API key.
    pub fn new(config: &MemoryConfig, api_key: &str) -> Result<Self, ConvoflowError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = MemoryClient::new(api_key, &config.base_url, timeout)?;

        info!(base_url = config.base_url.as_str(), "memory adapter initialized");

        Ok(Self { client, timeout })
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, ConvoflowError>
    where
        F: Future<Output = Result<T, ConvoflowError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ConvoflowError::Timeout {
                duration: self.timeout,
            })?
    }
}

/// Renders an exchange as the two-message transcript the service extracts memories from.
fn exchange_messages(exchange: &Exchange) -> Vec<ApiMessage> {
    vec![
        ApiMessage {
            role: "user".into(),
            content: exchange.user_text.clone(),
        },
        ApiMessage {
            role: "assistant".into(),
            content: exchange.agent_text.clone(),
        },
    ]
}

#[async_trait]
impl PluginAdapter for RemoteMemory {
    fn name(&self) -> &str {
        "remote-memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Memory
    }

    async fn health_check(&self) -> Result<HealthStatus, ConvoflowError> {
        match self.bounded(self.client.ping()).await {
            Ok(status) if status.is_success() => Ok(HealthStatus::Healthy),
            Ok(status) => Ok(HealthStatus::Degraded(format!("ping returned {status}"))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), ConvoflowError> {
        debug!("memory adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl MemoryAdapter for RemoteMemory {
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, ConvoflowError> {
        let request = SearchRequest {
            query: query.to_string(),
            user_id: user_id.to_string(),
            limit,
        };
        let found = self.bounded(self.client.search(&request)).await?;
        Ok(found
            .into_iter()
            .take(limit)
            .map(|m| m.into_record(user_id))
            .collect())
    }

    async fn list_recent(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, ConvoflowError> {
        let listed = self.bounded(self.client.list(user_id)).await?;
        let mut records: Vec<MemoryRecord> =
            listed.into_iter().map(|m| m.into_record(user_id)).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn store(
        &self,
        user_id: &str,
        exchange: &Exchange,
    ) -> Result<Option<String>, ConvoflowError> {
        let request = AddRequest {
            messages: exchange_messages(exchange),
            user_id: user_id.to_string(),
        };
        let id = self.bounded(self.client.add(&request)).await?;
        debug!(user_id, memory_id = ?id, "exchange stored");
        Ok(id)
    }

    async fn delete_all(&self, user_id: &str) -> Result<(), ConvoflowError> {
        self.bounded(self.client.delete_all(user_id)).await?;
        info!(user_id, "all memories deleted");
        Ok(())
    }
}
