// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory adapter trait for the external persistent-memory service.

use async_trait::async_trait;

use crate::error::ConvoflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Exchange, MemoryRecord};

/// Adapter for a per-user persistent memory store.
///
/// All operations are scoped to a `user_id`. An empty result is never an error.
#[async_trait]
pub trait MemoryAdapter: PluginAdapter {
    /// Searches the user's memories, returning at most `limit` scored records.
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, ConvoflowError>;

    /// Lists the user's most recent memories, newest first, without ranking.
    async fn list_recent(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, ConvoflowError>;

    /// Persists one exchange for the user.
    ///
    /// Returns the id assigned by the service, or `None` when the service
    /// accepted the write without assigning one yet.
    async fn store(
        &self,
        user_id: &str,
        exchange: &Exchange,
    ) -> Result<Option<String>, ConvoflowError>;

    /// Deletes every memory owned by the user. Deleting nothing is a success.
    async fn delete_all(&self, user_id: &str) -> Result<(), ConvoflowError>;
}
