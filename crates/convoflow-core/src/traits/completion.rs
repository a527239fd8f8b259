// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion adapter trait for language-model integrations.

use async_trait::async_trait;

use crate::error::ConvoflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::CompletionRequest;

/// Adapter for a language-model completion service.
#[async_trait]
pub trait CompletionAdapter: PluginAdapter {
    /// Produces the reply text for one request.
    ///
    /// A refused or empty completion is reported as
    /// [`ConvoflowError::CompletionService`], never as an empty string.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ConvoflowError>;
}
