// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the memory service REST API.
//!
//! Provides [`MemoryClient`] which handles authentication, request
//! construction, and a single retry on transient errors (429, 500, 502, 503).

use std::time::Duration;

use convoflow_core::ConvoflowError;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::types::{AddRequest, AddResponse, ApiErrorResponse, ApiMemory, MemoryList, SearchRequest};

/// HTTP client for memory service communication.
#[derive(Debug, Clone)]
pub struct MemoryClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl MemoryClient {
    /// Creates a new memory service client.
    ///
    /// `timeout` bounds each individual HTTP request.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ConvoflowError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Token {api_key}")).map_err(|e| {
                ConvoflowError::Config(format!("invalid memory API key header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ConvoflowError::MemoryService {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Shortens the delay between retries (for testing with wiremock).
    #[cfg(test)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `POST /v1/memories/search/`
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<ApiMemory>, ConvoflowError> {
        let url = self.url("/v1/memories/search/");
        let response = self
            .send_with_retry("search", || self.client.post(&url).json(request))
            .await?;
        let response = expect_success("search", response).await?;
        parse_json::<MemoryList>("search", response)
            .await
            .map(MemoryList::into_vec)
    }

    /// `GET /v1/memories/?user_id=`
    pub async fn list(&self, user_id: &str) -> Result<Vec<ApiMemory>, ConvoflowError> {
        let url = self.url("/v1/memories/");
        let response = self
            .send_with_retry("list", || self.client.get(&url).query(&[("user_id", user_id)]))
            .await?;
        let response = expect_success("list", response).await?;
        parse_json::<MemoryList>("list", response)
            .await
            .map(MemoryList::into_vec)
    }

    /// `POST /v1/memories/`
    pub async fn add(&self, request: &AddRequest) -> Result<Option<String>, ConvoflowError> {
        let url = self.url("/v1/memories/");
        let response = self
            .send_with_retry("add", || self.client.post(&url).json(request))
            .await?;
        let response = expect_success("add", response).await?;
        let parsed = parse_json::<AddResponse>("add", response).await?;
        Ok(parsed.first_id())
    }

    /// `DELETE /v1/memories/?user_id=`
    ///
    /// A 404 means the user owns no memories and counts as success.
    pub async fn delete_all(&self, user_id: &str) -> Result<(), ConvoflowError> {
        let url = self.url("/v1/memories/");
        let response = self
            .send_with_retry("delete_all", || {
                self.client.delete(&url).query(&[("user_id", user_id)])
            })
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(user_id, "no memories to delete");
            return Ok(());
        }
        expect_success("delete_all", response).await.map(|_| ())
    }

    /// `GET /v1/ping/`, returning the raw status.
    pub async fn ping(&self) -> Result<StatusCode, ConvoflowError> {
        let response = self
            .client
            .get(self.url("/v1/ping/"))
            .send()
            .await
            .map_err(|e| request_error("ping", e))?;
        Ok(response.status())
    }

    /// Sends a request, retrying once after a delay on transient statuses.
    ///
    /// Returns the final response whatever its status; network failures are errors.
    async fn send_with_retry<F>(&self, op: &'static str, build: F) -> Result<Response, ConvoflowError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let response = build()
                .send()
                .await
                .map_err(|e| request_error(op, e))?;

            let status = response.status();
            debug!(op, status = %status, attempt, "memory service response received");

            if is_transient_error(status) && attempt < self.max_retries {
                warn!(op, status = %status, "transient memory service error, will retry");
                attempt += 1;
                tokio::time::sleep(self.retry_delay).await;
                continue;
            }

            return Ok(response);
        }
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

fn request_error(op: &str, e: reqwest::Error) -> ConvoflowError {
    ConvoflowError::MemoryService {
        message: format!("{op} request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

async fn expect_success(op: &str, response: Response) -> Result<Response, ConvoflowError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|e| e.detail)
        .unwrap_or(body);
    let message = if status == StatusCode::TOO_MANY_REQUESTS {
        format!("{op} rate limited: {detail}")
    } else {
        format!("{op} returned {status}: {detail}")
    };
    Err(ConvoflowError::memory(message))
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    op: &str,
    response: Response,
) -> Result<T, ConvoflowError> {
    let body = response.text().await.map_err(|e| ConvoflowError::MemoryService {
        message: format!("failed to read {op} response body: {e}"),
        source: Some(Box::new(e)),
    })?;
    serde_json::from_str(&body).map_err(|e| ConvoflowError::MemoryService {
        message: format!("failed to parse {op} response: {e}"),
        source: Some(Box::new(e)),
    })
}
