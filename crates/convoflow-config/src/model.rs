// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Convoflow relay agent.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.
//!
//! Secrets are held as [`SecretString`]: they redact themselves in `Debug`
//! output and are never serialized back out.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Top-level Convoflow configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values. Credentials left
/// unset here are resolved from well-known environment variables at startup
/// (see [`crate::credentials`]).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConvoflowConfig {
    /// Agent identity and behavior settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Real-time room transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Language-model completion settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Persistent memory service settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Tiered memory retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Agent identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent, used in the default system prompt.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Participant identity the agent joins the room with.
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline system prompt. Falls back to a built-in conversational prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Senders whose identity contains any of these markers (case-insensitive)
    /// are ignored, so agents sharing a room never answer each other.
    #[serde(default = "default_ignored_identity_markers")]
    pub ignored_identity_markers: Vec<String>,

    /// Interval between liveness heartbeat log lines.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// How long shutdown waits for in-flight session work and write-backs.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Messages a sender may have queued before the agent answers with the
    /// busy reply instead of queueing more.
    #[serde(default = "default_session_queue_depth")]
    pub session_queue_depth: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            identity: default_identity(),
            log_level: default_log_level(),
            system_prompt: None,
            ignored_identity_markers: default_ignored_identity_markers(),
            heartbeat_secs: default_heartbeat_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
            session_queue_depth: default_session_queue_depth(),
        }
    }
}

fn default_agent_name() -> String {
    "convoflow".to_string()
}

fn default_identity() -> String {
    "gemini-agent".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ignored_identity_markers() -> Vec<String> {
    vec!["agent".to_string(), "bot".to_string()]
}

fn default_heartbeat_secs() -> u64 {
    10
}

fn default_drain_timeout_secs() -> u64 {
    10
}

fn default_session_queue_depth() -> usize {
    16
}

/// Real-time room transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// WebSocket endpoint of the room service. Falls back to `LIVEKIT_URL`.
    #[serde(default)]
    pub url: Option<String>,

    /// API key used as the access-token issuer. Falls back to `LIVEKIT_API_KEY`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Secret used to sign the access token. Falls back to `LIVEKIT_API_SECRET`.
    #[serde(default, skip_serializing)]
    pub api_secret: Option<SecretString>,

    /// Room to join.
    #[serde(default = "default_room")]
    pub room: String,

    /// Lifetime of the agent's access token.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Deliver replies only to the sender instead of the whole room.
    #[serde(default)]
    pub direct_replies: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            api_secret: None,
            room: default_room(),
            token_ttl_secs: default_token_ttl_secs(),
            direct_replies: false,
        }
    }
}

fn default_room() -> String {
    "chat-room".to_string()
}

fn default_token_ttl_secs() -> u64 {
    3600
}

/// Language-model completion configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompletionConfig {
    /// Gemini API key. Falls back to `GEMINI_API_KEY`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Base URL of the Generative Language API.
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Upper bound on generated tokens per reply.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Sampling temperature (0.0 to 2.0).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-call deadline, retries included.
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_completion_base_url(),
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_output_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.7
}

fn default_completion_timeout_secs() -> u64 {
    30
}

/// Persistent memory service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Memory service API key. Falls back to `MEM0_API_KEY`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Base URL of the memory REST API.
    #[serde(default = "default_memory_base_url")]
    pub base_url: String,

    /// Per-call deadline.
    #[serde(default = "default_memory_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_memory_base_url(),
            timeout_secs: default_memory_timeout_secs(),
        }
    }
}

fn default_memory_base_url() -> String {
    "https://api.mem0.ai".to_string()
}

fn default_memory_timeout_secs() -> u64 {
    10
}

/// Tiered memory retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Result cap for the contextual (utterance) search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Fixed queries used by the identity/preference fallback.
    #[serde(default = "default_identity_queries")]
    pub identity_queries: Vec<String>,

    /// Result cap per identity query.
    #[serde(default = "default_identity_limit")]
    pub identity_limit: usize,

    /// Size of the most-recent slice used by the comprehensive fallback.
    #[serde(default = "default_comprehensive_limit")]
    pub comprehensive_limit: usize,

    /// Memories consulted when greeting a returning user.
    #[serde(default = "default_welcome_limit")]
    pub welcome_limit: usize,

    /// Maximum memories listed by the dump command.
    #[serde(default = "default_dump_limit")]
    pub dump_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            identity_queries: default_identity_queries(),
            identity_limit: default_identity_limit(),
            comprehensive_limit: default_comprehensive_limit(),
            welcome_limit: default_welcome_limit(),
            dump_limit: default_dump_limit(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_identity_queries() -> Vec<String> {
    vec![
        "user name and personal details".to_string(),
        "user preferences, likes and interests".to_string(),
    ]
}

fn default_identity_limit() -> usize {
    5
}

fn default_comprehensive_limit() -> usize {
    20
}

fn default_welcome_limit() -> usize {
    3
}

fn default_dump_limit() -> usize {
    50
}
