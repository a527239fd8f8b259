// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty identities, positive result caps, and sane sampling values.

use crate::diagnostic::ConfigError;
use crate::model::ConvoflowConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ConvoflowConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    require_non_empty(&mut errors, "agent.identity", &config.agent.identity);
    require_non_empty(&mut errors, "transport.room", &config.transport.room);
    require_non_empty(&mut errors, "completion.model", &config.completion.model);
    require_non_empty(&mut errors, "completion.base_url", &config.completion.base_url);
    require_non_empty(&mut errors, "memory.base_url", &config.memory.base_url);

    if !LOG_LEVELS.contains(&config.agent.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::validation(
            "agent.log_level",
            format!(
                "agent.log_level `{}` must be one of {}",
                config.agent.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config
        .agent
        .ignored_identity_markers
        .iter()
        .any(|m| m.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "agent.ignored_identity_markers",
            "agent.ignored_identity_markers must not contain empty markers",
        ));
    }

    require_positive(&mut errors, "agent.heartbeat_secs", config.agent.heartbeat_secs);
    require_positive(&mut errors, "agent.drain_timeout_secs", config.agent.drain_timeout_secs);
    require_positive(
        &mut errors,
        "agent.session_queue_depth",
        config.agent.session_queue_depth as u64,
    );
    require_positive(&mut errors, "transport.token_ttl_secs", config.transport.token_ttl_secs);
    require_positive(&mut errors, "completion.timeout_secs", config.completion.timeout_secs);
    require_positive(&mut errors, "memory.timeout_secs", config.memory.timeout_secs);
    require_positive(
        &mut errors,
        "completion.max_output_tokens",
        u64::from(config.completion.max_output_tokens),
    );

    let retrieval = &config.retrieval;
    for (key, value) in [
        ("retrieval.top_k", retrieval.top_k),
        ("retrieval.identity_limit", retrieval.identity_limit),
        ("retrieval.comprehensive_limit", retrieval.comprehensive_limit),
        ("retrieval.welcome_limit", retrieval.welcome_limit),
        ("retrieval.dump_limit", retrieval.dump_limit),
    ] {
        require_positive(&mut errors, key, value as u64);
    }

    if retrieval.identity_queries.iter().all(|q| q.trim().is_empty()) {
        errors.push(ConfigError::validation(
            "retrieval.identity_queries",
            "retrieval.identity_queries must contain at least one non-empty query",
        ));
    }

    let temperature = config.completion.temperature;
    if !(0.0..=2.0).contains(&temperature) {
        errors.push(ConfigError::validation(
            "completion.temperature",
            format!("completion.temperature must be between 0.0 and 2.0, got {temperature}"),
        ));
    }

    if let Some(url) = &config.transport.url {
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            errors.push(ConfigError::validation(
                "transport.url",
                format!("transport.url `{url}` must use the ws:// or wss:// scheme"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn require_non_empty(errors: &mut Vec<ConfigError>, key: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ConfigError::validation(key, format!("{key} must not be empty")));
    }
}

fn require_positive(errors: &mut Vec<ConfigError>, key: &str, value: u64) {
    if value == 0 {
        errors.push(ConfigError::validation(key, format!("{key} must be at least 1")));
    }
}
