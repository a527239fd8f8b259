// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential resolution for the external services.
//!
//! Each credential is taken from the config file first and from its
//! well-known environment variable second. Every missing credential is
//! reported at once so a single restart fixes them all.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::diagnostic::ConfigError;
use crate::model::ConvoflowConfig;

/// Resolved credentials for the room transport, completion, and memory services.
///
/// The room URL is not a secret; everything else stays wrapped until the
/// client that needs it is built.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub transport_url: String,
    pub transport_api_key: SecretString,
    pub transport_api_secret: SecretString,
    pub completion_api_key: SecretString,
    pub memory_api_key: SecretString,
}

/// Resolve credentials from config, falling back to the process environment.
pub fn resolve_credentials(config: &ConvoflowConfig) -> Result<Credentials, Vec<ConfigError>> {
    resolve_credentials_with(config, |name| std::env::var(name).ok())
}

/// Resolve credentials with an injectable environment lookup.
pub fn resolve_credentials_with<F>(
    config: &ConvoflowConfig,
    env: F,
) -> Result<Credentials, Vec<ConfigError>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();
    let mut resolve = |key: &str, configured: Option<&str>, env_var: &str| -> String {
        if let Some(value) = configured.map(str::trim).filter(|v| !v.is_empty()) {
            return value.to_string();
        }
        match env(env_var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(value) => {
                debug!(key, env_var, "credential resolved from environment");
                value
            }
            None => {
                errors.push(ConfigError::missing_credential(key, env_var));
                String::new()
            }
        }
    };

    let transport_url = resolve("transport.url", config.transport.url.as_deref(), "LIVEKIT_URL");
    let transport_api_key = resolve(
        "transport.api_key",
        exposed(&config.transport.api_key),
        "LIVEKIT_API_KEY",
    );
    let transport_api_secret = resolve(
        "transport.api_secret",
        exposed(&config.transport.api_secret),
        "LIVEKIT_API_SECRET",
    );
    let completion_api_key = resolve(
        "completion.api_key",
        exposed(&config.completion.api_key),
        "GEMINI_API_KEY",
    );
    let memory_api_key = resolve("memory.api_key", exposed(&config.memory.api_key), "MEM0_API_KEY");

    let credentials = Credentials {
        transport_url,
        transport_api_key: SecretString::from(transport_api_key),
        transport_api_secret: SecretString::from(transport_api_secret),
        completion_api_key: SecretString::from(completion_api_key),
        memory_api_key: SecretString::from(memory_api_key),
    };

    if errors.is_empty() {
        Ok(credentials)
    } else {
        Err(errors)
    }
}

fn exposed(secret: &Option<SecretString>) -> Option<&str> {
    secret.as_ref().map(|value| value.expose_secret())
}
