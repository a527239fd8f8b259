// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Convoflow relay agent.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, environment variable overrides, credential
//! resolution, and diagnostic error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use convoflow_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Joining room: {}", config.transport.room);
//! ```

pub mod credentials;
pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use credentials::{Credentials, resolve_credentials};
pub use diagnostic::{ConfigError, ConfigSource, locate_errors, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::ConvoflowConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// 1. Loads config from TOML files + env vars via Figment
/// 2. On success: runs post-deserialization validation
/// 3. On Figment error: converts to miette diagnostics with typo suggestions
pub fn load_and_validate() -> Result<ConvoflowConfig, Vec<ConfigError>> {
    checked(loader::load_config(), &config_sources(None))
}

/// Load configuration from a specific TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<ConvoflowConfig, Vec<ConfigError>> {
    let sources = vec![("<inline>".to_string(), toml_content.to_string())];
    checked(loader::load_config_from_str(toml_content), &sources)
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(
    path: &std::path::Path,
) -> Result<ConvoflowConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), &config_sources(Some(path)))
}

fn checked(
    loaded: Result<ConvoflowConfig, figment::Error>,
    sources: &[ConfigSource],
) -> Result<ConvoflowConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => match validation::validate_config(&config) {
            Ok(()) => Ok(config),
            Err(errors) => Err(locate_errors(errors, sources)),
        },
        Err(err) => Err(diagnostic::figment_to_config_errors(err, sources)),
    }
}

/// Contents of the config files that feed the loaded configuration, highest
/// priority first, for pointing diagnostics at the offending line.
///
/// With an explicit `path` only that file is read; otherwise the XDG
/// hierarchy is searched.
pub fn config_sources(path: Option<&std::path::Path>) -> Vec<ConfigSource> {
    if let Some(path) = path {
        return std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default();
    }

    let mut sources = Vec::new();

    if let Ok(content) = std::fs::read_to_string(loader::CONFIG_FILE_NAME) {
        let path = std::env::current_dir()
            .map(|d| d.join(loader::CONFIG_FILE_NAME).display().to_string())
            .unwrap_or_else(|_| loader::CONFIG_FILE_NAME.to_string());
        sources.push((path, content));
    }

    if let Some(path) = loader::user_config_path() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            sources.push((path.display().to_string(), content));
        }
    }

    let system_path = loader::system_config_path();
    if let Ok(content) = std::fs::read_to_string(&system_path) {
        sources.push((system_path.display().to_string(), content));
    }

    sources
}
