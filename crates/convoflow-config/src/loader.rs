// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./convoflow.toml` > `~/.config/convoflow/convoflow.toml` >
//! `/etc/convoflow/convoflow.toml`, with environment variable overrides via the
//! `CONVOFLOW_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::diagnostic::CONFIG_KEYS;
use crate::model::ConvoflowConfig;

/// Config file name searched for in every layer.
pub const CONFIG_FILE_NAME: &str = "convoflow.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/convoflow/convoflow.toml` (system-wide)
/// 3. `~/.config/convoflow/convoflow.toml` (user XDG config)
/// 4. `./convoflow.toml` (local directory)
/// 5. `CONVOFLOW_*` environment variables
pub fn load_config() -> Result<ConvoflowConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ConvoflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConvoflowConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ConvoflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConvoflowConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for standard config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(ConvoflowConfig::default()))
        .merge(Toml::file(system_config_path()));
    if let Some(user_path) = user_config_path() {
        figment = figment.merge(Toml::file(user_path));
    }
    figment
        .merge(Toml::file(CONFIG_FILE_NAME))
        .merge(env_provider())
}

/// Path of the system-wide config file.
pub fn system_config_path() -> PathBuf {
    Path::new("/etc/convoflow").join(CONFIG_FILE_NAME)
}

/// Path of the per-user config file, when the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("convoflow").join(CONFIG_FILE_NAME))
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `CONVOFLOW_TRANSPORT_API_SECRET` must map to
/// `transport.api_secret`, not `transport.api.secret`.
fn env_provider() -> Env {
    Env::prefixed("CONVOFLOW_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name onto a dotted config path.
///
/// Only the leading section name is converted; names that do not start with a
/// known section are returned unchanged so `deny_unknown_fields` reports them.
pub(crate) fn map_env_key(key: &str) -> String {
    for (section, _) in CONFIG_KEYS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
