// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config diagnostics rendered through miette.
//!
//! Every error that can be tied to a `section.key` in `convoflow.toml` is
//! pointed at that line. Unknown keys are matched against [`CONFIG_KEYS`]
//! and get a "did you mean?" hint when a known key is close enough.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Every section of `convoflow.toml` and the keys it accepts.
pub const CONFIG_KEYS: &[(&str, &[&str])] = &[
    (
        "agent",
        &[
            "name",
            "identity",
            "log_level",
            "system_prompt",
            "ignored_identity_markers",
            "heartbeat_secs",
            "drain_timeout_secs",
            "session_queue_depth",
        ],
    ),
    (
        "transport",
        &["url", "api_key", "api_secret", "room", "token_ttl_secs", "direct_replies"],
    ),
    (
        "completion",
        &["api_key", "base_url", "model", "max_output_tokens", "temperature", "timeout_secs"],
    ),
    ("memory", &["api_key", "base_url", "timeout_secs"]),
    (
        "retrieval",
        &[
            "top_k",
            "identity_queries",
            "identity_limit",
            "comprehensive_limit",
            "welcome_limit",
            "dump_limit",
        ],
    ),
];

/// A config file together with its display path.
pub type ConfigSource = (String, String);

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key or section that convoflow does not know.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(convoflow::config::unknown_key),
        help("{}", format_unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys accepted where `key` appeared.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(convoflow::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A service credential is set neither in config nor in the environment.
    #[error("missing credential `{key}`")]
    #[diagnostic(
        code(convoflow::config::missing_credential),
        help("set `{key}` in convoflow.toml or export {env_var}")
    )]
    MissingCredential {
        key: String,
        env_var: String,
        #[label("blank here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that parsed but is out of range.
    #[error("validation error: {message}")]
    #[diagnostic(code(convoflow::config::validation))]
    Validation {
        key: String,
        message: String,
        #[label("rejected value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// Catch-all for other configuration errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(convoflow::config::other))]
    Other(String),
}

impl ConfigError {
    /// A validation failure for the dotted key `key`.
    pub fn validation(key: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            message: message.into(),
            span: None,
            src: None,
        }
    }

    /// A credential missing from both config and environment.
    pub fn missing_credential(key: &str, env_var: &str) -> Self {
        Self::MissingCredential {
            key: key.to_string(),
            env_var: env_var.to_string(),
            span: None,
            src: None,
        }
    }

    /// Points the error at its key in `sources`, when the key appears there.
    ///
    /// Sources are searched in order, so pass the highest-priority file first.
    pub fn located(mut self, sources: &[ConfigSource]) -> Self {
        if let Self::Validation { key, span, src, .. }
        | Self::MissingCredential { key, span, src, .. }
        | Self::InvalidType { key, span, src, .. } = &mut self
            && span.is_none()
        {
            let (section, field) = split_key(key);
            for (path, content) in sources {
                if let Some(offset) = find_key_offset(content, &section, field) {
                    *span = Some(SourceSpan::new(offset.into(), field.len()));
                    *src = Some(NamedSource::new(path, content.clone()));
                    break;
                }
            }
        }
        self
    }
}

fn format_unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Attach source spans to every error whose key can be found in `sources`.
pub fn locate_errors(errors: Vec<ConfigError>, sources: &[ConfigSource]) -> Vec<ConfigError> {
    errors.into_iter().map(|e| e.located(sources)).collect()
}

/// Convert a `figment::Error` into a list of `ConfigError` diagnostics.
///
/// A figment error may carry several underlying errors; each one becomes
/// its own diagnostic.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[ConfigSource],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    let mut errors = Vec::new();

    for error in err {
        let path: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
        let config_error = match &error.kind {
            Kind::UnknownField(field, _) => {
                let valid_keys = known_keys(path.first().map(String::as_str));
                let (span, src) = match error_source(&error, sources) {
                    Some((name, content)) => match find_key_offset(content, &path, field) {
                        Some(offset) => (
                            Some(SourceSpan::new(offset.into(), field.len())),
                            Some(NamedSource::new(name, content.clone())),
                        ),
                        None => (None, None),
                    },
                    None => (None, None),
                };
                ConfigError::UnknownKey {
                    key: qualified(&path, field),
                    suggestion: suggest_key(field, &valid_keys),
                    valid_keys: valid_keys.join(", "),
                    span,
                    src,
                }
            }
            Kind::InvalidType(actual, expected) => {
                let key = path.join(".");
                let located: &[ConfigSource] = match error_source(&error, sources) {
                    Some(source) => std::slice::from_ref(source),
                    None => &[],
                };
                ConfigError::InvalidType {
                    key,
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.to_string(),
                    span: None,
                    src: None,
                }
                .located(located)
            }
            _ => ConfigError::Other(format!("{error}")),
        };

        errors.push(config_error);
    }

    errors
}

/// Keys accepted at `section`, or the section names at the top level.
fn known_keys(section: Option<&str>) -> Vec<&'static str> {
    match section {
        None => CONFIG_KEYS.iter().map(|(name, _)| *name).collect(),
        Some(section) => CONFIG_KEYS
            .iter()
            .find(|(name, _)| *name == section)
            .map(|(_, keys)| keys.to_vec())
            .unwrap_or_default(),
    }
}

fn qualified(path: &[String], field: &str) -> String {
    match path.first() {
        Some(section) => format!("{section}.{field}"),
        None => field.to_string(),
    }
}

fn split_key(key: &str) -> (Vec<String>, &str) {
    match key.split_once('.') {
        Some((section, field)) => (vec![section.to_string()], field),
        None => (Vec::new(), key),
    }
}

/// The file an error came from. Inline sources carry no file metadata, so a
/// lone source is assumed to be the origin.
fn error_source<'a>(
    error: &figment::error::Error,
    sources: &'a [ConfigSource],
) -> Option<&'a ConfigSource> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    match file {
        Some(path) => sources.iter().find(|(p, _)| *p == path),
        None if sources.len() == 1 => sources.first(),
        None => None,
    }
}

/// Byte offset of `field` inside the `[section]` named by `path[0]`, or at
/// the top level when `path` is empty.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header).map(|pos| pos + header.len())?
        }
    };

    let mut byte_offset = 0;
    for line in content[search_start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        // Stop at the next section header.
        if path.first().is_some() && trimmed.starts_with('[') {
            return None;
        }
        if let Some(after) = trimmed.strip_prefix(field) {
            if after.starts_with([' ', '=', '\t']) {
                return Some(search_start + byte_offset + (line.len() - trimmed.len()));
            }
        }
        byte_offset += line.len();
    }

    None
}

/// Best Jaro-Winkler match for `unknown` among `valid_keys`, if any clears
/// the threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|&key| (key, strsim::jaro_winkler(unknown, key)))
        .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(key, _)| key.to_string())
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(content: &str) -> Vec<ConfigSource> {
        vec![("<inline>".to_string(), content.to_string())]
    }

    fn span_text<'a>(content: &'a str, span: &SourceSpan) -> &'a str {
        &content[span.offset()..span.offset() + span.len()]
    }

    #[test]
    fn agent_typo_suggests_identity() {
        assert_eq!(
            suggest_key("idenity", &known_keys(Some("agent"))),
            Some("identity".to_string())
        );
    }

    #[test]
    fn retrieval_typo_suggests_top_k() {
        assert_eq!(
            suggest_key("top_kk", &known_keys(Some("retrieval"))),
            Some("top_k".to_string())
        );
    }

    #[test]
    fn section_typo_suggests_section() {
        assert_eq!(suggest_key("retreival", &known_keys(None)), Some("retrieval".to_string()));
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        assert_eq!(suggest_key("zzzzzz", &known_keys(Some("retrieval"))), None);
    }

    #[test]
    fn key_table_covers_every_serialized_key() {
        let value = toml::Value::try_from(crate::ConvoflowConfig::default()).expect("serializable");
        let table = value.as_table().expect("top-level table");
        assert_eq!(table.len(), CONFIG_KEYS.len());
        for (section, keys) in table {
            let known = known_keys(Some(section));
            let keys = keys.as_table().expect("section table");
            for key in keys.keys() {
                assert!(known.contains(&key.as_str()), "{section}.{key} missing from CONFIG_KEYS");
            }
        }
    }

    #[test]
    fn find_key_offset_stays_inside_section() {
        let content = "[agent]\nname = \"x\"\n\n[retrieval]\ntop_k = 3\n";
        let path = vec!["agent".to_string()];
        assert_eq!(find_key_offset(content, &path, "top_k"), None);
        let path = vec!["retrieval".to_string()];
        let o = find_key_offset(content, &path, "top_k").expect("key should be found");
        assert_eq!(&content[o..o + 5], "top_k");
    }

    #[test]
    fn find_key_offset_handles_crlf() {
        let content = "[agent]\r\nname = \"x\"\r\nidenity = \"y\"\r\n";
        let path = vec!["agent".to_string()];
        let o = find_key_offset(content, &path, "idenity").expect("key should be found");
        assert_eq!(&content[o..o + 7], "idenity");
    }

    #[test]
    fn validation_error_points_at_key() {
        let content = "[retrieval]\ntop_k = 0\n";
        let err = ConfigError::validation("retrieval.top_k", "retrieval.top_k must be at least 1")
            .located(&inline(content));
        match err {
            ConfigError::Validation { span: Some(span), src: Some(_), .. } => {
                assert_eq!(span_text(content, &span), "top_k");
            }
            other => panic!("expected located Validation, got {other:?}"),
        }
    }

    #[test]
    fn missing_credential_points_at_blank_value() {
        let content = "[memory]\napi_key = \"  \"\n";
        let err = ConfigError::missing_credential("memory.api_key", "MEM0_API_KEY")
            .located(&inline(content));
        match err {
            ConfigError::MissingCredential { span: Some(span), .. } => {
                assert_eq!(span_text(content, &span), "api_key");
            }
            other => panic!("expected located MissingCredential, got {other:?}"),
        }
    }

    #[test]
    fn absent_key_stays_unlocated() {
        let err = ConfigError::missing_credential("completion.api_key", "GEMINI_API_KEY")
            .located(&inline("[agent]\nname = \"x\"\n"));
        assert!(matches!(err, ConfigError::MissingCredential { span: None, src: None, .. }));
    }

    #[test]
    fn missing_credential_help_names_env_var() {
        let err = ConfigError::missing_credential("completion.api_key", "GEMINI_API_KEY");
        let help = Diagnostic::help(&err).map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("GEMINI_API_KEY"), "got: {help}");
    }
}
