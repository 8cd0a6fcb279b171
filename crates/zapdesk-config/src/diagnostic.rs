// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config diagnostics.
//!
//! Figment errors become `miette` reports. Unknown keys get a "did you mean"
//! within their own section and, when the key is valid in a different
//! section, a pointer there. The gateway sections share most key names but
//! not their credential key (`api_key` vs `secret_key`), which is the usual
//! way a zapdesk.toml goes wrong.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a key must beat to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Name used for TOML handed to `load_and_validate_str`.
pub const INLINE_SOURCE: &str = "<inline>";

/// Every section and the keys it accepts.
pub const SECTION_KEYS: &[(&str, &[&str])] = &[
    ("server", &["host", "port", "public_url", "bearer_token", "log_level"]),
    ("storage", &["database_path", "wal_mode"]),
    ("media", &["root_dir", "public_base_url", "download_timeout_secs", "max_bytes"]),
    (
        "automation",
        &[
            "flow_service_url",
            "flow_service_token",
            "bot_active_on_new_conversations",
            "request_timeout_secs",
        ],
    ),
    ("baileys", &["api_url", "api_key"]),
    ("evolution", &["api_url", "api_key"]),
    ("waha", &["api_url", "api_key"]),
    ("wppconnect", &["api_url", "secret_key"]),
    ("meta", &["verify_token", "app_secret", "graph_api_url", "graph_api_version"]),
    ("management", &["qr_retry_attempts", "qr_retry_delay_ms"]),
    ("prometheus", &["enabled"]),
];

const CREDENTIAL_KEYS: &[&str] = &[
    "api_key",
    "secret_key",
    "verify_token",
    "app_secret",
    "bearer_token",
    "flow_service_token",
];

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{}`", qualified(section, key))]
    #[diagnostic(
        code(zapdesk::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), hint.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Enclosing section, empty at the top level.
        section: String,
        /// Closest valid key in the same section.
        suggestion: Option<String>,
        /// Where the key belongs when another section accepts it.
        hint: Option<String>,
        valid_keys: String,
        #[label("not accepted here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(zapdesk::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
    },

    /// A semantic check in [`crate::validation`] failed.
    #[error("validation error: {message}")]
    #[diagnostic(code(zapdesk::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(zapdesk::config::other))]
    Other(String),
}

fn qualified(section: &str, key: &str) -> String {
    if section.is_empty() {
        key.to_string()
    } else {
        format!("{section}.{key}")
    }
}

fn unknown_key_help(suggestion: Option<&str>, hint: Option<&str>, valid_keys: &str) -> String {
    let mut parts = Vec::new();
    if let Some(s) = suggestion {
        parts.push(format!("did you mean `{s}`?"));
    }
    if let Some(h) = hint {
        parts.push(h.to_string());
    }
    parts.push(format!("valid keys: {valid_keys}"));
    parts.join(" ")
}

/// Keys accepted by `section`, or the section names at the top level.
fn keys_of(section: &str) -> Vec<&'static str> {
    if section.is_empty() {
        return SECTION_KEYS.iter().map(|(name, _)| *name).collect();
    }
    SECTION_KEYS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| keys.to_vec())
        .unwrap_or_default()
}

/// Point a misplaced key at the section(s) that accept it.
pub fn section_hint(section: &str, key: &str) -> Option<String> {
    let owners: Vec<String> = SECTION_KEYS
        .iter()
        .filter(|(name, keys)| *name != section && keys.contains(&key))
        .map(|(name, _)| format!("[{name}]"))
        .collect();
    if owners.is_empty() {
        return None;
    }
    let owners = owners.join(", ");

    if section.is_empty() {
        return Some(format!("`{key}` goes under {owners}"));
    }
    let own_credential = keys_of(section)
        .into_iter()
        .find(|k| CREDENTIAL_KEYS.contains(k));
    match own_credential {
        Some(own) if CREDENTIAL_KEYS.contains(&key) => Some(format!(
            "[{section}] authenticates with `{own}`; `{key}` is used by {owners}"
        )),
        _ => Some(format!("`{key}` is a setting of {owners}")),
    }
}

/// Closest valid key by Jaro-Winkler similarity, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|k| (strsim::jaro_winkler(unknown, k), *k))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, k)| k.to_string())
}

/// Convert every error inside a `figment::Error`.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let section = path.first().cloned().unwrap_or_default();
                    let (span, src) = locate(&error, &section, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, expected),
                        hint: section_hint(&section, field),
                        valid_keys: expected.join(", "),
                        section,
                        span,
                        src,
                    }
                }
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: path.join("."),
                    found: actual.to_string(),
                    expected: expected.to_string(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Span of the offending key in whichever TOML file produced it.
fn locate(
    error: &figment::Error,
    section: &str,
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let name = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => path.display().to_string(),
        _ => INLINE_SOURCE.to_string(),
    };
    // Merged tables may carry the defaults' tag; fall back to any source with the key.
    let named = toml_sources.iter().filter(|(p, _)| *p == name);
    let others = toml_sources.iter().filter(|(p, _)| *p != name);
    named
        .chain(others)
        .find_map(|(path, content)| {
            find_key_offset(content, section, field).map(|offset| {
                (
                    Some(SourceSpan::new(offset.into(), field.len())),
                    Some(NamedSource::new(path, content.clone())),
                )
            })
        })
        .unwrap_or((None, None))
}

/// Byte offset of `field` inside `[section]` (or before any header when
/// `section` is empty). Lines under other headers are skipped.
pub fn find_key_offset(content: &str, section: &str, field: &str) -> Option<usize> {
    let mut current = "";
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(header) = trimmed.strip_prefix('[') {
            current = header.split(']').next().unwrap_or_default().trim();
        } else if current == section
            && let Some(rest) = trimmed.strip_prefix(field)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Print every error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
