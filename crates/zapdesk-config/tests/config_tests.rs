// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the zapdesk configuration system.

use zapdesk_config::diagnostic::{suggest_key, ConfigError};
use zapdesk_config::model::ZapdeskConfig;
use zapdesk_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_zapdesk_config() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 9090
public_url = "https://crm.example.com"
bearer_token = "mgmt-token"
log_level = "debug"

[storage]
database_path = "/tmp/test.db"
wal_mode = false

[media]
root_dir = "/tmp/media"
public_base_url = "https://crm.example.com/media"
download_timeout_secs = 5
max_bytes = 1048576

[automation]
flow_service_url = "https://flows.example.com/execute"
flow_service_token = "flow-token"
bot_active_on_new_conversations = false

[evolution]
api_url = "http://evo:8080"
api_key = "evo-key"

[wppconnect]
api_url = "http://wpp:21465"
secret_key = "THISISMYSECURETOKEN"

[meta]
verify_token = "vt"
app_secret = "shh"

[management]
qr_retry_attempts = 5
qr_retry_delay_ms = 250
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.bearer_token.as_deref(), Some("mgmt-token"));
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.media.max_bytes, 1_048_576);
    assert!(!config.automation.bot_active_on_new_conversations);
    assert_eq!(config.evolution.api_key.as_deref(), Some("evo-key"));
    assert_eq!(config.wppconnect.secret_key.as_deref(), Some("THISISMYSECURETOKEN"));
    assert_eq!(config.meta.verify_token.as_deref(), Some("vt"));
    assert_eq!(config.meta.graph_api_version, "v21.0");
    assert_eq!(config.management.qr_retry_attempts, 5);
    assert!(config.baileys.api_url.is_none());
}

/// Unknown field in a gateway section produces an error naming the key.
#[test]
fn unknown_field_in_evolution_produces_error() {
    let toml = r#"
[evolution]
api_ky = "abc"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("api_ky"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Missing optional sections fall back to defaults.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty config should load");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.log_level, "info");
    assert!(config.storage.wal_mode);
    assert_eq!(config.management.qr_retry_attempts, 3);
    assert_eq!(config.management.qr_retry_delay_ms, 1000);
    assert!(config.automation.flow_service_url.is_none());
    assert!(config.prometheus.enabled);
}

/// `ZAPDESK_META_APP_SECRET` maps to `meta.app_secret`, not `meta.app.secret`.
#[test]
fn dotted_override_sets_underscore_field() {
    use figment::{providers::Serialized, Figment};

    let config: ZapdeskConfig = Figment::new()
        .merge(Serialized::defaults(ZapdeskConfig::default()))
        .merge(("meta.app_secret", "from-env"))
        .extract()
        .expect("should set app_secret via dot notation");

    assert_eq!(config.meta.app_secret.as_deref(), Some("from-env"));
}

/// Later layers override earlier TOML values.
#[test]
fn override_layer_wins_over_toml() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[evolution]
api_url = "http://from-toml"
"#;

    let config: ZapdeskConfig = Figment::new()
        .merge(Serialized::defaults(ZapdeskConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("evolution.api_url", "http://from-env"))
        .extract()
        .expect("should merge override");

    assert_eq!(config.evolution.api_url.as_deref(), Some("http://from-env"));
}

/// Unknown top-level section is rejected.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[telegram]
bot_token = "abc"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn diagnostic_suggests_secret_key() {
    let valid = &["api_url", "secret_key"];
    assert_eq!(suggest_key("secret_kye", valid), Some("secret_key".to_string()));
}

/// load_and_validate_str converts figment errors into UnknownKey diagnostics.
#[test]
fn diagnostic_error_includes_unknown_key_and_suggestion() {
    let toml = r#"
[storage]
wal_mod = true
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail");
    let unknown = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey {
            key,
            suggestion,
            valid_keys,
            ..
        } => Some((key.clone(), suggestion.clone(), valid_keys.clone())),
        _ => None,
    });
    let (key, suggestion, valid_keys) = unknown.expect("should produce UnknownKey");
    assert_eq!(key, "wal_mod");
    assert_eq!(suggestion.as_deref(), Some("wal_mode"));
    assert!(valid_keys.contains("database_path"));
}

#[test]
fn gateway_credential_in_wrong_section_is_explained() {
    let toml = r#"
[evolution]
api_url = "http://evolution:8080"
secret_key = "abc"
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail");
    let error = errors
        .iter()
        .find(|e| matches!(e, ConfigError::UnknownKey { .. }))
        .expect("should produce UnknownKey");
    let ConfigError::UnknownKey { section, hint, span, .. } = error else {
        unreachable!()
    };
    assert_eq!(section, "evolution");
    let hint = hint.as_deref().expect("hint");
    assert!(hint.contains("`api_key`"), "got: {hint}");
    assert!(hint.contains("[wppconnect]"), "got: {hint}");

    let span = span.expect("span into inline source");
    assert_eq!(&toml[span.offset()..span.offset() + span.len()], "secret_key");

    use miette::Diagnostic;
    let help = error.help().expect("help").to_string();
    assert!(help.contains("[evolution] authenticates with `api_key`"), "got: {help}");
    assert!(error.to_string().contains("evolution.secret_key"));
}

#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[server]
port = "not_a_number"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("port"),
        "error should mention type mismatch, got: {err_str}"
    );
}

/// ConfigError implements miette::Diagnostic and renders.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "verify_tokn".to_string(),
        section: "meta".to_string(),
        suggestion: Some("verify_token".to_string()),
        hint: None,
        valid_keys: "verify_token, app_secret".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some());
    let help = error.help().expect("should have help text").to_string();
    assert!(help.contains("did you mean `verify_token`"), "got: {help}");

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("verify_tokn"));
}

#[test]
fn load_and_validate_valid_toml() {
    let toml = r#"
[waha]
api_url = "http://waha:3000"
api_key = "k"
"#;
    let config = load_and_validate_str(toml).expect("valid TOML should validate");
    assert_eq!(config.waha.api_url.as_deref(), Some("http://waha:3000"));
}

#[test]
fn validation_catches_bad_gateway_url() {
    let toml = r#"
[baileys]
api_url = "baileys:3000"
"#;

    let errors = load_and_validate_str(toml).expect_err("bad url should fail");
    assert!(errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("baileys.api_url"))
    }));
}
