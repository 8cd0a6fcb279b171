// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind addresses, non-empty paths, and well-formed gateway URLs.

use crate::diagnostic::ConfigError;
use crate::model::ZapdeskConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ZapdeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.server.port == 0 {
        errors.push(ConfigError::Validation {
            message: "server.port must not be 0".to_string(),
        });
    }

    if let Some(url) = &config.server.public_url {
        check_url(&mut errors, "server.public_url", url);
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.media.root_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "media.root_dir must not be empty".to_string(),
        });
    }
    check_url(&mut errors, "media.public_base_url", &config.media.public_base_url);
    if config.media.max_bytes == 0 {
        errors.push(ConfigError::Validation {
            message: "media.max_bytes must be greater than 0".to_string(),
        });
    }

    if let Some(url) = &config.automation.flow_service_url {
        check_url(&mut errors, "automation.flow_service_url", url);
    }

    for (section, url) in [
        ("baileys", &config.baileys.api_url),
        ("evolution", &config.evolution.api_url),
        ("waha", &config.waha.api_url),
        ("wppconnect", &config.wppconnect.api_url),
    ] {
        if let Some(url) = url {
            check_url(&mut errors, &format!("{section}.api_url"), url);
        }
    }

    check_url(&mut errors, "meta.graph_api_url", &config.meta.graph_api_url);

    if config.management.qr_retry_attempts < 1 {
        errors.push(ConfigError::Validation {
            message: "management.qr_retry_attempts must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ConfigError>, key: &str, url: &str) {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(ConfigError::Validation {
            message: format!("{key} `{url}` must start with http:// or https://"),
        });
    }
}
