// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./zapdesk.toml` > `~/.config/zapdesk/zapdesk.toml` > `/etc/zapdesk/zapdesk.toml`
//! with environment variable overrides via `ZAPDESK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::diagnostic::SECTION_KEYS;
use crate::model::ZapdeskConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/zapdesk/zapdesk.toml` (system-wide)
/// 3. `~/.config/zapdesk/zapdesk.toml` (user XDG config)
/// 4. `./zapdesk.toml` (local directory)
/// 5. `ZAPDESK_*` environment variables
pub fn load_config() -> Result<ZapdeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ZapdeskConfig::default()))
        .merge(Toml::file("/etc/zapdesk/zapdesk.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("zapdesk/zapdesk.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("zapdesk.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a specific TOML file path only (no XDG lookup).
///
/// Used for testing and explicit config file specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ZapdeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ZapdeskConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ZapdeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ZapdeskConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ZapdeskConfig::default()))
        .merge(Toml::file("/etc/zapdesk/zapdesk.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("zapdesk/zapdesk.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("zapdesk.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// CRITICAL: Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `ZAPDESK_META_APP_SECRET` must
/// map to `meta.app_secret`, not `meta.app.secret`.
fn env_provider() -> Env {
    Env::prefixed("ZAPDESK_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: ZAPDESK_EVOLUTION_API_KEY -> "evolution_api_key"
        let key_str = key.as_str();
        for (section, _) in SECTION_KEYS {
            if let Some(rest) = key_str.strip_prefix(section)
                && let Some(field) = rest.strip_prefix('_')
            {
                return format!("{section}.{field}").into();
            }
        }
        key_str.to_string().into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_table_covers_every_key() {
        let defaults = figment::providers::Serialized::defaults(ZapdeskConfig::default());
        let value = Figment::from(defaults).extract::<figment::value::Dict>().unwrap();
        for (section, fields) in &value {
            let keys = SECTION_KEYS
                .iter()
                .find(|(name, _)| name == section)
                .map(|(_, keys)| *keys)
                .unwrap_or_else(|| panic!("section `{section}` missing from SECTION_KEYS"));
            let fields = fields.as_dict().expect("section is a table");
            for field in fields.keys() {
                assert!(keys.contains(&field.as_str()), "`{section}.{field}` missing");
            }
        }
    }

    #[test]
    fn env_var_maps_to_section_field() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("ZAPDESK_WPPCONNECT_SECRET_KEY", "s3cr3t");
            let config: ZapdeskConfig = Figment::from(Serialized::defaults(ZapdeskConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.wppconnect.secret_key.as_deref(), Some("s3cr3t"));
            Ok(())
        });
    }
}
