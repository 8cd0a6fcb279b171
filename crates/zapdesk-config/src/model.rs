// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for zapdesk.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level zapdesk configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ZapdeskConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Media ingestion and blob storage settings.
    #[serde(default)]
    pub media: MediaConfig,

    /// Chatbot flow-execution service settings.
    #[serde(default)]
    pub automation: AutomationConfig,

    /// Baileys gateway credentials.
    #[serde(default)]
    pub baileys: GatewayApiConfig,

    /// Evolution API credentials.
    #[serde(default)]
    pub evolution: GatewayApiConfig,

    /// WAHA credentials.
    #[serde(default)]
    pub waha: GatewayApiConfig,

    /// WPPConnect server credentials.
    #[serde(default)]
    pub wppconnect: WppConnectConfig,

    /// Meta WhatsApp Cloud API settings.
    #[serde(default)]
    pub meta: MetaConfig,

    /// Instance management behavior.
    #[serde(default)]
    pub management: ManagementConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL, used to register provider webhooks.
    #[serde(default)]
    pub public_url: Option<String>,

    /// Bearer token for management routes. `None` rejects all management calls.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
            bearer_token: None,
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// Base URL webhooks are registered under.
    pub fn webhook_base_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
            .trim_end_matches('/')
            .to_string()
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("zapdesk").join("zapdesk.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("zapdesk.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Media ingestion configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    /// Directory backing the `whatsapp-media` bucket.
    #[serde(default = "default_media_root")]
    pub root_dir: String,

    /// Public base URL objects are served from.
    #[serde(default = "default_media_public_base_url")]
    pub public_base_url: String,

    /// Timeout for downloading remote media.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Largest attachment accepted, in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root_dir: default_media_root(),
            public_base_url: default_media_public_base_url(),
            download_timeout_secs: default_download_timeout_secs(),
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_media_root() -> String {
    dirs::data_dir()
        .map(|p| p.join("zapdesk").join("whatsapp-media"))
        .unwrap_or_else(|| std::path::PathBuf::from("whatsapp-media"))
        .to_string_lossy()
        .into_owned()
}

fn default_media_public_base_url() -> String {
    "http://127.0.0.1:8080/media".to_string()
}

fn default_download_timeout_secs() -> u64 {
    30
}

fn default_max_bytes() -> usize {
    64 * 1024 * 1024
}

/// Flow-execution service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AutomationConfig {
    /// Endpoint of the flow-execution service. `None` disables triggering.
    #[serde(default)]
    pub flow_service_url: Option<String>,

    /// Bearer token sent to the flow-execution service.
    #[serde(default)]
    pub flow_service_token: Option<String>,

    /// Whether conversations created by webhooks start with the bot active.
    #[serde(default = "default_bot_active")]
    pub bot_active_on_new_conversations: bool,

    /// Timeout for a single trigger call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            flow_service_url: None,
            flow_service_token: None,
            bot_active_on_new_conversations: default_bot_active(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bot_active() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Base URL plus API key for a self-hosted gateway.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayApiConfig {
    /// Base URL of the gateway REST API. `None` disables management calls.
    #[serde(default)]
    pub api_url: Option<String>,

    /// API key sent with every management call.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for GatewayApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayApiConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// WPPConnect server configuration.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WppConnectConfig {
    /// Base URL of the WPPConnect server.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Server secret key used to mint per-session tokens.
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl std::fmt::Debug for WppConnectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WppConnectConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Meta WhatsApp Cloud API configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetaConfig {
    /// Token expected in the `hub.verify_token` handshake. Falls back to the
    /// `meta_verify_token` system setting when unset.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// App secret for `X-Hub-Signature-256` checks. `None` skips the check.
    #[serde(default)]
    pub app_secret: Option<String>,

    /// Graph API base URL.
    #[serde(default = "default_graph_api_url")]
    pub graph_api_url: String,

    /// Graph API version segment.
    #[serde(default = "default_graph_api_version")]
    pub graph_api_version: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            verify_token: None,
            app_secret: None,
            graph_api_url: default_graph_api_url(),
            graph_api_version: default_graph_api_version(),
        }
    }
}

impl std::fmt::Debug for MetaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaConfig")
            .field("verify_token", &self.verify_token.as_ref().map(|_| "[redacted]"))
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[redacted]"))
            .field("graph_api_url", &self.graph_api_url)
            .field("graph_api_version", &self.graph_api_version)
            .finish()
    }
}

fn default_graph_api_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_api_version() -> String {
    "v21.0".to_string()
}

/// Instance management configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ManagementConfig {
    /// How many times to poll for a QR code after creating a session.
    #[serde(default = "default_qr_retry_attempts")]
    pub qr_retry_attempts: u32,

    /// Delay between QR polls, in milliseconds.
    #[serde(default = "default_qr_retry_delay_ms")]
    pub qr_retry_delay_ms: u64,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            qr_retry_attempts: default_qr_retry_attempts(),
            qr_retry_delay_ms: default_qr_retry_delay_ms(),
        }
    }
}

fn default_qr_retry_attempts() -> u32 {
    3
}

fn default_qr_retry_delay_ms() -> u64 {
    1000
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Expose `/metrics` in Prometheus text format.
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}
