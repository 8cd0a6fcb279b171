// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by every zapdesk crate.
//!
//! Enumerations are persisted as their snake_case string form (via `strum`),
//! so `Display`/`FromStr` must stay stable across releases.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Current UTC time formatted the way every table stores timestamps.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Generate a new random entity identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Blob,
    Gateway,
    Automation,
    Observability,
}

/// A third-party WhatsApp gateway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Baileys,
    Evolution,
    Waha,
    WppConnect,
    Meta,
}

impl Provider {
    /// Every supported provider, in routing order.
    pub const ALL: [Provider; 5] = [
        Provider::Baileys,
        Provider::Evolution,
        Provider::Waha,
        Provider::WppConnect,
        Provider::Meta,
    ];
}

/// Canonical three-state connection lifecycle.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// CRM state of a conversation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    New,
    InProgress,
    Resolved,
    Archived,
}

impl ConversationStatus {
    /// Closed conversations are reopened to `New` by fresh activity.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Resolved | Self::Archived)
    }
}

/// Kind of content carried by a message.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Audio,
    Video,
    Document,
}

impl MessageType {
    /// Text stored in place of the body when media could not be kept.
    pub fn placeholder(self) -> &'static str {
        match self {
            MessageType::Text => "",
            MessageType::Image => "[Imagem]",
            MessageType::Audio => "[Áudio]",
            MessageType::Video => "[Vídeo]",
            MessageType::Document => "[Documento]",
        }
    }

    /// Top-level MIME family, used to build storage paths.
    pub fn media_folder(self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Audio => "audio",
            MessageType::Video => "video",
            MessageType::Document => "document",
        }
    }
}

/// Who authored a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Agent,
    Contact,
    Bot,
}

/// Per-message delivery progress reported by a gateway.
///
/// Ordered: a receipt only advances state, and `Failed` is terminal.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    fn rank(self) -> u8 {
        match self {
            DeliveryStatus::Pending => 0,
            DeliveryStatus::Sent => 1,
            DeliveryStatus::Delivered => 2,
            DeliveryStatus::Read => 3,
            DeliveryStatus::Failed => 4,
        }
    }

    /// Whether moving from `current` to `self` is a forward transition.
    pub fn advances(self, current: DeliveryStatus) -> bool {
        if current == DeliveryStatus::Failed {
            return false;
        }
        self.rank() > current.rank()
    }
}

/// How trustworthy a contact's display name is.
///
/// Only `Unknown` and `Placeholder` names may be replaced by a name the
/// gateway reports later.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NameQuality {
    #[default]
    Unknown,
    Placeholder,
    Verified,
}

/// Filler names written by older importers and chatbot flows.
pub const LEGACY_PLACEHOLDER_NAMES: &[&str] = &["Contato Desconhecido", "Chatbot Whats"];

impl NameQuality {
    /// Grade a stored name for rows that predate the `name_quality` column.
    pub fn classify(name: &str, identifiers: &[Option<&str>]) -> NameQuality {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return NameQuality::Unknown;
        }
        let is_identifier = identifiers
            .iter()
            .flatten()
            .any(|id| *id == trimmed || trimmed.trim_start_matches('+') == *id);
        let is_filler = LEGACY_PLACEHOLDER_NAMES
            .iter()
            .any(|filler| filler.eq_ignore_ascii_case(trimmed));
        if is_identifier || is_filler {
            NameQuality::Placeholder
        } else {
            NameQuality::Verified
        }
    }

    /// Whether a better name may overwrite one of this quality.
    pub fn is_replaceable(self) -> bool {
        !matches!(self, NameQuality::Verified)
    }
}

/// Provider-specific session details stored with a connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(rename = "sessionName", default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(rename = "phoneNumberId", default, skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    #[serde(rename = "accessToken", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One configured WhatsApp session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub connection_type: String,
    pub provider: Provider,
    pub status: ConnectionStatus,
    pub qr_code: Option<String>,
    pub phone_number: Option<String>,
    pub session_data: SessionData,
    pub tenant_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Connection {
    /// Build a fresh, disconnected WhatsApp connection.
    pub fn new(name: impl Into<String>, provider: Provider) -> Self {
        let now = now_timestamp();
        Self {
            id: new_id(),
            name: name.into(),
            connection_type: "whatsapp".to_string(),
            provider,
            status: ConnectionStatus::Disconnected,
            qr_code: None,
            phone_number: None,
            session_data: SessionData::default(),
            tenant_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Name of the provider-side session; falls back to the connection name.
    pub fn session_name(&self) -> &str {
        self.session_data
            .session_name
            .as_deref()
            .unwrap_or(&self.name)
    }
}

/// A WhatsApp identity known to the CRM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub name_quality: NameQuality,
    pub phone: Option<String>,
    pub whatsapp_lid: Option<String>,
    pub status: String,
    pub tenant_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// The thread between one connection and one contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub contact_id: String,
    pub connection_id: String,
    pub status: ConversationStatus,
    pub last_message_at: Option<String>,
    pub unread_count: i64,
    pub is_bot_active: bool,
    pub kanban_column_id: Option<String>,
    pub active_flow_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One persisted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub sender_type: SenderType,
    pub external_id: Option<String>,
    pub is_read: bool,
    pub delivery_status: Option<DeliveryStatus>,
    pub created_at: String,
}

/// A bulk-send campaign with aggregate delivery counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub sent_count: i64,
    pub delivered_count: i64,
    pub read_count: i64,
    pub failed_count: i64,
    pub created_at: String,
}

/// Per-recipient delivery tracking for a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignContact {
    pub id: String,
    pub campaign_id: String,
    pub contact_id: String,
    /// Provider message id of the outbound campaign message.
    pub message_id: Option<String>,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn provider_round_trips_lowercase() {
        for provider in Provider::ALL {
            let s = provider.to_string();
            assert_eq!(s, s.to_lowercase());
            assert_eq!(Provider::from_str(&s).unwrap(), provider);
        }
        assert_eq!(Provider::WppConnect.to_string(), "wppconnect");
        assert_eq!(Provider::from_str("WAHA").unwrap(), Provider::Waha);
    }

    #[test]
    fn conversation_status_closed_states() {
        assert!(ConversationStatus::Resolved.is_closed());
        assert!(ConversationStatus::Archived.is_closed());
        assert!(!ConversationStatus::New.is_closed());
        assert!(!ConversationStatus::InProgress.is_closed());
        assert_eq!(ConversationStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn delivery_status_only_moves_forward() {
        assert!(DeliveryStatus::Delivered.advances(DeliveryStatus::Sent));
        assert!(DeliveryStatus::Read.advances(DeliveryStatus::Delivered));
        assert!(!DeliveryStatus::Delivered.advances(DeliveryStatus::Read));
        assert!(!DeliveryStatus::Read.advances(DeliveryStatus::Read));
        assert!(DeliveryStatus::Failed.advances(DeliveryStatus::Read));
        assert!(!DeliveryStatus::Read.advances(DeliveryStatus::Failed));
    }

    #[test]
    fn name_quality_classifies_fillers_and_identifiers() {
        let phone = Some("5511999999999");
        assert_eq!(
            NameQuality::classify("5511999999999", &[phone]),
            NameQuality::Placeholder
        );
        assert_eq!(
            NameQuality::classify("+5511999999999", &[phone]),
            NameQuality::Placeholder
        );
        assert_eq!(
            NameQuality::classify("contato desconhecido", &[phone]),
            NameQuality::Placeholder
        );
        assert_eq!(NameQuality::classify("  ", &[phone]), NameQuality::Unknown);
        assert_eq!(NameQuality::classify("Maria", &[phone]), NameQuality::Verified);
        assert!(!NameQuality::Verified.is_replaceable());
    }

    #[test]
    fn session_data_keeps_unknown_keys() {
        let json = r#"{"sessionName":"s1","engine":"WEBJS","webhookId":"abc"}"#;
        let data: SessionData = serde_json::from_str(json).unwrap();
        assert_eq!(data.session_name.as_deref(), Some("s1"));
        assert_eq!(data.extra.get("webhookId").unwrap(), "abc");
        let back = serde_json::to_string(&data).unwrap();
        assert!(back.contains("webhookId"));
    }

    #[test]
    fn connection_session_name_falls_back_to_name() {
        let mut conn = Connection::new("vendas", Provider::Baileys);
        assert_eq!(conn.session_name(), "vendas");
        conn.session_data.session_name = Some("vendas-01".into());
        assert_eq!(conn.session_name(), "vendas-01");
    }

    #[test]
    fn new_ids_are_unique() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
