// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical, provider-agnostic webhook events.
//!
//! Provider adapters decode their own wire formats and emit [`Envelope`]s.
//! Nothing downstream of an adapter ever looks at raw provider JSON.

use serde::Serialize;

use crate::identity;
use crate::types::{ConnectionStatus, DeliveryStatus, MessageType};

/// How a webhook locates the [`crate::types::Connection`] it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum RouteKey {
    /// Match `session_data.sessionName` (falls back to the connection name).
    SessionName(String),
    /// Match the connection `name` column.
    ConnectionName(String),
    /// Match `session_data.phoneNumberId` (Meta Cloud API).
    PhoneNumberId(String),
}

impl RouteKey {
    /// The raw routing value, for logging.
    pub fn value(&self) -> &str {
        match self {
            RouteKey::SessionName(v) | RouteKey::ConnectionName(v) | RouteKey::PhoneNumberId(v) => v,
        }
    }
}

/// A batch of events that all target the same connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub route: RouteKey,
    pub events: Vec<InboundEvent>,
}

impl Envelope {
    pub fn new(route: RouteKey, events: Vec<InboundEvent>) -> Self {
        Self { route, events }
    }

    pub fn single(route: RouteKey, event: InboundEvent) -> Self {
        Self {
            route,
            events: vec![event],
        }
    }
}

/// One normalized intent extracted from a webhook.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// The provider session changed state.
    ConnectionStatusChanged {
        status: ConnectionStatus,
        phone_number: Option<String>,
    },
    /// A new QR code is waiting to be scanned. Always implies `Connecting`.
    QrCodeUpdated { qr_code: String },
    /// An inbound or outbound chat message.
    Message(InboundMessage),
    /// A delivery/read receipt for a message sent earlier.
    DeliveryReceipt(DeliveryReceipt),
}

impl InboundEvent {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::ConnectionStatusChanged { .. } => "connection_status",
            InboundEvent::QrCodeUpdated { .. } => "qr_update",
            InboundEvent::Message(_) => "message",
            InboundEvent::DeliveryReceipt(_) => "delivery_receipt",
        }
    }
}

/// A chat message in canonical form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundMessage {
    /// Remote address exactly as the provider sent it (JID, phone, or LID).
    pub remote_jid: String,
    /// Real phone number the provider sent alongside a LID address, if any.
    pub alt_phone: Option<String>,
    /// Display name reported by the sender's device.
    pub push_name: Option<String>,
    pub body: String,
    pub message_type: MessageType,
    pub media: Option<MediaRef>,
    /// Provider message id, the natural de-duplication key.
    pub external_id: Option<String>,
    /// Unix seconds as reported by the provider.
    pub timestamp: Option<i64>,
    pub from_me: bool,
}

impl InboundMessage {
    /// Group chats and broadcast lists never reach identity resolution.
    pub fn is_group_or_broadcast(&self) -> bool {
        identity::is_group_or_broadcast(&self.remote_jid)
    }

    /// Whether there is anything worth persisting.
    ///
    /// A media message counts even without a fetchable reference; it is
    /// stored with its type placeholder.
    pub fn has_content(&self) -> bool {
        !self.body.trim().is_empty()
            || self.media.is_some()
            || self.message_type != MessageType::Text
    }
}

/// Where the bytes of an attachment can be found.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaRef {
    /// Base64 payload embedded in the webhook (optionally a `data:` URI).
    Inline {
        data: String,
        mime_type: Option<String>,
        filename: Option<String>,
    },
    /// A URL the gateway exposes for download.
    Remote {
        url: String,
        mime_type: Option<String>,
        filename: Option<String>,
    },
    /// A Meta Graph API media id that must be resolved to a URL first.
    MetaMediaId {
        media_id: String,
        mime_type: Option<String>,
        filename: Option<String>,
    },
}

impl MediaRef {
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            MediaRef::Inline { mime_type, .. }
            | MediaRef::Remote { mime_type, .. }
            | MediaRef::MetaMediaId { mime_type, .. } => mime_type.as_deref(),
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            MediaRef::Inline { filename, .. }
            | MediaRef::Remote { filename, .. }
            | MediaRef::MetaMediaId { filename, .. } => filename.as_deref(),
        }
    }

    /// Pick inline data over a URL; both forms show up in the same payloads.
    pub fn from_parts(
        base64: Option<String>,
        url: Option<String>,
        mime_type: Option<String>,
        filename: Option<String>,
    ) -> Option<MediaRef> {
        match (base64.filter(|b| !b.is_empty()), url.filter(|u| !u.is_empty())) {
            (Some(data), _) => Some(MediaRef::Inline {
                data,
                mime_type,
                filename,
            }),
            (None, Some(url)) if url.starts_with("data:") => Some(MediaRef::Inline {
                data: url,
                mime_type,
                filename,
            }),
            (None, Some(url)) => Some(MediaRef::Remote {
                url,
                mime_type,
                filename,
            }),
            (None, None) => None,
        }
    }
}

/// A per-message delivery receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub external_id: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
}
