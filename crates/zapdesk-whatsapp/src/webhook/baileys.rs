// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Baileys REST server webhooks.
//!
//! Envelope: `{ "event": "...", "session": "...", "data": { ... } }`.

use serde::Deserialize;
use serde_json::Value;

use zapdesk_core::event::{Envelope, InboundEvent, InboundMessage, MediaRef, RouteKey};
use zapdesk_core::{ConnectionStatus, Provider, WebhookAdapter, ZapdeskError};

use super::{
    decode_body, decode_value, lookup_status, message_type_from_hint, non_empty, qr_data_uri,
    timestamp_secs,
};

/// Baileys connection states.
pub const STATUS_TABLE: &[(&str, ConnectionStatus)] = &[
    ("open", ConnectionStatus::Connected),
    ("connected", ConnectionStatus::Connected),
    ("connecting", ConnectionStatus::Connecting),
    ("qr", ConnectionStatus::Connecting),
    ("close", ConnectionStatus::Disconnected),
    ("closed", ConnectionStatus::Disconnected),
    ("disconnected", ConnectionStatus::Disconnected),
    ("logged_out", ConnectionStatus::Disconnected),
];

pub fn map_status(raw: &str) -> ConnectionStatus {
    lookup_status(STATUS_TABLE, raw)
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(default)]
    event: String,
    #[serde(default, alias = "sessionId")]
    session: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BaileysMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    from_me: bool,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    push_name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    media_url: Option<String>,
    #[serde(default)]
    base64: Option<String>,
    #[serde(default, alias = "mimeType")]
    mimetype: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    sender_pn: Option<String>,
    #[serde(default)]
    timestamp: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionUpdate {
    #[serde(default, alias = "connection", alias = "state")]
    status: Option<String>,
    #[serde(default, alias = "phone", alias = "jid")]
    phone_number: Option<String>,
    #[serde(default)]
    qr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QrUpdate {
    #[serde(alias = "qrcode", alias = "qrCode")]
    qr: String,
}

/// Decoder for Baileys webhooks, routed by `session_data.sessionName`.
pub struct BaileysWebhook;

impl WebhookAdapter for BaileysWebhook {
    fn provider(&self) -> Provider {
        Provider::Baileys
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<Envelope>, ZapdeskError> {
        let body: Body = decode_body(body)?;
        let Some(session) = non_empty(body.session) else {
            return Ok(Vec::new());
        };
        let route = RouteKey::SessionName(session);

        let events = match body.event.as_str() {
            "message" | "messages.upsert" => {
                let msg: BaileysMessage = decode_value(&body.event, body.data)?;
                convert_message(msg).map(InboundEvent::Message).into_iter().collect()
            }
            "connection.update" | "connection" => {
                let update: ConnectionUpdate = decode_value(&body.event, body.data)?;
                connection_events(update)
            }
            "qr" | "qrcode" | "qr.update" => {
                let update: QrUpdate = decode_value(&body.event, body.data)?;
                vec![InboundEvent::QrCodeUpdated {
                    qr_code: qr_data_uri(&update.qr),
                }]
            }
            _ => Vec::new(),
        };

        if events.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Envelope::new(route, events)])
    }
}

fn connection_events(update: ConnectionUpdate) -> Vec<InboundEvent> {
    if let Some(qr) = non_empty(update.qr) {
        return vec![InboundEvent::QrCodeUpdated {
            qr_code: qr_data_uri(&qr),
        }];
    }
    match non_empty(update.status) {
        Some(status) => vec![InboundEvent::ConnectionStatusChanged {
            status: map_status(&status),
            phone_number: update
                .phone_number
                .as_deref()
                .and_then(zapdesk_core::identity::normalize_phone),
        }],
        None => Vec::new(),
    }
}

fn convert_message(msg: BaileysMessage) -> Option<InboundMessage> {
    let remote_jid = match (msg.from_me, non_empty(msg.to)) {
        (true, Some(to)) => to,
        _ => msg.from,
    };
    if remote_jid.is_empty() {
        return None;
    }

    let message_type = message_type_from_hint(msg.kind.as_deref(), None);
    let media = MediaRef::from_parts(msg.base64, msg.media_url, msg.mimetype.clone(), msg.file_name);
    let message_type = match (&media, message_type) {
        (Some(_), zapdesk_core::MessageType::Text) => {
            message_type_from_hint(None, msg.mimetype.as_deref())
        }
        _ => message_type,
    };

    Some(InboundMessage {
        remote_jid,
        alt_phone: msg
            .sender_pn
            .as_deref()
            .and_then(zapdesk_core::identity::normalize_phone),
        push_name: non_empty(msg.push_name),
        body: non_empty(msg.body).or(non_empty(msg.caption)).unwrap_or_default(),
        message_type,
        media,
        external_id: non_empty(msg.id),
        timestamp: timestamp_secs(&msg.timestamp),
        from_me: msg.from_me,
    })
}
