// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WAHA (WhatsApp HTTP API) webhooks.
//!
//! Envelope: `{ "event": "...", "session": "...", "me": {...}, "payload": {...} }`.

use serde::Deserialize;
use serde_json::Value;

use zapdesk_core::event::{
    DeliveryReceipt, Envelope, InboundEvent, InboundMessage, MediaRef, RouteKey,
};
use zapdesk_core::identity::normalize_phone;
use zapdesk_core::{ConnectionStatus, DeliveryStatus, Provider, WebhookAdapter, ZapdeskError};

use super::{
    decode_body, decode_value, lookup_status, message_type_from_hint, non_empty, timestamp_secs,
};

/// WAHA session states.
pub const STATUS_TABLE: &[(&str, ConnectionStatus)] = &[
    ("STOPPED", ConnectionStatus::Disconnected),
    ("STARTING", ConnectionStatus::Connecting),
    ("SCAN_QR_CODE", ConnectionStatus::Connecting),
    ("WORKING", ConnectionStatus::Connected),
    ("FAILED", ConnectionStatus::Disconnected),
];

pub fn map_status(raw: &str) -> ConnectionStatus {
    lookup_status(STATUS_TABLE, raw)
}

/// WAHA numeric acks: -1 error, 0 pending, 1 server, 2 device, 3 read, 4 played.
pub fn map_ack(ack: i64) -> Option<DeliveryStatus> {
    match ack {
        -1 => Some(DeliveryStatus::Failed),
        1 => Some(DeliveryStatus::Sent),
        2 => Some(DeliveryStatus::Delivered),
        3 | 4 => Some(DeliveryStatus::Read),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(default)]
    event: String,
    #[serde(default)]
    session: Option<String>,
    #[serde(default)]
    me: Option<Me>,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct Me {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    me: Option<Me>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WahaMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    timestamp: Value,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    from_me: bool,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    has_media: bool,
    #[serde(default)]
    media: Option<WahaMedia>,
    #[serde(default, rename = "_data")]
    data: Option<RawData>,
}

#[derive(Debug, Deserialize)]
struct WahaMedia {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    mimetype: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

/// Engine-specific raw message; only a few fields are stable across engines.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawData {
    #[serde(default)]
    notify_name: Option<String>,
    #[serde(default)]
    push_name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    key: Option<RawKey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKey {
    #[serde(default)]
    remote_jid_alt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Ack {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    ack: Option<i64>,
}

/// Decoder for WAHA webhooks, routed by session name.
pub struct WahaWebhook;

impl WebhookAdapter for WahaWebhook {
    fn provider(&self) -> Provider {
        Provider::Waha
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<Envelope>, ZapdeskError> {
        let body: Body = decode_body(body)?;
        let Some(session) = non_empty(body.session) else {
            return Ok(Vec::new());
        };

        let events = match body.event.as_str() {
            "session.status" | "state.change" => {
                let payload: SessionStatus = decode_value(&body.event, body.payload)?;
                match non_empty(payload.status) {
                    Some(raw) => {
                        let status = map_status(&raw);
                        let me = payload.me.or(body.me).and_then(|m| m.id);
                        let phone_number = (status == ConnectionStatus::Connected)
                            .then_some(me)
                            .flatten()
                            .as_deref()
                            .and_then(normalize_phone);
                        vec![InboundEvent::ConnectionStatusChanged {
                            status,
                            phone_number,
                        }]
                    }
                    None => Vec::new(),
                }
            }
            "message" | "message.any" => {
                let msg: WahaMessage = decode_value(&body.event, body.payload)?;
                convert_message(msg).map(InboundEvent::Message).into_iter().collect()
            }
            "message.ack" => {
                let ack: Ack = decode_value(&body.event, body.payload)?;
                match (non_empty(ack.id), ack.ack.and_then(map_ack)) {
                    (Some(external_id), Some(status)) => {
                        vec![InboundEvent::DeliveryReceipt(DeliveryReceipt {
                            external_id,
                            status,
                            error: None,
                        })]
                    }
                    _ => Vec::new(),
                }
            }
            _ => Vec::new(),
        };

        if events.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Envelope::new(RouteKey::SessionName(session), events)])
    }
}

fn convert_message(msg: WahaMessage) -> Option<InboundMessage> {
    let remote_jid = match (msg.from_me, non_empty(msg.to)) {
        (true, Some(to)) => to,
        _ => msg.from,
    };
    if remote_jid.is_empty() {
        return None;
    }

    let (push_name, hint, alt) = match msg.data {
        Some(raw) => (
            non_empty(raw.notify_name).or(non_empty(raw.push_name)),
            raw.kind,
            raw.key.and_then(|k| k.remote_jid_alt),
        ),
        None => (None, None, None),
    };

    let media = msg
        .media
        .filter(|_| msg.has_media)
        .and_then(|m| MediaRef::from_parts(None, m.url, m.mimetype, m.filename));
    let message_type = match &media {
        Some(m) => message_type_from_hint(hint.as_deref(), m.mime_type()),
        None if msg.has_media => message_type_from_hint(hint.as_deref(), None),
        None => zapdesk_core::MessageType::Text,
    };

    Some(InboundMessage {
        remote_jid,
        alt_phone: alt.as_deref().and_then(normalize_phone),
        push_name,
        body: msg.body.unwrap_or_default(),
        message_type,
        media,
        external_id: non_empty(msg.id),
        timestamp: timestamp_secs(&msg.timestamp),
        from_me: msg.from_me,
    })
}
