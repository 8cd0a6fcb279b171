// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WPPConnect server webhooks.
//!
//! Unlike the other gateways, WPPConnect posts flat bodies: the event name,
//! the session, and the message fields all sit at the top level.

use serde::Deserialize;
use serde_json::Value;

use zapdesk_core::event::{
    DeliveryReceipt, Envelope, InboundEvent, InboundMessage, MediaRef, RouteKey,
};
use zapdesk_core::{ConnectionStatus, DeliveryStatus, MessageType, Provider, WebhookAdapter, ZapdeskError};

use super::{
    decode_body, lookup_status, message_type_from_hint, non_empty, qr_data_uri, timestamp_secs,
};

/// `status-find` values and session states.
pub const STATUS_TABLE: &[(&str, ConnectionStatus)] = &[
    ("isLogged", ConnectionStatus::Connected),
    ("inChat", ConnectionStatus::Connected),
    ("qrReadSuccess", ConnectionStatus::Connected),
    ("chatsAvailable", ConnectionStatus::Connected),
    ("successChat", ConnectionStatus::Connected),
    ("CONNECTED", ConnectionStatus::Connected),
    ("notLogged", ConnectionStatus::Connecting),
    ("QRCODE", ConnectionStatus::Connecting),
    ("INITIALIZING", ConnectionStatus::Connecting),
    ("STARTING", ConnectionStatus::Connecting),
    ("OPENING", ConnectionStatus::Connecting),
    ("browserClose", ConnectionStatus::Disconnected),
    ("qrReadFail", ConnectionStatus::Disconnected),
    ("autocloseCalled", ConnectionStatus::Disconnected),
    ("desconnectedMobile", ConnectionStatus::Disconnected),
    ("deleteToken", ConnectionStatus::Disconnected),
    ("serverClose", ConnectionStatus::Disconnected),
    ("CLOSED", ConnectionStatus::Disconnected),
    ("UNPAIRED", ConnectionStatus::Disconnected),
    ("CONFLICT", ConnectionStatus::Disconnected),
];

pub fn map_status(raw: &str) -> ConnectionStatus {
    lookup_status(STATUS_TABLE, raw)
}

/// WPPConnect acks share WhatsApp Web's numbering.
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
#[serde(rename_all = "camelCase")]
struct Body {
    #[serde(default)]
    event: String,
    #[serde(default)]
    session: Option<String>,

    // status-find / onstatechange
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    state: Option<String>,

    // qrcode
    #[serde(default)]
    qrcode: Option<String>,

    // messages and acks
    #[serde(default)]
    id: Value,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    from_me: bool,
    #[serde(default)]
    is_group_msg: bool,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    mimetype: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    base64: Option<String>,
    #[serde(default, alias = "mediaUrl")]
    file_url: Option<String>,
    #[serde(default)]
    notify_name: Option<String>,
    #[serde(default)]
    sender: Option<Sender>,
    #[serde(default)]
    t: Value,
    #[serde(default)]
    ack: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Sender {
    #[serde(default)]
    pushname: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Message ids arrive as a plain string or as `{ "_serialized": "..." }`.
fn message_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("_serialized")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Decoder for WPPConnect webhooks, routed by session name.
pub struct WppConnectWebhook;

impl WebhookAdapter for WppConnectWebhook {
    fn provider(&self) -> Provider {
        Provider::WppConnect
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<Envelope>, ZapdeskError> {
        let body: Body = decode_body(body)?;
        let Some(session) = non_empty(body.session.clone()) else {
            return Ok(Vec::new());
        };

        let event = body.event.clone();
        let events = match event.as_str() {
            "status-find" | "onstatechange" | "session-status" => {
                match non_empty(body.status).or(non_empty(body.state)) {
                    Some(raw) => vec![InboundEvent::ConnectionStatusChanged {
                        status: map_status(&raw),
                        phone_number: None,
                    }],
                    None => Vec::new(),
                }
            }
            "qrcode" => non_empty(body.qrcode)
                .map(|qr| InboundEvent::QrCodeUpdated {
                    qr_code: qr_data_uri(&qr),
                })
                .into_iter()
                .collect(),
            "onmessage" | "onselfmessage" | "onanymessage" => convert_message(body)
                .map(InboundEvent::Message)
                .into_iter()
                .collect(),
            "onack" => match (message_id(&body.id), body.ack.and_then(map_ack)) {
                (Some(external_id), Some(status)) => {
                    vec![InboundEvent::DeliveryReceipt(DeliveryReceipt {
                        external_id,
                        status,
                        error: None,
                    })]
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        if events.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Envelope::new(RouteKey::SessionName(session), events)])
    }
}

fn convert_message(body: Body) -> Option<InboundMessage> {
    if body.is_group_msg {
        return None;
    }
    let remote_jid = match (body.from_me, non_empty(body.to)) {
        (true, Some(to)) => to,
        _ => non_empty(body.from)?,
    };

    let message_type = message_type_from_hint(body.kind.as_deref(), None);
    let (text, media) = if message_type == MessageType::Text {
        (body.body.unwrap_or_default(), None)
    } else {
        // For media, `body` holds a thumbnail rather than text.
        (
            body.caption.unwrap_or_default(),
            MediaRef::from_parts(body.base64, body.file_url, body.mimetype, body.filename),
        )
    };

    let push_name = non_empty(body.notify_name).or_else(|| {
        body.sender
            .and_then(|s| non_empty(s.pushname).or(non_empty(s.name)))
    });

    Some(InboundMessage {
        alt_phone: None,
        push_name,
        body: text,
        message_type,
        media,
        external_id: message_id(&body.id),
        timestamp: timestamp_secs(&body.t),
        from_me: body.from_me,
        remote_jid,
    })
}
