// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evolution API webhooks.
//!
//! Envelope: `{ "event": "messages.upsert", "instance": "...", "data": ... }`.
//! Event names arrive either dotted (`messages.upsert`) or in the
//! upper-snake form (`MESSAGES_UPSERT`) depending on the webhook mode, and
//! `data` may be a single object or an array.

use serde::Deserialize;
use serde_json::Value;

use zapdesk_core::event::{
    DeliveryReceipt, Envelope, InboundEvent, InboundMessage, MediaRef, RouteKey,
};
use zapdesk_core::identity::normalize_phone;
use zapdesk_core::{
    ConnectionStatus, DeliveryStatus, MessageType, Provider, WebhookAdapter, ZapdeskError,
};

use super::{decode_body, decode_value, lookup_status, non_empty, qr_data_uri, timestamp_secs};

/// Baileys-style connection states Evolution forwards verbatim.
pub const STATUS_TABLE: &[(&str, ConnectionStatus)] = &[
    ("open", ConnectionStatus::Connected),
    ("connecting", ConnectionStatus::Connecting),
    ("close", ConnectionStatus::Disconnected),
    ("refused", ConnectionStatus::Disconnected),
];

pub fn map_status(raw: &str) -> ConnectionStatus {
    lookup_status(STATUS_TABLE, raw)
}

/// Message acknowledgement names used by `messages.update`.
pub fn map_ack(raw: &str) -> Option<DeliveryStatus> {
    match raw.to_ascii_uppercase().as_str() {
        "SERVER_ACK" => Some(DeliveryStatus::Sent),
        "DELIVERY_ACK" => Some(DeliveryStatus::Delivered),
        "READ" | "PLAYED" => Some(DeliveryStatus::Read),
        "ERROR" => Some(DeliveryStatus::Failed),
        _ => None,
    }
}

/// `MESSAGES_UPSERT` -> `messages.upsert`.
fn normalize_event(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace('_', ".")
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(default)]
    event: String,
    #[serde(default, alias = "instanceName")]
    instance: Option<String>,
    /// Owner JID of the instance.
    #[serde(default)]
    sender: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageKey {
    #[serde(default)]
    remote_jid: String,
    #[serde(default)]
    remote_jid_alt: Option<String>,
    #[serde(default)]
    sender_pn: Option<String>,
    #[serde(default)]
    from_me: bool,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TextMessage {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaMessage {
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    mimetype: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default)]
    conversation: Option<String>,
    #[serde(default)]
    extended_text_message: Option<TextMessage>,
    #[serde(default)]
    image_message: Option<MediaMessage>,
    #[serde(default)]
    sticker_message: Option<MediaMessage>,
    #[serde(default)]
    audio_message: Option<MediaMessage>,
    #[serde(default)]
    video_message: Option<MediaMessage>,
    #[serde(default)]
    document_message: Option<MediaMessage>,
    /// Present when the webhook is configured with `base64: true`.
    #[serde(default)]
    base64: Option<String>,
    /// Present when Evolution mirrors media to object storage.
    #[serde(default)]
    media_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertData {
    key: MessageKey,
    #[serde(default)]
    push_name: Option<String>,
    #[serde(default)]
    message: Option<Content>,
    #[serde(default)]
    message_timestamp: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateData {
    #[serde(default)]
    key_id: Option<String>,
    #[serde(default)]
    key: Option<MessageKey>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionData {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    wuid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QrData {
    qrcode: QrCode,
}

#[derive(Debug, Deserialize)]
struct QrCode {
    #[serde(default)]
    base64: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Decoder for Evolution API webhooks, routed by connection name.
pub struct EvolutionWebhook;

impl WebhookAdapter for EvolutionWebhook {
    fn provider(&self) -> Provider {
        Provider::Evolution
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<Envelope>, ZapdeskError> {
        let body: Body = decode_body(body)?;
        let Some(instance) = non_empty(body.instance) else {
            return Ok(Vec::new());
        };
        let event = normalize_event(&body.event);

        let events: Vec<InboundEvent> = match event.as_str() {
            "messages.upsert" => {
                let items: OneOrMany<UpsertData> = decode_value(&event, body.data)?;
                items
                    .into_vec()
                    .into_iter()
                    .filter_map(convert_message)
                    .map(InboundEvent::Message)
                    .collect()
            }
            "messages.update" => {
                let items: OneOrMany<UpdateData> = decode_value(&event, body.data)?;
                items
                    .into_vec()
                    .into_iter()
                    .filter_map(convert_receipt)
                    .map(InboundEvent::DeliveryReceipt)
                    .collect()
            }
            "connection.update" => {
                let data: ConnectionData = decode_value(&event, body.data)?;
                match non_empty(data.state) {
                    Some(state) => {
                        let status = map_status(&state);
                        let phone_number = (status == ConnectionStatus::Connected)
                            .then(|| data.wuid.or(body.sender))
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
            "qrcode.updated" => {
                let data: QrData = decode_value(&event, body.data)?;
                non_empty(data.qrcode.base64)
                    .or(non_empty(data.qrcode.code))
                    .map(|qr| InboundEvent::QrCodeUpdated {
                        qr_code: qr_data_uri(&qr),
                    })
                    .into_iter()
                    .collect()
            }
            _ => Vec::new(),
        };

        if events.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Envelope::new(RouteKey::ConnectionName(instance), events)])
    }
}

fn convert_message(data: UpsertData) -> Option<InboundMessage> {
    if data.key.remote_jid.is_empty() {
        return None;
    }
    let content = data.message.unwrap_or_default();

    let (message_type, media_meta) = if let Some(m) = content.image_message.or(content.sticker_message) {
        (MessageType::Image, Some(m))
    } else if let Some(m) = content.audio_message {
        (MessageType::Audio, Some(m))
    } else if let Some(m) = content.video_message {
        (MessageType::Video, Some(m))
    } else if let Some(m) = content.document_message {
        (MessageType::Document, Some(m))
    } else {
        (MessageType::Text, None)
    };

    let (body, media) = match media_meta {
        Some(meta) => {
            let media = MediaRef::from_parts(
                content.base64,
                content.media_url,
                meta.mimetype,
                meta.file_name,
            );
            (meta.caption.unwrap_or_default(), media)
        }
        None => (
            non_empty(content.conversation)
                .or_else(|| content.extended_text_message.and_then(|t| t.text))
                .unwrap_or_default(),
            None,
        ),
    };

    let alt_phone = data
        .key
        .remote_jid_alt
        .as_deref()
        .or(data.key.sender_pn.as_deref())
        .and_then(normalize_phone);

    Some(InboundMessage {
        remote_jid: data.key.remote_jid,
        alt_phone,
        push_name: non_empty(data.push_name),
        body,
        message_type,
        media,
        external_id: non_empty(data.key.id),
        timestamp: timestamp_secs(&data.message_timestamp),
        from_me: data.key.from_me,
    })
}

fn convert_receipt(data: UpdateData) -> Option<DeliveryReceipt> {
    let external_id = non_empty(data.key_id).or_else(|| data.key.and_then(|k| k.id))?;
    let status = map_ack(data.status.as_deref()?)?;
    Some(DeliveryReceipt {
        external_id,
        status,
        error: None,
    })
}
