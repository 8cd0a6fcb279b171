// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meta WhatsApp Cloud API webhooks.
//!
//! One POST may carry several `entry[].changes[]`, each addressed to a
//! business phone number id. Every change becomes its own [`Envelope`].

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use zapdesk_core::event::{
    DeliveryReceipt, Envelope, InboundEvent, InboundMessage, MediaRef, RouteKey,
};
use zapdesk_core::{DeliveryStatus, MessageType, Provider, WebhookAdapter, ZapdeskError};

use super::{decode_body, non_empty};

type HmacSha256 = Hmac<Sha256>;

/// Answer the `GET` subscription handshake.
///
/// Returns the challenge to echo back when `hub.mode` is `subscribe` and the
/// token matches.
pub fn verify_subscription<'a>(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&'a str>,
    expected_token: &str,
) -> Option<&'a str> {
    if expected_token.is_empty() {
        return None;
    }
    match (mode, token, challenge) {
        (Some("subscribe"), Some(token), Some(challenge)) if token == expected_token => {
            Some(challenge)
        }
        _ => None,
    }
}

/// Check an `X-Hub-Signature-256: sha256=<hex>` header against the body.
pub fn verify_signature(app_secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(hex_sig) = header.and_then(|h| h.trim().strip_prefix("sha256=")) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Status names used in `statuses[]`.
pub fn map_status_event(raw: &str) -> Option<DeliveryStatus> {
    match raw {
        "sent" => Some(DeliveryStatus::Sent),
        "delivered" => Some(DeliveryStatus::Delivered),
        "read" => Some(DeliveryStatus::Read),
        "failed" => Some(DeliveryStatus::Failed),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    #[serde(default)]
    field: String,
    #[serde(default)]
    value: Option<ChangeValue>,
}

#[derive(Debug, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    contacts: Vec<Profile>,
    #[serde(default)]
    messages: Vec<CloudMessage>,
    #[serde(default)]
    statuses: Vec<Status>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    phone_number_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default)]
    wa_id: Option<String>,
    #[serde(default)]
    profile: Option<ProfileName>,
}

#[derive(Debug, Deserialize)]
struct ProfileName {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudMessage {
    #[serde(default)]
    from: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<TextBody>,
    #[serde(default)]
    image: Option<CloudMedia>,
    #[serde(default)]
    sticker: Option<CloudMedia>,
    #[serde(default)]
    audio: Option<CloudMedia>,
    #[serde(default)]
    video: Option<CloudMedia>,
    #[serde(default)]
    document: Option<CloudMedia>,
    #[serde(default)]
    button: Option<ButtonReply>,
    #[serde(default)]
    interactive: Option<Interactive>,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct CloudMedia {
    id: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ButtonReply {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Interactive {
    #[serde(default)]
    button_reply: Option<Titled>,
    #[serde(default)]
    list_reply: Option<Titled>,
}

#[derive(Debug, Deserialize)]
struct Titled {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Status {
    id: String,
    status: String,
    #[serde(default)]
    errors: Vec<StatusError>,
}

#[derive(Debug, Deserialize)]
struct StatusError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl StatusError {
    fn describe(&self) -> String {
        let text = self
            .message
            .clone()
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| "unknown error".to_string());
        match self.code {
            Some(code) => format!("{code}: {text}"),
            None => text,
        }
    }
}

/// Decoder for Cloud API webhooks, routed by `phone_number_id`.
pub struct MetaWebhook;

impl WebhookAdapter for MetaWebhook {
    fn provider(&self) -> Provider {
        Provider::Meta
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<Envelope>, ZapdeskError> {
        let body: Body = decode_body(body)?;
        let mut envelopes = Vec::new();

        for change in body.entry.into_iter().flat_map(|e| e.changes) {
            if change.field != "messages" {
                continue;
            }
            let Some(value) = change.value else { continue };
            let Some(phone_number_id) = value
                .metadata
                .and_then(|m| non_empty(m.phone_number_id))
            else {
                continue;
            };

            let mut events = Vec::new();
            for msg in value.messages {
                let push_name = value
                    .contacts
                    .iter()
                    .find(|c| c.wa_id.as_deref() == Some(msg.from.as_str()))
                    .or(value.contacts.first())
                    .and_then(|c| c.profile.as_ref())
                    .and_then(|p| non_empty(p.name.clone()));
                if let Some(converted) = convert_message(msg, push_name) {
                    events.push(InboundEvent::Message(converted));
                }
            }
            for status in value.statuses {
                let Some(delivery) = map_status_event(&status.status) else {
                    continue;
                };
                events.push(InboundEvent::DeliveryReceipt(DeliveryReceipt {
                    external_id: status.id,
                    status: delivery,
                    error: status.errors.first().map(StatusError::describe),
                }));
            }

            if !events.is_empty() {
                envelopes.push(Envelope::new(RouteKey::PhoneNumberId(phone_number_id), events));
            }
        }

        Ok(envelopes)
    }
}

fn convert_message(msg: CloudMessage, push_name: Option<String>) -> Option<InboundMessage> {
    if msg.from.is_empty() {
        return None;
    }

    let (message_type, cloud_media) = match msg.kind.as_str() {
        "image" => (MessageType::Image, msg.image),
        "sticker" => (MessageType::Image, msg.sticker),
        "audio" | "voice" => (MessageType::Audio, msg.audio),
        "video" => (MessageType::Video, msg.video),
        "document" => (MessageType::Document, msg.document),
        _ => (MessageType::Text, None),
    };

    let (body, media) = match cloud_media {
        Some(m) => (
            m.caption.unwrap_or_default(),
            Some(MediaRef::MetaMediaId {
                media_id: m.id,
                mime_type: m.mime_type,
                filename: m.filename,
            }),
        ),
        None => {
            let text = match msg.kind.as_str() {
                "text" => msg.text.map(|t| t.body),
                "button" => msg.button.and_then(|b| b.text),
                "interactive" => msg
                    .interactive
                    .and_then(|i| i.button_reply.or(i.list_reply))
                    .and_then(|t| t.title),
                _ => None,
            };
            (text.unwrap_or_default(), None)
        }
    };

    Some(InboundMessage {
        remote_jid: msg.from,
        alt_phone: None,
        push_name,
        body,
        message_type,
        media,
        external_id: non_empty(msg.id),
        timestamp: msg.timestamp.and_then(|t| t.parse().ok()),
        from_me: false,
    })
}
