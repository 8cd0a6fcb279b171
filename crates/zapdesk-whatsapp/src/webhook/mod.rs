// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook decoders, one per gateway.
//!
//! Each decoder reads its provider's envelope, dispatches on the event name,
//! and decodes the event payload into typed structs before emitting
//! canonical [`zapdesk_core::InboundEvent`]s. Unknown events decode to an
//! empty batch.

pub mod baileys;
pub mod evolution;
pub mod meta;
pub mod waha;
pub mod wppconnect;

use serde::de::DeserializeOwned;
use serde_json::Value;

use zapdesk_core::{ConnectionStatus, MessageType, WebhookAdapter, ZapdeskError};
use zapdesk_core::types::Provider;

pub use baileys::BaileysWebhook;
pub use evolution::EvolutionWebhook;
pub use meta::MetaWebhook;
pub use waha::WahaWebhook;
pub use wppconnect::WppConnectWebhook;

/// The decoder for `provider`.
pub fn adapter_for(provider: Provider) -> Box<dyn WebhookAdapter> {
    match provider {
        Provider::Baileys => Box::new(BaileysWebhook),
        Provider::Evolution => Box::new(EvolutionWebhook),
        Provider::Waha => Box::new(WahaWebhook),
        Provider::WppConnect => Box::new(WppConnectWebhook),
        Provider::Meta => Box::new(MetaWebhook),
    }
}

/// Look a provider status up in its table; anything unknown is `Disconnected`.
pub(crate) fn lookup_status(table: &[(&str, ConnectionStatus)], raw: &str) -> ConnectionStatus {
    let raw = raw.trim();
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(raw))
        .map(|(_, status)| *status)
        .unwrap_or(ConnectionStatus::Disconnected)
}

pub(crate) fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ZapdeskError> {
    serde_json::from_slice(body).map_err(|e| ZapdeskError::payload(format!("invalid JSON body: {e}")))
}

pub(crate) fn decode_value<T: DeserializeOwned>(event: &str, value: Value) -> Result<T, ZapdeskError> {
    serde_json::from_value(value)
        .map_err(|e| ZapdeskError::payload(format!("unexpected `{event}` payload: {e}")))
}

/// Unix seconds from a number, a numeric string, or milliseconds.
pub(crate) fn timestamp_secs(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    Some(if raw > 10_000_000_000 { raw / 1000 } else { raw })
}

/// Gateways return QR codes either as data URIs or bare base64 PNGs.
pub fn qr_data_uri(raw: &str) -> String {
    if raw.starts_with("data:") {
        raw.to_string()
    } else {
        format!("data:image/png;base64,{raw}")
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Classify content from a provider type name (`ptt`, `image`, ...) or a MIME type.
pub(crate) fn message_type_from_hint(hint: Option<&str>, mime: Option<&str>) -> MessageType {
    let by_hint = hint.map(|h| match h.to_ascii_lowercase().as_str() {
        "image" | "sticker" | "imagemessage" | "stickermessage" => MessageType::Image,
        "ptt" | "audio" | "voice" | "audiomessage" => MessageType::Audio,
        "video" | "gif" | "videomessage" => MessageType::Video,
        "document" | "file" | "documentmessage" | "documentwithcaptionmessage" => {
            MessageType::Document
        }
        _ => MessageType::Text,
    });
    match (by_hint, mime) {
        (Some(t), _) if t != MessageType::Text => t,
        (_, Some(mime)) => {
            let family = mime.split('/').next().unwrap_or_default();
            match family {
                "image" => MessageType::Image,
                "audio" => MessageType::Audio,
                "video" => MessageType::Video,
                _ => MessageType::Document,
            }
        }
        _ => MessageType::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamps_accept_strings_and_millis() {
        assert_eq!(timestamp_secs(&json!(1_700_000_000)), Some(1_700_000_000));
        assert_eq!(timestamp_secs(&json!("1700000000")), Some(1_700_000_000));
        assert_eq!(timestamp_secs(&json!(1_700_000_000_123i64)), Some(1_700_000_000));
        assert_eq!(timestamp_secs(&json!({"low": 1})), None);
    }

    #[test]
    fn qr_codes_become_data_uris() {
        assert_eq!(qr_data_uri("iVBORw0"), "data:image/png;base64,iVBORw0");
        assert_eq!(qr_data_uri("data:image/png;base64,AAA"), "data:image/png;base64,AAA");
    }

    #[test]
    fn message_type_hints() {
        assert_eq!(message_type_from_hint(Some("ptt"), None), MessageType::Audio);
        assert_eq!(message_type_from_hint(Some("chat"), None), MessageType::Text);
        assert_eq!(message_type_from_hint(None, Some("application/pdf")), MessageType::Document);
        assert_eq!(message_type_from_hint(Some("chat"), Some("video/mp4")), MessageType::Video);
    }

    #[test]
    fn every_provider_has_an_adapter() {
        for provider in Provider::ALL {
            assert_eq!(adapter_for(provider).provider(), provider);
        }
    }
}
