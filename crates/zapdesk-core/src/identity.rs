// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp address parsing.
//!
//! Gateways hand out addresses in several shapes: `5511999999999@s.whatsapp.net`,
//! `5511999999999@c.us`, `5511999999999:12@s.whatsapp.net` (device suffix),
//! `64081549635686@lid`, or a bare number. This module reduces them to a bare
//! identifier and decides whether it is a real phone number or an opaque LID.

/// E.164 caps subscriber numbers at 15 digits; anything longer is a LID.
pub const MAX_PHONE_DIGITS: usize = 15;

/// What a bare identifier represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Phone,
    Lid,
}

/// A parsed WhatsApp address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsAppAddress {
    pub id: String,
    pub kind: AddressKind,
}

impl WhatsAppAddress {
    pub fn phone(&self) -> Option<&str> {
        (self.kind == AddressKind::Phone).then_some(self.id.as_str())
    }

    pub fn lid(&self) -> Option<&str> {
        (self.kind == AddressKind::Lid).then_some(self.id.as_str())
    }
}

/// Group chats (`@g.us`) and status/broadcast lists (`@broadcast`).
pub fn is_group_or_broadcast(raw: &str) -> bool {
    raw.contains("@g.us") || raw.contains("@broadcast")
}

/// Strip protocol suffixes and device ids, leaving the bare identifier.
pub fn strip_address(raw: &str) -> String {
    let user = raw.trim().split('@').next().unwrap_or_default();
    let user = user.split(':').next().unwrap_or_default();
    user.trim_start_matches('+').to_string()
}

/// Whether a bare value is too long (or not numeric enough) to be a phone.
pub fn looks_like_lid(value: &str) -> bool {
    let value = value.trim_start_matches('+');
    value.len() > MAX_PHONE_DIGITS || !value.chars().all(|c| c.is_ascii_digit())
}

/// Parse a raw provider address.
///
/// An explicit `@lid` marker, an over-long identifier, or non-digit content
/// all classify the address as a LID so it never lands in a phone column.
pub fn parse_address(raw: &str) -> Option<WhatsAppAddress> {
    let id = strip_address(raw);
    if id.is_empty() {
        return None;
    }
    let kind = if raw.contains("@lid") || looks_like_lid(&id) {
        AddressKind::Lid
    } else {
        AddressKind::Phone
    };
    Some(WhatsAppAddress { id, kind })
}

/// Normalize something that should be a phone number, rejecting LIDs.
pub fn normalize_phone(raw: &str) -> Option<String> {
    match parse_address(raw)? {
        WhatsAppAddress {
            id,
            kind: AddressKind::Phone,
        } => Some(id),
        _ => None,
    }
}
