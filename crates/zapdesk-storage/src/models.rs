// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite and the domain types.
//!
//! The canonical types live in `zapdesk-core::types`; this module owns the
//! column lists and the `Row -> T` conversions shared by the query modules.

use rusqlite::Row;

pub use zapdesk_core::types::{
    Campaign, CampaignContact, Connection, Contact, Conversation, Message, SessionData,
};

use crate::database::parse_column;

pub(crate) const CONNECTION_COLUMNS: &str = "id, name, type, provider, status, qr_code, \
     phone_number, session_data, tenant_id, created_at, updated_at";

pub(crate) const CONTACT_COLUMNS: &str =
    "id, name, name_quality, phone, whatsapp_lid, status, tenant_id, created_at, updated_at";

pub(crate) const CONVERSATION_COLUMNS: &str = "id, contact_id, connection_id, status, \
     last_message_at, unread_count, is_bot_active, kanban_column_id, active_flow_id, \
     created_at, updated_at";

pub(crate) const MESSAGE_COLUMNS: &str = "id, conversation_id, content, message_type, \
     media_url, sender_type, external_id, is_read, delivery_status, created_at";

pub(crate) const CAMPAIGN_CONTACT_COLUMNS: &str =
    "id, campaign_id, contact_id, message_id, status, error_message, updated_at";

pub(crate) fn connection_from_row(row: &Row<'_>) -> rusqlite::Result<Connection> {
    let session_json: String = row.get(7)?;
    let session_data: SessionData = serde_json::from_str(&session_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Connection {
        id: row.get(0)?,
        name: row.get(1)?,
        connection_type: row.get(2)?,
        provider: parse_column(3, row.get(3)?)?,
        status: parse_column(4, row.get(4)?)?,
        qr_code: row.get(5)?,
        phone_number: row.get(6)?,
        session_data,
        tenant_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub(crate) fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        name: row.get(1)?,
        name_quality: parse_column(2, row.get(2)?)?,
        phone: row.get(3)?,
        whatsapp_lid: row.get(4)?,
        status: row.get(5)?,
        tenant_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub(crate) fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        connection_id: row.get(2)?,
        status: parse_column(3, row.get(3)?)?,
        last_message_at: row.get(4)?,
        unread_count: row.get(5)?,
        is_bot_active: row.get(6)?,
        kanban_column_id: row.get(7)?,
        active_flow_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let delivery_status = row
        .get::<_, Option<String>>(8)?
        .map(|s| parse_column(8, s))
        .transpose()?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        content: row.get(2)?,
        message_type: parse_column(3, row.get(3)?)?,
        media_url: row.get(4)?,
        sender_type: parse_column(5, row.get(5)?)?,
        external_id: row.get(6)?,
        is_read: row.get(7)?,
        delivery_status,
        created_at: row.get(9)?,
    })
}

pub(crate) fn campaign_contact_from_row(row: &Row<'_>) -> rusqlite::Result<CampaignContact> {
    Ok(CampaignContact {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        contact_id: row.get(2)?,
        message_id: row.get(3)?,
        status: parse_column(4, row.get(4)?)?,
        error_message: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Serialize `session_data` for storage.
pub(crate) fn session_data_json(data: &SessionData) -> rusqlite::Result<String> {
    serde_json::to_string(data).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}
