// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD and read acknowledgement.

use rusqlite::{OptionalExtension, params};
use zapdesk_core::types::now_timestamp;
use zapdesk_core::ZapdeskError;

use crate::database::Database;
use crate::models::{CONVERSATION_COLUMNS, Conversation, conversation_from_row};

/// Insert a new conversation.
pub async fn create_conversation(db: &Database, c: &Conversation) -> Result<(), ZapdeskError> {
    let c = c.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, contact_id, connection_id, status, last_message_at,
                                            unread_count, is_bot_active, kanban_column_id,
                                            active_flow_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    c.id,
                    c.contact_id,
                    c.connection_id,
                    c.status.to_string(),
                    c.last_message_at,
                    c.unread_count,
                    c.is_bot_active,
                    c.kanban_column_id,
                    c.active_flow_id,
                    c.created_at,
                    c.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a conversation by ID.
pub async fn get_conversation(db: &Database, id: &str) -> Result<Option<Conversation>, ZapdeskError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
            conn.query_row(&sql, params![id], conversation_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent conversation for a contact on a connection.
///
/// Non-archived conversations win over archived ones; within each group the
/// most recently active one is returned.
pub async fn find_latest_conversation(
    db: &Database,
    contact_id: &str,
    connection_id: &str,
) -> Result<Option<Conversation>, ZapdeskError> {
    let contact_id = contact_id.to_string();
    let connection_id = connection_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE contact_id = ?1 AND connection_id = ?2
                 ORDER BY (status = 'archived') ASC,
                          COALESCE(last_message_at, created_at) DESC,
                          created_at DESC
                 LIMIT 1"
            );
            conn.query_row(&sql, params![contact_id, connection_id], conversation_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Overwrite the mutable columns of a conversation.
pub async fn update_conversation(db: &Database, c: &Conversation) -> Result<(), ZapdeskError> {
    let c = c.clone();
    let id = c.id.clone();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations
                 SET contact_id = ?2, status = ?3, last_message_at = ?4, unread_count = ?5,
                     is_bot_active = ?6, kanban_column_id = ?7, active_flow_id = ?8,
                     updated_at = ?9
                 WHERE id = ?1",
                params![
                    c.id,
                    c.contact_id,
                    c.status.to_string(),
                    c.last_message_at,
                    c.unread_count,
                    c.is_bot_active,
                    c.kanban_column_id,
                    c.active_flow_id,
                    now_timestamp(),
                ],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if updated == 0 {
        return Err(ZapdeskError::NotFound {
            entity: "conversation",
            id,
        });
    }
    Ok(())
}

/// All conversations of a contact, newest first.
pub async fn list_conversations_for_contact(
    db: &Database,
    contact_id: &str,
) -> Result<Vec<Conversation>, ZapdeskError> {
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE contact_id = ?1 ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![contact_id], conversation_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Zero the unread counter and flag every inbound message as read.
pub async fn mark_conversation_read(db: &Database, id: &str) -> Result<(), ZapdeskError> {
    let id = id.to_string();
    let missing = id.clone();
    let updated = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE conversations SET unread_count = 0, updated_at = ?2 WHERE id = ?1",
                params![id, now_timestamp()],
            )?;
            tx.execute(
                "UPDATE messages SET is_read = 1 WHERE conversation_id = ?1 AND is_read = 0",
                params![id],
            )?;
            tx.commit()?;
            Ok(updated)
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if updated == 0 {
        return Err(ZapdeskError::NotFound {
            entity: "conversation",
            id: missing,
        });
    }
    Ok(())
}
