// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message inserts, listing and delivery receipts.

use rusqlite::{OptionalExtension, params};
use zapdesk_core::event::DeliveryReceipt;
use zapdesk_core::traits::ReceiptOutcome;
use zapdesk_core::types::{DeliveryStatus, now_timestamp};
use zapdesk_core::ZapdeskError;

use crate::database::{Database, parse_column};
use crate::models::{MESSAGE_COLUMNS, Message, message_from_row};

/// Insert a message unless `(conversation_id, external_id)` already exists.
///
/// Returns `true` when a row was written.
pub async fn insert_message(db: &Database, msg: &Message) -> Result<bool, ZapdeskError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO messages (id, conversation_id, content, message_type, media_url,
                                       sender_type, external_id, is_read, delivery_status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT DO NOTHING",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.content,
                    msg.message_type.to_string(),
                    msg.media_url,
                    msg.sender_type.to_string(),
                    msg.external_id,
                    msg.is_read,
                    msg.delivery_status.map(|s| s.to_string()),
                    msg.created_at,
                ],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Messages of a conversation in chronological order.
pub async fn list_messages(db: &Database, conversation_id: &str) -> Result<Vec<Message>, ZapdeskError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1 ORDER BY created_at ASC, rowid ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![conversation_id], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn counter_column(status: DeliveryStatus) -> Option<&'static str> {
    match status {
        DeliveryStatus::Pending => None,
        DeliveryStatus::Sent => Some("sent_count"),
        DeliveryStatus::Delivered => Some("delivered_count"),
        DeliveryStatus::Read => Some("read_count"),
        DeliveryStatus::Failed => Some("failed_count"),
    }
}

/// Apply a delivery receipt to messages and campaign recipients.
///
/// Runs in one transaction. A status only moves forward and `failed` never
/// changes again, so redelivered or out-of-order receipts are no-ops and
/// campaign counters are bumped at most once per recipient and status.
pub async fn apply_delivery_receipt(
    db: &Database,
    receipt: &DeliveryReceipt,
) -> Result<ReceiptOutcome, ZapdeskError> {
    let receipt = receipt.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let next = receipt.status;
            let mut outcome = ReceiptOutcome::default();

            let current: Vec<(String, Option<String>)> = {
                let mut stmt =
                    tx.prepare("SELECT id, delivery_status FROM messages WHERE external_id = ?1")?;
                let rows = stmt
                    .query_map(params![receipt.external_id], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            };
            for (id, status) in current {
                let status = status
                    .map(|s| parse_column::<DeliveryStatus>(1, s))
                    .transpose()?
                    .unwrap_or_default();
                if next.advances(status) {
                    outcome.messages_updated += tx.execute(
                        "UPDATE messages SET delivery_status = ?2 WHERE id = ?1",
                        params![id, next.to_string()],
                    )?;
                }
            }

            let recipient: Option<(String, String, String)> = tx
                .query_row(
                    "SELECT id, campaign_id, status FROM campaign_contacts
                     WHERE message_id = ?1 LIMIT 1",
                    params![receipt.external_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            if let Some((id, campaign_id, status)) = recipient {
                let status = parse_column::<DeliveryStatus>(2, status)?;
                if next.advances(status) {
                    tx.execute(
                        "UPDATE campaign_contacts
                         SET status = ?2, error_message = COALESCE(?3, error_message), updated_at = ?4
                         WHERE id = ?1",
                        params![id, next.to_string(), receipt.error, now_timestamp()],
                    )?;
                    if let Some(column) = counter_column(next) {
                        tx.execute(
                            &format!("UPDATE campaigns SET {column} = {column} + 1 WHERE id = ?1"),
                            params![campaign_id],
                        )?;
                    }
                    outcome.campaign_contact_updated = true;
                }
            }

            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::campaigns::{add_campaign_contact, create_campaign, get_campaign, get_campaign_contact};
    use crate::queries::testing::{seed_conversation, setup_db};
    use zapdesk_core::types::{Campaign, CampaignContact, MessageType, SenderType, new_id};

    fn message(conversation_id: &str, external_id: Option<&str>) -> Message {
        Message {
            id: new_id(),
            conversation_id: conversation_id.to_string(),
            content: "Oi".to_string(),
            message_type: MessageType::Text,
            media_url: None,
            sender_type: SenderType::Contact,
            external_id: external_id.map(str::to_string),
            is_read: false,
            delivery_status: None,
            created_at: now_timestamp(),
        }
    }

    fn receipt(external_id: &str, status: DeliveryStatus) -> DeliveryReceipt {
        DeliveryReceipt {
            external_id: external_id.to_string(),
            status,
            error: None,
        }
    }

    #[tokio::test]
    async fn redelivered_external_id_is_skipped() {
        let (db, _dir) = setup_db().await;
        let conv = seed_conversation(&db).await;

        assert!(insert_message(&db, &message(&conv.id, Some("ABC123"))).await.unwrap());
        assert!(!insert_message(&db, &message(&conv.id, Some("ABC123"))).await.unwrap());
        assert_eq!(list_messages(&db, &conv.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn messages_without_external_id_are_never_deduplicated() {
        let (db, _dir) = setup_db().await;
        let conv = seed_conversation(&db).await;

        assert!(insert_message(&db, &message(&conv.id, None)).await.unwrap());
        assert!(insert_message(&db, &message(&conv.id, None)).await.unwrap());
        assert_eq!(list_messages(&db, &conv.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn receipts_only_move_message_status_forward() {
        let (db, _dir) = setup_db().await;
        let conv = seed_conversation(&db).await;
        let mut msg = message(&conv.id, Some("wamid.1"));
        msg.sender_type = SenderType::Agent;
        insert_message(&db, &msg).await.unwrap();

        let out = apply_delivery_receipt(&db, &receipt("wamid.1", DeliveryStatus::Read)).await.unwrap();
        assert_eq!(out.messages_updated, 1);
        let out = apply_delivery_receipt(&db, &receipt("wamid.1", DeliveryStatus::Delivered)).await.unwrap();
        assert_eq!(out.messages_updated, 0);

        let stored = list_messages(&db, &conv.id).await.unwrap();
        assert_eq!(stored[0].delivery_status, Some(DeliveryStatus::Read));
    }

    #[tokio::test]
    async fn campaign_counters_bump_once_per_transition() {
        let (db, _dir) = setup_db().await;
        let conv = seed_conversation(&db).await;
        let campaign = Campaign {
            id: new_id(),
            name: "Black Friday".to_string(),
            sent_count: 1,
            delivered_count: 0,
            read_count: 0,
            failed_count: 0,
            created_at: now_timestamp(),
        };
        create_campaign(&db, &campaign).await.unwrap();
        let recipient = CampaignContact {
            id: new_id(),
            campaign_id: campaign.id.clone(),
            contact_id: conv.contact_id.clone(),
            message_id: Some("wamid.C1".to_string()),
            status: DeliveryStatus::Sent,
            error_message: None,
            updated_at: now_timestamp(),
        };
        add_campaign_contact(&db, &recipient).await.unwrap();

        for status in [
            DeliveryStatus::Delivered,
            DeliveryStatus::Delivered,
            DeliveryStatus::Read,
            DeliveryStatus::Delivered,
        ] {
            apply_delivery_receipt(&db, &receipt("wamid.C1", status)).await.unwrap();
        }

        let campaign = get_campaign(&db, &campaign.id).await.unwrap().unwrap();
        assert_eq!(campaign.delivered_count, 1);
        assert_eq!(campaign.read_count, 1);
        assert_eq!(campaign.failed_count, 0);
        let recipient = get_campaign_contact(&db, &recipient.id).await.unwrap().unwrap();
        assert_eq!(recipient.status, DeliveryStatus::Read);
    }

    #[tokio::test]
    async fn failed_is_terminal_and_keeps_error() {
        let (db, _dir) = setup_db().await;
        let conv = seed_conversation(&db).await;
        let campaign = Campaign {
            id: new_id(),
            name: "c".to_string(),
            sent_count: 0,
            delivered_count: 0,
            read_count: 0,
            failed_count: 0,
            created_at: now_timestamp(),
        };
        create_campaign(&db, &campaign).await.unwrap();
        let recipient = CampaignContact {
            id: new_id(),
            campaign_id: campaign.id.clone(),
            contact_id: conv.contact_id.clone(),
            message_id: Some("wamid.F".to_string()),
            status: DeliveryStatus::Sent,
            error_message: None,
            updated_at: now_timestamp(),
        };
        add_campaign_contact(&db, &recipient).await.unwrap();

        let failed = DeliveryReceipt {
            external_id: "wamid.F".to_string(),
            status: DeliveryStatus::Failed,
            error: Some("131026: message undeliverable".to_string()),
        };
        let out = apply_delivery_receipt(&db, &failed).await.unwrap();
        assert!(out.campaign_contact_updated);
        let out = apply_delivery_receipt(&db, &receipt("wamid.F", DeliveryStatus::Read)).await.unwrap();
        assert!(!out.campaign_contact_updated);

        let recipient = get_campaign_contact(&db, &recipient.id).await.unwrap().unwrap();
        assert_eq!(recipient.status, DeliveryStatus::Failed);
        assert_eq!(recipient.error_message.as_deref(), Some("131026: message undeliverable"));
        let campaign = get_campaign(&db, &campaign.id).await.unwrap().unwrap();
        assert_eq!(campaign.failed_count, 1);
        assert_eq!(campaign.read_count, 0);
    }

    #[tokio::test]
    async fn unknown_receipt_is_a_no_op() {
        let (db, _dir) = setup_db().await;
        let out = apply_delivery_receipt(&db, &receipt("nope", DeliveryStatus::Read)).await.unwrap();
        assert_eq!(out, ReceiptOutcome::default());
    }
}
