// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign and campaign-recipient rows.

use rusqlite::{OptionalExtension, params};
use zapdesk_core::types::{Campaign, CampaignContact};
use zapdesk_core::ZapdeskError;

use crate::database::Database;
use crate::models::{CAMPAIGN_CONTACT_COLUMNS, campaign_contact_from_row};

pub async fn create_campaign(db: &Database, campaign: &Campaign) -> Result<(), ZapdeskError> {
    let c = campaign.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO campaigns (id, name, sent_count, delivered_count, read_count,
                                        failed_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    c.id,
                    c.name,
                    c.sent_count,
                    c.delivered_count,
                    c.read_count,
                    c.failed_count,
                    c.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_campaign(db: &Database, id: &str) -> Result<Option<Campaign>, ZapdeskError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, sent_count, delivered_count, read_count, failed_count, created_at
                 FROM campaigns WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Campaign {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        sent_count: row.get(2)?,
                        delivered_count: row.get(3)?,
                        read_count: row.get(4)?,
                        failed_count: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn add_campaign_contact(db: &Database, entry: &CampaignContact) -> Result<(), ZapdeskError> {
    let e = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO campaign_contacts (id, campaign_id, contact_id, message_id, status,
                                                error_message, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    e.id,
                    e.campaign_id,
                    e.contact_id,
                    e.message_id,
                    e.status.to_string(),
                    e.error_message,
                    e.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_campaign_contact(
    db: &Database,
    id: &str,
) -> Result<Option<CampaignContact>, ZapdeskError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {CAMPAIGN_CONTACT_COLUMNS} FROM campaign_contacts WHERE id = ?1");
            conn.query_row(&sql, params![id], campaign_contact_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
