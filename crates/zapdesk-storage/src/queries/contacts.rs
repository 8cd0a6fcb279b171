// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact CRUD, tagging, reconciliation scans and merges.

use rusqlite::{OptionalExtension, params};
use zapdesk_core::traits::MergeSummary;
use zapdesk_core::types::{LEGACY_PLACEHOLDER_NAMES, new_id, now_timestamp};
use zapdesk_core::ZapdeskError;

use crate::database::Database;
use crate::models::{CONTACT_COLUMNS, Contact, contact_from_row};

/// Insert a new contact.
pub async fn create_contact(db: &Database, contact: &Contact) -> Result<(), ZapdeskError> {
    let c = contact.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts (id, name, name_quality, phone, whatsapp_lid, status,
                                       tenant_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    c.id,
                    c.name,
                    c.name_quality.to_string(),
                    c.phone,
                    c.whatsapp_lid,
                    c.status,
                    c.tenant_id,
                    c.created_at,
                    c.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a contact by ID.
pub async fn get_contact(db: &Database, id: &str) -> Result<Option<Contact>, ZapdeskError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1");
            conn.query_row(&sql, params![id], contact_from_row).optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Oldest contact in the tenant whose `column` equals `value`.
async fn find_contact_by(
    db: &Database,
    column: &'static str,
    tenant_id: Option<&str>,
    value: &str,
) -> Result<Option<Contact>, ZapdeskError> {
    let tenant_id = tenant_id.map(str::to_string);
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts
                 WHERE {column} = ?1 AND tenant_id IS ?2
                 ORDER BY created_at ASC LIMIT 1"
            );
            conn.query_row(&sql, params![value, tenant_id], contact_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a contact by exact phone number within a tenant.
pub async fn find_contact_by_phone(
    db: &Database,
    tenant_id: Option<&str>,
    phone: &str,
) -> Result<Option<Contact>, ZapdeskError> {
    find_contact_by(db, "phone", tenant_id, phone).await
}

/// Find a contact by exact WhatsApp LID within a tenant.
pub async fn find_contact_by_lid(
    db: &Database,
    tenant_id: Option<&str>,
    lid: &str,
) -> Result<Option<Contact>, ZapdeskError> {
    find_contact_by(db, "whatsapp_lid", tenant_id, lid).await
}

/// Overwrite the mutable columns of a contact.
pub async fn update_contact(db: &Database, contact: &Contact) -> Result<(), ZapdeskError> {
    let c = contact.clone();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE contacts
                 SET name = ?2, name_quality = ?3, phone = ?4, whatsapp_lid = ?5,
                     status = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    c.id,
                    c.name,
                    c.name_quality.to_string(),
                    c.phone,
                    c.whatsapp_lid,
                    c.status,
                    now_timestamp(),
                ],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if updated == 0 {
        return Err(ZapdeskError::NotFound {
            entity: "contact",
            id: contact.id.clone(),
        });
    }
    Ok(())
}

/// Contacts the duplicate reconciler should look at.
///
/// Matches a phone longer than a real E.164 number, a phone equal to the
/// LID, a LID without a phone, or a name that is not verified.
pub async fn list_reconciliation_candidates(db: &Database) -> Result<Vec<Contact>, ZapdeskError> {
    db.connection()
        .call(move |conn| {
            let fillers = LEGACY_PLACEHOLDER_NAMES
                .iter()
                .map(|n| format!("'{}'", n.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts
                 WHERE length(phone) > 15
                    OR (phone IS NOT NULL AND phone = whatsapp_lid)
                    OR (phone IS NULL AND whatsapp_lid IS NOT NULL)
                    OR name_quality <> 'verified'
                    OR name IN ({fillers})
                 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], contact_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Attach a tag to a contact, creating the tag on first use.
pub async fn tag_contact(db: &Database, contact_id: &str, tag: &str) -> Result<(), ZapdeskError> {
    let contact_id = contact_id.to_string();
    let tag = tag.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let now = now_timestamp();
            tx.execute(
                "INSERT INTO tags (id, name, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO NOTHING",
                params![new_id(), tag, now],
            )?;
            tx.execute(
                "INSERT INTO contact_tags (contact_id, tag_id, created_at)
                 SELECT ?1, id, ?3 FROM tags WHERE name = ?2
                 ON CONFLICT DO NOTHING",
                params![contact_id, tag, now],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Tag names attached to a contact, alphabetically.
pub async fn list_contact_tags(db: &Database, contact_id: &str) -> Result<Vec<String>, ZapdeskError> {
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT t.name FROM contact_tags ct JOIN tags t ON t.id = ct.tag_id
                 WHERE ct.contact_id = ?1 ORDER BY t.name ASC",
            )?;
            let rows = stmt
                .query_map(params![contact_id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fold `duplicate_id` into `canonical_id` inside one transaction.
///
/// Conversations, campaign recipients and tags move to the canonical
/// contact, its LID is filled from the duplicate when missing, and the
/// duplicate row is deleted. Any failure rolls everything back.
pub async fn merge_contacts(
    db: &Database,
    duplicate_id: &str,
    canonical_id: &str,
) -> Result<MergeSummary, ZapdeskError> {
    if duplicate_id == canonical_id {
        return Err(ZapdeskError::Internal(format!(
            "cannot merge contact {duplicate_id} into itself"
        )));
    }
    let duplicate_id = duplicate_id.to_string();
    let canonical_id = canonical_id.to_string();
    let missing_id = duplicate_id.clone();
    let summary = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let duplicate_lid: Option<Option<String>> = tx
                .query_row(
                    "SELECT whatsapp_lid FROM contacts WHERE id = ?1",
                    params![duplicate_id],
                    |row| row.get(0),
                )
                .optional()?;
            let canonical_lid: Option<Option<String>> = tx
                .query_row(
                    "SELECT whatsapp_lid FROM contacts WHERE id = ?1",
                    params![canonical_id],
                    |row| row.get(0),
                )
                .optional()?;
            let (Some(duplicate_lid), Some(canonical_lid)) = (duplicate_lid, canonical_lid)
            else {
                return Ok(None);
            };

            let conversations_moved = tx.execute(
                "UPDATE conversations SET contact_id = ?2, updated_at = ?3 WHERE contact_id = ?1",
                params![duplicate_id, canonical_id, now_timestamp()],
            )?;
            tx.execute(
                "UPDATE campaign_contacts SET contact_id = ?2 WHERE contact_id = ?1",
                params![duplicate_id, canonical_id],
            )?;
            let tags_moved = tx.execute(
                "INSERT INTO contact_tags (contact_id, tag_id, created_at)
                 SELECT ?2, tag_id, created_at FROM contact_tags WHERE contact_id = ?1
                 ON CONFLICT DO NOTHING",
                params![duplicate_id, canonical_id],
            )?;
            tx.execute(
                "DELETE FROM contact_tags WHERE contact_id = ?1",
                params![duplicate_id],
            )?;

            // Delete first so the LID is not briefly held by two rows.
            tx.execute("DELETE FROM contacts WHERE id = ?1", params![duplicate_id])?;

            let lid_copied = match (canonical_lid, duplicate_lid) {
                (None, Some(lid)) => {
                    tx.execute(
                        "UPDATE contacts SET whatsapp_lid = ?2, updated_at = ?3 WHERE id = ?1",
                        params![canonical_id, lid, now_timestamp()],
                    )?;
                    true
                }
                _ => false,
            };

            tx.commit()?;
            Ok(Some(MergeSummary {
                conversations_moved,
                tags_moved,
                lid_copied,
            }))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    summary.ok_or(ZapdeskError::NotFound {
        entity: "contact",
        id: missing_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use zapdesk_core::types::NameQuality;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn contact(name: &str, phone: Option<&str>, lid: Option<&str>) -> Contact {
        let now = now_timestamp();
        Contact {
            id: new_id(),
            name: name.to_string(),
            name_quality: NameQuality::Verified,
            phone: phone.map(str::to_string),
            whatsapp_lid: lid.map(str::to_string),
            status: "active".to_string(),
            tenant_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn lookup_by_phone_and_lid_respects_tenant() {
        let (db, _dir) = setup_db().await;
        let mut c = contact("Ana", Some("5511988887777"), Some("64081549635686"));
        c.tenant_id = Some("t1".into());
        create_contact(&db, &c).await.unwrap();

        let hit = find_contact_by_phone(&db, Some("t1"), "5511988887777").await.unwrap();
        assert_eq!(hit.map(|h| h.id), Some(c.id.clone()));
        let hit = find_contact_by_lid(&db, Some("t1"), "64081549635686").await.unwrap();
        assert_eq!(hit.map(|h| h.id), Some(c.id.clone()));

        assert!(find_contact_by_phone(&db, None, "5511988887777").await.unwrap().is_none());
        assert!(find_contact_by_phone(&db, Some("t2"), "5511988887777").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_contact_persists_name_quality() {
        let (db, _dir) = setup_db().await;
        let mut c = contact("5511988887777", Some("5511988887777"), None);
        c.name_quality = NameQuality::Placeholder;
        create_contact(&db, &c).await.unwrap();

        c.name = "Ana Souza".into();
        c.name_quality = NameQuality::Verified;
        update_contact(&db, &c).await.unwrap();

        let fetched = get_contact(&db, &c.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Ana Souza");
        assert_eq!(fetched.name_quality, NameQuality::Verified);
    }

    #[tokio::test]
    async fn reconciliation_candidates_cover_lid_shapes() {
        let (db, _dir) = setup_db().await;
        let clean = contact("Ana", Some("5511988887777"), None);
        let long_phone = contact("B", Some("1234567890123456"), None);
        let equal = contact("C", Some("64081549635686"), Some("64081549635686"));
        let lid_only = contact("D", None, Some("99999999999999"));
        let mut filler = contact("Chatbot Whats", Some("5511911112222"), None);
        filler.name_quality = NameQuality::Verified;
        for c in [&clean, &long_phone, &equal, &lid_only, &filler] {
            create_contact(&db, c).await.unwrap();
        }

        let ids: Vec<String> = list_reconciliation_candidates(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert!(!ids.contains(&clean.id));
        for expected in [&long_phone, &equal, &lid_only, &filler] {
            assert!(ids.contains(&expected.id), "missing {}", expected.name);
        }
    }

    #[tokio::test]
    async fn tagging_is_idempotent() {
        let (db, _dir) = setup_db().await;
        let c = contact("Ana", Some("5511988887777"), None);
        create_contact(&db, &c).await.unwrap();
        tag_contact(&db, &c.id, "vip").await.unwrap();
        tag_contact(&db, &c.id, "vip").await.unwrap();
        tag_contact(&db, &c.id, "lead").await.unwrap();
        assert_eq!(list_contact_tags(&db, &c.id).await.unwrap(), vec!["lead", "vip"]);
    }

    #[tokio::test]
    async fn merge_moves_tags_and_copies_lid() {
        let (db, _dir) = setup_db().await;
        let canonical = contact("Ana", Some("5511999998888"), None);
        let duplicate = contact("Ana", Some("64081549635686"), Some("64081549635686"));
        create_contact(&db, &canonical).await.unwrap();
        create_contact(&db, &duplicate).await.unwrap();
        tag_contact(&db, &duplicate.id, "vip").await.unwrap();
        tag_contact(&db, &canonical.id, "vip").await.unwrap();
        tag_contact(&db, &duplicate.id, "lead").await.unwrap();

        let summary = merge_contacts(&db, &duplicate.id, &canonical.id).await.unwrap();
        assert!(summary.lid_copied);
        assert_eq!(summary.tags_moved, 1);
        assert!(get_contact(&db, &duplicate.id).await.unwrap().is_none());

        let merged = get_contact(&db, &canonical.id).await.unwrap().unwrap();
        assert_eq!(merged.whatsapp_lid.as_deref(), Some("64081549635686"));
        assert_eq!(merged.phone.as_deref(), Some("5511999998888"));
        assert_eq!(list_contact_tags(&db, &canonical.id).await.unwrap(), vec!["lead", "vip"]);
    }

    #[tokio::test]
    async fn merge_with_missing_contact_changes_nothing() {
        let (db, _dir) = setup_db().await;
        let duplicate = contact("X", Some("64081549635686"), Some("64081549635686"));
        create_contact(&db, &duplicate).await.unwrap();

        let err = merge_contacts(&db, &duplicate.id, "no-such-contact").await.unwrap_err();
        assert!(matches!(err, ZapdeskError::NotFound { .. }));
        assert!(get_contact(&db, &duplicate.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn merge_into_self_is_rejected() {
        let (db, _dir) = setup_db().await;
        let c = contact("X", Some("5511999998888"), None);
        create_contact(&db, &c).await.unwrap();
        assert!(merge_contacts(&db, &c.id, &c.id).await.is_err());
    }
}
