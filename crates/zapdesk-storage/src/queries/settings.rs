// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key/value rows in `system_settings`.

use rusqlite::{OptionalExtension, params};
use zapdesk_core::types::now_timestamp;
use zapdesk_core::ZapdeskError;

use crate::database::Database;

pub async fn get_setting(db: &Database, key: &str) -> Result<Option<String>, ZapdeskError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT value FROM system_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn set_setting(db: &Database, key: &str, value: &str) -> Result<(), ZapdeskError> {
    let key = key.to_string();
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO system_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now_timestamp()],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::testing::setup_db;

    #[tokio::test]
    async fn set_overwrites_existing_value() {
        let (db, _dir) = setup_db().await;
        assert!(get_setting(&db, "meta_verify_token").await.unwrap().is_none());
        set_setting(&db, "meta_verify_token", "first").await.unwrap();
        set_setting(&db, "meta_verify_token", "second").await.unwrap();
        assert_eq!(
            get_setting(&db, "meta_verify_token").await.unwrap().as_deref(),
            Some("second")
        );
    }
}
