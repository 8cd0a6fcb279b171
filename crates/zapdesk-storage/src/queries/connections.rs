// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection CRUD and webhook routing lookups.

use rusqlite::{OptionalExtension, params};
use zapdesk_core::event::RouteKey;
use zapdesk_core::types::{Provider, now_timestamp};
use zapdesk_core::ZapdeskError;

use crate::database::Database;
use crate::models::{CONNECTION_COLUMNS, Connection, connection_from_row, session_data_json};

/// Insert a new connection.
pub async fn create_connection(db: &Database, connection: &Connection) -> Result<(), ZapdeskError> {
    let c = connection.clone();
    db.connection()
        .call(move |conn| {
            let session = session_data_json(&c.session_data)?;
            conn.execute(
                "INSERT INTO connections (id, name, type, provider, status, qr_code, phone_number,
                                          session_data, tenant_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    c.id,
                    c.name,
                    c.connection_type,
                    c.provider.to_string(),
                    c.status.to_string(),
                    c.qr_code,
                    c.phone_number,
                    session,
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

/// Get a connection by ID.
pub async fn get_connection(db: &Database, id: &str) -> Result<Option<Connection>, ZapdeskError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {CONNECTION_COLUMNS} FROM connections WHERE id = ?1");
            conn.query_row(&sql, params![id], connection_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find the connection a webhook is addressed to.
///
/// Session names live in `session_data.sessionName`; connections created
/// without one are addressed by their `name`.
pub async fn find_connection(
    db: &Database,
    provider: Provider,
    route: &RouteKey,
) -> Result<Option<Connection>, ZapdeskError> {
    let provider = provider.to_string();
    let route = route.clone();
    db.connection()
        .call(move |conn| {
            let filter = match &route {
                RouteKey::SessionName(_) => {
                    "(json_extract(session_data, '$.sessionName') = ?2
                      OR (json_extract(session_data, '$.sessionName') IS NULL AND name = ?2))"
                }
                RouteKey::ConnectionName(_) => "name = ?2",
                RouteKey::PhoneNumberId(_) => "json_extract(session_data, '$.phoneNumberId') = ?2",
            };
            let sql = format!(
                "SELECT {CONNECTION_COLUMNS} FROM connections
                 WHERE provider = ?1 AND {filter}
                 ORDER BY created_at ASC LIMIT 1"
            );
            conn.query_row(&sql, params![provider, route.value()], connection_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all connections, oldest first.
pub async fn list_connections(db: &Database) -> Result<Vec<Connection>, ZapdeskError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {CONNECTION_COLUMNS} FROM connections ORDER BY created_at ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], connection_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Overwrite the mutable columns of a connection.
pub async fn update_connection(db: &Database, connection: &Connection) -> Result<(), ZapdeskError> {
    let c = connection.clone();
    let updated = db
        .connection()
        .call(move |conn| {
            let session = session_data_json(&c.session_data)?;
            conn.execute(
                "UPDATE connections
                 SET name = ?2, status = ?3, qr_code = ?4, phone_number = ?5,
                     session_data = ?6, tenant_id = ?7, updated_at = ?8
                 WHERE id = ?1",
                params![
                    c.id,
                    c.name,
                    c.status.to_string(),
                    c.qr_code,
                    c.phone_number,
                    session,
                    c.tenant_id,
                    now_timestamp(),
                ],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if updated == 0 {
        return Err(ZapdeskError::NotFound {
            entity: "connection",
            id: connection.id.clone(),
        });
    }
    Ok(())
}

/// Delete a connection and, by cascade, its conversations.
pub async fn delete_connection(db: &Database, id: &str) -> Result<(), ZapdeskError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM connections WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use zapdesk_core::types::ConnectionStatus;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_and_get_round_trips_session_data() {
        let (db, _dir) = setup_db().await;
        let mut c = Connection::new("Loja Centro", Provider::WppConnect);
        c.session_data.token = Some("tok".into());
        c.session_data.engine = Some("wppconnect".into());
        create_connection(&db, &c).await.unwrap();

        let fetched = get_connection(&db, &c.id).await.unwrap().unwrap();
        assert_eq!(fetched, c);
        assert!(get_connection(&db, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_session_name_falls_back_to_name() {
        let (db, _dir) = setup_db().await;
        let plain = Connection::new("vendas", Provider::Waha);
        let mut named = Connection::new("Suporte", Provider::Waha);
        named.session_data.session_name = Some("suporte_session".into());
        create_connection(&db, &plain).await.unwrap();
        create_connection(&db, &named).await.unwrap();

        let by_name = find_connection(&db, Provider::Waha, &RouteKey::SessionName("vendas".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, plain.id);

        let by_session = find_connection(
            &db,
            Provider::Waha,
            &RouteKey::SessionName("suporte_session".into()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(by_session.id, named.id);

        // Name no longer matches once a session name is set.
        assert!(
            find_connection(&db, Provider::Waha, &RouteKey::SessionName("Suporte".into()))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn find_is_scoped_to_provider() {
        let (db, _dir) = setup_db().await;
        let c = Connection::new("inst1", Provider::Evolution);
        create_connection(&db, &c).await.unwrap();

        let route = RouteKey::ConnectionName("inst1".into());
        assert!(find_connection(&db, Provider::Evolution, &route).await.unwrap().is_some());
        assert!(find_connection(&db, Provider::Baileys, &route).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_phone_number_id() {
        let (db, _dir) = setup_db().await;
        let mut c = Connection::new("cloud", Provider::Meta);
        c.session_data.phone_number_id = Some("1098765".into());
        create_connection(&db, &c).await.unwrap();

        let found = find_connection(&db, Provider::Meta, &RouteKey::PhoneNumberId("1098765".into()))
            .await
            .unwrap();
        assert_eq!(found.map(|f| f.id), Some(c.id));
    }

    #[tokio::test]
    async fn connected_row_with_qr_is_rejected() {
        let (db, _dir) = setup_db().await;
        let mut c = Connection::new("x", Provider::Baileys);
        create_connection(&db, &c).await.unwrap();

        c.status = ConnectionStatus::Connected;
        c.qr_code = Some("data:image/png;base64,AAAA".into());
        assert!(update_connection(&db, &c).await.is_err());

        c.qr_code = None;
        c.phone_number = Some("5511999999999".into());
        update_connection(&db, &c).await.unwrap();
        let fetched = get_connection(&db, &c.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ConnectionStatus::Connected);
        assert_eq!(fetched.phone_number.as_deref(), Some("5511999999999"));
    }

    #[tokio::test]
    async fn update_missing_connection_is_not_found() {
        let (db, _dir) = setup_db().await;
        let c = Connection::new("ghost", Provider::Baileys);
        let err = update_connection(&db, &c).await.unwrap_err();
        assert!(matches!(err, ZapdeskError::NotFound { entity: "connection", .. }));
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let (db, _dir) = setup_db().await;
        let c = Connection::new("gone", Provider::Baileys);
        create_connection(&db, &c).await.unwrap();
        delete_connection(&db, &c.id).await.unwrap();
        assert!(list_connections(&db).await.unwrap().is_empty());
    }
}
