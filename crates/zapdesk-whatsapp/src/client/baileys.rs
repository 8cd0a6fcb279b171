// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Baileys REST server session management.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use zapdesk_config::model::GatewayApiConfig;
use zapdesk_core::identity::normalize_phone;
use zapdesk_core::traits::{InstanceState, LiveContact, RemoteInstance};
use zapdesk_core::types::Connection;
use zapdesk_core::{ConnectionStatus, GatewayClient, Provider, ZapdeskError};

use super::{ApiClient, live_contact};
use crate::webhook::baileys::map_status;
use crate::webhook::{non_empty, qr_data_uri};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionState {
    #[serde(default, alias = "id", alias = "sessionId")]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    qr: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
}

impl SessionState {
    fn into_state(self) -> InstanceState {
        let qr_code = non_empty(self.qr).map(|qr| qr_data_uri(&qr));
        let status = match (&qr_code, self.status.as_deref()) {
            (Some(_), _) => ConnectionStatus::Connecting,
            (None, Some(raw)) => map_status(raw),
            (None, None) => ConnectionStatus::Disconnected,
        };
        InstanceState {
            status,
            qr_code,
            phone_number: self.phone_number.as_deref().and_then(normalize_phone),
            token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContactEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    lid: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    notify: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Baileys client; sessions are addressed by `session_data.sessionName`.
#[derive(Debug)]
pub struct BaileysClient {
    api: ApiClient,
}

impl BaileysClient {
    pub fn new(config: &GatewayApiConfig) -> Result<Self, ZapdeskError> {
        let api = ApiClient::new(
            Provider::Baileys,
            config.api_url.as_deref(),
            config.api_key.as_deref().map(|k| ("x-api-key", k)),
        )?;
        Ok(Self { api })
    }
}

#[async_trait]
impl GatewayClient for BaileysClient {
    fn provider(&self) -> Provider {
        Provider::Baileys
    }

    async fn create_instance(
        &self,
        connection: &Connection,
        webhook_url: &str,
    ) -> Result<InstanceState, ZapdeskError> {
        let created: SessionState = self
            .api
            .json(
                self.api.post("/sessions").json(&json!({
                    "sessionId": connection.session_name(),
                    "webhookUrl": webhook_url,
                })),
                "create session",
            )
            .await?;
        let mut state = created.into_state();
        if state.status == ConnectionStatus::Disconnected {
            state.status = ConnectionStatus::Connecting;
        }
        Ok(state)
    }

    async fn qr_code(&self, connection: &Connection) -> Result<Option<String>, ZapdeskError> {
        let state: SessionState = self
            .api
            .json(
                self.api
                    .get(&format!("/sessions/{}/qr", connection.session_name())),
                "fetch QR code",
            )
            .await?;
        Ok(state.into_state().qr_code)
    }

    async fn status(&self, connection: &Connection) -> Result<InstanceState, ZapdeskError> {
        let state: SessionState = self
            .api
            .json(
                self.api
                    .get(&format!("/sessions/{}/status", connection.session_name())),
                "session status",
            )
            .await?;
        Ok(state.into_state())
    }

    async fn logout(&self, connection: &Connection) -> Result<(), ZapdeskError> {
        self.api
            .empty(
                self.api
                    .post(&format!("/sessions/{}/logout", connection.session_name())),
                "logout",
            )
            .await
    }

    async fn delete_instance(&self, connection: &Connection) -> Result<(), ZapdeskError> {
        self.api
            .empty(
                self.api
                    .delete(&format!("/sessions/{}", connection.session_name())),
                "delete session",
            )
            .await
    }

    async fn server_health(&self) -> Result<serde_json::Value, ZapdeskError> {
        self.api.json(self.api.get("/health"), "server health").await
    }

    async fn fetch_instances(&self) -> Result<Vec<RemoteInstance>, ZapdeskError> {
        let sessions: Vec<SessionState> = self
            .api
            .json(self.api.get("/sessions"), "list sessions")
            .await?;
        Ok(sessions
            .into_iter()
            .filter_map(|s| {
                let name = non_empty(s.name.clone())?;
                let has_status = s.status.is_some();
                let state = s.into_state();
                Some(RemoteInstance {
                    name,
                    status: has_status.then_some(state.status),
                    phone_number: state.phone_number,
                })
            })
            .collect())
    }

    async fn fetch_contacts(&self, connection: &Connection) -> Result<Vec<LiveContact>, ZapdeskError> {
        let entries: Vec<ContactEntry> = self
            .api
            .json(
                self.api
                    .get(&format!("/sessions/{}/contacts", connection.session_name())),
                "list contacts",
            )
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| {
                live_contact(
                    &[e.id.as_deref(), e.lid.as_deref(), e.phone_number.as_deref()],
                    non_empty(e.notify).or(e.name),
                )
            })
            .filter(|c| c.phone.is_some() || c.lid.is_some())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> BaileysClient {
        BaileysClient::new(&GatewayApiConfig {
            api_url: Some(format!("{}/", server.uri())),
            api_key: Some("bk".into()),
        })
        .unwrap()
    }

    fn connection() -> Connection {
        let mut conn = Connection::new("Loja", Provider::Baileys);
        conn.session_data.session_name = Some("loja".into());
        conn
    }

    #[tokio::test]
    async fn create_returns_pending_qr() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .and(header("x-api-key", "bk"))
            .and(body_partial_json(json!({ "sessionId": "loja" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "qr": "data:image/png;base64,QR"
            })))
            .mount(&server)
            .await;

        let state = client(&server)
            .create_instance(&connection(), "https://crm/webhooks/baileys")
            .await
            .unwrap();
        assert_eq!(state.status, ConnectionStatus::Connecting);
        assert!(state.qr_code.is_some());
    }

    #[tokio::test]
    async fn status_and_contacts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/loja/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "connected", "phoneNumber": "5511900000000"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions/loja/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "5511999998888@s.whatsapp.net", "lid": "64081549635686@lid", "notify": "Rafa" },
                { "id": "120363@g.us", "name": "Grupo" }
            ])))
            .mount(&server)
            .await;

        let c = client(&server);
        let state = c.status(&connection()).await.unwrap();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.phone_number.as_deref(), Some("5511900000000"));

        let contacts = c.fetch_contacts(&connection()).await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].lid.as_deref(), Some("64081549635686"));
    }
}
