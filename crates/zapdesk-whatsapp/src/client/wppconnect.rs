// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WPPConnect server session management.
//!
//! WPPConnect authenticates per session: a bearer token is minted from the
//! server secret (`generate-token`) and then stored in the connection's
//! `session_data.token`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use zapdesk_config::model::WppConnectConfig;
use zapdesk_core::traits::{InstanceState, LiveContact, RemoteInstance};
use zapdesk_core::types::Connection;
use zapdesk_core::{ConnectionStatus, GatewayClient, Provider, ZapdeskError};

use super::{ApiClient, live_contact};
use crate::webhook::wppconnect::map_status;
use crate::webhook::{non_empty, qr_data_uri};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SessionStatus {
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    qrcode: Option<String>,
}

impl SessionStatus {
    fn state(self) -> InstanceState {
        let qr_code = non_empty(self.qrcode).map(|qr| qr_data_uri(&qr));
        let status = match (&qr_code, self.status) {
            (Some(_), _) => ConnectionStatus::Connecting,
            (None, Some(Value::String(raw))) => map_status(&raw),
            (None, Some(Value::Bool(true))) => ConnectionStatus::Connected,
            _ => ConnectionStatus::Disconnected,
        };
        InstanceState {
            status,
            qr_code,
            ..InstanceState::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    #[serde(default = "Vec::new")]
    response: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ContactEntry {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    pushname: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// WPPConnect client; sessions are addressed by `session_data.sessionName`.
pub struct WppConnectClient {
    api: ApiClient,
    secret_key: Option<String>,
}

impl std::fmt::Debug for WppConnectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WppConnectClient")
            .field("api", &self.api)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl WppConnectClient {
    pub fn new(config: &WppConnectConfig) -> Result<Self, ZapdeskError> {
        let api = ApiClient::new(Provider::WppConnect, config.api_url.as_deref(), None)?;
        Ok(Self {
            api,
            secret_key: config.secret_key.clone(),
        })
    }

    fn secret(&self) -> Result<&str, ZapdeskError> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| ZapdeskError::Config("wppconnect.secret_key is not set".into()))
    }

    async fn generate_token(&self, session: &str) -> Result<String, ZapdeskError> {
        let secret = self.secret()?;
        let minted: TokenResponse = self
            .api
            .json(
                self.api.post(&format!("/api/{session}/{secret}/generate-token")),
                "generate token",
            )
            .await?;
        Ok(minted.token)
    }

    /// Stored token, or a freshly minted one.
    async fn token_for(&self, connection: &Connection) -> Result<String, ZapdeskError> {
        match connection.session_data.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => Ok(token.to_string()),
            None => self.generate_token(connection.session_name()).await,
        }
    }

    async fn session_status(&self, connection: &Connection) -> Result<SessionStatus, ZapdeskError> {
        let token = self.token_for(connection).await?;
        self.api
            .json(
                self.api
                    .get(&format!("/api/{}/status-session", connection.session_name()))
                    .bearer_auth(token),
                "session status",
            )
            .await
    }
}

#[async_trait]
impl GatewayClient for WppConnectClient {
    fn provider(&self) -> Provider {
        Provider::WppConnect
    }

    async fn create_instance(
        &self,
        connection: &Connection,
        webhook_url: &str,
    ) -> Result<InstanceState, ZapdeskError> {
        let session = connection.session_name();
        let token = self.generate_token(session).await?;
        let started: SessionStatus = self
            .api
            .json(
                self.api
                    .post(&format!("/api/{session}/start-session"))
                    .bearer_auth(&token)
                    .json(&json!({ "webhook": webhook_url, "waitQrCode": true })),
                "start session",
            )
            .await?;

        let mut state = started.state();
        if state.status == ConnectionStatus::Disconnected {
            state.status = ConnectionStatus::Connecting;
        }
        state.token = Some(token);
        Ok(state)
    }

    async fn qr_code(&self, connection: &Connection) -> Result<Option<String>, ZapdeskError> {
        Ok(self.session_status(connection).await?.state().qr_code)
    }

    async fn status(&self, connection: &Connection) -> Result<InstanceState, ZapdeskError> {
        Ok(self.session_status(connection).await?.state())
    }

    async fn logout(&self, connection: &Connection) -> Result<(), ZapdeskError> {
        let token = self.token_for(connection).await?;
        self.api
            .empty(
                self.api
                    .post(&format!("/api/{}/logout-session", connection.session_name()))
                    .bearer_auth(token),
                "logout",
            )
            .await
    }

    async fn delete_instance(&self, connection: &Connection) -> Result<(), ZapdeskError> {
        let token = self.token_for(connection).await?;
        self.api
            .empty(
                self.api
                    .post(&format!("/api/{}/close-session", connection.session_name()))
                    .bearer_auth(token),
                "close session",
            )
            .await
    }

    async fn server_health(&self) -> Result<Value, ZapdeskError> {
        let text = self.api.text(self.api.get("/healthz"), "server health").await?;
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({ "status": text.trim() })))
    }

    async fn fetch_instances(&self) -> Result<Vec<RemoteInstance>, ZapdeskError> {
        let secret = self.secret()?;
        let listing: Listing<String> = self
            .api
            .json(
                self.api.get(&format!("/api/{secret}/show-all-sessions")),
                "list sessions",
            )
            .await?;
        Ok(listing
            .response
            .into_iter()
            .map(|name| RemoteInstance {
                name,
                status: None,
                phone_number: None,
            })
            .collect())
    }

    async fn fetch_contacts(&self, connection: &Connection) -> Result<Vec<LiveContact>, ZapdeskError> {
        let token = self.token_for(connection).await?;
        let listing: Listing<ContactEntry> = self
            .api
            .json(
                self.api
                    .get(&format!("/api/{}/all-contacts", connection.session_name()))
                    .bearer_auth(token),
                "list contacts",
            )
            .await?;
        Ok(listing
            .response
            .into_iter()
            .filter_map(|c| {
                let id = match &c.id {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(map) => map
                        .get("_serialized")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                }?;
                let contact = live_contact(&[Some(id.as_str())], non_empty(c.pushname).or(c.name));
                (contact.phone.is_some() || contact.lid.is_some()).then_some(contact)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> WppConnectClient {
        WppConnectClient::new(&WppConnectConfig {
            api_url: Some(server.uri()),
            secret_key: Some("THISISMYSECURETOKEN".into()),
        })
        .unwrap()
    }

    fn connection() -> Connection {
        let mut conn = Connection::new("Vendas", Provider::WppConnect);
        conn.session_data.session_name = Some("vendas".into());
        conn
    }

    #[tokio::test]
    async fn create_mints_token_and_starts_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/vendas/THISISMYSECURETOKEN/generate-token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "success", "session": "vendas", "token": "tok-123"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/vendas/start-session"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "QRCODE", "qrcode": "data:image/png;base64,QR"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let state = client(&server)
            .create_instance(&connection(), "https://crm/webhooks/wppconnect")
            .await
            .unwrap();
        assert_eq!(state.status, ConnectionStatus::Connecting);
        assert_eq!(state.qr_code.as_deref(), Some("data:image/png;base64,QR"));
        assert_eq!(state.token.as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn status_uses_stored_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/vendas/status-session"))
            .and(header("authorization", "Bearer stored"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "CONNECTED" })))
            .mount(&server)
            .await;

        let mut conn = connection();
        conn.session_data.token = Some("stored".into());
        let state = client(&server).status(&conn).await.unwrap();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert!(state.qr_code.is_none());
    }

    #[tokio::test]
    async fn health_accepts_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;
        let health = client(&server).server_health().await.unwrap();
        assert_eq!(health, json!({ "status": "OK" }));
    }

    #[tokio::test]
    async fn missing_secret_is_a_config_error() {
        let client = WppConnectClient::new(&WppConnectConfig {
            api_url: Some("http://127.0.0.1:9".into()),
            secret_key: None,
        })
        .unwrap();
        assert!(matches!(client.fetch_instances().await, Err(ZapdeskError::Config(_))));
    }
}
