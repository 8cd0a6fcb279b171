// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evolution API instance management.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use zapdesk_config::model::GatewayApiConfig;
use zapdesk_core::identity::normalize_phone;
use zapdesk_core::traits::{InstanceState, LiveContact, RemoteInstance};
use zapdesk_core::types::Connection;
use zapdesk_core::{ConnectionStatus, GatewayClient, Provider, ZapdeskError};

use super::{ApiClient, live_contact};
use crate::webhook::evolution::map_status;
use crate::webhook::{non_empty, qr_data_uri};

/// Events the instance webhook subscribes to.
const WEBHOOK_EVENTS: &[&str] = &[
    "MESSAGES_UPSERT",
    "MESSAGES_UPDATE",
    "CONNECTION_UPDATE",
    "QRCODE_UPDATED",
];

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    instance: Option<InstanceInfo>,
    #[serde(default)]
    qrcode: Option<QrResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceInfo {
    #[serde(default, alias = "state")]
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QrResponse {
    #[serde(default)]
    base64: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl QrResponse {
    fn data_uri(self) -> Option<String> {
        non_empty(self.base64)
            .or(non_empty(self.code))
            .map(|qr| qr_data_uri(&qr))
    }
}

#[derive(Debug, Deserialize)]
struct StateResponse {
    instance: InstanceInfo,
}

/// `fetchInstances` entry; v2 is flat, v1 nests under `instance`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedInstance {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    connection_status: Option<String>,
    #[serde(default)]
    owner_jid: Option<String>,
    #[serde(default)]
    instance: Option<LegacyInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyInstance {
    #[serde(default)]
    instance_name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    owner: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContactEntry {
    #[serde(default)]
    remote_jid: Option<String>,
    #[serde(default)]
    remote_jid_alt: Option<String>,
    #[serde(default)]
    lid: Option<String>,
    #[serde(default)]
    push_name: Option<String>,
}

/// Evolution API client; instances are addressed by connection name.
#[derive(Debug)]
pub struct EvolutionClient {
    api: ApiClient,
}

impl EvolutionClient {
    pub fn new(config: &GatewayApiConfig) -> Result<Self, ZapdeskError> {
        let api = ApiClient::new(
            Provider::Evolution,
            config.api_url.as_deref(),
            config.api_key.as_deref().map(|k| ("apikey", k)),
        )?;
        Ok(Self { api })
    }
}

#[async_trait]
impl GatewayClient for EvolutionClient {
    fn provider(&self) -> Provider {
        Provider::Evolution
    }

    async fn create_instance(
        &self,
        connection: &Connection,
        webhook_url: &str,
    ) -> Result<InstanceState, ZapdeskError> {
        let body = json!({
            "instanceName": connection.name,
            "qrcode": true,
            "integration": "WHATSAPP-BAILEYS",
            "webhook": {
                "url": webhook_url,
                "byEvents": false,
                "base64": true,
                "events": WEBHOOK_EVENTS,
            },
        });
        let created: CreateResponse = self
            .api
            .json(self.api.post("/instance/create").json(&body), "create instance")
            .await?;

        let qr_code = created.qrcode.and_then(QrResponse::data_uri);
        let status = match (&qr_code, created.instance.and_then(|i| i.status)) {
            (Some(_), _) => ConnectionStatus::Connecting,
            (None, Some(raw)) => map_status(&raw),
            (None, None) => ConnectionStatus::Connecting,
        };
        Ok(InstanceState {
            status,
            qr_code,
            ..InstanceState::default()
        })
    }

    async fn qr_code(&self, connection: &Connection) -> Result<Option<String>, ZapdeskError> {
        let qr: QrResponse = self
            .api
            .json(
                self.api.get(&format!("/instance/connect/{}", connection.name)),
                "fetch QR code",
            )
            .await?;
        Ok(qr.data_uri())
    }

    async fn status(&self, connection: &Connection) -> Result<InstanceState, ZapdeskError> {
        let state: StateResponse = self
            .api
            .json(
                self.api
                    .get(&format!("/instance/connectionState/{}", connection.name)),
                "connection state",
            )
            .await?;
        Ok(InstanceState {
            status: state
                .instance
                .status
                .as_deref()
                .map(map_status)
                .unwrap_or_default(),
            ..InstanceState::default()
        })
    }

    async fn logout(&self, connection: &Connection) -> Result<(), ZapdeskError> {
        self.api
            .empty(
                self.api.delete(&format!("/instance/logout/{}", connection.name)),
                "logout",
            )
            .await
    }

    async fn delete_instance(&self, connection: &Connection) -> Result<(), ZapdeskError> {
        self.api
            .empty(
                self.api.delete(&format!("/instance/delete/{}", connection.name)),
                "delete instance",
            )
            .await
    }

    async fn server_health(&self) -> Result<serde_json::Value, ZapdeskError> {
        self.api.json(self.api.get("/"), "server health").await
    }

    async fn fetch_instances(&self) -> Result<Vec<RemoteInstance>, ZapdeskError> {
        let listed: Vec<ListedInstance> = self
            .api
            .json(self.api.get("/instance/fetchInstances"), "fetch instances")
            .await?;
        Ok(listed
            .into_iter()
            .filter_map(|entry| {
                let legacy = entry.instance;
                let (legacy_name, legacy_status, legacy_owner) = match legacy {
                    Some(l) => (l.instance_name, l.status, l.owner),
                    None => (None, None, None),
                };
                let name = non_empty(entry.name).or(non_empty(legacy_name))?;
                Some(RemoteInstance {
                    name,
                    status: entry
                        .connection_status
                        .or(legacy_status)
                        .as_deref()
                        .map(map_status),
                    phone_number: entry
                        .owner_jid
                        .or(legacy_owner)
                        .as_deref()
                        .and_then(normalize_phone),
                })
            })
            .collect())
    }

    async fn fetch_contacts(&self, connection: &Connection) -> Result<Vec<LiveContact>, ZapdeskError> {
        let entries: Vec<ContactEntry> = self
            .api
            .json(
                self.api
                    .post(&format!("/chat/findContacts/{}", connection.name))
                    .json(&json!({ "where": {} })),
                "find contacts",
            )
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| {
                live_contact(
                    &[e.remote_jid.as_deref(), e.remote_jid_alt.as_deref(), e.lid.as_deref()],
                    e.push_name,
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

    async fn client(server: &MockServer) -> EvolutionClient {
        EvolutionClient::new(&GatewayApiConfig {
            api_url: Some(server.uri()),
            api_key: Some("evo-key".into()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn create_registers_webhook_and_returns_qr() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/instance/create"))
            .and(header("apikey", "evo-key"))
            .and(body_partial_json(json!({
                "instanceName": "Comercial",
                "webhook": { "url": "https://crm.example.com/webhooks/evolution" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "instance": { "instanceName": "Comercial", "status": "created" },
                "qrcode": { "base64": "data:image/png;base64,QR" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let conn = Connection::new("Comercial", Provider::Evolution);
        let state = client(&server)
            .await
            .create_instance(&conn, "https://crm.example.com/webhooks/evolution")
            .await
            .unwrap();
        assert_eq!(state.status, ConnectionStatus::Connecting);
        assert_eq!(state.qr_code.as_deref(), Some("data:image/png;base64,QR"));
    }

    #[tokio::test]
    async fn status_maps_open_to_connected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instance/connectionState/Comercial"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "instance": { "instanceName": "Comercial", "state": "open" }
            })))
            .mount(&server)
            .await;

        let conn = Connection::new("Comercial", Provider::Evolution);
        let state = client(&server).await.status(&conn).await.unwrap();
        assert_eq!(state.status, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn gateway_errors_surface_as_provider_errors() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/instance/logout/Comercial"))
            .respond_with(ResponseTemplate::new(404).set_body_string("instance not found"))
            .mount(&server)
            .await;

        let conn = Connection::new("Comercial", Provider::Evolution);
        let err = client(&server).await.logout(&conn).await.unwrap_err();
        assert!(matches!(err, ZapdeskError::Provider { provider: Provider::Evolution, .. }));
        assert!(err.to_string().contains("instance not found"));
    }

    #[tokio::test]
    async fn fetch_instances_accepts_both_shapes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instance/fetchInstances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "Comercial", "connectionStatus": "open", "ownerJid": "5511900000000@s.whatsapp.net" },
                { "instance": { "instanceName": "Suporte", "status": "close" } },
                { "connectionStatus": "open" }
            ])))
            .mount(&server)
            .await;

        let listed = client(&server).await.fetch_instances().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].phone_number.as_deref(), Some("5511900000000"));
        assert_eq!(listed[1].status, Some(ConnectionStatus::Disconnected));
    }

    #[tokio::test]
    async fn contacts_pair_lids_with_phones() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/findContacts/Comercial"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "remoteJid": "64081549635686@lid", "remoteJidAlt": "5511999998888@s.whatsapp.net", "pushName": "Rafa" },
                { "remoteJid": "status@broadcast" }
            ])))
            .mount(&server)
            .await;

        let conn = Connection::new("Comercial", Provider::Evolution);
        let contacts = client(&server).await.fetch_contacts(&conn).await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].lid.as_deref(), Some("64081549635686"));
        assert_eq!(contacts[0].phone.as_deref(), Some("5511999998888"));
    }
}
