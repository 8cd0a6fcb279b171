// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WAHA session management.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use zapdesk_config::model::GatewayApiConfig;
use zapdesk_core::identity::{normalize_phone, strip_address};
use zapdesk_core::traits::{InstanceState, LiveContact, RemoteInstance};
use zapdesk_core::types::Connection;
use zapdesk_core::{ConnectionStatus, GatewayClient, Provider, ZapdeskError};

use super::{ApiClient, live_contact};
use crate::webhook::non_empty;
use crate::webhook::waha::map_status;

const WEBHOOK_EVENTS: &[&str] = &["message", "message.any", "message.ack", "session.status"];

#[derive(Debug, Deserialize)]
struct SessionInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    me: Option<Me>,
}

#[derive(Debug, Deserialize)]
struct Me {
    #[serde(default)]
    id: Option<String>,
}

impl SessionInfo {
    fn state(self) -> InstanceState {
        let status = self.status.as_deref().map(map_status).unwrap_or_default();
        InstanceState {
            status,
            phone_number: self
                .me
                .and_then(|m| m.id)
                .as_deref()
                .and_then(normalize_phone),
            ..InstanceState::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct QrImage {
    #[serde(default)]
    mimetype: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ContactEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    pushname: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LidEntry {
    lid: String,
    #[serde(default)]
    pn: Option<String>,
}

/// WAHA client; sessions are addressed by `session_data.sessionName`.
#[derive(Debug)]
pub struct WahaClient {
    api: ApiClient,
}

impl WahaClient {
    pub fn new(config: &GatewayApiConfig) -> Result<Self, ZapdeskError> {
        let api = ApiClient::new(
            Provider::Waha,
            config.api_url.as_deref(),
            config.api_key.as_deref().map(|k| ("x-api-key", k)),
        )?;
        Ok(Self { api })
    }
}

#[async_trait]
impl GatewayClient for WahaClient {
    fn provider(&self) -> Provider {
        Provider::Waha
    }

    async fn create_instance(
        &self,
        connection: &Connection,
        webhook_url: &str,
    ) -> Result<InstanceState, ZapdeskError> {
        let body = json!({
            "name": connection.session_name(),
            "start": true,
            "config": {
                "webhooks": [{ "url": webhook_url, "events": WEBHOOK_EVENTS }],
            },
        });
        let info: SessionInfo = self
            .api
            .json(self.api.post("/api/sessions").json(&body), "create session")
            .await?;
        let mut state = info.state();
        // A freshly started session is waiting for its QR scan.
        if state.status == ConnectionStatus::Disconnected {
            state.status = ConnectionStatus::Connecting;
        }
        Ok(state)
    }

    async fn qr_code(&self, connection: &Connection) -> Result<Option<String>, ZapdeskError> {
        let qr: QrImage = self
            .api
            .json(
                self.api
                    .get(&format!("/api/{}/auth/qr?format=image", connection.session_name()))
                    .header(reqwest::header::ACCEPT, "application/json"),
                "fetch QR code",
            )
            .await?;
        if qr.data.is_empty() {
            return Ok(None);
        }
        let mime = qr.mimetype.unwrap_or_else(|| "image/png".to_string());
        Ok(Some(format!("data:{mime};base64,{}", qr.data)))
    }

    async fn status(&self, connection: &Connection) -> Result<InstanceState, ZapdeskError> {
        let info: SessionInfo = self
            .api
            .json(
                self.api
                    .get(&format!("/api/sessions/{}", connection.session_name())),
                "session status",
            )
            .await?;
        Ok(info.state())
    }

    async fn logout(&self, connection: &Connection) -> Result<(), ZapdeskError> {
        self.api
            .empty(
                self.api
                    .post(&format!("/api/sessions/{}/logout", connection.session_name())),
                "logout",
            )
            .await
    }

    async fn delete_instance(&self, connection: &Connection) -> Result<(), ZapdeskError> {
        self.api
            .empty(
                self.api
                    .delete(&format!("/api/sessions/{}", connection.session_name())),
                "delete session",
            )
            .await
    }

    async fn server_health(&self) -> Result<serde_json::Value, ZapdeskError> {
        self.api
            .json(self.api.get("/api/server/status"), "server health")
            .await
    }

    async fn fetch_instances(&self) -> Result<Vec<RemoteInstance>, ZapdeskError> {
        let sessions: Vec<SessionInfo> = self
            .api
            .json(
                self.api.get("/api/sessions?all=true"),
                "list sessions",
            )
            .await?;
        Ok(sessions
            .into_iter()
            .filter_map(|s| {
                let name = non_empty(s.name.clone())?;
                let raw_status = s.status.clone();
                let state = s.state();
                Some(RemoteInstance {
                    name,
                    status: raw_status.map(|_| state.status),
                    phone_number: state.phone_number,
                })
            })
            .collect())
    }

    /// Joins the contact list with the session's LID map.
    async fn fetch_contacts(&self, connection: &Connection) -> Result<Vec<LiveContact>, ZapdeskError> {
        let session = connection.session_name();
        let contacts: Vec<ContactEntry> = self
            .api
            .json(
                self.api.get(&format!("/api/contacts/all?session={session}")),
                "list contacts",
            )
            .await?;
        let lids: Vec<LidEntry> = self
            .api
            .json(self.api.get(&format!("/api/{session}/lids")), "list lids")
            .await?;

        let names: HashMap<String, String> = contacts
            .iter()
            .filter_map(|c| {
                let id = strip_address(c.id.as_deref()?);
                let name = non_empty(c.pushname.clone()).or(non_empty(c.name.clone()))?;
                Some((id, name))
            })
            .collect();

        let mut live: Vec<LiveContact> = lids
            .iter()
            .map(|entry| {
                let name = entry
                    .pn
                    .as_deref()
                    .and_then(|pn| names.get(&strip_address(pn)))
                    .or_else(|| names.get(&strip_address(&entry.lid)))
                    .cloned();
                live_contact(&[Some(entry.lid.as_str()), entry.pn.as_deref()], name)
            })
            .collect();
        live.extend(
            contacts
                .into_iter()
                .map(|c| live_contact(&[c.id.as_deref()], non_empty(c.pushname).or(c.name)))
                .filter(|c| c.phone.is_some() || c.lid.is_some()),
        );
        Ok(live)
    }
}
