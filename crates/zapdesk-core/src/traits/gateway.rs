// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Management API of a WhatsApp gateway (session lifecycle and contact listing).

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ZapdeskError;
use crate::types::{Connection, ConnectionStatus, Provider};

/// Session state as reported by the gateway's management API.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstanceState {
    pub status: ConnectionStatus,
    pub qr_code: Option<String>,
    pub phone_number: Option<String>,
    /// Per-session auth token handed out at creation (WPPConnect).
    #[serde(skip)]
    pub token: Option<String>,
}

/// One session listed by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteInstance {
    pub name: String,
    pub status: Option<ConnectionStatus>,
    pub phone_number: Option<String>,
}

/// One entry of the gateway's live contact list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveContact {
    pub phone: Option<String>,
    pub lid: Option<String>,
    pub push_name: Option<String>,
}

/// Client for a gateway's session management REST API.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Create the provider-side session and register our webhook.
    async fn create_instance(
        &self,
        connection: &Connection,
        webhook_url: &str,
    ) -> Result<InstanceState, ZapdeskError>;

    /// Fetch the current QR code as a data URI, if one is pending.
    async fn qr_code(&self, connection: &Connection) -> Result<Option<String>, ZapdeskError>;

    async fn status(&self, connection: &Connection) -> Result<InstanceState, ZapdeskError>;

    async fn logout(&self, connection: &Connection) -> Result<(), ZapdeskError>;

    async fn delete_instance(&self, connection: &Connection) -> Result<(), ZapdeskError>;

    async fn server_health(&self) -> Result<serde_json::Value, ZapdeskError>;

    async fn fetch_instances(&self) -> Result<Vec<RemoteInstance>, ZapdeskError>;

    /// Bulk contact listing used to pair LIDs with real phone numbers.
    async fn fetch_contacts(&self, connection: &Connection)
    -> Result<Vec<LiveContact>, ZapdeskError>;
}
